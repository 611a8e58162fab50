//! Ansible command - Run as an Ansible binary module
//!
//! Ansible copies a JSON file of the form `{"ANSIBLE_MODULE_ARGS": {...}}`
//! to the target and passes its path as the only argument. The result is
//! always a single JSON object on stdout, including on failure.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use rustible_azure::modules::{ModuleOutput, ModuleParams, ModuleStatus};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

const ARGS_KEY: &str = "ANSIBLE_MODULE_ARGS";
const INTERNAL_PREFIX: &str = "_ansible_";

/// Arguments for the ansible command
#[derive(Parser, Debug, Clone)]
pub struct AnsibleArgs {
    /// Path to the JSON arguments file written by Ansible
    #[arg(required = true)]
    pub args_file: PathBuf,

    /// Module to run; defaults to `_ansible_module_name` from the arguments
    #[arg(short = 'm', long)]
    pub module: Option<String>,
}

/// Parameters plus the internal flags Ansible passes alongside them
#[derive(Debug, Default, PartialEq)]
pub struct AnsibleInvocation {
    pub module: Option<String>,
    pub params: ModuleParams,
    pub check_mode: bool,
    pub diff_mode: bool,
}

impl AnsibleInvocation {
    /// Split an args document into module parameters and `_ansible_*` flags
    pub fn parse(document: Value) -> std::result::Result<Self, String> {
        let args = match document {
            Value::Object(mut map) => match map.remove(ARGS_KEY) {
                Some(Value::Object(args)) => args,
                Some(_) => return Err(format!("{} must be a mapping", ARGS_KEY)),
                // Old-style modules get the arguments at the top level
                None => map,
            },
            _ => return Err("module arguments must be a JSON object".to_string()),
        };

        let mut invocation = AnsibleInvocation::default();
        for (key, value) in args {
            match key.strip_prefix(INTERNAL_PREFIX) {
                Some("check_mode") => invocation.check_mode = value.as_bool().unwrap_or(false),
                Some("diff") => invocation.diff_mode = value.as_bool().unwrap_or(false),
                Some("module_name") => invocation.module = value.as_str().map(str::to_string),
                Some(_) => {}
                None => {
                    invocation.params.insert(key, value);
                }
            }
        }
        Ok(invocation)
    }
}

impl AnsibleArgs {
    fn load(&self) -> std::result::Result<AnsibleInvocation, String> {
        let document = read_args_file(&self.args_file)?;
        let mut invocation = AnsibleInvocation::parse(document)?;
        if let Some(module) = &self.module {
            invocation.module = Some(module.clone());
        }
        Ok(invocation)
    }

    /// Execute the ansible command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let result = match self.load() {
            Ok(AnsibleInvocation {
                module: Some(module),
                params,
                check_mode,
                diff_mode,
            }) => ctx
                .run_module(&module, params, check_mode, diff_mode)
                .await
                .map_err(|e| e.to_string()),
            Ok(_) => Err("no module name given; pass --module".to_string()),
            Err(e) => Err(e),
        };

        let output = result.unwrap_or_else(|msg| {
            warn!("{}", msg);
            ModuleOutput::failed(msg)
        });

        let failed = output.status == ModuleStatus::Failed;
        println!("{}", render(&output));
        Ok(if failed { 1 } else { 0 })
    }
}

fn read_args_file(path: &Path) -> std::result::Result<Value, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("failed to parse {}: {}", path.display(), e))
}

/// Serialize a result the way Ansible expects, with an explicit `failed` flag
pub fn render(output: &ModuleOutput) -> String {
    let mut value = serde_json::to_value(output).unwrap_or_else(|_| Value::Object(Default::default()));
    if let Value::Object(map) = &mut value {
        map.insert(
            "failed".to_string(),
            Value::Bool(output.status == ModuleStatus::Failed),
        );
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_strips_internal_keys() {
        let invocation = AnsibleInvocation::parse(json!({
            "ANSIBLE_MODULE_ARGS": {
                "name": "rg",
                "location": "eastus",
                "_ansible_check_mode": true,
                "_ansible_diff": true,
                "_ansible_module_name": "azure_rm_resourcegroup",
                "_ansible_verbosity": 2
            }
        }))
        .unwrap();

        assert_eq!(invocation.module.as_deref(), Some("azure_rm_resourcegroup"));
        assert!(invocation.check_mode);
        assert!(invocation.diff_mode);
        assert_eq!(invocation.params.len(), 2);
        assert_eq!(invocation.params["name"], json!("rg"));
    }

    #[test]
    fn test_parse_top_level_args() {
        let invocation = AnsibleInvocation::parse(json!({"name": "rg"})).unwrap();
        assert_eq!(invocation.params["name"], json!("rg"));
        assert!(!invocation.check_mode);
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(AnsibleInvocation::parse(json!([1, 2])).is_err());
        assert!(AnsibleInvocation::parse(json!({"ANSIBLE_MODULE_ARGS": "x"})).is_err());
    }

    #[test]
    fn test_render_failed_flag() {
        let rendered: Value = serde_json::from_str(&render(&ModuleOutput::failed("boom"))).unwrap();
        assert_eq!(rendered["failed"], json!(true));
        assert_eq!(rendered["changed"], json!(false));
        assert_eq!(rendered["msg"], json!("boom"));

        let rendered: Value = serde_json::from_str(&render(
            &ModuleOutput::changed("created").with_data("id", json!("/x")),
        ))
        .unwrap();
        assert_eq!(rendered["failed"], json!(false));
        assert_eq!(rendered["id"], json!("/x"));
    }
}
