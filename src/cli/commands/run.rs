//! Run command - Execute a single module
//!
//! Parameters come from an optional YAML/JSON file, then from repeated
//! `-a key=value` arguments, which win on conflict.

use super::CommandContext;
use crate::cli::{parse_module_arg, read_params_file};
use anyhow::Result;
use clap::Parser;
use rustible_azure::error::Error;
use rustible_azure::modules::{ModuleParams, ModuleStatus};
use std::path::PathBuf;
use tracing::debug;

/// Arguments for the run command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Module to run (e.g. azure_rm_storageaccount)
    #[arg(required = true)]
    pub module: String,

    /// Module argument as key=value (repeatable)
    #[arg(short = 'a', long = "args", action = clap::ArgAction::Append)]
    pub args: Vec<String>,

    /// YAML or JSON file with module parameters
    #[arg(short = 'p', long = "params")]
    pub params_file: Option<PathBuf>,

    /// Report what would change without changing it
    #[arg(long = "check")]
    pub check_mode: bool,

    /// Show before/after state of changed resources
    #[arg(long = "diff")]
    pub diff_mode: bool,
}

impl RunArgs {
    /// Collect module parameters from the params file and `-a` arguments
    pub fn collect_params(&self) -> Result<ModuleParams> {
        let mut params = ModuleParams::new();

        if let Some(path) = &self.params_file {
            let map = read_params_file(path)
                .map_err(|e| Error::module_args(&self.module, format!("{:#}", e)))?;
            params.extend(map);
        }

        for arg in &self.args {
            let (key, value) = parse_module_arg(arg)
                .map_err(|e| Error::module_args(&self.module, e.to_string()))?;
            params.insert(key, value);
        }

        Ok(params)
    }

    /// Execute the run command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let params = self.collect_params()?;
        debug!("Parameters for {}: {:?}", self.module, params.keys().collect::<Vec<_>>());

        ctx.output.task_header(&self.module);
        if self.check_mode && !ctx.output.is_json() {
            ctx.output.warning("Running in check mode; no changes will be made");
        }

        let output = ctx
            .run_module(&self.module, params, self.check_mode, self.diff_mode)
            .await?;

        ctx.output.module_result(&output);
        ctx.output.flush();

        Ok(match output.status {
            ModuleStatus::Failed => 1,
            _ => 0,
        })
    }
}
