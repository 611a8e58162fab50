//! Doc and list commands

use super::CommandContext;
use anyhow::Result;
use clap::Parser;

/// Arguments for the doc command
#[derive(Parser, Debug, Clone)]
pub struct DocArgs {
    /// Module to describe
    #[arg(required = true)]
    pub module: String,
}

impl DocArgs {
    /// Execute the doc command
    pub fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        let module = ctx.module(&self.module)?;
        ctx.output
            .module_doc(module.name(), module.description(), &module.params());
        Ok(0)
    }
}

/// Execute the list command
pub fn list(ctx: &CommandContext) -> Result<i32> {
    let modules: Vec<(&str, &str)> = ctx
        .registry
        .names()
        .into_iter()
        .filter_map(|name| ctx.registry.get(name))
        .map(|module| (module.name(), module.description()))
        .collect();

    ctx.output.module_list(&modules);
    Ok(0)
}
