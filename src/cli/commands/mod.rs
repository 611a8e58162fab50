//! Subcommands module for rustible-azure CLI
//!
//! This module contains all the subcommand implementations.

pub mod ansible;
pub mod doc;
pub mod run;

use crate::cli::output::OutputFormatter;
use rustible_azure::config::Config;
use rustible_azure::error::{Error, Result};
use rustible_azure::modules::{Module, ModuleContext, ModuleOutput, ModuleParams, ModuleRegistry};
use std::sync::Arc;
use tracing::{debug, info};

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
    /// Verbosity level
    pub verbosity: u8,
    /// Registered modules
    pub registry: ModuleRegistry,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        let output = OutputFormatter::new(!cli.no_color, cli.is_json(), cli.verbosity());

        Self {
            config,
            output,
            verbosity: cli.verbosity(),
            registry: ModuleRegistry::with_builtins(),
        }
    }

    /// Look up a module by name
    pub fn module(&self, name: &str) -> Result<Arc<dyn Module>> {
        self.registry
            .get(name)
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))
    }

    /// Validate and run a module.
    ///
    /// Credential parameters are moved out of `params` into a per-run copy of
    /// the configuration before the ARM client is built.
    pub async fn run_module(
        &self,
        name: &str,
        mut params: ModuleParams,
        check_mode: bool,
        diff_mode: bool,
    ) -> Result<ModuleOutput> {
        let module = self.module(name)?;

        let mut config = self.config.clone();
        config
            .apply_module_params(&mut params)
            .map_err(|e| Error::module(name, e))?;

        module
            .validate_params(&params)
            .map_err(|e| Error::module(name, e))?;

        let client = config.build_client()?;
        debug!("Running {} against subscription {:?}", name, config.azure.subscription_id);

        let context = ModuleContext::new()
            .with_check_mode(check_mode)
            .with_diff_mode(diff_mode)
            .with_arm(Arc::new(client))
            .with_polling(config.polling);

        let output = module
            .execute(&params, &context)
            .await
            .map_err(|e| Error::module(name, e))?;

        info!("{} finished: {}", name, output.status);
        Ok(output)
    }
}
