//! CLI module for rustible-azure
//!
//! This module provides the command-line interface: argument parsing,
//! module parameter assembly and subcommand handling.

pub mod commands;
pub mod completions;
pub mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;

/// rustible-azure - Azure Resource Manager modules for Rustible
///
/// Runs idempotent create/update/delete modules against Azure, either
/// directly from the command line or as an Ansible binary module.
#[derive(Parser, Debug, Clone)]
#[command(name = "rustible-azure")]
#[command(author = "Rustible Contributors")]
#[command(version)]
#[command(about = "Azure Resource Manager modules for Rustible", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "RUSTIBLE_AZURE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a module
    Run(commands::run::RunArgs),

    /// Run as an Ansible binary module
    Ansible(commands::ansible::AnsibleArgs),

    /// List available modules
    List,

    /// Show a module's parameters
    Doc(commands::doc::DocArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}

/// Parse a `key=value` module argument. The value is read as a YAML scalar
/// or flow collection, so `true`, `3` and `[a, b]` keep their types.
pub fn parse_module_arg(arg: &str) -> Result<(String, Value)> {
    let Some((key, raw)) = arg.split_once('=') else {
        bail!("Invalid module argument '{}': expected key=value", arg);
    };

    let key = key.trim();
    if key.is_empty() {
        bail!("Invalid module argument '{}': empty key", arg);
    }

    let value = if raw.trim().is_empty() {
        Value::String(String::new())
    } else {
        serde_yaml::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
    };

    Ok((key.to_string(), value))
}

/// Read a YAML or JSON mapping of module parameters
pub fn read_params_file(path: &std::path::Path) -> Result<serde_json::Map<String, Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read parameters file {}", path.display()))?;

    match serde_yaml::from_str::<Value>(&content)
        .with_context(|| format!("Failed to parse parameters file {}", path.display()))?
    {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(serde_json::Map::new()),
        _ => bail!("Parameters file {} must contain a mapping", path.display()),
    }
}
