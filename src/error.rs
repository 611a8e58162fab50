//! Error types for rustible-azure.
//!
//! Each layer has its own error enum ([`ArmError`], [`ModuleError`],
//! [`ReconcileError`]); this module defines the crate-level [`Error`] they
//! roll up into at the CLI boundary.

use crate::arm::ArmError;
use crate::modules::ModuleError;
use crate::reconcile::ReconcileError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for rustible-azure operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for rustible-azure.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration and usage errors
    // ========================================================================
    /// Error loading a configuration file.
    #[error("Failed to load config '{path}': {message}")]
    Config {
        /// Path to the configuration file
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Invalid command-line or module arguments.
    #[error("Invalid arguments for module '{module}': {message}")]
    ModuleArgs {
        /// Module name
        module: String,
        /// Error message
        message: String,
    },

    /// Module not found.
    #[error("Module '{0}' not found")]
    ModuleNotFound(String),

    // ========================================================================
    // Execution errors
    // ========================================================================
    /// Module execution failed.
    #[error("Module '{module}' failed: {source}")]
    ModuleExecution {
        /// Module name
        module: String,
        /// Underlying module error
        #[source]
        source: ModuleError,
    },

    /// Azure Resource Manager error outside a module run.
    #[error(transparent)]
    Arm(#[from] ArmError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    // ========================================================================
    // I/O and serialization errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Generic error with source.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new config error.
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new module args error.
    pub fn module_args(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModuleArgs {
            module: module.into(),
            message: message.into(),
        }
    }

    /// Wraps a module error, classifying parameter problems as usage errors.
    pub fn module(module: impl Into<String>, source: ModuleError) -> Self {
        let module = module.into();
        match source {
            ModuleError::NotFound(name) => Self::ModuleNotFound(name),
            ModuleError::MissingParameter(_) | ModuleError::InvalidParameter(_) => {
                Self::ModuleArgs {
                    module,
                    message: source.to_string(),
                }
            }
            source => Self::ModuleExecution { module, source },
        }
    }

    /// Returns true for errors caused by how the tool was invoked rather than
    /// by what happened in Azure.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::ModuleArgs { .. }
                | Error::ModuleNotFound(_)
                | Error::YamlParse(_)
                | Error::JsonParse(_)
                | Error::TomlParse(_)
        )
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        if self.is_usage() {
            2
        } else {
            1
        }
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Adds context with a closure that is only evaluated on error.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Other {
            message: message.into(),
            source: Some(Box::new(e)),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| Error::Other {
            message: f().into(),
            source: Some(Box::new(e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::config("/x.toml", "bad").exit_code(), 2);
        assert_eq!(Error::ModuleNotFound("nope".into()).exit_code(), 2);
        assert_eq!(
            Error::module(
                "azure_rm_storageaccount",
                ModuleError::ExecutionFailed("boom".into())
            )
            .exit_code(),
            1
        );
        assert_eq!(Error::Arm(ArmError::MissingSubscription).exit_code(), 1);
    }

    #[test]
    fn test_module_parameter_errors_are_usage_errors() {
        let err = Error::module(
            "azure_rm_resourcegroup",
            ModuleError::MissingParameter("name".into()),
        );
        assert!(err.is_usage());
        assert!(err.to_string().contains("azure_rm_resourcegroup"));

        let err = Error::module("x", ModuleError::NotFound("x".into()));
        assert!(matches!(err, Error::ModuleNotFound(_)));
    }

    #[test]
    fn test_context() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = result.context("reading params").unwrap_err();
        assert_eq!(err.to_string(), "reading params");
    }
}
