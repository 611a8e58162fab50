//! # rustible-azure - Azure Resource Manager modules for Rustible
//!
//! Idempotent create, update and delete of Azure resources, following the
//! Ansible module contract: a module takes a parameter mapping, compares the
//! desired state with what Azure reports, changes only what differs, and
//! returns `changed` plus the resource's echoed fields.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                CLI (run / ansible / list / doc)                      │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │           Module Registry  (azure_rm_* modules, one per kind)        │
//! └─────────────────────────────────────────────────────────────────────┘
//!          │                         │                         │
//!          ▼                         ▼                         ▼
//! ┌─────────────────┐   ┌─────────────────────┐   ┌─────────────────────┐
//! │    Transform    │   │      Reconcile      │   │     ARM Poller      │
//! │ (params → body) │   │ (compare + decide)  │   │  (long-running ops) │
//! └─────────────────┘   └─────────────────────┘   └─────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │        ArmApi  (reqwest client, OAuth2 credentials, retries)         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use rustible_azure::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load(None)?;
//!     let context = ModuleContext::new().with_arm(Arc::new(config.build_client()?));
//!
//!     let params: ModuleParams = serde_json::from_value(serde_json::json!({
//!         "name": "myresourcegroup",
//!         "location": "eastus",
//!     }))?;
//!
//!     let registry = ModuleRegistry::with_builtins();
//!     let output = registry
//!         .execute("azure_rm_resourcegroup", &params, &context)
//!         .await
//!         .map_err(|e| Error::module("azure_rm_resourcegroup", e))?;
//!     println!("changed: {}", output.changed);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // Transport
    pub use crate::arm::{ArmApi, ArmClient, ArmError, ArmRequest, ArmResponse, ResourceId};

    // Configuration
    pub use crate::config::Config;

    // Error handling
    pub use crate::error::{Error, Result};

    // Module system
    pub use crate::modules::{
        Module, ModuleContext, ModuleOutput, ModuleParams, ModuleRegistry, ModuleResult,
        ModuleStatus,
    };

    // Reconciliation
    pub use crate::reconcile::{decide, Action, CompareOptions, ReconcileRequest};

    // Payload transformation
    pub use crate::transform::{CaseStyle, PayloadMapper, Transform};
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases for rustible-azure operations.
pub mod error;

/// Layered configuration: files, environment and per-task credentials.
///
/// Values are merged from `/etc/rustible/azure.toml`, `~/.rustible/azure.toml`,
/// `./rustible-azure.toml`, `$RUSTIBLE_AZURE_CONFIG` and `--config`, then
/// overridden by the `AZURE_*` environment variables the Azure SDKs use.
pub mod config;

/// Retry policies for throttled and transiently failing requests.
pub mod retry;

// ============================================================================
// Azure Resource Manager
// ============================================================================

/// ARM transport: requests, credentials, resource IDs and LRO polling.
///
/// Everything above this layer talks to Azure through the
/// [`ArmApi`](arm::ArmApi) trait, so tests can swap in an in-memory backend.
pub mod arm;

// ============================================================================
// Reconciliation
// ============================================================================

/// Desired-versus-observed comparison and the create/update/delete decision.
pub mod reconcile;

/// Snake_case parameter to camelCase ARM payload transformations.
pub mod transform;

// ============================================================================
// Modules
// ============================================================================

/// Built-in `azure_rm_*` modules.
///
/// Typed modules cover resource groups, storage accounts, SQL databases,
/// Cosmos DB accounts and Traffic Manager profiles. `azure_rm_resource` and
/// `azure_rm_resource_info` reach any other ARM resource by path.
///
/// # Example
///
/// ```rust,ignore
/// use rustible_azure::modules::{ModuleRegistry, ModuleContext, ModuleParams};
///
/// let registry = ModuleRegistry::with_builtins();
/// let params: ModuleParams = serde_json::from_value(serde_json::json!({
///     "name": "mystorageacct",
///     "resource_group": "myresourcegroup",
///     "account_type": "standard_lrs"
/// }))?;
///
/// let result = registry.execute("azure_rm_storageaccount", &params, &context).await?;
/// ```
pub mod modules;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
