//! Cloud provider modules.
//!
//! Only Azure Resource Manager is supported. Modules talk to ARM through the
//! [`crate::arm::ArmApi`] client carried by the
//! [`ModuleContext`](crate::modules::ModuleContext).
//!
//! ## Example
//!
//! ```yaml
//! - name: Create a storage account
//!   azure_rm_storageaccount:
//!     resource_group: my-rg
//!     name: mystorage01
//!     account_type: standard_lrs
//!     kind: StorageV2
//!     tags:
//!       env: production
//! ```

pub mod azure;

pub use azure::{AzureResource, AzureRmModule};
