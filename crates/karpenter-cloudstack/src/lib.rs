//! Karpenter cloud provider for Apache CloudStack
//!
//! Maps the orchestrator's NodeClaim lifecycle (create, get, list, delete,
//! drift) onto CloudStack VMs, and keeps NodeClass status in sync with the
//! resources its selector terms resolve to.
//!
//! ```ignore
//! let options = Options::from_env()?;
//! let operator = Operator::new(options, api, Arc::new(InMemoryNodeClassStore::new()));
//! let node_claim = operator.cloud_provider().create(&claim).await?;
//! ```

pub mod cloudprovider;
pub mod controller;
pub mod drift;
pub mod error;
pub mod operator;
pub mod options;
pub mod store;

// Re-exports
pub use cloudprovider::{CloudProvider, RepairPolicy, format_provider_id, parse_provider_id};
pub use controller::{NodeClassReconciler, ReconcileResult};
pub use drift::DRIFT_REASON_NODE_CLASS;
pub use error::{CloudProviderError, Result};
pub use operator::Operator;
pub use options::{Options, OptionsError};
pub use store::{InMemoryNodeClassStore, NodeClassStore};
