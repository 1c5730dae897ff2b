//! CloudStack provider API types
//!
//! Resource model shared by the providers and the cloud provider facade:
//! the CloudStackNodeClass, the NodeClaim abstraction, instance types,
//! well-known label keys and the drift detection hash.

pub mod hash;
pub mod instancetype;
pub mod labels;
pub mod nodeclaim;
pub mod nodeclass;

pub use hash::{ConfigHash, NODE_CLASS_HASH_VERSION};
pub use instancetype::{InstanceType, Offering, Resources};
pub use nodeclaim::{NodeClaim, NodeClaimStatus};
pub use nodeclass::{
    CONDITION_READY, Condition, ConditionStatus, NetworkStatus, NodeClass, NodeClassSpec,
    NodeClassStatus, SelectorFields, SelectorTerm, ServiceOfferingStatus, TemplateSelectorTerm,
    TemplateStatus,
};
