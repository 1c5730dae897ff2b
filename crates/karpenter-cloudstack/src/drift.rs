//! NodeClass drift detection

use karpenter_cloudstack_api::labels::{
    ANNOTATION_NODE_CLASS_HASH, ANNOTATION_NODE_CLASS_HASH_VERSION,
};
use karpenter_cloudstack_api::{NodeClaim, NodeClass};

/// Drift reason reported when the NodeClass spec changed after launch
pub const DRIFT_REASON_NODE_CLASS: &str = "NodeClassDrifted";

/// Record the current NodeClass hash on a launched claim
pub fn annotate(node_claim: &mut NodeClaim, node_class: &NodeClass) {
    let hash = node_class.hash();
    node_claim
        .annotations
        .insert(ANNOTATION_NODE_CLASS_HASH.to_string(), hash.value);
    node_claim.annotations.insert(
        ANNOTATION_NODE_CLASS_HASH_VERSION.to_string(),
        hash.version.to_string(),
    );
}

/// Drift reason if `node_claim` was launched from an older NodeClass spec
///
/// Claims without a recorded hash, or with a hash of another format
/// version, are not considered drifted. A missing annotation is not compared
/// as an empty hash, so claims launched before annotation are never replaced
/// for drift.
pub fn drift_reason(node_claim: &NodeClaim, node_class: &NodeClass) -> Option<&'static str> {
    let recorded = node_claim.annotations.get(ANNOTATION_NODE_CLASS_HASH)?;
    let version = node_claim
        .annotations
        .get(ANNOTATION_NODE_CLASS_HASH_VERSION)?;

    let current = node_class.hash();
    if version != current.version {
        tracing::debug!(
            "NodeClaim {} hash version {} differs from {}, skipping drift check",
            node_claim.name,
            version,
            current.version
        );
        return None;
    }

    (*recorded != current.value).then_some(DRIFT_REASON_NODE_CLASS)
}
