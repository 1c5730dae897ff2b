//! NodeClaim abstraction exchanged with the orchestrator

use crate::labels::LABEL_NODE_POOL;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeClaimStatus {
    /// `cloudstack://<zone>/<instance-id>`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider_id: String,

    /// Template ID the instance booted from
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_id: String,
}

/// A request for, or the observed state of, one node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeClaim {
    pub name: String,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    /// Name of the referenced CloudStackNodeClass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_class_ref: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub status: NodeClaimStatus,
}

impl NodeClaim {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_node_class(mut self, node_class: impl Into<String>) -> Self {
        self.node_class_ref = Some(node_class.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// NodePool that owns this claim, if labelled
    pub fn node_pool(&self) -> Option<&str> {
        self.labels
            .get(LABEL_NODE_POOL)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}
