//! NodeClass lookup

use async_trait::async_trait;
use karpenter_cloudstack_api::NodeClass;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// Read access to the orchestrator's CloudStackNodeClass objects
#[async_trait]
pub trait NodeClassStore: Send + Sync {
    async fn get(&self, name: &str) -> Option<NodeClass>;
}

/// NodeClass store held in memory
#[derive(Default)]
pub struct InMemoryNodeClassStore {
    node_classes: RwLock<BTreeMap<String, NodeClass>>,
}

impl InMemoryNodeClassStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a NodeClass by name
    pub fn put(&self, node_class: NodeClass) {
        self.node_classes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node_class.name.clone(), node_class);
    }

    pub fn remove(&self, name: &str) -> Option<NodeClass> {
        self.node_classes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn list(&self) -> Vec<NodeClass> {
        self.node_classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NodeClassStore for InMemoryNodeClassStore {
    async fn get(&self, name: &str) -> Option<NodeClass> {
        self.node_classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}
