//! Karpenter cloud provider facade

use crate::drift;
use crate::error::{CloudProviderError, Result};
use crate::store::NodeClassStore;
use chrono::Utc;
use karpenter_cloudstack_api::labels::{
    ARCHITECTURE_AMD64, CAPACITY_TYPE_ON_DEMAND, LABEL_ARCHITECTURE, LABEL_CAPACITY_TYPE,
    LABEL_INSTANCE_TYPE, LABEL_NETWORK_ID, LABEL_NODE_POOL, LABEL_OS, LABEL_SERVICE_OFFERING_ID,
    LABEL_SERVICE_OFFERING_NAME, LABEL_TEMPLATE_ID, LABEL_TEMPLATE_NAME, LABEL_TOPOLOGY_ZONE,
    LABEL_ZONE_ID, LABEL_ZONE_NAME, OS_LINUX, TAG_NODE_CLAIM, TAG_NODE_CLASS, TAG_NODE_POOL,
};
use karpenter_cloudstack_api::{ConditionStatus, InstanceType, NodeClaim, NodeClass};
use karpenter_cloudstack_providers::{Instance, InstanceProvider, InstanceTypeProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const PROVIDER_NAME: &str = "cloudstack";
pub const PROVIDER_ID_SCHEME: &str = "cloudstack://";

/// Create failure reason when instance types cannot be resolved
pub const REASON_INSTANCE_TYPE_RESOLUTION_FAILED: &str = "InstanceTypeResolutionFailed";

const NODE_CONDITION_READY: &str = "Ready";
const NODE_REPAIR_TOLERATION: Duration = Duration::from_secs(30 * 60);

/// Node condition the orchestrator may repair after it persisted long enough
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairPolicy {
    pub condition_type: String,
    pub condition_status: ConditionStatus,
    pub toleration_duration: Duration,
}

/// `cloudstack://<zone>/<instance-id>`
pub fn format_provider_id(zone: &str, instance_id: &str) -> String {
    format!("{}{}/{}", PROVIDER_ID_SCHEME, zone, instance_id)
}

/// Instance ID from a provider ID: the segment after the last `/`
pub fn parse_provider_id(provider_id: &str) -> Result<String> {
    let id = provider_id.rsplit('/').next().unwrap_or_default();
    if id.is_empty() {
        return Err(CloudProviderError::InvalidProviderId(provider_id.to_string()));
    }
    Ok(id.to_string())
}

/// Implements the orchestrator's cloud provider contract on top of the
/// instance and instance type providers
pub struct CloudProvider {
    instances: Arc<InstanceProvider>,
    instance_types: Arc<InstanceTypeProvider>,
    node_classes: Arc<dyn NodeClassStore>,
    shutdown: CancellationToken,
}

impl CloudProvider {
    pub fn new(
        instances: Arc<InstanceProvider>,
        instance_types: Arc<InstanceTypeProvider>,
        node_classes: Arc<dyn NodeClassStore>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            instances,
            instance_types,
            node_classes,
            shutdown,
        }
    }

    pub fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    /// Launch an instance for `node_claim` and return the populated claim
    pub async fn create(&self, node_claim: &NodeClaim) -> Result<NodeClaim> {
        let node_class = self.resolve_node_class(node_claim).await.ok_or_else(|| {
            CloudProviderError::InsufficientCapacity(format!(
                "NodeClass {} not found for NodeClaim {}",
                node_claim.node_class_ref.as_deref().unwrap_or_default(),
                node_claim.name
            ))
        })?;

        if !node_class.is_ready() {
            return Err(CloudProviderError::NodeClassNotReady(node_class.name));
        }

        let instance_types = self
            .instance_types
            .list(&node_class)
            .await
            .map_err(|e| {
                CloudProviderError::create_error(REASON_INSTANCE_TYPE_RESOLUTION_FAILED, e)
            })?;

        let instance = self
            .instances
            .create(&node_class, node_claim, &instance_types, &self.shutdown)
            .await?;

        let mut created = self.to_node_claim(&instance);
        created.node_class_ref = Some(node_class.name.clone());
        drift::annotate(&mut created, &node_class);

        tracing::info!(
            "Created NodeClaim {} as instance {} ({})",
            node_claim.name,
            instance.id,
            created.status.provider_id
        );
        Ok(created)
    }

    /// NodeClaim backed by the instance behind `provider_id`
    pub async fn get(&self, provider_id: &str) -> Result<NodeClaim> {
        let id = parse_provider_id(provider_id)?;
        let instance = self.instances.get(&id).await.map_err(|e| {
            if e.is_not_found() {
                CloudProviderError::NodeClaimNotFound(provider_id.to_string())
            } else {
                e.into()
            }
        })?;

        Ok(self.to_node_claim(&instance))
    }

    /// NodeClaims for every instance this cluster manages
    pub async fn list(&self) -> Result<Vec<NodeClaim>> {
        let instances = self.instances.list().await?;
        Ok(instances.iter().map(|i| self.to_node_claim(i)).collect())
    }

    /// Terminate the instance of `node_claim`; unknown instances are a no-op
    pub async fn delete(&self, node_claim: &NodeClaim) -> Result<()> {
        let id = parse_provider_id(&node_claim.status.provider_id)?;
        self.instances.delete(&id, &self.shutdown).await?;

        tracing::info!("Deleted NodeClaim {} (instance {})", node_claim.name, id);
        Ok(())
    }

    /// Instance types offered by `node_class`
    pub async fn get_instance_types(&self, node_class: &NodeClass) -> Result<Vec<InstanceType>> {
        Ok(self.instance_types.list(node_class).await?)
    }

    /// Drift reason of `node_claim`, if any
    ///
    /// A NodeClaim whose NodeClass is gone is left to the orchestrator's own
    /// garbage collection and is not reported as drifted.
    pub async fn is_drifted(&self, node_claim: &NodeClaim) -> Result<Option<&'static str>> {
        let Some(node_class) = self.resolve_node_class(node_claim).await else {
            return Ok(None);
        };
        Ok(drift::drift_reason(node_claim, &node_class))
    }

    pub fn repair_policies(&self) -> Vec<RepairPolicy> {
        [ConditionStatus::False, ConditionStatus::Unknown]
            .into_iter()
            .map(|status| RepairPolicy {
                condition_type: NODE_CONDITION_READY.to_string(),
                condition_status: status,
                toleration_duration: NODE_REPAIR_TOLERATION,
            })
            .collect()
    }

    async fn resolve_node_class(&self, node_claim: &NodeClaim) -> Option<NodeClass> {
        let name = node_claim.node_class_ref.as_deref()?;
        self.node_classes
            .get(name)
            .await
            .filter(|nc| !nc.is_deleting())
    }

    fn to_node_claim(&self, instance: &Instance) -> NodeClaim {
        let mut node_claim =
            NodeClaim::new(instance.tag(TAG_NODE_CLAIM).unwrap_or(&instance.name));
        node_claim.node_class_ref = instance.tag(TAG_NODE_CLASS).map(str::to_string);

        let labels = [
            (LABEL_TOPOLOGY_ZONE, instance.zone.as_str()),
            (LABEL_INSTANCE_TYPE, instance.service_offering.as_str()),
            (LABEL_CAPACITY_TYPE, CAPACITY_TYPE_ON_DEMAND),
            (LABEL_ARCHITECTURE, ARCHITECTURE_AMD64),
            (LABEL_OS, OS_LINUX),
            (LABEL_ZONE_ID, instance.zone_id.as_str()),
            (LABEL_ZONE_NAME, instance.zone.as_str()),
            (LABEL_NETWORK_ID, instance.network_id.as_str()),
            (LABEL_SERVICE_OFFERING_ID, instance.service_offering_id.as_str()),
            (LABEL_SERVICE_OFFERING_NAME, instance.service_offering.as_str()),
            (LABEL_TEMPLATE_ID, instance.template_id.as_str()),
            (LABEL_TEMPLATE_NAME, instance.template.as_str()),
        ];
        for (key, value) in labels {
            if !value.is_empty() {
                node_claim.labels.insert(key.to_string(), value.to_string());
            }
        }
        if let Some(node_pool) = instance.tag(TAG_NODE_POOL) {
            node_claim
                .labels
                .insert(LABEL_NODE_POOL.to_string(), node_pool.to_string());
        }

        node_claim.creation_timestamp = instance.created_time;
        if instance.is_terminating() {
            node_claim.deletion_timestamp = Some(Utc::now());
        }
        node_claim.status.provider_id = format_provider_id(&instance.zone, &instance.id);
        node_claim.status.image_id = instance.template_id.clone();
        node_claim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_provider_id() {
        assert_eq!(
            format_provider_id("zone-1", "vm-1"),
            "cloudstack://zone-1/vm-1"
        );
    }

    #[test]
    fn test_parse_provider_id() {
        assert_eq!(parse_provider_id("cloudstack://zone-1/vm-1").unwrap(), "vm-1");
        assert_eq!(parse_provider_id("vm-1").unwrap(), "vm-1");

        for invalid in ["", "cloudstack://zone-1/"] {
            let err = parse_provider_id(invalid).unwrap_err();
            assert!(matches!(err, CloudProviderError::InvalidProviderId(_)));
        }
    }
}
