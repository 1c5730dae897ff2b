//! NodeClass status reconciliation

use karpenter_cloudstack_api::{
    CONDITION_READY, Condition, ConditionStatus, NetworkStatus, NodeClass, ServiceOfferingStatus,
    TemplateStatus,
};
use karpenter_cloudstack_providers::{
    InstanceTypeProvider, NetworkProvider, TemplateProvider, ZoneProvider,
};
use std::sync::Arc;
use std::time::Duration;

pub const REASON_READY: &str = "Ready";
pub const REASON_ZONE_VALIDATION_FAILED: &str = "ZoneValidationFailed";
pub const REASON_NETWORK_RESOLUTION_FAILED: &str = "NetworkResolutionFailed";
pub const REASON_TEMPLATE_RESOLUTION_FAILED: &str = "TemplateResolutionFailed";
pub const REASON_SERVICE_OFFERING_RESOLUTION_FAILED: &str = "ServiceOfferingResolutionFailed";

const ZONE_FAILURE_REQUEUE: Duration = Duration::from_secs(5 * 60);
const RESOLUTION_FAILURE_REQUEUE: Duration = Duration::from_secs(60);
const READY_REQUEUE: Duration = Duration::from_secs(15 * 60);

/// Outcome of one reconcile pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileResult {
    /// When the NodeClass should be reconciled again; `None` means not at all
    pub requeue_after: Option<Duration>,
}

impl ReconcileResult {
    fn requeue(after: Duration) -> Self {
        Self {
            requeue_after: Some(after),
        }
    }

    fn done() -> Self {
        Self {
            requeue_after: None,
        }
    }
}

/// Resolves a NodeClass against the inventory and records the outcome in
/// its status
pub struct NodeClassReconciler {
    zones: Arc<ZoneProvider>,
    networks: Arc<NetworkProvider>,
    templates: Arc<TemplateProvider>,
    instance_types: Arc<InstanceTypeProvider>,
}

impl NodeClassReconciler {
    pub fn new(
        zones: Arc<ZoneProvider>,
        networks: Arc<NetworkProvider>,
        templates: Arc<TemplateProvider>,
        instance_types: Arc<InstanceTypeProvider>,
    ) -> Self {
        Self {
            zones,
            networks,
            templates,
            instance_types,
        }
    }

    pub async fn reconcile(&self, node_class: &mut NodeClass) -> ReconcileResult {
        if node_class.is_deleting() {
            tracing::debug!("NodeClass {} is being deleted, skipping", node_class.name);
            return ReconcileResult::done();
        }

        let zone = node_class.spec.zone.clone();

        if let Err(e) = self.zones.validate_zone(&zone).await {
            return not_ready(
                node_class,
                REASON_ZONE_VALIDATION_FAILED,
                format!("Zone validation failed: {}", e),
                ZONE_FAILURE_REQUEUE,
            );
        }

        let networks = match self
            .networks
            .resolve(&node_class.spec.network_selector_terms, &zone)
            .await
        {
            Ok(networks) => networks,
            Err(e) => {
                return not_ready(
                    node_class,
                    REASON_NETWORK_RESOLUTION_FAILED,
                    format!("Network resolution failed: {}", e),
                    RESOLUTION_FAILURE_REQUEUE,
                );
            }
        };

        let templates = match self
            .templates
            .resolve(&node_class.spec.template_selector_terms, &zone)
            .await
        {
            Ok(templates) => templates,
            Err(e) => {
                return not_ready(
                    node_class,
                    REASON_TEMPLATE_RESOLUTION_FAILED,
                    format!("Template resolution failed: {}", e),
                    RESOLUTION_FAILURE_REQUEUE,
                );
            }
        };

        let offerings = match self
            .instance_types
            .resolve(&node_class.spec.service_offering_selector_terms, &zone)
            .await
        {
            Ok(offerings) => offerings,
            Err(e) => {
                return not_ready(
                    node_class,
                    REASON_SERVICE_OFFERING_RESOLUTION_FAILED,
                    format!("Service offering resolution failed: {}", e),
                    RESOLUTION_FAILURE_REQUEUE,
                );
            }
        };

        node_class.status.networks = networks
            .into_iter()
            .map(|n| NetworkStatus {
                id: n.id,
                name: n.name,
                zone: n.zone,
                network_type: n.network_type,
            })
            .collect();
        node_class.status.templates = templates
            .into_iter()
            .map(|t| TemplateStatus {
                id: t.id,
                name: t.name,
                os_type: t.os_type_name,
                zone: t.zone,
            })
            .collect();
        node_class.status.service_offerings = offerings
            .into_iter()
            .map(|o| ServiceOfferingStatus {
                id: o.id,
                name: o.name,
                cpu_number: o.cpu_number,
                cpu_speed: o.cpu_speed,
                memory: o.memory,
                network_rate: o.network_rate,
            })
            .collect();

        node_class.set_condition(Condition::new(
            CONDITION_READY,
            ConditionStatus::True,
            REASON_READY,
            "NodeClass is ready",
        ));

        tracing::info!(
            nodeclass = %node_class.name,
            networks = node_class.status.networks.len(),
            templates = node_class.status.templates.len(),
            service_offerings = node_class.status.service_offerings.len(),
            "Reconciled NodeClass"
        );
        ReconcileResult::requeue(READY_REQUEUE)
    }
}

fn not_ready(
    node_class: &mut NodeClass,
    reason: &str,
    message: String,
    requeue_after: Duration,
) -> ReconcileResult {
    tracing::warn!("NodeClass {} is not ready: {}", node_class.name, message);
    node_class.set_condition(Condition::new(
        CONDITION_READY,
        ConditionStatus::False,
        reason,
        message,
    ));
    ReconcileResult::requeue(requeue_after)
}
