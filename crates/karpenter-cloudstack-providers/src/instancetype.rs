//! Instance types derived from CloudStack service offerings

use crate::cache::TtlCache;
use crate::error::{ProviderError, Result};
use crate::selector::{self, NO_TAGS, Selectable};
use karpenter_cloudstack_api::labels::{
    ARCHITECTURE_AMD64, CAPACITY_TYPE_ON_DEMAND, LABEL_ARCHITECTURE, LABEL_CAPACITY_TYPE,
    LABEL_INSTANCE_TYPE, LABEL_OS, LABEL_SERVICE_OFFERING_ID, LABEL_TOPOLOGY_ZONE, OS_LINUX,
};
use karpenter_cloudstack_api::{InstanceType, NodeClass, Offering, Resources, SelectorTerm};
use karpenter_cloudstack_client::{CloudStackApi, ListServiceOfferingsParams, ServiceOfferingInfo};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Pods schedulable per node
pub const MAX_PODS: u64 = 110;
/// CPU reserved for the kubelet, in millicores
pub const KUBE_RESERVED_CPU_MILLIS: u64 = 100;
/// Memory reserved for the kubelet
pub const KUBE_RESERVED_MEMORY_BYTES: u64 = 256 * MIB;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOffering {
    pub id: String,
    pub name: String,
    pub cpu_number: u32,
    /// MHz
    pub cpu_speed: u32,
    /// MB
    pub memory: u64,
    /// Mbps
    pub network_rate: u32,
}

impl ServiceOffering {
    /// Placeholder hourly price: 0.04 per core plus 0.005 per GB of memory
    pub fn price(&self) -> f64 {
        f64::from(self.cpu_number) * 0.04 + (self.memory as f64 / 1024.0) * 0.005
    }

    pub fn capacity(&self) -> Resources {
        Resources {
            cpu_millis: u64::from(self.cpu_number) * 1000,
            memory_bytes: self.memory * MIB,
            pods: MAX_PODS,
        }
    }

    /// Instance type offered in `zone`
    pub fn to_instance_type(&self, zone: &str) -> InstanceType {
        let requirement = |key: &str, value: &str| (key.to_string(), vec![value.to_string()]);

        InstanceType {
            name: self.name.clone(),
            requirements: BTreeMap::from([
                requirement(LABEL_INSTANCE_TYPE, &self.name),
                requirement(LABEL_TOPOLOGY_ZONE, zone),
                requirement(LABEL_CAPACITY_TYPE, CAPACITY_TYPE_ON_DEMAND),
                requirement(LABEL_ARCHITECTURE, ARCHITECTURE_AMD64),
                requirement(LABEL_OS, OS_LINUX),
                requirement(LABEL_SERVICE_OFFERING_ID, &self.id),
            ]),
            offerings: vec![Offering {
                zone: zone.to_string(),
                capacity_type: CAPACITY_TYPE_ON_DEMAND.to_string(),
                price: self.price(),
                available: true,
            }],
            capacity: self.capacity(),
            overhead: Resources {
                cpu_millis: KUBE_RESERVED_CPU_MILLIS,
                memory_bytes: KUBE_RESERVED_MEMORY_BYTES,
                pods: 0,
            },
        }
    }
}

impl From<ServiceOfferingInfo> for ServiceOffering {
    fn from(info: ServiceOfferingInfo) -> Self {
        Self {
            id: info.id,
            name: info.name,
            cpu_number: info.cpu_number,
            cpu_speed: info.cpu_speed,
            memory: info.memory,
            network_rate: info.network_rate,
        }
    }
}

/// Service offerings carry no tags, so tag-only terms match nothing
impl Selectable for ServiceOffering {
    const KIND: &'static str = "service offering";

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &BTreeMap<String, String> {
        &NO_TAGS
    }
}

/// Resolves service offerings and maps them to instance types
pub struct InstanceTypeProvider {
    api: Arc<dyn CloudStackApi>,
    cache: TtlCache<Vec<ServiceOffering>>,
}

impl InstanceTypeProvider {
    pub fn new(api: Arc<dyn CloudStackApi>, cache_ttl: Duration) -> Self {
        Self {
            api,
            cache: TtlCache::new(cache_ttl),
        }
    }

    /// All service offerings, cached per zone
    pub async fn list_service_offerings(&self, zone: &str) -> Result<Vec<ServiceOffering>> {
        let key = format!("service-offerings-{}", zone);
        self.cache
            .get_or_fetch(&key, self.cache.default_ttl(), || async {
                let offerings = self
                    .api
                    .list_service_offerings(&ListServiceOfferingsParams::default())
                    .await
                    .map_err(ProviderError::client("list service offerings"))?;

                tracing::info!("Listed {} service offering(s)", offerings.len());
                Ok::<_, ProviderError>(offerings.into_iter().map(ServiceOffering::from).collect())
            })
            .await
    }

    /// Service offerings picked by `terms`
    pub async fn resolve(&self, terms: &[SelectorTerm], zone: &str) -> Result<Vec<ServiceOffering>> {
        let offerings = self.list_service_offerings(zone).await?;
        selector::resolve(&offerings, terms, zone)
    }

    /// Instance types available to `node_class`
    pub async fn list(&self, node_class: &NodeClass) -> Result<Vec<InstanceType>> {
        let zone = &node_class.spec.zone;
        let offerings = self
            .resolve(&node_class.spec.service_offering_selector_terms, zone)
            .await?;

        let instance_types: Vec<InstanceType> = offerings
            .iter()
            .map(|offering| offering.to_instance_type(zone))
            .collect();

        tracing::info!(
            "Listed {} instance type(s) for NodeClass {}",
            instance_types.len(),
            node_class.name
        );
        Ok(instance_types)
    }

    pub async fn get(&self, node_class: &NodeClass, name: &str) -> Result<InstanceType> {
        self.list(node_class)
            .await?
            .into_iter()
            .find(|it| it.name == name)
            .ok_or_else(|| ProviderError::not_found("instance type", name))
    }
}
