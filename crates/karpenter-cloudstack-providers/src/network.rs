//! Network resolution

use crate::cache::TtlCache;
use crate::error::{ProviderError, Result};
use crate::selector::{self, Selectable};
use crate::zone::ZoneProvider;
use karpenter_cloudstack_api::SelectorTerm;
use karpenter_cloudstack_client::{
    CloudStackApi, ListNetworksParams, ListTagsParams, NetworkInfo, ResourceType,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Network states that accept new VMs
pub const USABLE_NETWORK_STATES: [&str; 2] = ["Implemented", "Setup"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub zone: String,
    pub zone_id: String,
    pub network_type: String,
    pub state: String,
    pub cidr: String,
    pub gateway: String,
    pub tags: BTreeMap<String, String>,
}

impl Network {
    fn from_info(info: NetworkInfo, tags: BTreeMap<String, String>) -> Self {
        Self {
            id: info.id,
            name: info.name,
            zone: info.zone_name,
            zone_id: info.zone_id,
            network_type: info.network_type,
            state: info.state,
            cidr: info.cidr,
            gateway: info.gateway,
            tags,
        }
    }
}

impl Selectable for Network {
    const KIND: &'static str = "network";

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    fn is_usable(&self) -> bool {
        USABLE_NETWORK_STATES.contains(&self.state.as_str())
    }
}

/// Fetch the tags of one resource; a failure yields no tags
pub(crate) async fn resource_tags(
    api: &dyn CloudStackApi,
    resource_id: &str,
    resource_type: ResourceType,
) -> BTreeMap<String, String> {
    match api
        .list_tags(&ListTagsParams::new(resource_id, resource_type))
        .await
    {
        Ok(tags) => tags.into_iter().map(|t| (t.key, t.value)).collect(),
        Err(e) => {
            tracing::warn!("Failed to list tags for {} {}: {}", resource_type, resource_id, e);
            BTreeMap::new()
        }
    }
}

/// Lists and resolves networks per zone
pub struct NetworkProvider {
    api: Arc<dyn CloudStackApi>,
    zones: Arc<ZoneProvider>,
    cache: TtlCache<Vec<Network>>,
}

impl NetworkProvider {
    pub fn new(api: Arc<dyn CloudStackApi>, zones: Arc<ZoneProvider>, cache_ttl: Duration) -> Self {
        Self {
            api,
            zones,
            cache: TtlCache::new(cache_ttl),
        }
    }

    /// All networks of `zone` with their tags
    pub async fn list(&self, zone: &str) -> Result<Vec<Network>> {
        let key = format!("networks-{}", zone);
        self.cache
            .get_or_fetch(&key, self.cache.default_ttl(), || async {
                let zone_info = self.zones.lookup(zone).await?;
                let infos = self
                    .api
                    .list_networks(&ListNetworksParams::in_zone(&zone_info.id))
                    .await
                    .map_err(ProviderError::client(format!("list networks in zone {}", zone)))?;

                let mut networks = Vec::with_capacity(infos.len());
                for info in infos {
                    let tags =
                        resource_tags(self.api.as_ref(), &info.id, ResourceType::Network).await;
                    networks.push(Network::from_info(info, tags));
                }

                tracing::info!("Listed {} network(s) in zone {}", networks.len(), zone);
                Ok::<_, ProviderError>(networks)
            })
            .await
    }

    /// Usable networks of `zone` picked by `terms`
    pub async fn resolve(&self, terms: &[SelectorTerm], zone: &str) -> Result<Vec<Network>> {
        let networks = self.list(zone).await?;
        selector::resolve(&networks, terms, zone)
    }

    pub async fn get(&self, id: &str, zone: &str) -> Result<Network> {
        self.list(zone)
            .await?
            .into_iter()
            .find(|n| n.id == id)
            .ok_or_else(|| ProviderError::not_found("network", id))
    }
}
