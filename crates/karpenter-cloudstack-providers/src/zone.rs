//! Zone lookup and validation

use crate::cache::TtlCache;
use crate::error::{ProviderError, Result};
use crate::selector::{self, NO_TAGS, Selectable};
use karpenter_cloudstack_api::SelectorTerm;
use karpenter_cloudstack_client::{CloudStackApi, ListZonesParams, ZoneInfo};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const ZONES_CACHE_KEY: &str = "zones";

/// Allocation state of a zone accepting new resources
pub const ZONE_ENABLED: &str = "Enabled";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub network_type: String,
    pub allocation_state: String,
    pub local_storage_enabled: bool,
    pub security_groups_enabled: bool,
}

impl Zone {
    pub fn is_enabled(&self) -> bool {
        self.allocation_state == ZONE_ENABLED
    }
}

impl From<ZoneInfo> for Zone {
    fn from(info: ZoneInfo) -> Self {
        Self {
            id: info.id,
            name: info.name,
            network_type: info.network_type,
            allocation_state: info.allocation_state,
            local_storage_enabled: info.local_storage_enabled,
            security_groups_enabled: info.security_groups_enabled,
        }
    }
}

impl Selectable for Zone {
    const KIND: &'static str = "zone";

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &BTreeMap<String, String> {
        &NO_TAGS
    }

    fn is_usable(&self) -> bool {
        self.is_enabled()
    }
}

/// Lists zones available to the account, cached under a single key
pub struct ZoneProvider {
    api: Arc<dyn CloudStackApi>,
    cache: TtlCache<Vec<Zone>>,
}

impl ZoneProvider {
    pub fn new(api: Arc<dyn CloudStackApi>, cache_ttl: Duration) -> Self {
        Self {
            api,
            cache: TtlCache::new(cache_ttl),
        }
    }

    pub async fn list(&self) -> Result<Vec<Zone>> {
        self.cache
            .get_or_fetch(ZONES_CACHE_KEY, self.cache.default_ttl(), || async {
                let zones = self
                    .api
                    .list_zones(&ListZonesParams::available())
                    .await
                    .map_err(ProviderError::client("list zones"))?;

                tracing::info!("Listed {} zone(s)", zones.len());
                Ok::<_, ProviderError>(zones.into_iter().map(Zone::from).collect())
            })
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Zone> {
        self.list()
            .await?
            .into_iter()
            .find(|z| z.id == id)
            .ok_or_else(|| ProviderError::not_found("zone", id))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Zone> {
        self.list()
            .await?
            .into_iter()
            .find(|z| z.name == name)
            .ok_or_else(|| ProviderError::not_found("zone", name))
    }

    /// Zone by name or ID, regardless of its allocation state
    pub async fn lookup(&self, id_or_name: &str) -> Result<Zone> {
        self.list()
            .await?
            .into_iter()
            .find(|z| z.name == id_or_name || z.id == id_or_name)
            .ok_or_else(|| ProviderError::not_found("zone", id_or_name))
    }

    /// Zone by name or ID that is enabled for allocation
    pub async fn validate_zone(&self, id_or_name: &str) -> Result<Zone> {
        let zone = self.lookup(id_or_name).await?;
        if !zone.is_enabled() {
            return Err(ProviderError::ZoneNotEnabled {
                zone: id_or_name.to_string(),
                state: zone.allocation_state,
            });
        }
        Ok(zone)
    }

    /// Enabled zones picked by `terms`
    pub async fn resolve_zones(&self, terms: &[SelectorTerm]) -> Result<Vec<Zone>> {
        let zones = self.list().await?;
        selector::resolve(&zones, terms, "*")
    }
}
