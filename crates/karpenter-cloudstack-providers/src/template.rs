//! Template resolution

use crate::cache::TtlCache;
use crate::error::{ProviderError, Result};
use crate::network::resource_tags;
use crate::selector::{self, Selectable};
use crate::zone::ZoneProvider;
use karpenter_cloudstack_api::TemplateSelectorTerm;
use karpenter_cloudstack_client::{
    CloudStackApi, ListTemplatesParams, ResourceType, TemplateFilter, TemplateInfo,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Template status once the image is fully available
pub const TEMPLATE_STATUS_READY: &str = "Download Complete";

/// Template filters queried when listing, in order
pub const TEMPLATE_FILTERS: [TemplateFilter; 3] = [
    TemplateFilter::Featured,
    TemplateFilter::Community,
    TemplateFilter::SelfOwned,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub display_text: String,
    pub zone: String,
    pub zone_id: String,
    /// OS type ID
    pub os_type: String,
    pub os_type_name: String,
    pub status: String,
    pub is_ready: bool,
    pub is_public: bool,
    pub is_featured: bool,
    pub tags: BTreeMap<String, String>,
}

impl Template {
    fn from_info(info: TemplateInfo, tags: BTreeMap<String, String>) -> Self {
        Self {
            id: info.id,
            name: info.name,
            display_text: info.display_text,
            zone: info.zone_name,
            zone_id: info.zone_id,
            os_type: info.os_type_id,
            os_type_name: info.os_type_name,
            status: info.status,
            is_ready: info.is_ready,
            is_public: info.is_public,
            is_featured: info.is_featured,
            tags,
        }
    }
}

impl Selectable for Template {
    const KIND: &'static str = "template";

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    fn matches_os_type(&self, os_type: &str) -> bool {
        self.os_type_name == os_type || self.os_type == os_type
    }

    fn is_usable(&self) -> bool {
        self.is_ready && self.status == TEMPLATE_STATUS_READY
    }
}

/// Lists and resolves templates per zone
pub struct TemplateProvider {
    api: Arc<dyn CloudStackApi>,
    zones: Arc<ZoneProvider>,
    cache: TtlCache<Vec<Template>>,
}

impl TemplateProvider {
    pub fn new(api: Arc<dyn CloudStackApi>, zones: Arc<ZoneProvider>, cache_ttl: Duration) -> Self {
        Self {
            api,
            zones,
            cache: TtlCache::new(cache_ttl),
        }
    }

    /// Featured, community and own templates of `zone`, deduplicated by ID
    ///
    /// A filter that fails is skipped; the call fails only when every filter
    /// does.
    pub async fn list(&self, zone: &str) -> Result<Vec<Template>> {
        let key = format!("templates-{}", zone);
        self.cache
            .get_or_fetch(&key, self.cache.default_ttl(), || self.fetch(zone))
            .await
    }

    async fn fetch(&self, zone: &str) -> Result<Vec<Template>> {
        let zone_info = self.zones.lookup(zone).await?;

        let mut infos = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0;
        for filter in TEMPLATE_FILTERS {
            let params = ListTemplatesParams::new(filter).with_zone_id(&zone_info.id);
            match self.api.list_templates(&params).await {
                Ok(batch) => {
                    succeeded += 1;
                    infos.extend(batch);
                }
                Err(e) => {
                    tracing::warn!("Failed to list {} templates in zone {}: {}", filter, zone, e);
                    last_error = Some(e);
                }
            }
        }

        if succeeded == 0 {
            if let Some(e) = last_error {
                return Err(ProviderError::Client {
                    context: format!("list templates in zone {}", zone),
                    source: e,
                });
            }
        }

        let mut seen = HashSet::new();
        let mut templates = Vec::new();
        for info in infos {
            if !seen.insert(info.id.clone()) {
                continue;
            }
            let tags = resource_tags(self.api.as_ref(), &info.id, ResourceType::Template).await;
            templates.push(Template::from_info(info, tags));
        }

        tracing::info!("Listed {} template(s) in zone {}", templates.len(), zone);
        Ok(templates)
    }

    /// Ready templates of `zone` picked by `terms`
    pub async fn resolve(
        &self,
        terms: &[TemplateSelectorTerm],
        zone: &str,
    ) -> Result<Vec<Template>> {
        let templates = self.list(zone).await?;
        selector::resolve(&templates, terms, zone)
    }

    pub async fn get(&self, id: &str, zone: &str) -> Result<Template> {
        self.list(zone)
            .await?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| ProviderError::not_found("template", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use karpenter_cloudstack_client::fake::{self, FakeCloudStackApi, FakeOperation};

    fn setup() -> (Arc<FakeCloudStackApi>, TemplateProvider) {
        let api = Arc::new(FakeCloudStackApi::new());
        api.add_zone(fake::zone("z1", "zone-1"));
        // featured and public: served by two filters
        api.add_template(fake::template("tpl-ubuntu", "ubuntu-22.04", "z1"));
        api.add_template(TemplateInfo {
            is_featured: false,
            is_public: false,
            os_type_id: "ostype-rocky".to_string(),
            os_type_name: "Rocky Linux 9".to_string(),
            ..fake::template("tpl-rocky", "rocky-9", "z1")
        });

        let zones = Arc::new(ZoneProvider::new(api.clone(), Duration::from_secs(900)));
        let provider = TemplateProvider::new(api.clone(), zones, Duration::from_secs(900));
        (api, provider)
    }

    #[tokio::test]
    async fn test_list_fans_out_and_deduplicates() {
        let (api, provider) = setup();

        let templates = provider.list("zone-1").await.unwrap();
        let ids: Vec<&str> = templates.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["tpl-ubuntu", "tpl-rocky"]);
        assert_eq!(api.calls(FakeOperation::ListTemplates), 3);
    }

    #[tokio::test]
    async fn test_failing_filter_is_skipped() {
        let (api, provider) = setup();
        api.fail_template_filter(TemplateFilter::Featured);

        let templates = provider.list("zone-1").await.unwrap();
        assert_eq!(templates.len(), 2);
    }

    #[tokio::test]
    async fn test_all_filters_failing_is_an_error() {
        let (api, provider) = setup();
        api.fail(FakeOperation::ListTemplates, "api unavailable");

        let err = provider.list("zone-1").await.unwrap_err();
        assert!(matches!(err, ProviderError::Client { .. }));

        api.clear_failure(FakeOperation::ListTemplates);
        assert_eq!(provider.list("zone-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_by_os_type_name_or_id() {
        let (_api, provider) = setup();

        let by_name = vec![TemplateSelectorTerm::by_os_type("Rocky Linux 9")];
        let resolved = provider.resolve(&by_name, "zone-1").await.unwrap();
        assert_eq!(resolved[0].id, "tpl-rocky");

        let by_id = vec![TemplateSelectorTerm::by_os_type("ostype-ubuntu")];
        let resolved = provider.resolve(&by_id, "zone-1").await.unwrap();
        assert_eq!(resolved[0].id, "tpl-ubuntu");
    }

    #[tokio::test]
    async fn test_resolve_skips_templates_not_ready() {
        let (api, provider) = setup();
        api.add_template(TemplateInfo {
            is_ready: false,
            status: "Downloading".to_string(),
            ..fake::template("tpl-new", "ubuntu-24.04", "z1")
        });

        let terms = vec![TemplateSelectorTerm::by_name("ubuntu-24.04")];
        let err = provider.resolve(&terms, "zone-1").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "no templates matched the selector terms in zone zone-1"
        );
    }
}
