//! Request parameters
//!
//! Plain value types so that any [`CloudStackApi`](crate::CloudStackApi)
//! implementation can consume them without knowing who built them.

use std::collections::BTreeMap;

/// CloudStack resource types used by the tag API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    UserVm,
    Network,
    Template,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::UserVm => "UserVm",
            ResourceType::Network => "Network",
            ResourceType::Template => "Template",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `templatefilter` values of `listTemplates`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateFilter {
    Featured,
    Community,
    /// Templates owned by the caller
    SelfOwned,
    Executable,
    All,
}

impl TemplateFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateFilter::Featured => "featured",
            TemplateFilter::Community => "community",
            TemplateFilter::SelfOwned => "self",
            TemplateFilter::Executable => "executable",
            TemplateFilter::All => "all",
        }
    }
}

impl std::fmt::Display for TemplateFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of `deployVirtualMachine`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployVirtualMachineParams {
    pub service_offering_id: String,
    pub template_id: String,
    pub zone_id: String,
    pub network_ids: Vec<String>,
    pub name: Option<String>,
    pub display_name: Option<String>,
    /// Base64-encoded user data
    pub user_data: Option<String>,
    /// Root disk size in GB
    pub root_disk_size: Option<i64>,
    pub disk_offering_id: Option<String>,
    pub key_pair: Option<String>,
}

impl DeployVirtualMachineParams {
    pub fn new(
        service_offering_id: impl Into<String>,
        template_id: impl Into<String>,
        zone_id: impl Into<String>,
    ) -> Self {
        Self {
            service_offering_id: service_offering_id.into(),
            template_id: template_id.into(),
            zone_id: zone_id.into(),
            ..Default::default()
        }
    }

    pub fn with_network_ids(mut self, network_ids: Vec<String>) -> Self {
        self.network_ids = network_ids;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_user_data(mut self, user_data: impl Into<String>) -> Self {
        self.user_data = Some(user_data.into());
        self
    }

    pub fn with_root_disk_size(mut self, size_gb: i64) -> Self {
        self.root_disk_size = Some(size_gb);
        self
    }

    pub fn with_disk_offering_id(mut self, disk_offering_id: impl Into<String>) -> Self {
        self.disk_offering_id = Some(disk_offering_id.into());
        self
    }

    pub fn with_key_pair(mut self, key_pair: impl Into<String>) -> Self {
        self.key_pair = Some(key_pair.into());
        self
    }
}

/// Parameters of `listVirtualMachines`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListVirtualMachinesParams {
    pub id: Option<String>,
    pub zone_id: Option<String>,
    pub name: Option<String>,
}

impl ListVirtualMachinesParams {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }
}

/// Parameters of `destroyVirtualMachine`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestroyVirtualMachineParams {
    pub id: String,
    pub expunge: bool,
}

impl DestroyVirtualMachineParams {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            expunge: false,
        }
    }

    pub fn with_expunge(mut self, expunge: bool) -> Self {
        self.expunge = expunge;
        self
    }
}

/// Parameters of `listServiceOfferings`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListServiceOfferingsParams {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Parameters of `listTemplates`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListTemplatesParams {
    pub filter: TemplateFilter,
    pub zone_id: Option<String>,
    pub id: Option<String>,
}

impl ListTemplatesParams {
    pub fn new(filter: TemplateFilter) -> Self {
        Self {
            filter,
            zone_id: None,
            id: None,
        }
    }

    pub fn with_zone_id(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = Some(zone_id.into());
        self
    }
}

/// Parameters of `listNetworks`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListNetworksParams {
    pub zone_id: Option<String>,
    pub id: Option<String>,
}

impl ListNetworksParams {
    pub fn in_zone(zone_id: impl Into<String>) -> Self {
        Self {
            zone_id: Some(zone_id.into()),
            ..Default::default()
        }
    }
}

/// Parameters of `listZones`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListZonesParams {
    /// Only zones available to the caller
    pub available: Option<bool>,
    pub id: Option<String>,
    pub name: Option<String>,
}

impl ListZonesParams {
    pub fn available() -> Self {
        Self {
            available: Some(true),
            ..Default::default()
        }
    }
}

/// Parameters of `createTags`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTagsParams {
    pub resource_ids: Vec<String>,
    pub resource_type: ResourceType,
    pub tags: BTreeMap<String, String>,
}

impl CreateTagsParams {
    pub fn new(
        resource_ids: Vec<String>,
        resource_type: ResourceType,
        tags: BTreeMap<String, String>,
    ) -> Self {
        Self {
            resource_ids,
            resource_type,
            tags,
        }
    }
}

/// Parameters of `listTags`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListTagsParams {
    pub resource_id: String,
    pub resource_type: ResourceType,
}

impl ListTagsParams {
    pub fn new(resource_id: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_type,
        }
    }
}

/// Parameters of `deleteTags`; an empty `tags` map deletes every tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTagsParams {
    pub resource_ids: Vec<String>,
    pub resource_type: ResourceType,
    pub tags: BTreeMap<String, String>,
}

impl DeleteTagsParams {
    pub fn new(resource_ids: Vec<String>, resource_type: ResourceType) -> Self {
        Self {
            resource_ids,
            resource_type,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}
