//! CloudStackNodeClass model
//!
//! The NodeClass is the declarative input of the provider: the zone to launch
//! in, selector terms for networks, service offerings and templates, plus the
//! optional launch settings (user data, disk size, SSH key pair, tags).

use crate::hash::{ConfigHash, NODE_CLASS_HASH_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Condition type reporting overall NodeClass readiness
pub const CONDITION_READY: &str = "Ready";

/// Read access to the fields of a selector term
///
/// Empty strings are treated the same as unset fields.
pub trait SelectorFields {
    fn id(&self) -> Option<&str>;

    fn name(&self) -> Option<&str>;

    fn tags(&self) -> &BTreeMap<String, String>;

    /// OS type filter, only meaningful for template terms
    fn os_type(&self) -> Option<&str> {
        None
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// One OR-branch of a network or service offering selector
///
/// ID is tried first, then Name, then Tags. A tag value of `"*"` matches
/// any value for that key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorTerm {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl SelectorTerm {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn by_tag(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::default().with_tag(key, value)
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

impl SelectorFields for SelectorTerm {
    fn id(&self) -> Option<&str> {
        non_empty(&self.id)
    }

    fn name(&self) -> Option<&str> {
        non_empty(&self.name)
    }

    fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }
}

/// Template selector term, a [`SelectorTerm`] with an extra OS type filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSelectorTerm {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Matches either the OS type ID or the OS type display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_type: Option<String>,
}

impl TemplateSelectorTerm {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn by_os_type(os_type: impl Into<String>) -> Self {
        Self {
            os_type: Some(os_type.into()),
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

impl SelectorFields for TemplateSelectorTerm {
    fn id(&self) -> Option<&str> {
        non_empty(&self.id)
    }

    fn name(&self) -> Option<&str> {
        non_empty(&self.name)
    }

    fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    fn os_type(&self) -> Option<&str> {
        non_empty(&self.os_type)
    }
}

/// Desired launch configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeClassSpec {
    /// CloudStack zone name where VMs are launched
    pub zone: String,

    /// Network selector terms (ORed)
    #[serde(default)]
    pub network_selector_terms: Vec<SelectorTerm>,

    /// Service offering selector terms (ORed)
    #[serde(default)]
    pub service_offering_selector_terms: Vec<SelectorTerm>,

    /// Template selector terms (ORed)
    #[serde(default)]
    pub template_selector_terms: Vec<TemplateSelectorTerm>,

    /// cloud-init user data, base64-encoded before it is sent to CloudStack
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,

    /// Tags applied to launched instances
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,

    /// Root disk size in GB (1-1000)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_disk_size: Option<i64>,

    /// Disk offering name for data disks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_offering: Option<String>,

    /// SSH key pair name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key_pair: Option<String>,
}

impl NodeClassSpec {
    /// Drift detection hash of this spec
    pub fn hash(&self) -> ConfigHash {
        ConfigHash::of(self)
    }
}

/// Resolved network recorded in the NodeClass status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    pub id: String,
    pub name: String,
    pub zone: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network_type: String,
}

/// Resolved service offering recorded in the NodeClass status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOfferingStatus {
    pub id: String,
    pub name: String,
    pub cpu_number: u32,
    #[serde(default)]
    pub cpu_speed: u32,
    /// Memory in MB
    pub memory: u64,
    #[serde(default)]
    pub network_rate: u32,
}

/// Resolved template recorded in the NodeClass status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateStatus {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub os_type: String,
    pub zone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionStatus::True => write!(f, "True"),
            ConditionStatus::False => write!(f, "False"),
            ConditionStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Status condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
    #[serde(default)]
    pub observed_generation: i64,
}

impl Condition {
    pub fn new(
        condition_type: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            condition_type: condition_type.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
            observed_generation: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeClassStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkStatus>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_offerings: Vec<ServiceOfferingStatus>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<TemplateStatus>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// CloudStackNodeClass resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeClass {
    pub name: String,

    #[serde(default)]
    pub generation: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,

    pub spec: NodeClassSpec,

    #[serde(default)]
    pub status: NodeClassStatus,
}

impl NodeClass {
    pub fn new(name: impl Into<String>, spec: NodeClassSpec) -> Self {
        Self {
            name: name.into(),
            generation: 1,
            deletion_timestamp: None,
            spec,
            status: NodeClassStatus::default(),
        }
    }

    /// Drift detection hash of the spec
    pub fn hash(&self) -> ConfigHash {
        self.spec.hash()
    }

    pub fn hash_version(&self) -> &'static str {
        NODE_CLASS_HASH_VERSION
    }

    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn get_condition(&self, condition_type: &str) -> Option<&Condition> {
        self.status
            .conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }

    /// Insert or replace the condition of the same type
    pub fn set_condition(&mut self, mut condition: Condition) {
        condition.observed_generation = self.generation;
        match self
            .status
            .conditions
            .iter_mut()
            .find(|c| c.condition_type == condition.condition_type)
        {
            Some(existing) => {
                if existing.status == condition.status {
                    condition.last_transition_time = existing.last_transition_time;
                }
                *existing = condition;
            }
            None => self.status.conditions.push(condition),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.get_condition(CONDITION_READY)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_fields_ignore_empty_strings() {
        let term = SelectorTerm {
            id: Some(String::new()),
            name: Some("k8s-net".to_string()),
            ..Default::default()
        };

        assert_eq!(SelectorFields::id(&term), None);
        assert_eq!(SelectorFields::name(&term), Some("k8s-net"));
        assert_eq!(SelectorFields::os_type(&term), None);
    }

    #[test]
    fn test_template_term_os_type() {
        let term = TemplateSelectorTerm::by_os_type("ubuntu");
        assert_eq!(SelectorFields::os_type(&term), Some("ubuntu"));
        assert!(SelectorFields::tags(&term).is_empty());
    }

    #[test]
    fn test_set_condition_replaces_same_type() {
        let mut node_class = NodeClass::new("default", NodeClassSpec::default());
        node_class.generation = 3;

        node_class.set_condition(Condition::new(
            CONDITION_READY,
            ConditionStatus::False,
            "ZoneValidationFailed",
            "zone missing",
        ));
        assert!(!node_class.is_ready());

        node_class.set_condition(Condition::new(
            CONDITION_READY,
            ConditionStatus::True,
            "Ready",
            "NodeClass is ready",
        ));

        assert_eq!(node_class.status.conditions.len(), 1);
        assert!(node_class.is_ready());
        assert_eq!(node_class.status.conditions[0].observed_generation, 3);
    }

    #[test]
    fn test_spec_deserialize_camel_case() {
        let spec: NodeClassSpec = serde_json::from_value(serde_json::json!({
            "zone": "zone-1",
            "networkSelectorTerms": [{"name": "k8s-net"}],
            "serviceOfferingSelectorTerms": [{"id": "off-1"}],
            "templateSelectorTerms": [{"osType": "ubuntu", "tags": {"env": "*"}}],
            "rootDiskSize": 50,
            "sshKeyPair": "ops"
        }))
        .unwrap();

        assert_eq!(spec.zone, "zone-1");
        assert_eq!(spec.network_selector_terms[0].name.as_deref(), Some("k8s-net"));
        assert_eq!(spec.template_selector_terms[0].os_type.as_deref(), Some("ubuntu"));
        assert_eq!(spec.root_disk_size, Some(50));
        assert_eq!(spec.ssh_key_pair.as_deref(), Some("ops"));
    }
}
