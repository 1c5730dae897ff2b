//! CloudStack API response model
//!
//! Field names follow the CloudStack wire format (lowercase, no separators).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resource tag attached to a CloudStack resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTag {
    pub key: String,
    pub value: String,
    #[serde(default, rename = "resourceid")]
    pub resource_id: String,
    #[serde(default, rename = "resourcetype")]
    pub resource_type: String,
}

impl ResourceTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nic {
    pub id: String,
    #[serde(rename = "networkid")]
    pub network_id: String,
    #[serde(default, rename = "networkname")]
    pub network_name: String,
    #[serde(default, rename = "ipaddress")]
    pub ip_address: String,
    #[serde(default, rename = "isdefault")]
    pub is_default: bool,
}

/// Virtual machine as returned by `listVirtualMachines`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "displayname")]
    pub display_name: String,
    pub state: String,
    #[serde(rename = "zoneid")]
    pub zone_id: String,
    #[serde(default, rename = "zonename")]
    pub zone_name: String,
    #[serde(default, rename = "serviceofferingid")]
    pub service_offering_id: String,
    #[serde(default, rename = "serviceofferingname")]
    pub service_offering_name: String,
    #[serde(default, rename = "templateid")]
    pub template_id: String,
    #[serde(default, rename = "templatename")]
    pub template_name: String,
    /// Creation time, e.g. `2024-01-15T10:30:00+0000`
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub nic: Vec<Nic>,
    #[serde(default)]
    pub tags: Vec<ResourceTag>,
}

impl VirtualMachine {
    pub fn is_running(&self) -> bool {
        self.state == "Running"
    }

    /// Network ID of the first NIC
    pub fn network_id(&self) -> Option<&str> {
        self.nic.first().map(|n| n.network_id.as_str())
    }

    /// IP address of the first NIC
    pub fn ip_address(&self) -> Option<&str> {
        self.nic
            .first()
            .map(|n| n.ip_address.as_str())
            .filter(|ip| !ip.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneInfo {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "networktype")]
    pub network_type: String,
    #[serde(default, rename = "allocationstate")]
    pub allocation_state: String,
    #[serde(default, rename = "localstorageenabled")]
    pub local_storage_enabled: bool,
    #[serde(default, rename = "securitygroupsenabled")]
    pub security_groups_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "zoneid")]
    pub zone_id: String,
    #[serde(default, rename = "zonename")]
    pub zone_name: String,
    #[serde(default, rename = "type")]
    pub network_type: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub cidr: String,
    #[serde(default)]
    pub gateway: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateInfo {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "displaytext")]
    pub display_text: String,
    #[serde(rename = "zoneid")]
    pub zone_id: String,
    #[serde(default, rename = "zonename")]
    pub zone_name: String,
    #[serde(default, rename = "ostypeid")]
    pub os_type_id: String,
    #[serde(default, rename = "ostypename")]
    pub os_type_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "isready")]
    pub is_ready: bool,
    #[serde(default, rename = "ispublic")]
    pub is_public: bool,
    #[serde(default, rename = "isfeatured")]
    pub is_featured: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOfferingInfo {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "cpunumber")]
    pub cpu_number: u32,
    #[serde(default, rename = "cpuspeed")]
    pub cpu_speed: u32,
    /// Memory in MB
    #[serde(default)]
    pub memory: u64,
    #[serde(default, rename = "networkrate")]
    pub network_rate: u32,
}

/// Paged list response carrying the total count
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub count: usize,
    pub items: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

/// Response of `deployVirtualMachine`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployVirtualMachineResponse {
    pub id: String,
    #[serde(default, rename = "jobid", skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

/// Response of an asynchronous command that only reports its job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncJobResponse {
    #[serde(default, rename = "jobid", skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
    Unknown(i32),
}

impl From<i32> for JobStatus {
    fn from(code: i32) -> Self {
        match code {
            0 => JobStatus::Pending,
            1 => JobStatus::Succeeded,
            2 => JobStatus::Failed,
            other => JobStatus::Unknown(other),
        }
    }
}

/// Response of `queryAsyncJobResult`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AsyncJobResult {
    #[serde(rename = "jobid")]
    pub job_id: String,
    #[serde(rename = "jobstatus")]
    pub job_status: i32,
    #[serde(default, rename = "jobresultcode")]
    pub job_result_code: i32,
    #[serde(default, rename = "jobresult", skip_serializing_if = "Option::is_none")]
    pub job_result: Option<Value>,
}

impl AsyncJobResult {
    pub fn status(&self) -> JobStatus {
        JobStatus::from(self.job_status)
    }

    /// Error message of a failed job
    pub fn error_text(&self) -> String {
        match &self.job_result {
            Some(Value::Object(obj)) => obj
                .get("errortext")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(obj.clone()).to_string()),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "unknown error".to_string(),
        }
    }
}
