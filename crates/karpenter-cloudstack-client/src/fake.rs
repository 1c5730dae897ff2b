//! In-memory CloudStack inventory for tests
//!
//! `FakeCloudStackApi` keeps zones, networks, templates, service offerings,
//! VMs and tags in memory and records how often each operation was called.
//! Failures, latency, VM state progression and async job behaviour can be
//! scripted per test.

use crate::api::CloudStackApi;
use crate::error::{ClientError, Result};
use crate::model::{
    AsyncJobResponse, AsyncJobResult, DeployVirtualMachineResponse, ListResponse, NetworkInfo,
    Nic, ResourceTag, ServiceOfferingInfo, TemplateInfo, VirtualMachine, ZoneInfo,
};
use crate::params::{
    CreateTagsParams, DeleteTagsParams, DeployVirtualMachineParams, DestroyVirtualMachineParams,
    ListNetworksParams, ListServiceOfferingsParams, ListTagsParams, ListTemplatesParams,
    ListVirtualMachinesParams, ListZonesParams, ResourceType, TemplateFilter,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Operations of [`CloudStackApi`], used for call counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOperation {
    DeployVirtualMachine,
    ListVirtualMachines,
    DestroyVirtualMachine,
    ListServiceOfferings,
    ListTemplates,
    ListNetworks,
    ListZones,
    CreateTags,
    ListTags,
    DeleteTags,
    QueryAsyncJob,
}

/// CloudStack error code for a missing entity
const ERROR_CODE_NOT_FOUND: u16 = 431;
/// CloudStack error code for an internal error
const ERROR_CODE_INTERNAL: u16 = 530;

struct FakeState {
    zones: Vec<ZoneInfo>,
    networks: Vec<NetworkInfo>,
    templates: Vec<TemplateInfo>,
    service_offerings: Vec<ServiceOfferingInfo>,
    vms: Vec<VirtualMachine>,
    tags: Vec<ResourceTag>,

    calls: HashMap<FakeOperation, usize>,
    failures: HashMap<FakeOperation, String>,
    failing_tag_resources: HashSet<String>,
    failing_template_filters: HashSet<TemplateFilter>,
    latency: Option<Duration>,

    deployed: Vec<DeployVirtualMachineParams>,
    vm_polls: HashMap<String, usize>,
    running_after_polls: Option<usize>,

    async_job_polls: Option<usize>,
    async_job_failure: Option<String>,
    jobs: HashMap<String, usize>,

    next_id: usize,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            zones: Vec::new(),
            networks: Vec::new(),
            templates: Vec::new(),
            service_offerings: Vec::new(),
            vms: Vec::new(),
            tags: Vec::new(),
            calls: HashMap::new(),
            failures: HashMap::new(),
            failing_tag_resources: HashSet::new(),
            failing_template_filters: HashSet::new(),
            latency: None,
            deployed: Vec::new(),
            vm_polls: HashMap::new(),
            running_after_polls: Some(0),
            async_job_polls: None,
            async_job_failure: None,
            jobs: HashMap::new(),
            next_id: 0,
        }
    }
}

impl FakeState {
    /// Name of the zone `zone_id`, as the API reports it alongside the ID
    fn zone_name(&self, zone_id: &str) -> String {
        self.zones
            .iter()
            .find(|z| z.id == zone_id)
            .map(|z| z.name.clone())
            .unwrap_or_default()
    }

    fn tags_of(&self, resource_id: &str) -> Vec<ResourceTag> {
        self.tags
            .iter()
            .filter(|t| t.resource_id == resource_id)
            .cloned()
            .collect()
    }

    fn start_job(&mut self) -> Option<String> {
        let pending = self.async_job_polls?;
        self.next_id += 1;
        let job_id = format!("job-{}", self.next_id);
        self.jobs.insert(job_id.clone(), pending);
        Some(job_id)
    }
}

/// In-memory [`CloudStackApi`]
#[derive(Default)]
pub struct FakeCloudStackApi {
    state: Mutex<FakeState>,
}

impl FakeCloudStackApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_zone(&self, zone: ZoneInfo) {
        self.lock().zones.push(zone);
    }

    pub fn add_network(&self, network: NetworkInfo) {
        self.lock().networks.push(network);
    }

    pub fn add_template(&self, template: TemplateInfo) {
        self.lock().templates.push(template);
    }

    pub fn add_service_offering(&self, offering: ServiceOfferingInfo) {
        self.lock().service_offerings.push(offering);
    }

    pub fn add_virtual_machine(&self, vm: VirtualMachine) {
        self.lock().vms.push(vm);
    }

    pub fn add_tag(
        &self,
        resource_id: &str,
        resource_type: ResourceType,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.lock().tags.push(ResourceTag {
            key: key.into(),
            value: value.into(),
            resource_id: resource_id.to_string(),
            resource_type: resource_type.as_str().to_string(),
        });
    }

    /// Make every call of `operation` fail with an API error
    pub fn fail(&self, operation: FakeOperation, message: impl Into<String>) {
        self.lock().failures.insert(operation, message.into());
    }

    pub fn clear_failure(&self, operation: FakeOperation) {
        self.lock().failures.remove(&operation);
    }

    /// Make `listTags` fail for one resource only
    pub fn fail_list_tags_for(&self, resource_id: impl Into<String>) {
        self.lock().failing_tag_resources.insert(resource_id.into());
    }

    pub fn fail_template_filter(&self, filter: TemplateFilter) {
        self.lock().failing_template_filters.insert(filter);
    }

    /// Delay every call by `latency` before it is served
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    /// A deployed VM reports `Running` from the `polls`-th
    /// `listVirtualMachines` call on; `None` keeps it `Starting` forever
    pub fn set_vm_running_after(&self, polls: Option<usize>) {
        self.lock().running_after_polls = polls;
    }

    /// Deploy and destroy return async job IDs that stay pending for
    /// `pending_polls` queries
    pub fn set_async_jobs(&self, pending_polls: Option<usize>) {
        self.lock().async_job_polls = pending_polls;
    }

    /// Async jobs end as failed with `message`
    pub fn set_async_job_failure(&self, message: Option<String>) {
        self.lock().async_job_failure = message;
    }

    pub fn calls(&self, operation: FakeOperation) -> usize {
        self.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Parameters of every deploy call, in order
    pub fn deployed(&self) -> Vec<DeployVirtualMachineParams> {
        self.lock().deployed.clone()
    }

    pub fn virtual_machine(&self, id: &str) -> Option<VirtualMachine> {
        self.lock().vms.iter().find(|vm| vm.id == id).cloned()
    }

    pub fn tags_for(&self, resource_id: &str) -> BTreeMap<String, String> {
        self.lock()
            .tags_of(resource_id)
            .into_iter()
            .map(|t| (t.key, t.value))
            .collect()
    }

    async fn begin(&self, operation: FakeOperation) -> Result<()> {
        let latency = {
            let mut state = self.lock();
            *state.calls.entry(operation).or_default() += 1;
            state.latency
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        match self.lock().failures.get(&operation) {
            Some(message) => Err(ClientError::api(ERROR_CODE_INTERNAL, message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CloudStackApi for FakeCloudStackApi {
    async fn deploy_virtual_machine(
        &self,
        params: &DeployVirtualMachineParams,
    ) -> Result<DeployVirtualMachineResponse> {
        self.begin(FakeOperation::DeployVirtualMachine).await?;

        let mut state = self.lock();
        state.next_id += 1;
        let n = state.next_id;
        let id = format!("vm-{}", n);

        let zone_name = state.zone_name(&params.zone_id);
        let offering_name = state
            .service_offerings
            .iter()
            .find(|o| o.id == params.service_offering_id)
            .map(|o| o.name.clone())
            .unwrap_or_default();
        let template_name = state
            .templates
            .iter()
            .find(|t| t.id == params.template_id)
            .map(|t| t.name.clone())
            .unwrap_or_default();
        let nic = params
            .network_ids
            .iter()
            .enumerate()
            .map(|(i, network_id)| Nic {
                id: format!("nic-{}-{}", n, i),
                network_id: network_id.clone(),
                network_name: String::new(),
                ip_address: format!("10.1.{}.{}", i, n),
                is_default: i == 0,
            })
            .collect();

        let state_name = if state.running_after_polls == Some(0) {
            "Running"
        } else {
            "Starting"
        };
        let name = params.name.clone().unwrap_or_else(|| id.clone());

        state.vms.push(VirtualMachine {
            id: id.clone(),
            display_name: params.display_name.clone().unwrap_or_else(|| name.clone()),
            name,
            state: state_name.to_string(),
            zone_id: params.zone_id.clone(),
            zone_name,
            service_offering_id: params.service_offering_id.clone(),
            service_offering_name: offering_name,
            template_id: params.template_id.clone(),
            template_name,
            created: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%z").to_string(),
            nic,
            tags: Vec::new(),
        });
        state.deployed.push(params.clone());

        let job_id = state.start_job();
        Ok(DeployVirtualMachineResponse { id, job_id })
    }

    async fn list_virtual_machines(
        &self,
        params: &ListVirtualMachinesParams,
    ) -> Result<ListResponse<VirtualMachine>> {
        self.begin(FakeOperation::ListVirtualMachines).await?;

        let mut state = self.lock();
        let running_after = state.running_after_polls;
        let matched: Vec<usize> = state
            .vms
            .iter()
            .enumerate()
            .filter(|(_, vm)| params.id.as_ref().is_none_or(|id| &vm.id == id))
            .filter(|(_, vm)| params.zone_id.as_ref().is_none_or(|z| &vm.zone_id == z))
            .filter(|(_, vm)| params.name.as_ref().is_none_or(|n| &vm.name == n))
            .map(|(i, _)| i)
            .collect();

        let mut items = Vec::with_capacity(matched.len());
        for i in matched {
            let vm_id = state.vms[i].id.clone();
            if state.vms[i].state == "Starting" {
                let polls = state.vm_polls.entry(vm_id.clone()).or_default();
                *polls += 1;
                let polls = *polls;
                if running_after.is_some_and(|n| polls >= n) {
                    state.vms[i].state = "Running".to_string();
                }
            }
            let mut vm = state.vms[i].clone();
            vm.tags = state.tags_of(&vm_id);
            items.push(vm);
        }

        Ok(ListResponse::new(items))
    }

    async fn destroy_virtual_machine(
        &self,
        params: &DestroyVirtualMachineParams,
    ) -> Result<AsyncJobResponse> {
        self.begin(FakeOperation::DestroyVirtualMachine).await?;

        let mut state = self.lock();
        let Some(pos) = state.vms.iter().position(|vm| vm.id == params.id) else {
            return Err(ClientError::api(
                ERROR_CODE_NOT_FOUND,
                format!("Unable to find VM by id {}", params.id),
            ));
        };

        if params.expunge {
            state.vms.remove(pos);
            state.tags.retain(|t| t.resource_id != params.id);
        } else {
            state.vms[pos].state = "Destroyed".to_string();
        }

        let job_id = state.start_job();
        Ok(AsyncJobResponse { job_id })
    }

    async fn list_service_offerings(
        &self,
        params: &ListServiceOfferingsParams,
    ) -> Result<Vec<ServiceOfferingInfo>> {
        self.begin(FakeOperation::ListServiceOfferings).await?;

        Ok(self
            .lock()
            .service_offerings
            .iter()
            .filter(|o| params.id.as_ref().is_none_or(|id| &o.id == id))
            .filter(|o| params.name.as_ref().is_none_or(|n| &o.name == n))
            .cloned()
            .collect())
    }

    /// `featured` serves featured templates, `community` public ones and
    /// `self` the rest; `executable` and `all` serve everything
    async fn list_templates(&self, params: &ListTemplatesParams) -> Result<Vec<TemplateInfo>> {
        self.begin(FakeOperation::ListTemplates).await?;

        let state = self.lock();
        if state.failing_template_filters.contains(&params.filter) {
            return Err(ClientError::api(
                ERROR_CODE_INTERNAL,
                format!("templatefilter {} unavailable", params.filter),
            ));
        }

        Ok(state
            .templates
            .iter()
            .filter(|t| match params.filter {
                TemplateFilter::Featured => t.is_featured,
                TemplateFilter::Community => t.is_public,
                TemplateFilter::SelfOwned => !t.is_featured && !t.is_public,
                TemplateFilter::Executable | TemplateFilter::All => true,
            })
            .filter(|t| params.zone_id.as_ref().is_none_or(|z| &t.zone_id == z))
            .filter(|t| params.id.as_ref().is_none_or(|id| &t.id == id))
            .map(|t| TemplateInfo {
                zone_name: state.zone_name(&t.zone_id),
                ..t.clone()
            })
            .collect())
    }

    async fn list_networks(&self, params: &ListNetworksParams) -> Result<Vec<NetworkInfo>> {
        self.begin(FakeOperation::ListNetworks).await?;

        let state = self.lock();
        Ok(state
            .networks
            .iter()
            .filter(|n| params.zone_id.as_ref().is_none_or(|z| &n.zone_id == z))
            .filter(|n| params.id.as_ref().is_none_or(|id| &n.id == id))
            .map(|n| NetworkInfo {
                zone_name: state.zone_name(&n.zone_id),
                ..n.clone()
            })
            .collect())
    }

    async fn list_zones(&self, params: &ListZonesParams) -> Result<Vec<ZoneInfo>> {
        self.begin(FakeOperation::ListZones).await?;

        Ok(self
            .lock()
            .zones
            .iter()
            .filter(|z| params.id.as_ref().is_none_or(|id| &z.id == id))
            .filter(|z| params.name.as_ref().is_none_or(|n| &z.name == n))
            .cloned()
            .collect())
    }

    async fn create_tags(&self, params: &CreateTagsParams) -> Result<()> {
        self.begin(FakeOperation::CreateTags).await?;

        let mut state = self.lock();
        for resource_id in &params.resource_ids {
            for (key, value) in &params.tags {
                state
                    .tags
                    .retain(|t| !(t.resource_id == *resource_id && t.key == *key));
                state.tags.push(ResourceTag {
                    key: key.clone(),
                    value: value.clone(),
                    resource_id: resource_id.clone(),
                    resource_type: params.resource_type.as_str().to_string(),
                });
            }
        }
        Ok(())
    }

    async fn list_tags(&self, params: &ListTagsParams) -> Result<Vec<ResourceTag>> {
        self.begin(FakeOperation::ListTags).await?;

        let state = self.lock();
        if state.failing_tag_resources.contains(&params.resource_id) {
            return Err(ClientError::api(
                ERROR_CODE_INTERNAL,
                format!("failed to list tags of {}", params.resource_id),
            ));
        }

        Ok(state
            .tags
            .iter()
            .filter(|t| {
                t.resource_id == params.resource_id
                    && t.resource_type == params.resource_type.as_str()
            })
            .cloned()
            .collect())
    }

    async fn delete_tags(&self, params: &DeleteTagsParams) -> Result<()> {
        self.begin(FakeOperation::DeleteTags).await?;

        let mut state = self.lock();
        state.tags.retain(|t| {
            let targeted = params.resource_ids.contains(&t.resource_id)
                && t.resource_type == params.resource_type.as_str()
                && (params.tags.is_empty() || params.tags.contains_key(&t.key));
            !targeted
        });
        Ok(())
    }

    async fn query_async_job(&self, job_id: &str) -> Result<AsyncJobResult> {
        self.begin(FakeOperation::QueryAsyncJob).await?;

        let mut state = self.lock();
        let failure = state.async_job_failure.clone();
        let Some(remaining) = state.jobs.get_mut(job_id) else {
            return Err(ClientError::api(
                ERROR_CODE_NOT_FOUND,
                format!("Unable to find async job {}", job_id),
            ));
        };

        if *remaining > 0 {
            *remaining -= 1;
            return Ok(AsyncJobResult {
                job_id: job_id.to_string(),
                job_status: 0,
                ..Default::default()
            });
        }

        Ok(match failure {
            Some(message) => AsyncJobResult {
                job_id: job_id.to_string(),
                job_status: 2,
                job_result_code: i32::from(ERROR_CODE_INTERNAL),
                job_result: Some(serde_json::json!({
                    "errorcode": ERROR_CODE_INTERNAL,
                    "errortext": message,
                })),
            },
            None => AsyncJobResult {
                job_id: job_id.to_string(),
                job_status: 1,
                ..Default::default()
            },
        })
    }
}

/// Enabled advanced zone
pub fn zone(id: &str, name: &str) -> ZoneInfo {
    ZoneInfo {
        id: id.to_string(),
        name: name.to_string(),
        network_type: "Advanced".to_string(),
        allocation_state: "Enabled".to_string(),
        ..Default::default()
    }
}

/// Implemented isolated network
pub fn network(id: &str, name: &str, zone_id: &str) -> NetworkInfo {
    NetworkInfo {
        id: id.to_string(),
        name: name.to_string(),
        zone_id: zone_id.to_string(),
        network_type: "Isolated".to_string(),
        state: "Implemented".to_string(),
        cidr: "10.1.0.0/16".to_string(),
        gateway: "10.1.0.1".to_string(),
        ..Default::default()
    }
}

/// Ready, featured and public Ubuntu template
pub fn template(id: &str, name: &str, zone_id: &str) -> TemplateInfo {
    TemplateInfo {
        id: id.to_string(),
        name: name.to_string(),
        display_text: name.to_string(),
        zone_id: zone_id.to_string(),
        os_type_id: "ostype-ubuntu".to_string(),
        os_type_name: "Ubuntu 22.04 LTS".to_string(),
        status: "Download Complete".to_string(),
        is_ready: true,
        is_public: true,
        is_featured: true,
        ..Default::default()
    }
}

pub fn service_offering(id: &str, name: &str, cpu_number: u32, memory_mb: u64) -> ServiceOfferingInfo {
    ServiceOfferingInfo {
        id: id.to_string(),
        name: name.to_string(),
        cpu_number,
        cpu_speed: 2000,
        memory: memory_mb,
        network_rate: 0,
    }
}
