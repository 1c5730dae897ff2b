//! Instance lifecycle
//!
//! `create` drives a VM through deploy, async completion, state polling and
//! tagging:
//!
//! ```text
//! Requested -> Deploying -> Polling -> Running
//!                  |            |
//!                  +-> Failed   +-> TimedOut / Failed
//!
//! Destroying -> Destroyed
//! ```
//!
//! Every wait observes the caller's cancellation token. Remote calls already
//! issued are not rolled back on failure.

use crate::cache::TtlCache;
use crate::error::{ProviderError, Result};
use crate::network::NetworkProvider;
use crate::template::TemplateProvider;
use crate::zone::ZoneProvider;
use base64::Engine;
use chrono::{DateTime, Utc};
use karpenter_cloudstack_api::labels::{
    CLUSTER_OWNED_VALUE, LABEL_SERVICE_OFFERING_ID, MANAGED_BY_VALUE, TAG_MANAGED_BY,
    TAG_NODE_CLAIM, TAG_NODE_CLASS, TAG_NODE_POOL, cluster_tag_key,
};
use karpenter_cloudstack_api::{InstanceType, NodeClaim, NodeClass};
use karpenter_cloudstack_client::{
    CloudStackApi, CreateTagsParams, DeployVirtualMachineParams, DestroyVirtualMachineParams,
    ListTagsParams, ListVirtualMachinesParams, ResourceType, VirtualMachine, wait_for_async_job,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, interval_at, sleep};
use tokio_util::sync::CancellationToken;

/// Interval between VM state polls
pub const INSTANCE_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// How long a new VM may take to reach `Running`
pub const INSTANCE_READY_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// How long deploy and destroy jobs may take
pub const ASYNC_JOB_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub const STATE_RUNNING: &str = "Running";
/// VM states of an instance on its way out
pub const TERMINATING_STATES: [&str; 2] = ["Destroyed", "Expunging"];

/// Default prefix of VM names
pub const DEFAULT_NAME_PREFIX: &str = "karpenter";

/// Launch progress of one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    Requested,
    Deploying,
    Polling,
    Running,
    Failed,
    TimedOut,
    Destroying,
    Destroyed,
}

impl fmt::Display for LaunchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchState::Requested => write!(f, "requested"),
            LaunchState::Deploying => write!(f, "deploying"),
            LaunchState::Polling => write!(f, "polling"),
            LaunchState::Running => write!(f, "running"),
            LaunchState::Failed => write!(f, "failed"),
            LaunchState::TimedOut => write!(f, "timed_out"),
            LaunchState::Destroying => write!(f, "destroying"),
            LaunchState::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// A CloudStack VM as seen by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub state: String,
    pub zone: String,
    pub zone_id: String,
    pub service_offering: String,
    pub service_offering_id: String,
    pub template: String,
    pub template_id: String,
    pub network_id: String,
    pub ip_address: Option<String>,
    pub created_time: Option<DateTime<Utc>>,
    pub tags: BTreeMap<String, String>,
}

impl Instance {
    pub fn from_vm(vm: &VirtualMachine, tags: BTreeMap<String, String>) -> Self {
        Self {
            id: vm.id.clone(),
            name: vm.name.clone(),
            state: vm.state.clone(),
            zone: vm.zone_name.clone(),
            zone_id: vm.zone_id.clone(),
            service_offering: vm.service_offering_name.clone(),
            service_offering_id: vm.service_offering_id.clone(),
            template: vm.template_name.clone(),
            template_id: vm.template_id.clone(),
            network_id: vm.network_id().unwrap_or_default().to_string(),
            ip_address: vm.ip_address().map(str::to_string),
            created_time: parse_cloudstack_time(&vm.created),
            tags,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == STATE_RUNNING
    }

    pub fn is_terminating(&self) -> bool {
        TERMINATING_STATES.contains(&self.state.as_str())
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Owned by this provider
    pub fn is_managed(&self) -> bool {
        self.tags.contains_key(TAG_MANAGED_BY)
    }
}

/// Parse a CloudStack timestamp (RFC 3339 or `2024-01-15T10:30:00+0000`)
pub fn parse_cloudstack_time(value: &str) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z"))
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

/// Picks the instance type to launch from the scheduler's candidates
pub trait InstanceTypeSelector: Send + Sync {
    fn select<'a>(&self, candidates: &'a [InstanceType]) -> Option<&'a InstanceType>;
}

/// First candidate with an available offering
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstAvailable;

impl InstanceTypeSelector for FirstAvailable {
    fn select<'a>(&self, candidates: &'a [InstanceType]) -> Option<&'a InstanceType> {
        candidates
            .iter()
            .find(|it| it.offerings.iter().any(|o| o.available))
    }
}

/// Settings of the instance lifecycle manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceProviderConfig {
    pub cluster_name: String,
    pub name_prefix: String,
    pub poll_interval: Duration,
    pub ready_timeout: Duration,
    pub async_job_timeout: Duration,
}

impl InstanceProviderConfig {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            poll_interval: INSTANCE_POLL_INTERVAL,
            ready_timeout: INSTANCE_READY_TIMEOUT,
            async_job_timeout: ASYNC_JOB_TIMEOUT,
        }
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }
}

/// Creates, reads, lists and deletes CloudStack VMs
pub struct InstanceProvider {
    api: Arc<dyn CloudStackApi>,
    zones: Arc<ZoneProvider>,
    networks: Arc<NetworkProvider>,
    templates: Arc<TemplateProvider>,
    cache: TtlCache<Instance>,
    config: InstanceProviderConfig,
    selector: Box<dyn InstanceTypeSelector>,
}

impl InstanceProvider {
    pub fn new(
        api: Arc<dyn CloudStackApi>,
        zones: Arc<ZoneProvider>,
        networks: Arc<NetworkProvider>,
        templates: Arc<TemplateProvider>,
        config: InstanceProviderConfig,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            api,
            zones,
            networks,
            templates,
            cache: TtlCache::new(cache_ttl),
            config,
            selector: Box::new(FirstAvailable),
        }
    }

    /// Replace the instance type selection policy
    pub fn with_selector(mut self, selector: Box<dyn InstanceTypeSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn config(&self) -> &InstanceProviderConfig {
        &self.config
    }

    /// Launch a VM for `node_claim` and wait until it is running
    pub async fn create(
        &self,
        node_class: &NodeClass,
        node_claim: &NodeClaim,
        instance_types: &[InstanceType],
        cancel: &CancellationToken,
    ) -> Result<Instance> {
        self.transition(&node_claim.name, LaunchState::Requested);

        match self
            .launch(node_class, node_claim, instance_types, cancel)
            .await
        {
            Ok(instance) => {
                self.transition(&node_claim.name, LaunchState::Running);
                tracing::info!(
                    "Instance {} ({}) created for NodeClaim {}",
                    instance.id,
                    instance.name,
                    node_claim.name
                );
                Ok(instance)
            }
            Err(e) => {
                let state = match e {
                    ProviderError::Timeout(_) => LaunchState::TimedOut,
                    _ => LaunchState::Failed,
                };
                self.transition(&node_claim.name, state);
                Err(e)
            }
        }
    }

    async fn launch(
        &self,
        node_class: &NodeClass,
        node_claim: &NodeClaim,
        instance_types: &[InstanceType],
        cancel: &CancellationToken,
    ) -> Result<Instance> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let spec = &node_class.spec;
        let instance_type = self
            .selector
            .select(instance_types)
            .ok_or(ProviderError::NoInstanceType)?;
        let offering_id = instance_type
            .requirement(LABEL_SERVICE_OFFERING_ID)
            .ok_or_else(|| ProviderError::InvalidInstanceType {
                name: instance_type.name.clone(),
                reason: format!("missing requirement {}", LABEL_SERVICE_OFFERING_ID),
            })?;

        let zone = self.zones.lookup(&spec.zone).await?;
        let networks = self
            .networks
            .resolve(&spec.network_selector_terms, &spec.zone)
            .await?;
        let templates = self
            .templates
            .resolve(&spec.template_selector_terms, &spec.zone)
            .await?;
        // resolve never returns an empty list
        let (Some(network), Some(template)) = (networks.first(), templates.first()) else {
            return Err(ProviderError::NoSelectorMatch {
                kind: "network",
                zone: spec.zone.clone(),
            });
        };

        let vm_name = format!("{}-{}", self.config.name_prefix, node_claim.name);
        let mut params = DeployVirtualMachineParams::new(offering_id, &template.id, &zone.id)
            .with_network_ids(vec![network.id.clone()])
            .with_name(&vm_name)
            .with_display_name(&vm_name);
        if let Some(user_data) = spec.user_data.as_deref().filter(|u| !u.is_empty()) {
            params = params
                .with_user_data(base64::engine::general_purpose::STANDARD.encode(user_data));
        }
        if let Some(size) = spec.root_disk_size {
            params = params.with_root_disk_size(size);
        }
        if let Some(key_pair) = spec.ssh_key_pair.as_deref() {
            params = params.with_key_pair(key_pair);
        }

        self.transition(&node_claim.name, LaunchState::Deploying);
        tracing::info!(
            "Deploying VM {} (offering {}, template {}, network {}, zone {})",
            vm_name,
            instance_type.name,
            template.name,
            network.name,
            zone.name
        );
        let deployed = self
            .api
            .deploy_virtual_machine(&params)
            .await
            .map_err(ProviderError::client("deploy virtual machine"))?;

        if let Some(job_id) = deployed.job_id.as_deref() {
            wait_for_async_job(
                self.api.as_ref(),
                job_id,
                self.config.async_job_timeout,
                cancel,
            )
            .await
            .map_err(|e| ProviderError::from_job_error("deploy virtual machine", e))?;
        }

        self.transition(&node_claim.name, LaunchState::Polling);
        let vm = self.wait_for_state(&deployed.id, STATE_RUNNING, cancel).await?;

        let tags = self.build_tags(node_class, node_claim);
        if let Err(e) = self
            .api
            .create_tags(&CreateTagsParams::new(
                vec![vm.id.clone()],
                ResourceType::UserVm,
                tags.clone(),
            ))
            .await
        {
            tracing::error!("Failed to tag VM {}: {}", vm.id, e);
        }

        let instance = Instance::from_vm(&vm, tags);
        self.cache.set(
            instance_cache_key(&instance.id),
            instance.clone(),
            self.cache.default_ttl(),
        );
        Ok(instance)
    }

    /// Poll `vm_id` until it reports `target`
    async fn wait_for_state(
        &self,
        vm_id: &str,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<VirtualMachine> {
        let deadline = sleep(self.config.ready_timeout);
        tokio::pin!(deadline);

        let interval = self.config.poll_interval;
        let mut ticker = interval_at(Instant::now() + interval, interval);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = &mut deadline => {
                    return Err(ProviderError::Timeout(format!(
                        "VM {} to reach state {}",
                        vm_id, target
                    )));
                }
                _ = ticker.tick() => {
                    let response = self
                        .api
                        .list_virtual_machines(&ListVirtualMachinesParams::by_id(vm_id))
                        .await
                        .map_err(ProviderError::client(format!("get VM {}", vm_id)))?;

                    let Some(vm) = response.items.into_iter().next() else {
                        return Err(ProviderError::not_found("instance", vm_id));
                    };
                    if vm.state == target {
                        return Ok(vm);
                    }
                    tracing::debug!("VM {} is {}, waiting for {}", vm_id, vm.state, target);
                }
            }
        }
    }

    fn build_tags(&self, node_class: &NodeClass, node_claim: &NodeClaim) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::from([
            (TAG_MANAGED_BY.to_string(), MANAGED_BY_VALUE.to_string()),
            (
                cluster_tag_key(&self.config.cluster_name),
                CLUSTER_OWNED_VALUE.to_string(),
            ),
            (TAG_NODE_CLASS.to_string(), node_class.name.clone()),
            (TAG_NODE_CLAIM.to_string(), node_claim.name.clone()),
        ]);
        if let Some(node_pool) = node_claim.node_pool() {
            tags.insert(TAG_NODE_POOL.to_string(), node_pool.to_string());
        }

        // user tags are applied last; reserved keys are validated upstream
        tags.extend(node_class.spec.tags.clone());
        tags
    }

    /// Instance by CloudStack VM ID
    pub async fn get(&self, id: &str) -> Result<Instance> {
        self.cache
            .get_or_fetch(&instance_cache_key(id), self.cache.default_ttl(), || async {
                let response = self
                    .api
                    .list_virtual_machines(&ListVirtualMachinesParams::by_id(id))
                    .await
                    .map_err(ProviderError::client(format!("get VM {}", id)))?;

                let Some(vm) = response.items.into_iter().next() else {
                    return Err(ProviderError::not_found("instance", id));
                };

                let tags = match self.vm_tags(&vm.id).await {
                    Ok(tags) => tags,
                    Err(e) => {
                        tracing::debug!("Using inline tags of VM {}: {}", vm.id, e);
                        vm.tags.iter().map(|t| (t.key.clone(), t.value.clone())).collect()
                    }
                };
                Ok(Instance::from_vm(&vm, tags))
            })
            .await
    }

    /// All instances carrying the managed-by tag
    pub async fn list(&self) -> Result<Vec<Instance>> {
        let response = self
            .api
            .list_virtual_machines(&ListVirtualMachinesParams::default())
            .await
            .map_err(ProviderError::client("list VMs"))?;

        let mut instances = Vec::new();
        for vm in &response.items {
            let tags = match self.vm_tags(&vm.id).await {
                Ok(tags) => tags,
                Err(e) => {
                    tracing::warn!("Skipping VM {}, failed to list tags: {}", vm.id, e);
                    continue;
                }
            };
            let instance = Instance::from_vm(vm, tags);
            if instance.is_managed() {
                instances.push(instance);
            }
        }

        tracing::debug!(
            "Listed {} managed instance(s) out of {} VM(s)",
            instances.len(),
            response.count
        );
        Ok(instances)
    }

    /// Destroy and expunge a VM; a missing VM counts as deleted
    pub async fn delete(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        match self.get(id).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                tracing::info!("Instance {} already gone", id);
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        self.transition(id, LaunchState::Destroying);
        let response = self
            .api
            .destroy_virtual_machine(&DestroyVirtualMachineParams::new(id).with_expunge(true))
            .await
            .map_err(ProviderError::client(format!("destroy VM {}", id)))?;
        self.cache.delete(&instance_cache_key(id));

        if let Some(job_id) = response.job_id.as_deref() {
            wait_for_async_job(
                self.api.as_ref(),
                job_id,
                self.config.async_job_timeout,
                cancel,
            )
            .await
            .map_err(|e| ProviderError::from_job_error(format!("destroy VM {}", id), e))?;
        }

        self.transition(id, LaunchState::Destroyed);
        tracing::info!("Instance {} deleted", id);
        Ok(())
    }

    async fn vm_tags(&self, vm_id: &str) -> Result<BTreeMap<String, String>> {
        let tags = self
            .api
            .list_tags(&ListTagsParams::new(vm_id, ResourceType::UserVm))
            .await
            .map_err(ProviderError::client(format!("list tags of VM {}", vm_id)))?;
        Ok(tags.into_iter().map(|t| (t.key, t.value)).collect())
    }

    fn transition(&self, subject: &str, state: LaunchState) {
        tracing::debug!("Instance {} -> {}", subject, state);
    }
}

fn instance_cache_key(id: &str) -> String {
    format!("instance-{}", id)
}
