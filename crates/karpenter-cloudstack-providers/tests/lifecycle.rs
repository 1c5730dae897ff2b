use base64::Engine;
use karpenter_cloudstack_api::labels::{
    LABEL_NODE_POOL, TAG_MANAGED_BY, TAG_NODE_CLAIM, TAG_NODE_CLASS, TAG_NODE_POOL,
};
use karpenter_cloudstack_api::{
    InstanceType, NodeClaim, NodeClass, NodeClassSpec, SelectorTerm, TemplateSelectorTerm,
};
use karpenter_cloudstack_client::fake::{self, FakeCloudStackApi, FakeOperation};
use karpenter_cloudstack_client::{ResourceType, TemplateInfo, VirtualMachine};
use karpenter_cloudstack_providers::{
    InstanceProvider, InstanceProviderConfig, InstanceTypeSelector, NetworkProvider,
    ProviderError, ServiceOffering, TemplateProvider, ZoneProvider,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const TTL: Duration = Duration::from_secs(900);

fn inventory() -> Arc<FakeCloudStackApi> {
    let api = Arc::new(FakeCloudStackApi::new());
    api.add_zone(fake::zone("z1", "zone-1"));
    api.add_network(fake::network("net-1", "k8s-net", "z1"));
    api.add_template(fake::template("tpl-1", "ubuntu-22.04", "z1"));
    api.add_service_offering(fake::service_offering("off-m", "medium", 2, 4096));
    api
}

fn instance_provider(api: &Arc<FakeCloudStackApi>) -> InstanceProvider {
    let zones = Arc::new(ZoneProvider::new(api.clone(), TTL));
    let networks = Arc::new(NetworkProvider::new(api.clone(), zones.clone(), TTL));
    let templates = Arc::new(TemplateProvider::new(api.clone(), zones.clone(), TTL));
    InstanceProvider::new(
        api.clone(),
        zones,
        networks,
        templates,
        InstanceProviderConfig::new("prod"),
        TTL,
    )
}

fn node_class() -> NodeClass {
    let mut spec = NodeClassSpec {
        zone: "zone-1".to_string(),
        network_selector_terms: vec![SelectorTerm::by_name("k8s-net")],
        service_offering_selector_terms: vec![SelectorTerm::by_name("medium")],
        template_selector_terms: vec![TemplateSelectorTerm::by_name("ubuntu-22.04")],
        user_data: Some("#cloud-config\n".to_string()),
        root_disk_size: Some(50),
        ssh_key_pair: Some("ops".to_string()),
        ..Default::default()
    };
    spec.tags.insert("team".to_string(), "platform".to_string());
    NodeClass::new("default", spec)
}

fn instance_types() -> Vec<InstanceType> {
    let offering = ServiceOffering::from(fake::service_offering("off-m", "medium", 2, 4096));
    vec![offering.to_instance_type("zone-1")]
}

fn claim() -> NodeClaim {
    NodeClaim::new("claim-1")
        .with_node_class("default")
        .with_label(LABEL_NODE_POOL, "general")
}

#[tokio::test(start_paused = true)]
async fn test_create_deploys_waits_and_tags() {
    let api = inventory();
    api.set_vm_running_after(Some(2));
    let provider = instance_provider(&api);

    let instance = provider
        .create(&node_class(), &claim(), &instance_types(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(instance.name, "karpenter-claim-1");
    assert_eq!(instance.state, "Running");
    assert_eq!(instance.zone, "zone-1");
    assert_eq!(instance.template_id, "tpl-1");
    assert_eq!(instance.service_offering_id, "off-m");
    assert_eq!(instance.network_id, "net-1");

    let deployed = api.deployed();
    assert_eq!(deployed.len(), 1);
    let params = &deployed[0];
    assert_eq!(params.zone_id, "z1");
    assert_eq!(params.network_ids, vec!["net-1"]);
    assert_eq!(params.display_name.as_deref(), Some("karpenter-claim-1"));
    assert_eq!(params.root_disk_size, Some(50));
    assert_eq!(params.key_pair.as_deref(), Some("ops"));
    let user_data = base64::engine::general_purpose::STANDARD
        .decode(params.user_data.as_deref().unwrap())
        .unwrap();
    assert_eq!(user_data, b"#cloud-config\n");

    let tags = api.tags_for(&instance.id);
    assert_eq!(tags.get(TAG_MANAGED_BY).map(String::as_str), Some("karpenter"));
    assert_eq!(tags.get("kubernetes.io/cluster/prod").map(String::as_str), Some("owned"));
    assert_eq!(tags.get(TAG_NODE_CLASS).map(String::as_str), Some("default"));
    assert_eq!(tags.get(TAG_NODE_CLAIM).map(String::as_str), Some("claim-1"));
    assert_eq!(tags.get(TAG_NODE_POOL).map(String::as_str), Some("general"));
    assert_eq!(tags.get("team").map(String::as_str), Some("platform"));
    assert_eq!(instance.tags, tags);

    assert_eq!(api.calls(FakeOperation::ListVirtualMachines), 2);
}

#[tokio::test(start_paused = true)]
async fn test_create_times_out_without_tagging() {
    let api = inventory();
    api.set_vm_running_after(None);
    let provider = instance_provider(&api);

    let start = tokio::time::Instant::now();
    let err = provider
        .create(&node_class(), &claim(), &instance_types(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Timeout(_)));
    assert_eq!(err.to_string(), "timeout waiting for VM vm-1 to reach state Running");
    assert_eq!(start.elapsed(), Duration::from_secs(300));
    assert_eq!(api.calls(FakeOperation::CreateTags), 0);
    // the VM is left in place
    assert!(api.virtual_machine("vm-1").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_create_observes_cancellation() {
    let api = inventory();
    api.set_vm_running_after(None);
    let provider = instance_provider(&api);
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            cancel.cancel();
        })
    };

    let start = tokio::time::Instant::now();
    let err = provider
        .create(&node_class(), &claim(), &instance_types(), &cancel)
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, ProviderError::Cancelled));
    assert_eq!(start.elapsed(), Duration::from_secs(12));
    assert_eq!(api.calls(FakeOperation::ListVirtualMachines), 2);
}

#[tokio::test(start_paused = true)]
async fn test_create_waits_for_deploy_job() {
    let api = inventory();
    api.set_async_jobs(Some(1));
    let provider = instance_provider(&api);

    provider
        .create(&node_class(), &claim(), &instance_types(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(api.calls(FakeOperation::QueryAsyncJob), 2);
}

#[tokio::test(start_paused = true)]
async fn test_create_fails_when_deploy_job_fails() {
    let api = inventory();
    api.set_async_jobs(Some(0));
    api.set_async_job_failure(Some("insufficient capacity".to_string()));
    let provider = instance_provider(&api);

    let err = provider
        .create(&node_class(), &claim(), &instance_types(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("insufficient capacity"));
    assert_eq!(api.calls(FakeOperation::CreateTags), 0);
}

#[tokio::test(start_paused = true)]
async fn test_tagging_failure_does_not_fail_create() {
    let api = inventory();
    api.fail(FakeOperation::CreateTags, "tag service down");
    let provider = instance_provider(&api);

    let instance = provider
        .create(&node_class(), &claim(), &instance_types(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(instance.state, "Running");
    assert!(api.tags_for(&instance.id).is_empty());
}

#[tokio::test]
async fn test_create_without_instance_types() {
    let api = inventory();
    let provider = instance_provider(&api);

    let err = provider
        .create(&node_class(), &claim(), &[], &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "no suitable instance type found");
    assert_eq!(api.calls(FakeOperation::DeployVirtualMachine), 0);
}

struct LastCandidate;

impl InstanceTypeSelector for LastCandidate {
    fn select<'a>(&self, candidates: &'a [InstanceType]) -> Option<&'a InstanceType> {
        candidates.last()
    }
}

#[tokio::test(start_paused = true)]
async fn test_selection_policy_is_pluggable() {
    let api = inventory();
    api.add_service_offering(fake::service_offering("off-l", "large", 4, 8192));
    let provider = instance_provider(&api).with_selector(Box::new(LastCandidate));

    let mut types = instance_types();
    types.push(
        ServiceOffering::from(fake::service_offering("off-l", "large", 4, 8192))
            .to_instance_type("zone-1"),
    );

    provider
        .create(&node_class(), &claim(), &types, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(api.deployed()[0].service_offering_id, "off-l");
}

#[tokio::test(start_paused = true)]
async fn test_get_list_and_idempotent_delete() {
    let api = inventory();
    let provider = instance_provider(&api);
    let cancel = CancellationToken::new();

    let instance = provider
        .create(&node_class(), &claim(), &instance_types(), &cancel)
        .await
        .unwrap();

    // an unmanaged VM is not listed
    api.add_virtual_machine(VirtualMachine {
        id: "vm-foreign".to_string(),
        name: "foreign".to_string(),
        state: "Running".to_string(),
        zone_id: "z1".to_string(),
        ..Default::default()
    });

    let listed = provider.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, instance.id);

    let fetched = provider.get(&instance.id).await.unwrap();
    assert_eq!(fetched.id, instance.id);

    provider.delete(&instance.id, &cancel).await.unwrap();
    assert!(api.virtual_machine(&instance.id).is_none());
    assert_eq!(api.calls(FakeOperation::DestroyVirtualMachine), 1);

    // second delete finds nothing and succeeds without a destroy call
    provider.delete(&instance.id, &cancel).await.unwrap();
    assert_eq!(api.calls(FakeOperation::DestroyVirtualMachine), 1);

    let err = provider.get(&instance.id).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_list_skips_vms_whose_tags_fail() {
    let api = inventory();
    api.add_virtual_machine(VirtualMachine {
        id: "vm-a".to_string(),
        name: "karpenter-a".to_string(),
        state: "Running".to_string(),
        zone_id: "z1".to_string(),
        ..Default::default()
    });
    api.add_virtual_machine(VirtualMachine {
        id: "vm-b".to_string(),
        name: "karpenter-b".to_string(),
        state: "Running".to_string(),
        zone_id: "z1".to_string(),
        ..Default::default()
    });
    api.add_tag("vm-a", ResourceType::UserVm, TAG_MANAGED_BY, "karpenter");
    api.add_tag("vm-b", ResourceType::UserVm, TAG_MANAGED_BY, "karpenter");
    api.fail_list_tags_for("vm-a");

    let provider = instance_provider(&api);
    let listed = provider.list().await.unwrap();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "vm-b");
}

#[tokio::test]
async fn test_delete_of_unknown_instance_succeeds() {
    let api = inventory();
    let provider = instance_provider(&api);

    provider
        .delete("vm-missing", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(api.calls(FakeOperation::DestroyVirtualMachine), 0);
}

#[tokio::test(start_paused = true)]
async fn test_delete_waits_for_destroy_job() {
    let api = inventory();
    let provider = instance_provider(&api);
    let cancel = CancellationToken::new();

    let instance = provider
        .create(&node_class(), &claim(), &instance_types(), &cancel)
        .await
        .unwrap();

    api.set_async_jobs(Some(2));
    provider.delete(&instance.id, &cancel).await.unwrap();
    assert_eq!(api.calls(FakeOperation::QueryAsyncJob), 3);
}

#[tokio::test(start_paused = true)]
async fn test_create_resolves_template_by_os_type() {
    let api = Arc::new(FakeCloudStackApi::new());
    api.add_zone(fake::zone("z1", "zone-1"));
    api.add_network(fake::network("net-1", "k8s-net", "z1"));
    api.add_template(TemplateInfo {
        os_type_id: "ostype-rocky".to_string(),
        os_type_name: "rocky".to_string(),
        ..fake::template("tmpl-0", "rocky-9", "z1")
    });
    api.add_template(TemplateInfo {
        os_type_name: "ubuntu".to_string(),
        ..fake::template("tmpl-1", "ubuntu-22.04", "z1")
    });
    api.add_service_offering(fake::service_offering("off-1", "medium", 2, 4096));
    let provider = instance_provider(&api);

    let mut nc = node_class();
    nc.spec.template_selector_terms = vec![TemplateSelectorTerm::by_os_type("ubuntu")];
    let offering = ServiceOffering::from(fake::service_offering("off-1", "medium", 2, 4096));

    let instance = provider
        .create(
            &nc,
            &claim(),
            &[offering.to_instance_type("zone-1")],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(instance.state, "Running");
    assert_eq!(instance.network_id, "net-1");
    assert_eq!(instance.template_id, "tmpl-1");
    assert_eq!(instance.service_offering_id, "off-1");

    let tags = api.tags_for(&instance.id);
    assert_eq!(tags.get(TAG_MANAGED_BY).map(String::as_str), Some("karpenter"));
    assert_eq!(tags.get(TAG_NODE_CLASS).map(String::as_str), Some("default"));
    assert_eq!(tags.get(TAG_NODE_CLAIM).map(String::as_str), Some("claim-1"));
}

#[tokio::test(start_paused = true)]
async fn test_node_class_tags_are_applied_last() {
    let api = inventory();
    let provider = instance_provider(&api);

    let mut nc = node_class();
    nc.spec
        .tags
        .insert(TAG_NODE_POOL.to_string(), "user-pool".to_string());
    let claim = NodeClaim::new("claim-1").with_node_class("default");

    let instance = provider
        .create(&nc, &claim, &instance_types(), &CancellationToken::new())
        .await
        .unwrap();

    let tags = api.tags_for(&instance.id);
    assert_eq!(tags.get(TAG_NODE_POOL).map(String::as_str), Some("user-pool"));
    assert_eq!(tags.get("team").map(String::as_str), Some("platform"));
    assert_eq!(instance.tags, tags);
}
