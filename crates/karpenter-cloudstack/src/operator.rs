//! Provider wiring

use crate::cloudprovider::CloudProvider;
use crate::controller::NodeClassReconciler;
use crate::options::Options;
use crate::store::NodeClassStore;
use karpenter_cloudstack_client::CloudStackApi;
use karpenter_cloudstack_providers::{
    InstanceProvider, InstanceProviderConfig, InstanceTypeProvider, NetworkProvider,
    TemplateProvider, ZoneProvider,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Owns the providers built from one set of options and one client
pub struct Operator {
    options: Options,
    cloud_provider: CloudProvider,
    reconciler: NodeClassReconciler,
    shutdown: CancellationToken,
}

impl Operator {
    pub fn new(
        options: Options,
        api: Arc<dyn CloudStackApi>,
        node_classes: Arc<dyn NodeClassStore>,
    ) -> Self {
        let ttl = options.cache_ttl;

        let zones = Arc::new(ZoneProvider::new(api.clone(), ttl));
        let networks = Arc::new(NetworkProvider::new(api.clone(), zones.clone(), ttl));
        let templates = Arc::new(TemplateProvider::new(api.clone(), zones.clone(), ttl));
        let instance_types = Arc::new(InstanceTypeProvider::new(api.clone(), ttl));

        let instance_config = InstanceProviderConfig::new(&options.cluster_name)
            .with_name_prefix(&options.instance_name_prefix);
        let instances = Arc::new(InstanceProvider::new(
            api,
            zones.clone(),
            networks.clone(),
            templates.clone(),
            instance_config,
            ttl,
        ));

        let shutdown = CancellationToken::new();
        let cloud_provider = CloudProvider::new(
            instances,
            instance_types.clone(),
            node_classes,
            shutdown.clone(),
        );
        let reconciler = NodeClassReconciler::new(zones, networks, templates, instance_types);

        tracing::info!(
            "CloudStack provider initialized for cluster {} (cache TTL {:?})",
            options.cluster_name,
            ttl
        );

        Self {
            options,
            cloud_provider,
            reconciler,
            shutdown,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn cloud_provider(&self) -> &CloudProvider {
        &self.cloud_provider
    }

    pub fn reconciler(&self) -> &NodeClassReconciler {
        &self.reconciler
    }

    /// Cancel in-flight launches and deletions
    pub fn shutdown(&self) {
        tracing::info!("Shutting down CloudStack provider");
        self.shutdown.cancel();
    }
}
