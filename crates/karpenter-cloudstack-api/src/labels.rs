//! Well-known label, tag and annotation keys

// Kubernetes well-known labels
pub const LABEL_TOPOLOGY_ZONE: &str = "topology.kubernetes.io/zone";
pub const LABEL_INSTANCE_TYPE: &str = "node.kubernetes.io/instance-type";
pub const LABEL_ARCHITECTURE: &str = "kubernetes.io/arch";
pub const LABEL_OS: &str = "kubernetes.io/os";

// Karpenter labels
pub const LABEL_NODE_POOL: &str = "karpenter.sh/nodepool";
pub const LABEL_CAPACITY_TYPE: &str = "karpenter.sh/capacity-type";
pub const CAPACITY_TYPE_ON_DEMAND: &str = "on-demand";

// CloudStack specific labels
pub const LABEL_ZONE_ID: &str = "karpenter.k8s.cloudstack/zone-id";
pub const LABEL_ZONE_NAME: &str = "karpenter.k8s.cloudstack/zone-name";
pub const LABEL_NETWORK_ID: &str = "karpenter.k8s.cloudstack/network-id";
pub const LABEL_SERVICE_OFFERING_ID: &str = "karpenter.k8s.cloudstack/service-offering-id";
pub const LABEL_SERVICE_OFFERING_NAME: &str = "karpenter.k8s.cloudstack/service-offering-name";
pub const LABEL_TEMPLATE_ID: &str = "karpenter.k8s.cloudstack/template-id";
pub const LABEL_TEMPLATE_NAME: &str = "karpenter.k8s.cloudstack/template-name";

/// Tag keys written on instances for ownership tracking and discovery
pub const TAG_NODE_POOL: &str = "karpenter.sh/nodepool";
pub const TAG_NODE_CLAIM: &str = "karpenter.sh/nodeclaim";
pub const TAG_NODE_CLASS: &str = "karpenter.k8s.cloudstack/nodeclass";
pub const TAG_MANAGED_BY: &str = "karpenter.sh/managed-by";
/// Prefix of the cluster ownership tag, completed as `kubernetes.io/cluster/<name>`
pub const TAG_CLUSTER_NAME_PREFIX: &str = "kubernetes.io/cluster";

pub const MANAGED_BY_VALUE: &str = "karpenter";
pub const CLUSTER_OWNED_VALUE: &str = "owned";

// Annotations
pub const ANNOTATION_NODE_CLASS_HASH: &str = "karpenter.k8s.cloudstack/nodeclass-hash";
pub const ANNOTATION_NODE_CLASS_HASH_VERSION: &str =
    "karpenter.k8s.cloudstack/nodeclass-hash-version";

// Well-known label values
pub const ARCHITECTURE_AMD64: &str = "amd64";
pub const OS_LINUX: &str = "linux";

/// Cluster ownership tag key for `cluster_name`
pub fn cluster_tag_key(cluster_name: &str) -> String {
    format!("{}/{}", TAG_CLUSTER_NAME_PREFIX, cluster_name)
}
