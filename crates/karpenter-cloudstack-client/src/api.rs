//! CloudStack inventory client contract

use crate::error::Result;
use crate::model::{
    AsyncJobResponse, AsyncJobResult, DeployVirtualMachineResponse, ListResponse, NetworkInfo,
    ResourceTag, ServiceOfferingInfo, TemplateInfo, VirtualMachine, ZoneInfo,
};
use crate::params::{
    CreateTagsParams, DeleteTagsParams, DeployVirtualMachineParams, DestroyVirtualMachineParams,
    ListNetworksParams, ListServiceOfferingsParams, ListTagsParams, ListTemplatesParams,
    ListVirtualMachinesParams, ListZonesParams,
};
use async_trait::async_trait;

/// CloudStack inventory operations
///
/// Implementations own the wire protocol (request signing, transport,
/// pagination). Callers only see the value-typed parameters and the decoded
/// response model, so a concrete HTTP client and an in-memory fake are
/// interchangeable.
#[async_trait]
pub trait CloudStackApi: Send + Sync {
    /// Deploy a virtual machine; the response may carry an async job ID
    async fn deploy_virtual_machine(
        &self,
        params: &DeployVirtualMachineParams,
    ) -> Result<DeployVirtualMachineResponse>;

    async fn list_virtual_machines(
        &self,
        params: &ListVirtualMachinesParams,
    ) -> Result<ListResponse<VirtualMachine>>;

    async fn destroy_virtual_machine(
        &self,
        params: &DestroyVirtualMachineParams,
    ) -> Result<AsyncJobResponse>;

    async fn list_service_offerings(
        &self,
        params: &ListServiceOfferingsParams,
    ) -> Result<Vec<ServiceOfferingInfo>>;

    async fn list_templates(&self, params: &ListTemplatesParams) -> Result<Vec<TemplateInfo>>;

    async fn list_networks(&self, params: &ListNetworksParams) -> Result<Vec<NetworkInfo>>;

    async fn list_zones(&self, params: &ListZonesParams) -> Result<Vec<ZoneInfo>>;

    async fn create_tags(&self, params: &CreateTagsParams) -> Result<()>;

    async fn list_tags(&self, params: &ListTagsParams) -> Result<Vec<ResourceTag>>;

    async fn delete_tags(&self, params: &DeleteTagsParams) -> Result<()>;

    /// Current status of an async job
    async fn query_async_job(&self, job_id: &str) -> Result<AsyncJobResult>;
}
