//! CloudStack inventory client
//!
//! This crate defines the contract between the provider and the CloudStack
//! API: the [`CloudStackApi`] trait, its value-typed request parameters and
//! the decoded response model. It also carries the client connection settings
//! and the async job wait loop shared by every asynchronous command.
//!
//! With the `test-utils` feature, [`fake::FakeCloudStackApi`] provides an
//! in-memory inventory for tests.

pub mod api;
pub mod config;
pub mod error;
pub mod job;
pub mod model;
pub mod params;

#[cfg(feature = "test-utils")]
pub mod fake;

// Re-exports
pub use api::CloudStackApi;
pub use config::{ClientConfig, DEFAULT_REQUEST_TIMEOUT};
pub use error::{ClientError, Result};
pub use job::{ASYNC_JOB_POLL_INTERVAL, wait_for_async_job};
pub use model::{
    AsyncJobResponse, AsyncJobResult, DeployVirtualMachineResponse, JobStatus, ListResponse,
    NetworkInfo, Nic, ResourceTag, ServiceOfferingInfo, TemplateInfo, VirtualMachine, ZoneInfo,
};
pub use params::{
    CreateTagsParams, DeleteTagsParams, DeployVirtualMachineParams, DestroyVirtualMachineParams,
    ListNetworksParams, ListServiceOfferingsParams, ListTagsParams, ListTemplatesParams,
    ListVirtualMachinesParams, ListZonesParams, ResourceType, TemplateFilter,
};
