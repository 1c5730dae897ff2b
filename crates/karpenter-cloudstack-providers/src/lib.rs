//! CloudStack resource providers
//!
//! Resolves the resources a NodeClass selects (zones, networks, templates,
//! service offerings) through a shared TTL cache and selector engine, and
//! manages the lifecycle of the VMs launched from them.

pub mod cache;
pub mod error;
pub mod instance;
pub mod instancetype;
pub mod network;
pub mod selector;
pub mod template;
pub mod zone;

// Re-exports
pub use cache::{DEFAULT_TTL, TtlCache};
pub use error::{ProviderError, Result};
pub use instance::{
    FirstAvailable, Instance, InstanceProvider, InstanceProviderConfig, InstanceTypeSelector,
    LaunchState,
};
pub use instancetype::{InstanceTypeProvider, ServiceOffering};
pub use network::{Network, NetworkProvider};
pub use selector::Selectable;
pub use template::{Template, TemplateProvider};
pub use zone::{Zone, ZoneProvider};
