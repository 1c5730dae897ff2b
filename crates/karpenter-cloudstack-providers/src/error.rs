//! Provider error types

use karpenter_cloudstack_client::ClientError;
use thiserror::Error;

/// Resolution and instance lifecycle errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("no {kind}s matched the selector terms in zone {zone}")]
    NoSelectorMatch { kind: &'static str, zone: String },

    #[error("zone {zone} is not enabled (state: {state})")]
    ZoneNotEnabled { zone: String, state: String },

    #[error("no suitable instance type found")]
    NoInstanceType,

    #[error("invalid instance type {name}: {reason}")]
    InvalidInstanceType { name: String, reason: String },

    #[error("timeout waiting for {0}")]
    Timeout(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("failed to {context}: {source}")]
    Client {
        context: String,
        #[source]
        source: ClientError,
    },
}

impl ProviderError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        ProviderError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Wrap a client error with the operation that produced it
    pub fn client(context: impl Into<String>) -> impl FnOnce(ClientError) -> Self {
        let context = context.into();
        move |source| ProviderError::Client { context, source }
    }

    /// Map an async job wait error; cancellation and timeout keep their kind
    pub fn from_job_error(context: impl Into<String>, err: ClientError) -> Self {
        match err {
            ClientError::Cancelled => ProviderError::Cancelled,
            ClientError::AsyncJobTimeout(job_id) => {
                ProviderError::Timeout(format!("async job {}", job_id))
            }
            source => ProviderError::Client {
                context: context.into(),
                source,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
