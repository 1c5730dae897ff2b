//! Cloud provider error types

use karpenter_cloudstack_providers::ProviderError;
use thiserror::Error;

/// Errors surfaced to the orchestrator
#[derive(Error, Debug)]
pub enum CloudProviderError {
    #[error("NodeClaim not found: {0}")]
    NodeClaimNotFound(String),

    #[error("NodeClass {0} is not ready")]
    NodeClassNotReady(String),

    #[error("insufficient capacity: {0}")]
    InsufficientCapacity(String),

    /// Launch failure with a machine-readable reason
    #[error("{reason}: {message}")]
    CreateError { reason: String, message: String },

    #[error("invalid provider ID: {0:?}")]
    InvalidProviderId(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl CloudProviderError {
    pub fn create_error(reason: impl Into<String>, err: impl std::fmt::Display) -> Self {
        CloudProviderError::CreateError {
            reason: reason.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudProviderError>;
