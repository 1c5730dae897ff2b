//! CloudStack client error types

use thiserror::Error;

/// CloudStack client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("CloudStack API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("async job {job_id} failed: {message}")]
    AsyncJobFailed { job_id: String, message: String },

    #[error("timeout waiting for async job {0}")]
    AsyncJobTimeout(String),

    #[error("unknown job status {status} for async job {job_id}")]
    UnknownJobStatus { job_id: String, status: i32 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    pub fn api(code: u16, message: impl Into<String>) -> Self {
        ClientError::Api {
            code,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
