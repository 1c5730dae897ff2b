//! Async job completion

use crate::api::CloudStackApi;
use crate::error::{ClientError, Result};
use crate::model::JobStatus;
use serde_json::Value;
use std::time::Duration;
use tokio::time::{Instant, interval_at, sleep};
use tokio_util::sync::CancellationToken;

/// Interval between `queryAsyncJobResult` calls
pub const ASYNC_JOB_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Poll an async job until it succeeds, fails, times out or is cancelled
///
/// The first query happens one poll interval after the call. Returns the job
/// result payload on success.
pub async fn wait_for_async_job(
    api: &dyn CloudStackApi,
    job_id: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Option<Value>> {
    let deadline = sleep(timeout);
    tokio::pin!(deadline);

    let mut ticker = interval_at(
        Instant::now() + ASYNC_JOB_POLL_INTERVAL,
        ASYNC_JOB_POLL_INTERVAL,
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            _ = &mut deadline => return Err(ClientError::AsyncJobTimeout(job_id.to_string())),
            _ = ticker.tick() => {
                let result = api.query_async_job(job_id).await?;
                match result.status() {
                    JobStatus::Succeeded => {
                        tracing::debug!("Async job {} completed", job_id);
                        return Ok(result.job_result);
                    }
                    JobStatus::Failed => {
                        return Err(ClientError::AsyncJobFailed {
                            job_id: job_id.to_string(),
                            message: result.error_text(),
                        });
                    }
                    JobStatus::Pending => {
                        tracing::debug!("Async job {} still pending", job_id);
                    }
                    JobStatus::Unknown(status) => {
                        return Err(ClientError::UnknownJobStatus {
                            job_id: job_id.to_string(),
                            status,
                        });
                    }
                }
            }
        }
    }
}
