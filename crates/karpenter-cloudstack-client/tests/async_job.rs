use karpenter_cloudstack_client::fake::{FakeCloudStackApi, FakeOperation, zone};
use karpenter_cloudstack_client::{
    ClientError, CloudStackApi, DeployVirtualMachineParams, wait_for_async_job,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn deploy_job(api: &FakeCloudStackApi) -> String {
    api.add_zone(zone("z1", "zone-1"));
    let response = api
        .deploy_virtual_machine(&DeployVirtualMachineParams::new("off-1", "tpl-1", "z1"))
        .await
        .unwrap();
    response.job_id.expect("async jobs enabled")
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_async_job_success() {
    let api = FakeCloudStackApi::new();
    api.set_async_jobs(Some(2));
    let job_id = deploy_job(&api).await;

    let start = tokio::time::Instant::now();
    let result = wait_for_async_job(
        &api,
        &job_id,
        Duration::from_secs(300),
        &CancellationToken::new(),
    )
    .await;

    assert!(result.is_ok());
    // two pending polls, success on the third
    assert_eq!(api.calls(FakeOperation::QueryAsyncJob), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_async_job_failed() {
    let api = FakeCloudStackApi::new();
    api.set_async_jobs(Some(0));
    api.set_async_job_failure(Some("insufficient capacity".to_string()));
    let job_id = deploy_job(&api).await;

    let err = wait_for_async_job(
        &api,
        &job_id,
        Duration::from_secs(300),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    match err {
        ClientError::AsyncJobFailed { job_id: id, message } => {
            assert_eq!(id, job_id);
            assert_eq!(message, "insufficient capacity");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_async_job_timeout() {
    let api = FakeCloudStackApi::new();
    api.set_async_jobs(Some(usize::MAX));
    let job_id = deploy_job(&api).await;

    let err = wait_for_async_job(
        &api,
        &job_id,
        Duration::from_secs(30),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(&err, ClientError::AsyncJobTimeout(id) if *id == job_id));
    // polls at 5s..25s, the deadline wins the tie at 30s
    assert_eq!(api.calls(FakeOperation::QueryAsyncJob), 5);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_async_job_cancelled() {
    let api = FakeCloudStackApi::new();
    api.set_async_jobs(Some(usize::MAX));
    let job_id = deploy_job(&api).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = wait_for_async_job(&api, &job_id, Duration::from_secs(300), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Cancelled));
    assert_eq!(api.calls(FakeOperation::QueryAsyncJob), 0);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_async_job_query_error_propagates() {
    let api = FakeCloudStackApi::new();
    api.set_async_jobs(Some(0));
    let job_id = deploy_job(&api).await;
    api.fail(FakeOperation::QueryAsyncJob, "api unavailable");

    let err = wait_for_async_job(
        &api,
        &job_id,
        Duration::from_secs(300),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ClientError::Api { .. }));
}
