//! RUM start/stop waits and the CLI entry point against a mocked endpoint

#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

use mockito::{Matcher, Mock, Server, ServerGuard};
use opwait::{Context, PollError};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tencentcloud::cli::{self, WaitCommand};
use tencentcloud::rum::RumError;
use tencentcloud::{Client, ProviderConfig, RumService};

fn client(server: &ServerGuard) -> Client {
    let config = ProviderConfig::builder()
        .secret_id("AKIDtest")
        .secret_key("test-secret")
        .endpoint(server.url())
        .build()
        .unwrap();
    Client::new(config).unwrap()
}

fn rum_body(status: i64) -> String {
    json!({
        "Response": {
            "InstanceSet": [{"InstanceId": "rum-1", "InstanceName": "web", "InstanceStatus": status}],
            "TotalCount": 1,
            "RequestId": "req"
        }
    })
    .to_string()
}

async fn scripted_rum(server: &mut ServerGuard, statuses: Vec<i64>) -> (Mock, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mock = server
        .mock("POST", "/")
        .match_header("x-tc-action", "DescribeTawInstances")
        .match_body(Matcher::PartialJson(json!({
            "Filters": [{"Name": "InstanceId", "Values": ["rum-1"]}]
        })))
        .with_body_from_request(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            rum_body(statuses[n.min(statuses.len() - 1)]).into_bytes()
        })
        .create_async()
        .await;
    (mock, calls)
}

#[tokio::test]
async fn start_waits_through_stopped_and_creating() {
    let mut server = Server::new_async().await;
    let (_mock, calls) = scripted_rum(&mut server, vec![6, 1, 2]).await;

    let instance = RumService::new(client(&server))
        .with_interval(Duration::from_millis(10))
        .wait_instance_operation(&Context::new(), "rum-1", "start", Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(instance.instance_status, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn stop_fails_on_abnormal_status() {
    let mut server = Server::new_async().await;
    let (_mock, calls) = scripted_rum(&mut server, vec![5, 3]).await;

    let err = RumService::new(client(&server))
        .with_interval(Duration::from_millis(10))
        .wait_instance_operation(&Context::new(), "rum-1", "stop", Duration::from_secs(10))
        .await
        .unwrap_err();

    match err {
        RumError::Wait(PollError::Failed { status, .. }) => assert_eq!(status, "instance status 3"),
        other => panic!("expected Failed, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unknown_operation_is_rejected_before_polling() {
    let mut server = Server::new_async().await;
    let mock = server.mock("POST", "/").expect(0).create_async().await;

    let err = RumService::new(client(&server))
        .wait_instance_operation(&Context::new(), "rum-1", "reboot", Duration::from_secs(10))
        .await
        .unwrap_err();

    assert!(matches!(err, RumError::UnknownOperation(ref op) if op == "reboot"));
    mock.assert_async().await;
}

#[tokio::test]
async fn missing_instance_is_unresolvable() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .with_body(r#"{"Response":{"InstanceSet":[],"TotalCount":0,"RequestId":"req"}}"#)
        .create_async()
        .await;

    let err = RumService::new(client(&server))
        .wait_instance_operation(&Context::new(), "rum-404", "stop", Duration::from_secs(10))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RumError::Wait(PollError::Unresolvable { ref target }) if target == "DescribeTawInstances rum-404"
    ));
}

#[tokio::test]
async fn cli_run_prints_delivered_instance() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .match_header("x-tc-action", "DescribeInstanceDealDetail")
        .with_body(
            r#"{"Response":{"TotalCount":1,"DealDetails":[{"DealId":"deal-1","Status":4,"InstanceIds":["crs-new"]}],"RequestId":"req"}}"#,
        )
        .create_async()
        .await;

    let command = WaitCommand::Deal {
        deal_id: "deal-1".to_string(),
        timeout: Some(5),
    };
    let output = cli::run(&Context::new(), client(&server), &command)
        .await
        .unwrap();

    assert_eq!(output, "crs-new");
}

#[tokio::test]
async fn cli_run_reports_cancellation_as_unknown_outcome() {
    let mut server = Server::new_async().await;
    let (_mock, _calls) = scripted_rum(&mut server, vec![5]).await;

    let ctx = Context::new();
    ctx.cancel();
    let command = WaitCommand::RumStop {
        instance_id: "rum-1".to_string(),
        timeout: Some(5),
    };
    let err = cli::run(&ctx, client(&server), &command).await.unwrap_err();

    assert_eq!(err.exit_code(), 2);
}
