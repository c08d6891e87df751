mod common;

use common::{request, serve, Behaviour, FakeGenerator, Reply, StubService};
use gateway::generator::KeywordGenerator;
use gateway::pipeline::Pipeline;
use gateway::{DispatchClient, DispatchResult, DispatchStatus};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn start_gateway(pipeline: Pipeline, shutdown: CancellationToken) -> String {
    serve(gateway::server::router(pipeline, shutdown)).await
}

async fn dispatch_pipeline() -> (StubService, Pipeline) {
    let (stub, url) = StubService::start(Reply::Json(
        json!({"status": "success", "message": "Ambulance dispatched"}),
    ))
    .await;
    let client = DispatchClient::new(&url, Duration::from_secs(2)).unwrap();
    let pipeline = Pipeline::new(Arc::new(KeywordGenerator::new()), client)
        .with_demo_message("demo call");
    (stub, pipeline)
}

#[tokio::test]
async fn dispatch_route_returns_the_pipeline_result() {
    let (stub, pipeline) = dispatch_pipeline().await;
    let base = start_gateway(pipeline, CancellationToken::new()).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/dispatch"))
        .json(&request())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({"status": "success", "responseMessage": "Ambulance dispatched"})
    );
    assert_eq!(stub.hits(), 1);
}

#[tokio::test]
async fn dispatch_route_accepts_camel_case_fields() {
    let (stub, pipeline) = dispatch_pipeline().await;
    let base = start_gateway(pipeline, CancellationToken::new()).await;

    let result: DispatchResult = reqwest::Client::new()
        .post(format!("{base}/dispatch"))
        .json(&json!({
            "zoneId": "west",
            "incidentType": "medical",
            "message": "urgent help needed"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(result.status, DispatchStatus::Success);
    assert_eq!(
        stub.messages(),
        vec!["[HIGH PRIORITY] medical in zone west: urgent help needed".to_string()]
    );
}

#[tokio::test]
async fn generation_failure_is_still_ok_status() {
    let (stub, url) = StubService::start(Reply::Json(json!({}))).await;
    let client = DispatchClient::new(&url, Duration::from_secs(2)).unwrap();
    let pipeline = Pipeline::new(FakeGenerator::new(Behaviour::Output("")), client);
    let base = start_gateway(pipeline, CancellationToken::new()).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/dispatch"))
        .json(&request())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let result: DispatchResult = response.json().await.unwrap();
    assert_eq!(
        result,
        DispatchResult::error("Failed to generate a valid dispatch message.")
    );
    assert_eq!(stub.hits(), 0);
}

#[tokio::test]
async fn incomplete_request_is_rejected_before_dispatch() {
    let (stub, pipeline) = dispatch_pipeline().await;
    let base = start_gateway(pipeline, CancellationToken::new()).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/dispatch"))
        .json(&json!({"zoneId": "west", "message": "help"}))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert_eq!(stub.hits(), 0);
}

#[tokio::test]
async fn demo_route_needs_no_body() {
    let (stub, pipeline) = dispatch_pipeline().await;
    let base = start_gateway(pipeline, CancellationToken::new()).await;

    let result: DispatchResult = reqwest::Client::new()
        .post(format!("{base}/dispatch/demo"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(
        result,
        DispatchResult::new(DispatchStatus::Success, "Ambulance dispatched")
    );
    assert_eq!(stub.messages(), vec!["demo call".to_string()]);
}

#[tokio::test]
async fn shutdown_cancels_in_flight_dispatches() {
    let (stub, url) = StubService::start(Reply::Slow(Duration::from_secs(5))).await;
    let client = DispatchClient::new(&url, Duration::from_secs(10)).unwrap();
    let pipeline = Pipeline::new(Arc::new(KeywordGenerator::new()), client);
    let shutdown = CancellationToken::new();
    let base = start_gateway(pipeline, shutdown.clone()).await;

    let pending = tokio::spawn(async move {
        reqwest::Client::new()
            .post(format!("{base}/dispatch"))
            .json(&request())
            .send()
            .await
            .unwrap()
    });

    while stub.hits() == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    shutdown.cancel();

    let response = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    let result: DispatchResult = response.json().await.unwrap();
    assert_eq!(result, DispatchResult::error("Dispatch request was cancelled."));
    assert_eq!(stub.hits(), 1);
}

#[tokio::test]
async fn cancelled_gateway_answers_503_without_dispatching() {
    let (stub, pipeline) = dispatch_pipeline().await;
    let shutdown = CancellationToken::new();
    let base = start_gateway(pipeline, shutdown.clone()).await;
    shutdown.cancel();

    let response = reqwest::Client::new()
        .post(format!("{base}/dispatch"))
        .json(&request())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    let result: DispatchResult = response.json().await.unwrap();
    assert_eq!(result, DispatchResult::error("Dispatch request was cancelled."));
    assert_eq!(stub.hits(), 0);
}
