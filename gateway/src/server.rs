use crate::pipeline::{Cancelled, Pipeline};
use crate::{DispatchRequest, DispatchResult};

use axum::{http::StatusCode, routing::post, Json, Router};
use tokio_util::sync::CancellationToken;

type DispatchResponse = (StatusCode, Json<DispatchResult>);

/// HTTP surface used by the UI. Every pipeline outcome, errors included, is a
/// `200` carrying a `DispatchResult`; only shutdown cancellation answers `503`.
pub fn router(pipeline: Pipeline, shutdown: CancellationToken) -> Router {
    let demo_pipeline = pipeline.clone();
    let demo_shutdown = shutdown.clone();

    Router::new()
        .route(
            "/dispatch",
            post(move |request: Json<DispatchRequest>| {
                dispatch_handler(request, pipeline.clone(), shutdown.child_token())
            }),
        )
        .route(
            "/dispatch/demo",
            post(move || demo_handler(demo_pipeline.clone(), demo_shutdown.child_token())),
        )
}

async fn dispatch_handler(
    request: Json<DispatchRequest>,
    pipeline: Pipeline,
    cancel: CancellationToken,
) -> DispatchResponse {
    let request = request.0;

    tracing::info!("Processing request: {:?}", &request);

    respond(pipeline.run_dispatch_with_cancel(&request, &cancel).await)
}

async fn demo_handler(pipeline: Pipeline, cancel: CancellationToken) -> DispatchResponse {
    tracing::info!("Processing demo request");

    let request = pipeline.demo_request();
    respond(pipeline.demo().run_dispatch_with_cancel(&request, &cancel).await)
}

fn respond(outcome: Result<DispatchResult, Cancelled>) -> DispatchResponse {
    match outcome {
        Ok(result) => (StatusCode::OK, Json(result)),
        Err(cancelled) => (StatusCode::SERVICE_UNAVAILABLE, Json(cancelled.into())),
    }
}
