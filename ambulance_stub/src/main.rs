use anyhow::Result;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use clap::{Parser, ValueEnum};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::instrument;

/// Canned behaviour of the stand-in dispatch service.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Success,
    Info,
    Empty,
    Error,
}

#[derive(serde::Deserialize, Debug)]
struct AmbulanceRequest {
    message: String,
}

#[derive(Parser, Debug)]
struct Args {
    #[clap(short, long, default_value = "5000")]
    port: u16,
    #[clap(short, long, value_enum, default_value = "success")]
    mode: Mode,
}

fn app(mode: Mode) -> Router {
    Router::new().route(
        "/call_ambulance",
        post(move |request: Json<AmbulanceRequest>| call_ambulance(request, mode)),
    )
}

#[instrument(skip_all, fields(mode = ?mode, message))]
async fn call_ambulance(request: Json<AmbulanceRequest>, mode: Mode) -> Response {
    let span = tracing::Span::current();
    let message = request.0.message;
    span.record("message", message.as_str());

    if message.trim().is_empty() {
        tracing::warn!("Rejected empty dispatch message");
        return (StatusCode::BAD_REQUEST, "message must not be empty").into_response();
    }

    let response = match mode {
        Mode::Success => {
            Json(json!({"status": "success", "message": "Ambulance dispatched"})).into_response()
        }
        Mode::Info => Json(json!({"status": "info", "message": "Dispatch request logged for review"}))
            .into_response(),
        Mode::Empty => Json(json!({})).into_response(),
        Mode::Error => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
    };
    tracing::info!("Answered with {}", response.status());
    response
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    tracing::info!("Starting ambulance stub with Args={:?}", args);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;
    axum::serve(listener, app(args.mode)).await?;

    Ok(())
}
