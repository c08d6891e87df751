#![allow(dead_code)]

use async_trait::async_trait;
use axum::{http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use gateway::generator::{GenerationError, TextGenerator};
use gateway::DispatchRequest;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Clone)]
pub enum Reply {
    Json(Value),
    Status(StatusCode, &'static str),
    Slow(Duration),
}

/// In-process stand-in for the dispatch endpoint that records what it receives.
#[derive(Clone, Default)]
pub struct StubService {
    hits: Arc<AtomicUsize>,
    messages: Arc<Mutex<Vec<String>>>,
}

impl StubService {
    pub async fn start(reply: Reply) -> (Self, String) {
        let stub = StubService::default();
        let recorder = stub.clone();
        let app = Router::new().route(
            "/call_ambulance",
            post(move |Json(body): Json<Value>| {
                let recorder = recorder.clone();
                let reply = reply.clone();
                async move {
                    recorder.hits.fetch_add(1, Ordering::SeqCst);
                    let message = body["message"].as_str().unwrap_or_default().to_string();
                    recorder.messages.lock().unwrap().push(message);
                    match reply {
                        Reply::Json(value) => Json(value).into_response(),
                        Reply::Status(status, body) => (status, body).into_response(),
                        Reply::Slow(delay) => {
                            tokio::time::sleep(delay).await;
                            Json(json!({"status": "success"})).into_response()
                        }
                    }
                }
            }),
        );
        let url = format!("{}/call_ambulance", serve(app).await);
        (stub, url)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

/// Binds a free local port and serves `app` on it, returning the base URL.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

/// URL of a port nothing listens on.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/call_ambulance")
}

pub enum Behaviour {
    Output(&'static str),
    Fail,
    Hang,
}

pub struct FakeGenerator {
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, _request: &DispatchRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Output(text) => Ok(text.to_string()),
            Behaviour::Fail => Err(GenerationError::MissingText),
            Behaviour::Hang => std::future::pending().await,
        }
    }
}

pub fn request() -> DispatchRequest {
    DispatchRequest::new("south", "medical", "Person collapsed, not breathing")
}
