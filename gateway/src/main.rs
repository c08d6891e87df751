use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use gateway::generator::{KeywordGenerator, RemoteGenerator, TextGenerator};
use gateway::pipeline::{Pipeline, DEFAULT_DEMO_MESSAGE};
use gateway::DispatchClient;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum GeneratorKind {
    Keyword,
    Remote,
}

#[derive(Parser, Debug)]
struct Args {
    #[clap(short, long, env = "GATEWAY_ADDRESS", default_value = "127.0.0.1:8080")]
    address: String,
    #[clap(
        short,
        long,
        env = "DISPATCH_URL",
        default_value = "http://127.0.0.1:5000/call_ambulance"
    )]
    dispatch_url: String,
    #[clap(long, env = "DISPATCH_TIMEOUT_MS", default_value = "10000")]
    dispatch_timeout_ms: u64,
    #[clap(long, env = "GENERATION_TIMEOUT_MS", default_value = "30000")]
    generation_timeout_ms: u64,
    #[clap(short, long, env = "GENERATOR", value_enum, default_value = "keyword")]
    generator: GeneratorKind,
    #[clap(long, env = "GENERATOR_URL")]
    generator_url: Option<String>,
    #[clap(long = "extra-keyword")]
    extra_keywords: Vec<String>,
    #[clap(long, env = "DEMO_MESSAGE", default_value = DEFAULT_DEMO_MESSAGE)]
    demo_message: String,
}

impl Args {
    fn build_generator(&self) -> Result<Arc<dyn TextGenerator>> {
        let generator: Arc<dyn TextGenerator> = match self.generator {
            GeneratorKind::Keyword => {
                Arc::new(KeywordGenerator::new().with_keywords(&self.extra_keywords))
            }
            GeneratorKind::Remote => match &self.generator_url {
                Some(url) => Arc::new(RemoteGenerator::new(url)),
                None => anyhow::bail!("--generator-url is required for the remote generator"),
            },
        };
        Ok(generator)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    tracing::info!("args: {:?}", &args);

    let client = DispatchClient::new(
        &args.dispatch_url,
        Duration::from_millis(args.dispatch_timeout_ms),
    )?;
    let pipeline = Pipeline::new(args.build_generator()?, client)
        .with_generation_timeout(Duration::from_millis(args.generation_timeout_ms))
        .with_demo_message(&args.demo_message);

    tracing::info!("Forwarding dispatches to {}", args.dispatch_url);

    let shutdown = CancellationToken::new();
    let app = gateway::server::router(pipeline, shutdown.clone());

    tracing::info!("Listening on {}", &args.address);
    let listener = TcpListener::bind(&args.address).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;
    tracing::info!("Server shutdown");

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown requested, cancelling in-flight dispatches");
    shutdown.cancel();
}
