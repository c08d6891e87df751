use anyhow::Result;
use clap::Parser;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::process::{Child, Command, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

#[derive(Debug)]
enum LauncherError {
    StubError,
    GatewayError,
    SignalError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgramName {
    AmbulanceStub,
    Gateway,
}

impl ProgramName {
    fn name(&self) -> &'static str {
        match self {
            ProgramName::AmbulanceStub => "ambulance_stub",
            ProgramName::Gateway => "gateway",
        }
    }

    fn get_error(&self) -> LauncherError {
        match self {
            ProgramName::AmbulanceStub => LauncherError::StubError,
            ProgramName::Gateway => LauncherError::GatewayError,
        }
    }

    fn get_executable(&self, bin_dir: Option<&str>) -> String {
        match bin_dir {
            Some(dir) => format!("{}/{}", dir.trim_end_matches('/'), self.name()),
            None => self.name().to_string(),
        }
    }
}

#[derive(Parser, Debug)]
struct Args {
    gateway_address: String,
    gateway_port: u16,
    #[clap(long, short, default_value = "5000")]
    stub_port: u16,
    #[clap(long, short = 'm', default_value = "success")]
    stub_mode: String,
    /// Directory holding the built binaries; defaults to looking them up on PATH
    #[clap(long, short)]
    bin_dir: Option<String>,
}

impl Args {
    fn get_arguments(&self, program_name: ProgramName) -> Vec<String> {
        match program_name {
            ProgramName::AmbulanceStub => vec![
                "--port".to_string(),
                self.stub_port.to_string(),
                "--mode".to_string(),
                self.stub_mode.clone(),
            ],
            ProgramName::Gateway => vec![
                "--address".to_string(),
                format!("{}:{}", self.gateway_address, self.gateway_port),
                "--dispatch-url".to_string(),
                self.dispatch_url(),
            ],
        }
    }

    fn dispatch_url(&self) -> String {
        format!("http://127.0.0.1:{}/call_ambulance", self.stub_port)
    }
}

fn main() -> Result<(), LauncherError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    tracing::info!("Launcher started with {:?}", args);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .map_err(|e| {
        tracing::error!("Error setting Ctrl-C handler: {:?}", e);
        LauncherError::SignalError
    })?;

    let stub = spawn_program(&args, ProgramName::AmbulanceStub)?;

    sleep(Duration::from_millis(100));
    let mut gateway = match spawn_program(&args, ProgramName::Gateway) {
        Ok(gateway) => gateway,
        Err(e) => {
            shutdown(ProgramName::AmbulanceStub, stub);
            return Err(e);
        }
    };

    tracing::info!(
        "Everything is up and running, dispatches go to {}. Press Ctrl-C to terminate the application.",
        args.dispatch_url()
    );

    let mut outcome = Ok(());
    while running.load(Ordering::SeqCst) {
        match gateway.try_wait() {
            Ok(Some(_)) => {
                tracing::error!("Gateway has died, shutting down");
                outcome = Err(LauncherError::GatewayError);
                break;
            }
            Ok(None) => sleep(Duration::from_millis(100)),
            Err(e) => {
                tracing::error!("Failed to poll gateway: {:?}", e);
                outcome = Err(LauncherError::GatewayError);
                break;
            }
        }
    }

    shutdown(ProgramName::Gateway, gateway);
    shutdown(ProgramName::AmbulanceStub, stub);

    outcome
}

fn spawn_program(args: &Args, program_type: ProgramName) -> Result<Child, LauncherError> {
    tracing::info!("Spawning {}", program_type.name());

    let program_args = args.get_arguments(program_type);

    let child = Command::new(program_type.get_executable(args.bin_dir.as_deref()))
        .args(program_args)
        .spawn()
        .map_err(|e| {
            tracing::error!("Failed to start {}: {:?}", program_type.name(), e);
            program_type.get_error()
        })?;

    Ok(child)
}

fn shutdown(program_type: ProgramName, process: Child) {
    if let Err(e) = terminate(program_type.name(), process, Duration::from_millis(500)) {
        tracing::error!("Failed to terminate {}: {:?}", program_type.name(), e);
    }
}

fn terminate(process_name: &str, mut process: Child, timeout: Duration) -> Result<ExitStatus> {
    tracing::info!("Terminating {process_name}");

    if let Some(status) = process.try_wait()? {
        tracing::info!("{process_name} already exited");
        return Ok(status);
    }

    let terminate_time = Instant::now();
    signal::kill(Pid::from_raw(process.id() as i32), Signal::SIGTERM)?;

    tracing::info!("Waiting for {process_name} to gracefully shutdown");

    while terminate_time.elapsed() < timeout {
        if let Some(status) = process.try_wait()? {
            tracing::info!("{process_name} terminated");
            return Ok(status);
        }
        sleep(Duration::from_millis(100));
    }

    tracing::info!("Killing {process_name}");

    process.kill()?;
    let exit_status = process.wait()?;

    tracing::info!("{process_name} killed");
    Ok(exit_status)
}
