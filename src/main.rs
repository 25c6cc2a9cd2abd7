//! opwatch - continuous operation supervisor
//!
//! # Usage
//!
//! ```bash
//! # Supervise with ./opwatch.toml (or $OPWATCH_CONFIG, or defaults)
//! opwatch
//!
//! # Explicit config, faster ticks, custom status address
//! opwatch run --config /etc/opwatch.toml --interval 10 --addr 0.0.0.0:9400
//!
//! # Validate a config file
//! opwatch check-config /etc/opwatch.toml
//!
//! # Start from the defaults
//! opwatch print-default-config > opwatch.toml
//! ```
//!
//! # Environment Variables
//!
//! - `OPWATCH_CONFIG`: config path when `--config` is not given
//! - `OPWATCH_CORS_ORIGINS`: comma-separated origins allowed on the status API
//! - `RUST_LOG`: logging filter (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use opwatch::api::{create_app, ApiState};
use opwatch::{logging, probes, OperationController, SupervisorConfig};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "opwatch")]
#[command(about = "Continuous operation supervisor with escalating recovery")]
#[command(version)]
struct CliArgs {
    /// Config file; overrides $OPWATCH_CONFIG and ./opwatch.toml
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Status API listen address (enables the API)
    #[arg(short, long, global = true, value_name = "HOST:PORT")]
    addr: Option<String>,

    /// Health check interval in seconds
    #[arg(long, global = true, value_name = "SECS")]
    interval: Option<u64>,

    /// Do not serve the status API
    #[arg(long, global = true)]
    no_server: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run the supervisor (default)
    Run,
    /// Validate a config file and report unknown keys
    CheckConfig {
        /// Path to the TOML file
        path: PathBuf,
    },
    /// Print the built-in default config as TOML
    PrintDefaultConfig,
}

// ============================================================================
// Task bookkeeping
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
        }
    }
}

/// Resolve the config: `--config`, else the standard search order, then
/// apply command-line overrides and re-validate.
fn load_config(args: &CliArgs) -> Result<SupervisorConfig> {
    let mut config = match &args.config {
        Some(path) => SupervisorConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => SupervisorConfig::load(),
    };

    if let Some(secs) = args.interval {
        config.supervisor.health_check_interval_secs = secs;
        if config.supervisor.max_monitoring_interval_secs < secs {
            config.supervisor.max_monitoring_interval_secs = secs;
        }
    }
    if let Some(addr) = &args.addr {
        config.server.addr = addr.clone();
        config.server.enabled = true;
    }
    if args.no_server {
        config.server.enabled = false;
    }

    config.validate().context("Invalid configuration after overrides")?;
    Ok(config)
}

/// Cancel `token` on Ctrl+C or SIGTERM; `run` turns that into a controller shutdown.
fn spawn_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, initiating shutdown"),
                        _ = term.recv() => info!("Received SIGTERM, initiating shutdown"),
                        () = token.cancelled() => return,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Cannot install SIGTERM handler, Ctrl+C only");
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, initiating shutdown"),
                        () = token.cancelled() => return,
                    }
                }
            }
        }
        #[cfg(not(unix))]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, initiating shutdown"),
                () = token.cancelled() => return,
            }
        }
        token.cancel();
    });
}

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: axum::Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Wait for a shutdown request, an emergency shutdown from the supervisor,
/// or a task failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    shutdown_token: &CancellationToken,
    supervisor_token: &CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            () = shutdown_token.cancelled() => {
                info!("Shutdown signal received");
                break;
            }
            () = supervisor_token.cancelled() => {
                warn!("Supervisor requested shutdown");
                break;
            }
            result = task_set.join_next(), if !task_set.is_empty() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Task {} completed", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("Task failed with error: {}", e);
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Task panicked: {}", e);
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {}
                }
            }
        }
    }

    Ok(())
}

async fn run(args: &CliArgs) -> Result<()> {
    let config = tracing::subscriber::with_default(logging::console_subscriber(), || {
        load_config(args)
    })?;
    let _log_guard = logging::init_logging(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        interval_secs = config.supervisor.health_check_interval_secs,
        components = config.components.len(),
        "opwatch starting"
    );

    let controller = Arc::new(OperationController::new(config.clone()));
    for component in &config.components {
        controller.register_component(
            component.name.clone(),
            probes::build_component(component),
            component.critical,
            component.max_failures,
        )?;
    }

    let shutdown_token = CancellationToken::new();
    spawn_signal_handler(shutdown_token.clone());

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    if config.server.enabled {
        let listener = tokio::net::TcpListener::bind(&config.server.addr)
            .await
            .with_context(|| format!("Failed to bind to {}", config.server.addr))?;
        info!(addr = %config.server.addr, "Status API listening");
        let app = create_app(ApiState::new(Arc::clone(&controller)));
        spawn_http_server(&mut task_set, listener, app, shutdown_token.clone());
    }

    controller.start().await;

    let result = run_supervisor(
        &mut task_set,
        &shutdown_token,
        &controller.cancellation_token(),
    )
    .await;

    // Loops first, then the status API
    controller.shutdown().await;
    shutdown_token.cancel();
    while let Some(joined) = task_set.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "Task did not shut down cleanly");
        }
    }

    let emergency = controller
        .status()
        .last_recovery
        .is_some_and(|r| r.success && r.action.is_terminal());
    if emergency {
        error!("Stopped by emergency shutdown");
        return Err(anyhow::anyhow!("emergency shutdown after unrecoverable failure"));
    }

    result?;
    info!("opwatch shutdown complete");
    Ok(())
}

fn check_config(path: &std::path::Path) -> Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let warnings = opwatch::config::validation::validate_unknown_keys(&contents);
    for w in &warnings {
        println!("warning: {w}");
    }

    let config = SupervisorConfig::load_from_file(path)
        .with_context(|| format!("{} is not a valid config", path.display()))?;

    println!(
        "{}: ok ({} component(s), {} warning(s))",
        path.display(),
        config.components.len(),
        warnings.len()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    match &args.command {
        Some(SubCommand::CheckConfig { path }) => check_config(path),
        Some(SubCommand::PrintDefaultConfig) => {
            print!("{}", SupervisorConfig::default().to_toml()?);
            Ok(())
        }
        Some(SubCommand::Run) | None => run(&args).await,
    }
}
