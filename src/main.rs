//! PluginHost Supervisor: runs the plugin registry as a standalone process.
//!
//! Loads configuration, initializes logging, registers the built-in plugins,
//! reports health periodically, and shuts every plugin down on Ctrl-C.

mod heartbeat;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use pluginhost_core::config::{AppConfig, LoggingConfig};
use pluginhost_core::{AppError, AppResult};
use pluginhost_registry::{EventKind, EventPayload, PluginRegistry};

use heartbeat::HeartbeatPlugin;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "pluginhost-supervisor", version, about = "Plugin lifecycle supervisor")]
struct Args {
    /// Configuration environment; selects `config/{env}.toml`.
    #[arg(long, default_value = "development")]
    env: String,
    /// Seconds between health reports.
    #[arg(long, default_value_t = 60)]
    report_interval: u64,
    /// Milliseconds between heartbeat beats.
    #[arg(long, default_value_t = 1000)]
    heartbeat_ms: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match AppConfig::load(&args.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.logging);

    if let Err(e) = run(config, args).await {
        tracing::error!("Supervisor error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main supervisor run function
async fn run(config: AppConfig, args: Args) -> AppResult<()> {
    tracing::info!("Starting PluginHost Supervisor v{}", env!("CARGO_PKG_VERSION"));

    let registry = Arc::new(PluginRegistry::new(config.registry));

    registry.on(EventKind::Error, |event| {
        if let EventPayload::Error {
            plugin,
            operation,
            message,
        } = &event.payload
        {
            tracing::warn!(plugin = %plugin, operation = %operation, "Plugin reported failure: {}", message);
        }
        Ok(())
    });

    registry
        .load_plugin(Arc::new(HeartbeatPlugin::new(Duration::from_millis(
            args.heartbeat_ms,
        ))))
        .await?;
    registry.start_plugin("heartbeat").await?;

    let mut reports = tokio::time::interval(Duration::from_secs(args.report_interval.max(1)));
    reports.tick().await;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(|e| AppError::internal(format!("Failed to listen for Ctrl-C: {e}")))?;
                tracing::info!("Shutdown signal received");
                break;
            }
            _ = reports.tick() => {
                let report = registry.health_report().await;
                tracing::info!(
                    total = report.total,
                    started = report.started,
                    errored = report.errored,
                    success_rate = report.success_rate,
                    "Health report"
                );
            }
        }
    }

    let failures = registry.shutdown_all().await;
    for failure in &failures {
        tracing::error!(plugin = %failure.plugin_name(), error = %failure, "Plugin shutdown failed");
    }

    println!("{}", registry.generate_health_report().await);
    tracing::info!("Supervisor stopped");
    Ok(())
}
