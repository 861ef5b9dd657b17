//! hl-hostmon
//!
//! Serial-line host telemetry responder with tracing logging.
//! This is the main entry point: it loads the config, waits for the serial
//! device and runs one session until disconnect or shutdown.

use clap::Parser;
use hl_hostmon::cli::Args;
use hl_hostmon::config::{load_config, validate_effective_config, Config, DEFAULT_CONFIG_PATH};
use hl_hostmon::{responder, startup_checks};
use hl_hostmon::{SystemCommands, SCHEMA_VERSION, SCRIPT_VERSION};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config) {
    let log_level = if config.is_debug() {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    info!("Logging initialized with level: {}", config.log_level());
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if loading or validation fails.
fn load_validated_config(args: &Args) -> Config {
    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Configuration could not be loaded: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    config
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_validated_config(&args);

    setup_logging(&config);

    info!(
        "Starting hl-hostmon v{} (schema {}, built {})",
        SCRIPT_VERSION,
        SCHEMA_VERSION,
        env!("VERGEN_BUILD_TIMESTAMP")
    );

    info!(
        "Config: {}",
        args.config
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    );

    startup_checks::validate_requirements(&SystemCommands);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    // Serial reads block; the session runs off the async runtime.
    let outcome = tokio::task::spawn_blocking(move || responder::serve(&config, cancel)).await?;

    match outcome {
        Ok(end) => {
            info!("hl-hostmon stopped ({:?})", end);
            Ok(())
        }
        Err(e) => {
            error!("❌ {}", e);
            std::process::exit(1);
        }
    }
}
