//! `rcbridge-cli` – Robot Bridge Command Line Interface
//!
//! This binary starts the whole bridge:
//!
//! 1. Loads `~/.rcbridge/config.toml` (or `--config`), applies `RCBRIDGE_*`
//!    overrides and `--port`.
//! 2. Connects the device link and runs the session start-up sequence.
//! 3. Serves the HTTP API until a `stop` command or **Ctrl-C**.
//! 4. Stops every motor and disconnects before exiting.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use rcbridge_gateway::ApiGateway;
use rcbridge_hal::{EyeBoxRenderer, RaspiStill, SimDeviceLink};
use rcbridge_middleware::EventBus;
use rcbridge_runtime::{Session, init_tracing};
use rcbridge_types::BridgeError;
use tracing::{error, info, warn};

/// Period of the simulated robot's state events.
const SIM_STATE_PERIOD: Duration = Duration::from_millis(66);

#[derive(Debug, Parser)]
#[command(name = "rcbridge", version, about = "HTTP bridge to a small tracked robot")]
struct Args {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    verbose: bool,

    /// Config file to read instead of ~/.rcbridge/config.toml.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// HTTP port; wins over the config file and RCBRIDGE_PORT.
    #[arg(short, long)]
    port: Option<u16>,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    write_config: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _guard = init_tracing("rcbridge", args.verbose);

    print_banner();

    let path = args.config.clone().unwrap_or_else(config::config_path);
    let mut cfg = match config::load(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {e}", "Config error".red());
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = args.port {
        cfg.listen_port = port;
    }

    if args.write_config {
        return match config::save_to(&cfg, &path) {
            Ok(()) => {
                println!("  {} Config saved to {}", "✓".green().bold(), path.display().to_string().bold());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {e}", "Error saving config".red());
                ExitCode::FAILURE
            }
        };
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cfg)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "bridge stopped with an error");
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bridge lifecycle
// ─────────────────────────────────────────────────────────────────────────────

async fn run(cfg: config::Config) -> Result<(), BridgeError> {
    // A zero-capacity broadcast channel is invalid.
    let bus = Arc::new(EventBus::new(cfg.event_bus_capacity.max(1)));
    let device = Arc::new(SimDeviceLink::new(Arc::clone(&bus)));
    let feed = Arc::clone(&device).spawn_state_feed(SIM_STATE_PERIOD);

    let mut session = Session::new(
        device,
        &bus,
        Arc::new(RaspiStill::new(cfg.still_config())),
        Arc::new(EyeBoxRenderer),
        cfg.session_config(),
    );
    let shutdown = session.shutdown_signal();

    let ctrlc_signal = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        ctrlc_signal.trigger("ctrl-c");
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; use the stop command to exit");
    }

    if let Err(e) = session.start().await {
        error!(error = %e, "session start-up failed");
        session.stop().await;
        feed.abort();
        return Err(e);
    }

    info!(port = cfg.listen_port, origin = %cfg.cors_origin, "bridge ready");
    let served = ApiGateway::new(session.dispatcher())
        .with_port(cfg.listen_port)
        .with_cors_origin(cfg.cors_origin.clone())
        .run(shutdown.clone())
        .await;
    // A bind failure returns before anything raised the signal.
    shutdown.trigger("gateway exited");

    session.stop().await;
    if tokio::time::timeout(Duration::from_secs(1), feed).await.is_err() {
        warn!("device state feed did not stop in time");
    }
    served
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("  {} {}",
        "rcbridge".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  HTTP command and camera bridge for a small tracked robot");
    println!();
}
