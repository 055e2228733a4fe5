//! DLE multi-tenant gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                     GATEWAY                          │
//!   Client Request   │  ┌────────┐   ┌──────────┐   ┌─────────┐             │
//!   ─────────────────┼─▶│  http  │──▶│ tenants  │──▶│ routing │             │
//!                    │  │ server │   │ alias /  │   │ backend │             │
//!                    │  └────────┘   │ file /   │   │ select  │             │
//!                    │               │ post     │   └────┬────┘             │
//!                    │               └────▲─────┘        ▼                  │
//!   Client Response  │  ┌──────────┐      │        ┌──────────┐             │
//!   ◀────────────────┼──│ response │◀─────┼────────│ upstream │◀────────────┼── CMS / imager /
//!                    │  │ rewriter │      │        │forwarder │             │   sitemap / DNS
//!                    │  └──────────┘      │        └──────────┘             │
//!                    │             ┌──────┴──────┐                          │
//!                    │             │  snapshots  │◀── refresh ── store ─────┼── MySQL / fixture
//!                    │             └─────────────┘                          │
//!                    │   config · observability · lifecycle · admin API     │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use dle_gateway::config::loader::{load_config, load_dotenv};
use dle_gateway::lifecycle::startup;
use dle_gateway::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "dle-gateway", version, about = "Multi-tenant reverse proxy for DLE sites")]
struct Args {
    /// TOML configuration file; defaults are used when it does not exist
    #[arg(short, long, env = "GATEWAY_CONFIG", default_value = "gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = load_dotenv();
    let args = Args::parse();

    let config = match load_config(Some(args.config.as_path())) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dle-gateway starting");
    dotenv.log();
    if !args.config.exists() {
        tracing::warn!(path = %args.config.display(), "Config file not found, using defaults");
    }
    tracing::info!(
        bind_address = %config.listener.bind_address,
        store = ?config.store.kind,
        refresh_interval_secs = config.refresh.interval_secs,
        request_timeout_secs = config.timeouts.request_secs,
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );

    match startup::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}
