//! Locshare relay server: live location sharing over WebSockets.
//!
//! An axum server that relays location updates from a room's senders to its
//! viewers, hands out fresh room ids on `GET /new`, and serves the browser
//! UI from a static directory.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:3000
//! cargo run --bin locshare-relay
//!
//! # Run on custom address
//! cargo run --bin locshare-relay -- --bind 127.0.0.1:8080
//!
//! # Or pick only the port, as most hosting platforms do
//! PORT=8080 cargo run --bin locshare-relay
//! ```

use std::sync::Arc;

use clap::Parser;
use locshare_relay::config::{RelayCliArgs, RelayConfig};
use locshare_relay::relay::{self, RelayState};

#[tokio::main]
async fn main() {
    let cli = RelayCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match RelayConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(
        addr = %config.bind_addr,
        static_dir = %config.static_dir.display(),
        "starting locshare relay server"
    );

    let state = Arc::new(RelayState::with_config(&config));

    match relay::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "relay server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "relay server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start relay server");
            std::process::exit(1);
        }
    }
}
