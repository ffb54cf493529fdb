//! Roblox Connect terminal host: entry point.
//!
//! Runs the relay and acts as its host: client output is printed through
//! `tracing`, and every line typed on stdin is sent to all connected Roblox
//! clients as one snippet.
//!
//! # Usage
//!
//! ```text
//! rbx-connect [OPTIONS]
//!
//! Options:
//!   --port <PORT>   WebSocket listener port [default: 42121]
//!   --bind <ADDR>   Listener IP address [default: 127.0.0.1]
//! ```
//!
//! # Environment variable overrides
//!
//! CLI args take precedence when both are present.
//!
//! | Variable           | Default     | Description             |
//! |--------------------|-------------|-------------------------|
//! | `RBX_CONNECT_PORT` | `42121`     | WebSocket listener port |
//! | `RBX_CONNECT_BIND` | `127.0.0.1` | Listener IP address     |
//!
//! The process stops on Ctrl+C or when stdin is closed.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rbx_connect_core::DEFAULT_PORT;
use rbx_connect_relay::application::HostSink;
use rbx_connect_relay::domain::RelayConfig;
use rbx_connect_relay::infrastructure::{ConsoleHost, Extension, StdinPrompter};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Roblox Connect relay with a terminal host.
#[derive(Debug, Parser)]
#[command(
    name = "rbx-connect",
    about = "Relay Lua snippets from the terminal to connected Roblox clients",
    version
)]
struct Cli {
    /// TCP port for the WebSocket server to listen on.
    ///
    /// The companion Roblox script connects to 42121 unless edited.
    #[arg(long, default_value_t = DEFAULT_PORT, env = "RBX_CONNECT_PORT")]
    port: u16,

    /// IP address to bind the WebSocket server to.
    ///
    /// The relay has no authentication; keep this on loopback unless the
    /// network is trusted.
    #[arg(long, default_value = "127.0.0.1", env = "RBX_CONNECT_BIND")]
    bind: String,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`RelayConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--bind` is not a valid IP address.
    fn into_relay_config(self) -> anyhow::Result<RelayConfig> {
        // Parse the IP on its own: "::1:42121" is not a valid SocketAddr
        // string, but ("::1", 42121) is a valid pair.
        let ip: IpAddr = self
            .bind
            .parse()
            .with_context(|| format!("invalid bind address: '{}'", self.bind))?;

        Ok(RelayConfig {
            bind_addr: SocketAddr::new(ip, self.port),
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// The relay's event loop handles one event at a time, so a single-threaded
/// runtime is all it needs.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // `RUST_LOG` controls verbosity; default to `info`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_relay_config()?;

    let host: Arc<dyn HostSink> = Arc::new(ConsoleHost);
    let extension = Extension::activate(&config, host).await;
    if !extension.is_running() {
        // The failure has already been reported through the host.
        anyhow::bail!("relay could not listen on {}", config.bind_addr);
    }

    // Start reading stdin only once the relay is up, so a bind failure does
    // not leave a reader thread behind.
    let prompter = StdinPrompter::spawn();

    // Whichever finishes first ends the session.  Dropping the other branch
    // only abandons a pending prompt or broadcast reply.
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("received Ctrl+C; shutting down"),
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        },
        () = read_snippets(&extension, &prompter) => info!("stdin closed; shutting down"),
    }

    // Closes every client (announcing identified ones) and frees the port.
    extension.deactivate().await;
    Ok(())
}

/// Broadcasts each line typed on stdin until EOF.
async fn read_snippets(extension: &Extension, prompter: &StdinPrompter) {
    while !prompter.at_eof() {
        // Errors (no clients, etc.) have already been shown through the host.
        let _ = extension.execute_interactive(prompter).await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
