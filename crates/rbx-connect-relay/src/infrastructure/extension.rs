//! The value a host holds for the lifetime of its Roblox Connect session.
//!
//! [`Extension`] maps the host's lifecycle and commands onto a [`Server`]:
//!
//! | Host hook / command    | Method                            |
//! |------------------------|-----------------------------------|
//! | activate               | [`Extension::activate`]           |
//! | run the active file    | [`Extension::execute_text`]       |
//! | run typed input        | [`Extension::execute_interactive`]|
//! | deactivate             | [`Extension::deactivate`]         |
//!
//! If the listener cannot be bound, activation still succeeds: the error is
//! shown to the host and the extension stays inert, answering every command
//! with [`RelayError::NotRunning`].

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::error;

use crate::application::{BroadcastReport, HostSink, Prompter, RelayError};
use crate::domain::RelayConfig;
use crate::infrastructure::ws_server::Server;

/// Title of the input prompt.
pub const PROMPT_TITLE: &str = "ROBLOX Connect";

/// Placeholder text of the input prompt.
pub const PROMPT_PLACEHOLDER: &str = "Enter Lua code to execute";

const NOT_RUNNING_MESSAGE: &str = "The Roblox Connect server is not running.";

/// Host-facing facade over the relay server.
pub struct Extension {
    host: Arc<dyn HostSink>,
    server: Option<Server>,
}

impl Extension {
    /// Starts the relay.  Never fails; see the module docs for bind errors.
    pub async fn activate(config: &RelayConfig, host: Arc<dyn HostSink>) -> Self {
        host.info("ROBLOX Connect extension activated");

        let server = match Server::start(config, Arc::clone(&host)).await {
            Ok(server) => Some(server),
            Err(e) => {
                // Most often another editor window already holds the port.
                // Keep the extension alive so its commands can say so.
                error!("relay failed to start: {e}");
                host.error(&e.to_string());
                host.show_error(&format!("Roblox Connect could not start: {e}"));
                None
            }
        };

        Self { host, server }
    }

    pub fn is_running(&self) -> bool {
        self.server.is_some()
    }

    /// The bound listener address, if running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(Server::local_addr)
    }

    /// Number of connected clients; `0` when inert.
    pub async fn client_count(&self) -> usize {
        match &self.server {
            Some(server) => server.client_count().await.unwrap_or(0),
            None => 0,
        }
    }

    /// Broadcasts `text` as a single snippet to every connected client.
    ///
    /// # Errors
    ///
    /// - [`RelayError::NotRunning`] if the extension is inert.
    /// - [`RelayError::NoClients`] if nobody is connected.
    ///
    /// Both have already been shown to the host as error popups.
    pub async fn execute_text(&self, text: &str) -> Result<BroadcastReport, RelayError> {
        let Some(server) = &self.server else {
            self.host.show_error(NOT_RUNNING_MESSAGE);
            return Err(RelayError::NotRunning);
        };

        // The whole text is one snippet: the client runs it as a single chunk.
        let result = server.broadcast(vec![text.to_owned()]).await;
        // `NoClients` was already shown by the relay.  `NotRunning` here means
        // the event loop died under us, which nothing else reports.
        if let Err(RelayError::NotRunning) = &result {
            self.host.show_error(NOT_RUNNING_MESSAGE);
        }
        result
    }

    /// Asks `prompter` for code and broadcasts it.
    ///
    /// Returns `Ok(None)` without sending anything if the prompt was dismissed.
    ///
    /// # Errors
    ///
    /// Same as [`Extension::execute_text`].
    pub async fn execute_interactive(
        &self,
        prompter: &dyn Prompter,
    ) -> Result<Option<BroadcastReport>, RelayError> {
        match prompter.prompt(PROMPT_TITLE, PROMPT_PLACEHOLDER).await {
            Some(text) => self.execute_text(&text).await.map(Some),
            None => Ok(None),
        }
    }

    /// Closes every client and unbinds the listener.
    pub async fn deactivate(mut self) {
        self.host.info("ROBLOX Connect extension deactivated");
        if let Some(server) = self.server.take() {
            server.stop().await;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
