//! Relay configuration types.
//!
//! [`RelayConfig`] is the single source of truth for runtime settings.  It is
//! built from CLI arguments by the terminal binary, or directly by an
//! embedding host.  There is no configuration file.

use std::net::{Ipv4Addr, SocketAddr};

use rbx_connect_core::DEFAULT_PORT;

/// All runtime configuration for the relay server.
///
/// # Example
///
/// ```rust
/// use rbx_connect_relay::domain::RelayConfig;
///
/// let cfg = RelayConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 42121);
/// assert!(cfg.bind_addr.ip().is_loopback());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// The address and port the WebSocket server binds to.
    ///
    /// Defaults to loopback: the relay trusts every peer, so it should not be
    /// reachable from the network.
    pub bind_addr: SocketAddr,
}

impl RelayConfig {
    /// Loopback configuration on an explicit port.  Port `0` lets the OS pick.
    pub fn localhost(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
        }
    }
}

impl Default for RelayConfig {
    /// `127.0.0.1:42121`, the address the companion script connects to.
    fn default() -> Self {
        Self::localhost(DEFAULT_PORT)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port_is_42121() {
        // Arrange / Act
        let cfg = RelayConfig::default();
        // Assert
        assert_eq!(cfg.bind_addr.port(), 42121);
    }

    #[test]
    fn test_default_bind_is_loopback() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.bind_addr.ip().to_string(), "127.0.0.1");
    }

    #[test]
    fn test_localhost_with_ephemeral_port() {
        let cfg = RelayConfig::localhost(0);
        assert_eq!(cfg.bind_addr.port(), 0);
        assert!(cfg.bind_addr.ip().is_loopback());
    }
}
