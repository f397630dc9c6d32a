//! Resolved companion endpoint.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

// ============================================================================
// Constants
// ============================================================================

/// Host every probe and connection targets.
pub const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

// ============================================================================
// Endpoint
// ============================================================================

/// Loopback host and discovered control port of the companion.
///
/// Immutable once discovered. The connection manager discards it when a
/// connection attempt using it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: IpAddr,
    port: u16,
}

impl Endpoint {
    /// Creates an endpoint on the loopback interface.
    #[inline]
    #[must_use]
    pub const fn loopback(port: u16) -> Self {
        Self {
            host: LOOPBACK,
            port,
        }
    }

    /// Returns the host.
    #[inline]
    #[must_use]
    pub const fn host(&self) -> IpAddr {
        self.host
    }

    /// Returns the control port.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the socket address.
    #[inline]
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Returns the WebSocket URL for this endpoint.
    ///
    /// Format: `ws://127.0.0.1:{port}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.socket_addr())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

// ============================================================================
// Tests
// ============================================================================
