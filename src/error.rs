//! Error types for focus-relay.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use focus_relay::{Result, Error};
//!
//! async fn example(resolver: &PortResolver) -> Result<()> {
//!     let endpoint = resolver.resolve().await?;
//!     println!("companion at {}", endpoint.ws_url());
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Discovery | [`Error::DiscoveryFailed`], [`Error::MalformedDiscovery`], [`Error::ProbeStatus`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Host input | [`Error::Protocol`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`] |
//!
//! Nothing on the discovery/reconnect path is fatal: the connection manager
//! logs these errors and schedules a retry.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when agent configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Discovery Errors
    // ========================================================================
    /// Every probe tier was exhausted without a usable port.
    #[error("Discovery failed: no companion found after {tiers} tier(s)")]
    DiscoveryFailed {
        /// Number of tiers that were tried.
        tiers: usize,
    },

    /// Discovery resource body was not a port number.
    #[error("Malformed discovery response: {body:?}")]
    MalformedDiscovery {
        /// The trimmed response body.
        body: String,
    },

    /// Discovery resource answered with a non-success status.
    #[error("Discovery probe returned HTTP {status}")]
    ProbeStatus {
        /// HTTP status code.
        status: u16,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when the link to a resolved endpoint cannot be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection attempt exceeded its time budget.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// WebSocket connection closed.
    ///
    /// Returned when writing to a link whose event loop has stopped.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Host Input Errors
    // ========================================================================
    /// Host event stream violated its framing.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a discovery failure error.
    #[inline]
    pub fn discovery_failed(tiers: usize) -> Self {
        Self::DiscoveryFailed { tiers }
    }

    /// Creates a malformed discovery response error.
    #[inline]
    pub fn malformed_discovery(body: impl Into<String>) -> Self {
        Self::MalformedDiscovery { body: body.into() }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::ConnectionTimeout { .. } => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error came out of port discovery.
    #[inline]
    #[must_use]
    pub fn is_discovery_error(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryFailed { .. } | Self::MalformedDiscovery { .. } | Self::ProbeStatus { .. }
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry. Configuration and host
    /// input errors are not.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.is_connection_error() || self.is_discovery_error() || matches!(self, Self::Http(_))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("refused");
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("stride must be positive");
        assert_eq!(err.to_string(), "Configuration error: stride must be positive");
    }

    #[test]
    fn test_discovery_failed_display() {
        let err = Error::discovery_failed(3);
        assert_eq!(
            err.to_string(),
            "Discovery failed: no companion found after 3 tier(s)"
        );
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::connection_timeout(5000);
        let other_err = Error::connection("test");

        assert!(timeout_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("test").is_connection_error());
        assert!(Error::connection_timeout(1000).is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(!Error::config("test").is_connection_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::discovery_failed(3).is_recoverable());
        assert!(Error::malformed_discovery("abc").is_recoverable());
        assert!(Error::ConnectionClosed.is_recoverable());
        assert!(!Error::config("test").is_recoverable());
        assert!(!Error::protocol("frame too large").is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::ConnectionRefused, "refused");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
