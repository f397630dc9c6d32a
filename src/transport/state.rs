//! Link state and transition events.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use crate::discovery::Endpoint;

use super::connection::CloseReason;

// ============================================================================
// LinkState
// ============================================================================

/// State of the link to the companion.
///
/// Owned by the connection manager. Focus facts are written only while
/// the state is [`LinkState::Open`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LinkState {
    /// No link and no attempt in flight.
    #[default]
    Disconnected,
    /// Resolving the endpoint or performing the handshake.
    Connecting,
    /// Link established; sends go through.
    Open,
    /// Shutting down.
    Closing,
}

impl LinkState {
    /// Returns `true` if focus facts can be sent.
    #[inline]
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns the state name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Disconnect
// ============================================================================

/// Why the manager fell back to [`LinkState::Disconnected`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disconnect {
    /// No tier produced a port.
    DiscoveryFailed,
    /// The endpoint was found but the handshake failed.
    ConnectFailed(String),
    /// An open link went away.
    Closed(CloseReason),
    /// A manual reconnect dropped the link or attempt.
    Reconnect,
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DiscoveryFailed => f.write_str("discovery failed"),
            Self::ConnectFailed(message) => write!(f, "connect failed: {message}"),
            Self::Closed(reason) => write!(f, "link closed: {reason}"),
            Self::Reconnect => f.write_str("manual reconnect"),
        }
    }
}

// ============================================================================
// LinkEvent
// ============================================================================

/// Diagnostic event published on every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A connection attempt started.
    Connecting {
        /// Attempt counter since start, from 1.
        attempt: u64,
    },
    /// The link is open.
    Open {
        /// Endpoint the link uses.
        endpoint: Endpoint,
        /// Whether the current focus was re-sent on open.
        resynced: bool,
    },
    /// The link or attempt was lost.
    Disconnected {
        /// Cause of the loss.
        cause: Disconnect,
    },
    /// The next attempt is scheduled.
    RetryScheduled {
        /// Wait before the next attempt.
        delay: Duration,
    },
    /// The manager shut down.
    Closed,
}

// ============================================================================
// Tests
// ============================================================================
