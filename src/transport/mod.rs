//! WebSocket transport layer.
//!
//! This module keeps the link between the agent and the companion alive.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐                          ┌─────────────────┐
//! │  Agent (Rust)       │                          │  Companion      │
//! │                     │        WebSocket         │                 │
//! │  ConnectionManager  │─────────────────────────►│  WebSocket      │
//! │  → Connection       │   127.0.0.1:RESOLVED     │  Server         │
//! │                     │      "title|url"         │                 │
//! └─────────────────────┘                          └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `PortResolver::resolve` - Find the companion's control port
//! 2. `Connector::connect` - WebSocket handshake
//! 3. `Connection` - Event loop owns the socket, reports close
//! 4. `ConnectionManager` - Waits, then starts over from 1
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |
//! | `connector` | Handshake seam and WebSocket connector |
//! | `manager` | Reconnecting state machine |
//! | `retry` | Retry delay policy |
//! | `state` | Link state and transition events |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

/// Opening links to a resolved endpoint.
pub mod connector;

/// Self-healing link to the companion.
pub mod manager;

/// Retry delay policy.
pub mod retry;

/// Link state and transition events.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{CloseReason, Connection, ConnectionCommand, ConnectionPeer, ConnectionSender};
pub use connector::{Connector, WsConnector};
pub use manager::{ConnectionManager, DEFAULT_CONNECT_TIMEOUT, ManagerConfig};
pub use retry::{Backoff, DEFAULT_RETRY_DELAY, RetryPolicy};
pub use state::{Disconnect, LinkEvent, LinkState};
