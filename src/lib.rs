//! Focus relay - streams the browser's focused tab to a local companion.
//!
//! The agent finds a companion service on the same machine, keeps a
//! WebSocket link to it alive through restarts and crashes, and reports
//! every change of focused tab as a `title|url` text frame.
//!
//! # Architecture
//!
//! - **Discovery**: tiered HTTP probing of a well-known resource
//!   (`/websocket_port.txt`) whose body is the WebSocket port
//! - **Transport**: a single link driven by a state machine that retries
//!   forever and resends the current focus whenever it opens
//! - **Tracking**: host events (tab activated, page load completed) become
//!   focus facts with `Untitled` / `about:blank` substituted for missing
//!   fields
//!
//! # Quick Start
//!
//! ```no_run
//! use focus_relay::{Agent, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let agent = Agent::builder().build()?;
//!
//!     agent
//!         .run_stdio(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | [`Agent`] assembly, builder and configuration |
//! | [`discovery`] | Port discovery: [`PortResolver`], [`DiscoveryPlan`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`protocol`] | Focus facts and host events |
//! | [`tracker`] | [`FocusTracker`] and host event input |
//! | [`transport`] | [`ConnectionManager`] and the WebSocket link |

// ============================================================================
// Modules
// ============================================================================

/// Agent assembly and configuration.
///
/// Use [`Agent::builder()`] to create a configured agent.
pub mod agent;

/// Companion discovery.
///
/// Probes candidate ports in tiers until one serves the discovery resource.
pub mod discovery;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Focus facts and host events.
pub mod protocol;

/// Focus tracking and host event input.
pub mod tracker;

/// WebSocket link and its lifecycle.
pub mod transport;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Agent types
pub use agent::{Agent, AgentBuilder, AgentConfig};

// Discovery types
pub use discovery::{
    DiscoveryPlan, Endpoint, HttpProber, PortResolver, ProbeTier, Prober, RangeScan,
};

// Error types
pub use error::{Error, Result};

// Protocol types
pub use protocol::{FocusFact, HostEvent, RawFocus, TabInfo};

// Tracker types
pub use tracker::{EventReader, FocusTracker, Framing};

// Transport types
pub use transport::{
    ConnectionManager, Connector, LinkEvent, LinkState, ManagerConfig, RetryPolicy, WsConnector,
};
