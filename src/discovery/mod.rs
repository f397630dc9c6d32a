//! Companion port discovery.
//!
//! The companion listens on an ephemeral WebSocket port and publishes it as
//! a plain-text resource on a small HTTP server whose own port is only
//! loosely known. Discovery probes candidate HTTP ports in tiers until one
//! serves that resource.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   GET /websocket_port.txt    ┌──────────────────┐
//! │  PortResolver    │─────────────────────────────►│  Companion       │
//! │  fixed → common  │       127.0.0.1:PROBE        │  discovery HTTP  │
//! │  → range scan    │◄─────────────────────────────│                  │
//! └──────────────────┘           "54321"            └──────────────────┘
//!          │
//!          ▼
//!   Endpoint(127.0.0.1:54321)
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `endpoint` | Resolved loopback endpoint |
//! | `prober` | Single HTTP probe and body parsing |
//! | `resolver` | Tier walk and port cache |
//! | `tier` | Tier and plan definitions |

// ============================================================================
// Submodules
// ============================================================================

/// Resolved loopback endpoint.
pub mod endpoint;

/// Discovery probes.
pub mod prober;

/// Tiered port resolution.
pub mod resolver;

/// Probe tiers and the discovery plan.
pub mod tier;

// ============================================================================
// Re-exports
// ============================================================================

pub use endpoint::{Endpoint, LOOPBACK};
pub use prober::{HttpProber, Prober, parse_control_port};
pub use resolver::PortResolver;
pub use tier::{Candidates, DiscoveryPlan, ProbeTier, RangeScan};
