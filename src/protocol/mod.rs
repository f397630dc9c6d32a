//! Message types exchanged with the host and the companion.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `HostEvent` | Host → Agent | Focus changed / tab finished loading |
//! | `FocusFact` | Agent → Companion | Current focus, `title|url` text frame |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Host event JSON |
//! | `fact` | Focus fact and wire encoding |

// ============================================================================
// Submodules
// ============================================================================

/// Host focus events.
pub mod event;

/// Focus fact and wire encoding.
pub mod fact;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{HostEvent, TabInfo};
pub use fact::{BLANK_URL, FocusFact, RawFocus, UNTITLED};
