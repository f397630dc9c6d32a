//! Focus tracking.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`FocusTracker`] | Normalizes focus and hands it to the connection manager |
//! | [`EventReader`] | Reads host events from stdin or any byte stream |
//! | [`Framing`] | Native messaging or JSON lines |

// ============================================================================
// Submodules
// ============================================================================

/// Focus tracker.
pub mod core;

/// Host event input.
pub mod source;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::FocusTracker;
pub use source::{EventReader, Framing, MAX_NATIVE_MESSAGE};
