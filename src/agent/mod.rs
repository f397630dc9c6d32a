//! Agent assembly and configuration.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Agent`] | Runs the tracker and the connection manager together |
//! | [`AgentBuilder`] | Fluent configuration |
//! | [`AgentConfig`] | Serializable tunables |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder.
pub mod builder;

/// Serializable configuration.
pub mod config;

/// Agent lifecycle.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::Agent;
pub use builder::AgentBuilder;
pub use config::AgentConfig;
