//! Builder pattern for agent configuration.
//!
//! Provides a fluent API for configuring and creating [`Agent`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use focus_relay::Agent;
//!
//! # fn example() -> focus_relay::Result<()> {
//! let agent = Agent::builder()
//!     .fixed_ports([9999, 9998])
//!     .retry_delay(Duration::from_secs(2))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use crate::discovery::{HttpProber, PortResolver, Prober, RangeScan};
use crate::error::Result;
use crate::transport::{Connector, WsConnector};

use super::config::AgentConfig;
use super::core::Agent;

// ============================================================================
// AgentBuilder
// ============================================================================

/// Builder for configuring an [`Agent`] instance.
///
/// Use [`Agent::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct AgentBuilder {
    /// Tunables.
    config: AgentConfig,
    /// Probe implementation; HTTP when unset.
    prober: Option<Arc<dyn Prober>>,
    /// Link implementation; WebSocket when unset.
    connector: Option<Arc<dyn Connector>>,
}

// ============================================================================
// AgentBuilder Implementation
// ============================================================================

impl AgentBuilder {
    /// Creates a builder with default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the discovery resource path.
    #[inline]
    #[must_use]
    pub fn discovery_path(mut self, path: impl Into<String>) -> Self {
        self.config.discovery_path = path.into();
        self
    }

    /// Sets the fixed-candidate tier.
    #[inline]
    #[must_use]
    pub fn fixed_ports(mut self, ports: impl Into<Vec<u16>>) -> Self {
        self.config.fixed_ports = ports.into();
        self
    }

    /// Sets the common-port tier.
    #[inline]
    #[must_use]
    pub fn common_ports(mut self, ports: impl Into<Vec<u16>>) -> Self {
        self.config.common_ports = ports.into();
        self
    }

    /// Sets the range-scan tier.
    #[inline]
    #[must_use]
    pub fn range_scan(mut self, scan: RangeScan) -> Self {
        self.config.scan = scan;
        self
    }

    /// Sets the per-probe timeouts of the list tiers and the range scan.
    #[inline]
    #[must_use]
    pub fn probe_timeouts(mut self, list: Duration, scan: Duration) -> Self {
        self.config.probe_timeout_ms = list.as_millis() as u64;
        self.config.scan_timeout_ms = scan.as_millis() as u64;
        self
    }

    /// Uses a fixed retry delay.
    #[inline]
    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay_ms = delay.as_millis() as u64;
        self.config.retry_max_delay_ms = None;
        self
    }

    /// Uses doubling backoff from `initial`, capped at `max`.
    #[inline]
    #[must_use]
    pub fn exponential_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.config.retry_delay_ms = initial.as_millis() as u64;
        self.config.retry_max_delay_ms = Some(max.as_millis() as u64);
        self
    }

    /// Sets the handshake budget.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Replaces the discovery probe implementation.
    #[inline]
    #[must_use]
    pub fn prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = Some(prober);
        self
    }

    /// Replaces the link implementation.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Builds the agent with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if any setting is invalid
    /// - [`Error::Http`] if the default HTTP prober cannot be created
    ///
    /// [`Error::Config`]: crate::Error::Config
    /// [`Error::Http`]: crate::Error::Http
    pub fn build(self) -> Result<Agent> {
        self.config.validate()?;

        let prober: Arc<dyn Prober> = match self.prober {
            Some(prober) => prober,
            None => Arc::new(HttpProber::new()?),
        };
        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(WsConnector),
        };

        let resolver = Arc::new(PortResolver::new(prober, self.config.discovery_plan()));

        Ok(Agent::new(resolver, connector, &self.config))
    }
}

// ============================================================================
// Tests
// ============================================================================
