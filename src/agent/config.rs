//! Agent configuration.
//!
//! Every tunable of discovery and reconnection lives here so it can be
//! changed without rebuilding: from a JSON file, from CLI flags or env vars
//! (see the `focus-relay` binary), or through [`AgentBuilder`].
//!
//! # Example
//!
//! ```json
//! {
//!   "discovery_path": "/websocket_port.txt",
//!   "fixed_ports": [9999, 9998],
//!   "common_ports": [8000],
//!   "scan": { "start": 20000, "end": 30000, "stride": 50, "max_attempts": 200 },
//!   "retry_delay_ms": 5000,
//!   "framing": "native"
//! }
//! ```
//!
//! Omitted fields keep their defaults.
//!
//! [`AgentBuilder`]: super::AgentBuilder

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::discovery::tier::{
    DEFAULT_COMMON_PORTS, DEFAULT_DISCOVERY_PATH, DEFAULT_FIXED_PORTS, DEFAULT_LIST_TIMEOUT,
    DEFAULT_SCAN_TIMEOUT,
};
use crate::discovery::{DiscoveryPlan, ProbeTier, RangeScan};
use crate::error::{Error, Result};
use crate::tracker::Framing;
use crate::transport::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_RETRY_DELAY, ManagerConfig, RetryPolicy};

// ============================================================================
// AgentConfig
// ============================================================================

/// All agent tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Path of the discovery resource.
    pub discovery_path: String,

    /// First tier: well-known discovery ports, in order.
    pub fixed_ports: Vec<u16>,

    /// Second tier: conventional service ports, in order.
    pub common_ports: Vec<u16>,

    /// Per-probe timeout for the two list tiers.
    pub probe_timeout_ms: u64,

    /// Last-resort range scan.
    pub scan: RangeScan,

    /// Per-probe timeout for the range scan.
    pub scan_timeout_ms: u64,

    /// Delay before retrying after a failure.
    pub retry_delay_ms: u64,

    /// Enables doubling backoff capped at this value.
    pub retry_max_delay_ms: Option<u64>,

    /// Budget for one WebSocket handshake.
    pub connect_timeout_ms: u64,

    /// Host event framing on stdin.
    pub framing: Framing,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            discovery_path: DEFAULT_DISCOVERY_PATH.to_string(),
            fixed_ports: DEFAULT_FIXED_PORTS.to_vec(),
            common_ports: DEFAULT_COMMON_PORTS.to_vec(),
            probe_timeout_ms: millis(DEFAULT_LIST_TIMEOUT),
            scan: RangeScan::default(),
            scan_timeout_ms: millis(DEFAULT_SCAN_TIMEOUT),
            retry_delay_ms: millis(DEFAULT_RETRY_DELAY),
            retry_max_delay_ms: None,
            connect_timeout_ms: millis(DEFAULT_CONNECT_TIMEOUT),
            framing: Framing::default(),
        }
    }
}

impl AgentConfig {
    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the file cannot be read
    /// - [`Error::Json`] if it is not a valid configuration
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Builds the discovery plan: fixed, common, then range tier.
    #[must_use]
    pub fn discovery_plan(&self) -> DiscoveryPlan {
        let probe_timeout = Duration::from_millis(self.probe_timeout_ms);
        DiscoveryPlan {
            path: self.discovery_path.clone(),
            tiers: vec![
                ProbeTier::list("fixed", self.fixed_ports.clone(), probe_timeout),
                ProbeTier::list("common", self.common_ports.clone(), probe_timeout),
                ProbeTier::range(
                    "range",
                    self.scan,
                    Duration::from_millis(self.scan_timeout_ms),
                ),
            ],
        }
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        let initial = Duration::from_millis(self.retry_delay_ms);
        match self.retry_max_delay_ms {
            Some(max) => RetryPolicy::Exponential {
                initial,
                max: Duration::from_millis(max),
            },
            None => RetryPolicy::Fixed(initial),
        }
    }

    /// Returns the manager timing configuration.
    #[must_use]
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            retry: self.retry_policy(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }

    /// Checks every derived setting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.discovery_plan().validate()?;
        self.retry_policy().validate()?;
        if self.connect_timeout_ms == 0 {
            return Err(Error::config("connect timeout must be positive"));
        }
        Ok(())
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

// ============================================================================
// Tests
// ============================================================================
