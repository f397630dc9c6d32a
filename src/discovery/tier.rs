//! Probe tiers and the discovery plan.
//!
//! A [`DiscoveryPlan`] is an ordered list of [`ProbeTier`]s plus the path of
//! the discovery resource. Tiers are defined at configuration time and are
//! never mutated by discovery.
//!
//! # Default Plan
//!
//! | Tier | Candidates | Timeout |
//! |------|------------|---------|
//! | `fixed` | 9999, 9998, …, 9990 | 500ms |
//! | `common` | 8000, 8080, 8888, 3000, 5000 | 500ms |
//! | `range` | 10000..=60000 step 100, ≤ 500 probes | 30ms |
//!
//! The companion binds its discovery server to 9999 and walks down to 9990
//! when that is taken, which is why the fixed tier descends.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default path of the discovery resource.
pub const DEFAULT_DISCOVERY_PATH: &str = "/websocket_port.txt";

/// Ports the companion prefers for its discovery server.
pub const DEFAULT_FIXED_PORTS: [u16; 10] = [9999, 9998, 9997, 9996, 9995, 9994, 9993, 9992, 9991, 9990];

/// Conventional local development ports.
pub const DEFAULT_COMMON_PORTS: [u16; 5] = [8000, 8080, 8888, 3000, 5000];

/// Per-probe budget for list tiers.
pub const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_millis(500);

/// Per-probe budget for the range scan.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_millis(30);

// ============================================================================
// RangeScan
// ============================================================================

/// A bounded numeric port range scanned at a fixed stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeScan {
    /// First port scanned.
    pub start: u16,
    /// Last port that may be scanned (inclusive).
    pub end: u16,
    /// Distance between consecutive probes.
    pub stride: u16,
    /// Hard cap on the number of probes.
    pub max_attempts: usize,
}

impl Default for RangeScan {
    fn default() -> Self {
        Self {
            start: 10_000,
            end: 60_000,
            stride: 100,
            max_attempts: 500,
        }
    }
}

impl RangeScan {
    /// Returns the ports this scan visits, in order.
    pub fn ports(&self) -> impl Iterator<Item = u16> + use<> {
        (self.start..=self.end)
            .step_by(usize::from(self.stride.max(1)))
            .take(self.max_attempts)
    }

    /// Returns the number of ports this scan visits.
    #[must_use]
    pub fn len(&self) -> usize {
        if self.start > self.end || self.stride == 0 {
            return 0;
        }
        let span = usize::from(self.end - self.start) / usize::from(self.stride) + 1;
        span.min(self.max_attempts)
    }

    /// Returns `true` if the scan visits no ports.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            return Err(Error::config("range scan stride must be positive"));
        }
        if self.start == 0 || self.start > self.end {
            return Err(Error::config(format!(
                "range scan bounds {}..={} are invalid",
                self.start, self.end
            )));
        }
        if self.max_attempts == 0 {
            return Err(Error::config("range scan max_attempts must be positive"));
        }
        Ok(())
    }
}

// ============================================================================
// Candidates
// ============================================================================

/// The ports a tier probes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidates {
    /// An explicit ordered list.
    List(Vec<u16>),
    /// A strided range scan.
    Range(RangeScan),
}

// ============================================================================
// ProbeTier
// ============================================================================

/// An ordered group of candidate ports with a per-probe timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTier {
    /// Tier name used in logs.
    pub name: String,
    /// Ports to probe.
    pub candidates: Candidates,
    /// Budget for a single probe.
    pub timeout: Duration,
}

impl ProbeTier {
    /// Creates a tier from an explicit port list.
    #[must_use]
    pub fn list(name: impl Into<String>, ports: impl Into<Vec<u16>>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            candidates: Candidates::List(ports.into()),
            timeout,
        }
    }

    /// Creates a range-scan tier.
    #[must_use]
    pub fn range(name: impl Into<String>, scan: RangeScan, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            candidates: Candidates::Range(scan),
            timeout,
        }
    }

    /// Returns the ports of this tier, in probe order.
    pub fn ports(&self) -> Box<dyn Iterator<Item = u16> + Send + '_> {
        match &self.candidates {
            Candidates::List(ports) => Box::new(ports.iter().copied()),
            Candidates::Range(scan) => Box::new(scan.ports()),
        }
    }

    /// Returns the number of probes this tier issues at most.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.candidates {
            Candidates::List(ports) => ports.len(),
            Candidates::Range(scan) => scan.len(),
        }
    }

    /// Returns `true` if the tier has no candidates.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Upper bound on the wall-clock time this tier can take.
    #[must_use]
    pub fn worst_case(&self) -> Duration {
        self.timeout
            .saturating_mul(u32::try_from(self.len()).unwrap_or(u32::MAX))
    }

    fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::config(format!(
                "tier '{}' needs a non-zero probe timeout",
                self.name
            )));
        }
        match &self.candidates {
            Candidates::List(ports) if ports.contains(&0) => Err(Error::config(format!(
                "tier '{}' lists port 0",
                self.name
            ))),
            Candidates::List(_) => Ok(()),
            Candidates::Range(scan) => scan.validate(),
        }
    }
}

// ============================================================================
// DiscoveryPlan
// ============================================================================

/// Ordered tiers plus the discovery resource path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryPlan {
    /// Path of the plain-text resource holding the control port.
    pub path: String,
    /// Tiers in probe order.
    pub tiers: Vec<ProbeTier>,
}

impl Default for DiscoveryPlan {
    fn default() -> Self {
        Self {
            path: DEFAULT_DISCOVERY_PATH.to_string(),
            tiers: vec![
                ProbeTier::list("fixed", DEFAULT_FIXED_PORTS, DEFAULT_LIST_TIMEOUT),
                ProbeTier::list("common", DEFAULT_COMMON_PORTS, DEFAULT_LIST_TIMEOUT),
                ProbeTier::range("range", RangeScan::default(), DEFAULT_SCAN_TIMEOUT),
            ],
        }
    }
}

impl DiscoveryPlan {
    /// Upper bound on the wall-clock time of one full resolution.
    ///
    /// Includes one extra probe for a cached port.
    #[must_use]
    pub fn worst_case(&self) -> Duration {
        let tiers: Duration = self.tiers.iter().map(ProbeTier::worst_case).sum();
        let cached = self.tiers.first().map(|t| t.timeout).unwrap_or_default();
        tiers + cached
    }

    /// Checks that the plan can terminate and find something.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on an empty plan, a bad path or a bad tier.
    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(Error::config(format!(
                "discovery path '{}' must start with '/'",
                self.path
            )));
        }
        if self.tiers.iter().all(ProbeTier::is_empty) {
            return Err(Error::config("discovery plan has no candidate ports"));
        }
        self.tiers.iter().try_for_each(ProbeTier::validate)
    }
}

// ============================================================================
// Tests
// ============================================================================
