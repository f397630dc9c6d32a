//! Tiered port resolution.
//!
//! [`PortResolver::resolve`] walks the [`DiscoveryPlan`] tier by tier and
//! candidate by candidate, sequentially. The first candidate whose discovery
//! resource answers with a valid port number wins and no later candidate or
//! tier is probed.
//!
//! # Caching
//!
//! The discovery port that answered last time is probed before the first
//! tier. It is a hint only: if it stops answering, or the connection manager
//! calls [`PortResolver::invalidate`] after a failed connect, it is dropped.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, trace};

use crate::error::{Error, Result};

use super::endpoint::Endpoint;
use super::prober::{HttpProber, Prober, parse_control_port};
use super::tier::DiscoveryPlan;

// ============================================================================
// PortResolver
// ============================================================================

/// Locates the companion's control port.
pub struct PortResolver {
    /// Probe implementation.
    prober: Arc<dyn Prober>,
    /// Tiers and resource path.
    plan: DiscoveryPlan,
    /// Discovery port that answered last.
    cached: Mutex<Option<u16>>,
}

impl PortResolver {
    /// Creates a resolver using the given prober.
    #[must_use]
    pub fn new(prober: Arc<dyn Prober>, plan: DiscoveryPlan) -> Self {
        Self {
            prober,
            plan,
            cached: Mutex::new(None),
        }
    }

    /// Creates a resolver probing over HTTP.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the plan is invalid
    /// - [`Error::Http`] if the HTTP client cannot be built
    pub fn http(plan: DiscoveryPlan) -> Result<Self> {
        plan.validate()?;
        Ok(Self::new(Arc::new(HttpProber::new()?), plan))
    }

    /// Returns the discovery plan.
    #[inline]
    #[must_use]
    pub fn plan(&self) -> &DiscoveryPlan {
        &self.plan
    }

    /// Returns the cached discovery port, if any.
    #[inline]
    #[must_use]
    pub fn cached_port(&self) -> Option<u16> {
        *self.cached.lock()
    }

    /// Forgets the cached discovery port.
    pub fn invalidate(&self) {
        if let Some(port) = self.cached.lock().take() {
            debug!(discovery_port = port, "Discovery cache invalidated");
        }
    }

    /// Resolves the companion endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DiscoveryFailed`] when every tier is exhausted.
    /// Individual probe failures are never returned.
    pub async fn resolve(&self) -> Result<Endpoint> {
        let cached = self.cached_port();

        if let Some(port) = cached {
            let budget = self
                .plan
                .tiers
                .first()
                .map(|tier| tier.timeout)
                .unwrap_or_default();

            if let Some(endpoint) = self.probe(port, budget).await {
                debug!(discovery_port = port, %endpoint, "Cached discovery port answered");
                return Ok(endpoint);
            }
            self.invalidate();
        }

        for tier in &self.plan.tiers {
            let mut attempts = 0usize;

            for port in tier.ports() {
                if Some(port) == cached {
                    continue;
                }
                attempts += 1;

                if let Some(endpoint) = self.probe(port, tier.timeout).await {
                    info!(
                        tier = %tier.name,
                        discovery_port = port,
                        port = endpoint.port(),
                        "Companion discovered"
                    );
                    *self.cached.lock() = Some(port);
                    return Ok(endpoint);
                }
            }

            debug!(tier = %tier.name, attempts, "Tier exhausted");
        }

        Err(Error::discovery_failed(self.plan.tiers.len()))
    }

    /// Probes a single port, folding every failure into `None`.
    async fn probe(&self, port: u16, budget: Duration) -> Option<Endpoint> {
        let fetched = timeout(budget, self.prober.fetch(port, &self.plan.path, budget)).await;

        let body = match fetched {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                trace!(port, error = %e, "Probe failed");
                return None;
            }
            Err(_) => {
                trace!(port, timeout_ms = budget.as_millis() as u64, "Probe timed out");
                return None;
            }
        };

        match parse_control_port(&body) {
            Ok(control_port) => Some(Endpoint::loopback(control_port)),
            Err(e) => {
                trace!(port, error = %e, "Probe returned malformed body");
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use crate::discovery::tier::{ProbeTier, RangeScan};

    /// Prober answering from a fixed table and recording every probe.
    #[derive(Default)]
    struct TableProber {
        answers: HashMap<u16, std::result::Result<String, u16>>,
        probed: Mutex<Vec<u16>>,
    }

    impl TableProber {
        fn with(answers: impl IntoIterator<Item = (u16, std::result::Result<&'static str, u16>)>) -> Self {
            Self {
                answers: answers
                    .into_iter()
                    .map(|(port, answer)| (port, answer.map(str::to_string)))
                    .collect(),
                probed: Mutex::new(Vec::new()),
            }
        }

        fn probed(&self) -> Vec<u16> {
            self.probed.lock().clone()
        }
    }

    #[async_trait]
    impl Prober for TableProber {
        async fn fetch(&self, port: u16, _path: &str, _timeout: Duration) -> Result<String> {
            self.probed.lock().push(port);
            match self.answers.get(&port) {
                Some(Ok(body)) => Ok(body.clone()),
                Some(Err(status)) => Err(Error::ProbeStatus { status: *status }),
                None => Err(Error::connection("refused")),
            }
        }
    }

    /// Prober that never answers.
    struct SilentProber;

    #[async_trait]
    impl Prober for SilentProber {
        async fn fetch(&self, _port: u16, _path: &str, _timeout: Duration) -> Result<String> {
            std::future::pending().await
        }
    }

    fn plan(fixed: &[u16], common: &[u16], scan: RangeScan) -> DiscoveryPlan {
        DiscoveryPlan {
            path: "/websocket_port.txt".into(),
            tiers: vec![
                ProbeTier::list("fixed", fixed.to_vec(), Duration::from_millis(500)),
                ProbeTier::list("common", common.to_vec(), Duration::from_millis(500)),
                ProbeTier::range("range", scan, Duration::from_millis(30)),
            ],
        }
    }

    fn small_scan() -> RangeScan {
        RangeScan {
            start: 20000,
            end: 20040,
            stride: 10,
            max_attempts: 5,
        }
    }

    #[tokio::test]
    async fn test_fixed_tier_short_circuits() {
        let prober = Arc::new(TableProber::with([(9998, Ok("54321"))]));
        let resolver = PortResolver::new(prober.clone(), plan(&[9999, 9998], &[8000], small_scan()));

        let endpoint = resolver.resolve().await.expect("resolve");

        assert_eq!(endpoint.port(), 54321);
        assert_eq!(prober.probed(), [9999, 9998]);
        assert_eq!(resolver.cached_port(), Some(9998));
    }

    #[tokio::test]
    async fn test_failures_advance_to_next_candidate() {
        let prober = Arc::new(TableProber::with([
            (9999, Err(404)),
            (9998, Ok("not a port")),
            (8000, Ok("  0 ")),
            (8080, Ok("\t40000\r\n")),
        ]));
        let resolver =
            PortResolver::new(prober.clone(), plan(&[9999, 9998], &[8000, 8080], small_scan()));

        let endpoint = resolver.resolve().await.expect("resolve");

        assert_eq!(endpoint.port(), 40000);
        assert_eq!(prober.probed(), [9999, 9998, 8000, 8080]);
    }

    #[tokio::test]
    async fn test_range_tier_is_last_resort() {
        let prober = Arc::new(TableProber::with([(20020, Ok("41000"))]));
        let resolver = PortResolver::new(prober.clone(), plan(&[9999], &[8000], small_scan()));

        let endpoint = resolver.resolve().await.expect("resolve");

        assert_eq!(endpoint.port(), 41000);
        assert_eq!(prober.probed(), [9999, 8000, 20000, 20010, 20020]);
    }

    #[tokio::test]
    async fn test_all_tiers_exhausted() {
        let prober = Arc::new(TableProber::default());
        let resolver = PortResolver::new(prober.clone(), plan(&[9999, 9998], &[8000], small_scan()));

        let err = resolver.resolve().await.unwrap_err();

        assert!(matches!(err, Error::DiscoveryFailed { tiers: 3 }));
        assert_eq!(prober.probed().len(), 2 + 1 + 5);
        assert_eq!(resolver.cached_port(), None);
    }

    #[tokio::test]
    async fn test_cached_port_probed_first_and_not_repeated() {
        let prober = Arc::new(TableProber::with([(9998, Ok("54321"))]));
        let resolver = PortResolver::new(prober.clone(), plan(&[9999, 9998], &[8000], small_scan()));

        resolver.resolve().await.expect("first resolve");
        prober.probed.lock().clear();

        resolver.resolve().await.expect("second resolve");
        assert_eq!(prober.probed(), [9998]);
    }

    #[tokio::test]
    async fn test_invalidate_forces_full_walk() {
        let prober = Arc::new(TableProber::with([(9998, Ok("54321"))]));
        let resolver = PortResolver::new(prober.clone(), plan(&[9999, 9998], &[8000], small_scan()));

        resolver.resolve().await.expect("first resolve");
        resolver.invalidate();
        prober.probed.lock().clear();

        resolver.resolve().await.expect("second resolve");
        assert_eq!(prober.probed(), [9999, 9998]);
    }

    #[tokio::test]
    async fn test_stale_cache_is_skipped_in_tiers() {
        let prober = Arc::new(TableProber::with([(9998, Ok("54321"))]));
        let resolver = PortResolver::new(prober.clone(), plan(&[9999, 9998], &[8000], small_scan()));
        *resolver.cached.lock() = Some(8000);

        resolver.resolve().await.expect("resolve");

        assert_eq!(prober.probed(), [8000, 9999, 9998]);
        assert_eq!(resolver.cached_port(), Some(9998));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_network_terminates_within_bound() {
        let plan = plan(&[9999, 9998], &[8000], small_scan());
        let bound = plan.worst_case();
        let resolver = PortResolver::new(Arc::new(SilentProber), plan);

        let started = Instant::now();
        let err = resolver.resolve().await.unwrap_err();

        assert!(matches!(err, Error::DiscoveryFailed { .. }));
        assert!(started.elapsed() <= bound);
        assert_eq!(
            started.elapsed(),
            Duration::from_millis(3 * 500 + 5 * 30)
        );
    }
}
