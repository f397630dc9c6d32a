//! Focus relay agent.
//!
//! The [`Agent`] wires the pieces together: a [`ConnectionManager`] keeping
//! the link to the companion alive, and a [`FocusTracker`] fed from host
//! events. The two share the current focus through a watch channel so the
//! manager can resend it whenever a link opens.
//!
//! # Example
//!
//! ```no_run
//! use focus_relay::Agent;
//!
//! # async fn example() -> focus_relay::Result<()> {
//! let agent = Agent::builder().build()?;
//! agent
//!     .run_stdio(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::discovery::PortResolver;
use crate::error::{Error, Result};
use crate::tracker::{EventReader, FocusTracker, Framing};
use crate::transport::{ConnectionManager, Connector};

use super::builder::AgentBuilder;
use super::config::AgentConfig;

// ============================================================================
// Agent
// ============================================================================

/// Relays browser focus to the companion service.
pub struct Agent {
    manager: ConnectionManager,
    tracker: FocusTracker,
    framing: Framing,
}

impl Agent {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    pub(crate) fn new(
        resolver: Arc<PortResolver>,
        connector: Arc<dyn Connector>,
        config: &AgentConfig,
    ) -> Self {
        let (current_tx, current_rx) = watch::channel(None);
        let manager =
            ConnectionManager::new(resolver, connector, config.manager_config(), current_rx);
        let tracker = FocusTracker::new(manager.clone(), current_tx);

        Self {
            manager,
            tracker,
            framing: config.framing,
        }
    }

    /// Returns the connection manager.
    #[inline]
    #[must_use]
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Returns the focus tracker.
    #[inline]
    #[must_use]
    pub fn tracker(&self) -> &FocusTracker {
        &self.tracker
    }

    /// Returns the configured input framing.
    #[inline]
    #[must_use]
    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Runs on the process's stdin until it closes or `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// See [`Agent::run`].
    pub async fn run_stdio<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let events = EventReader::new(tokio::io::stdin(), self.framing);
        self.run(events, shutdown).await
    }

    /// Starts the link and feeds `events` to the tracker.
    ///
    /// Returns when the input ends or `shutdown` resolves. The manager is
    /// shut down in both cases before returning.
    ///
    /// # Errors
    ///
    /// Returns the input error that ended the stream. Malformed events are
    /// logged and skipped.
    pub async fn run<R, F>(self, mut events: EventReader<R>, shutdown: F) -> Result<()>
    where
        R: AsyncRead + Unpin,
        F: Future<Output = ()>,
    {
        info!(framing = %events.framing(), "Focus relay running");
        self.manager.start();

        let outcome = tokio::select! {
            result = self.pump(&mut events) => result,
            () = shutdown => {
                info!("Shutdown requested");
                Ok(())
            }
        };

        self.manager.shutdown().await;
        info!("Focus relay stopped");
        outcome
    }

    async fn pump<R>(&self, events: &mut EventReader<R>) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            match events.next_event().await {
                Ok(Some(event)) => {
                    self.tracker.on_host_event(event);
                }
                Ok(None) => {
                    debug!("Host event stream ended");
                    return Ok(());
                }
                Err(Error::Json(e)) => {
                    warn!(error = %e, "Skipping malformed host event");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
