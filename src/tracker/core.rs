//! Focus tracker.
//!
//! Turns host notifications into [`FocusFact`]s, keeps the current one for
//! the connection manager's resend-on-open, and forwards each fact through
//! [`ConnectionManager::send`]. Whether the link is open is the manager's
//! concern; the tracker sends on every event without deduplicating.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::watch;
use tracing::{debug, trace};

use crate::protocol::{FocusFact, HostEvent, RawFocus};
use crate::transport::ConnectionManager;

// ============================================================================
// FocusTracker
// ============================================================================

/// Normalizes focus events and streams them to the companion.
pub struct FocusTracker {
    manager: ConnectionManager,
    current: watch::Sender<Option<FocusFact>>,
}

impl FocusTracker {
    /// Creates a tracker publishing the current fact on `current`.
    ///
    /// The matching receiver belongs to the manager.
    #[must_use]
    pub fn new(manager: ConnectionManager, current: watch::Sender<Option<FocusFact>>) -> Self {
        Self { manager, current }
    }

    /// Returns the last observed fact.
    #[must_use]
    pub fn current(&self) -> Option<FocusFact> {
        self.current.borrow().clone()
    }

    /// Records the new focus and sends it.
    ///
    /// Returns whether the fact reached the link.
    pub fn on_focus_changed(&self, raw: RawFocus) -> bool {
        let fact = FocusFact::from_raw(raw);
        self.current.send_replace(Some(fact.clone()));

        let sent = self.manager.send(&fact);
        debug!(title = %fact.title, url = %fact.url, sent, "Focus changed");
        sent
    }

    /// Handles one host event.
    ///
    /// Events that do not change focus (an update still loading) are
    /// ignored and return `false`.
    pub fn on_host_event(&self, event: HostEvent) -> bool {
        let kind = event.kind();
        match event.into_focus() {
            Some(raw) => self.on_focus_changed(raw),
            None => {
                trace!(kind, "Host event does not change focus");
                false
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
