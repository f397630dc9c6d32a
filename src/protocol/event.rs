//! Host focus events.
//!
//! Events are notifications sent by the host (a browser extension speaking
//! native messaging, or any other process writing JSON lines) whenever the
//! focused surface changes.
//!
//! # Event Types
//!
//! | `type` | Meaning | Re-evaluates focus |
//! |--------|---------|--------------------|
//! | `activated` | A different tab became active | always |
//! | `updated` | A tab changed state | when `status` is `complete` and the tab is active |
//!
//! Browsers report updates for background tabs as well; those carry
//! `"active": false` and never change focus. A tab without `active` is
//! taken to be the focused one.
//!
//! # Format
//!
//! ```json
//! { "type": "activated", "tab": { "title": "Example", "url": "https://example.com" } }
//! { "type": "updated", "status": "complete", "tab": { "title": "Example", "url": "https://example.com", "active": true } }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use super::fact::RawFocus;

// ============================================================================
// Constants
// ============================================================================

/// Tab status that marks a finished load.
const STATUS_COMPLETE: &str = "complete";

// ============================================================================
// TabInfo
// ============================================================================

/// Tab fields carried by a host event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    /// Tab title.
    #[serde(default)]
    pub title: Option<String>,

    /// Tab URL.
    #[serde(default)]
    pub url: Option<String>,

    /// Whether the tab is the active one in its window.
    #[serde(default)]
    pub active: Option<bool>,
}

impl TabInfo {
    /// Creates tab info with title and URL, activity unknown.
    #[inline]
    #[must_use]
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            url: Some(url.into()),
            active: None,
        }
    }

    /// Sets the `active` flag.
    #[inline]
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Returns `false` only when the host says the tab is in the background.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active != Some(false)
    }
}

impl From<TabInfo> for RawFocus {
    fn from(tab: TabInfo) -> Self {
        Self {
            title: tab.title,
            url: tab.url,
        }
    }
}

// ============================================================================
// HostEvent
// ============================================================================

/// A focus notification from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostEvent {
    /// Focus moved to another tab.
    Activated {
        /// The newly active tab, if the host could read it.
        #[serde(default)]
        tab: Option<TabInfo>,
    },

    /// A tab was updated.
    Updated {
        /// Load status reported with the update (`loading`, `complete`).
        #[serde(default)]
        status: Option<String>,
        /// The updated tab, if the host could read it.
        #[serde(default)]
        tab: Option<TabInfo>,
    },
}

impl HostEvent {
    /// Returns the focus to report for this event, if it warrants one.
    ///
    /// A missing tab yields an empty [`RawFocus`] so the sentinels are sent.
    /// Updates of background tabs and unfinished loads yield `None`.
    #[must_use]
    pub fn into_focus(self) -> Option<RawFocus> {
        match self {
            Self::Activated { tab } => Some(tab.unwrap_or_default().into()),
            Self::Updated { status, tab } => {
                let tab = tab.unwrap_or_default();
                let complete = status.as_deref() == Some(STATUS_COMPLETE);
                (complete && tab.is_active()).then(|| tab.into())
            }
        }
    }

    /// Returns the event type name.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Activated { .. } => "activated",
            Self::Updated { .. } => "updated",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
