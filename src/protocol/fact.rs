//! Focus fact and its wire encoding.
//!
//! A [`FocusFact`] is the only payload the agent ever writes to the link.
//!
//! # Wire Format
//!
//! A single WebSocket text frame, `title|url`:
//!
//! ```text
//! Example|https://example.com
//! ```
//!
//! Neither field is escaped. A `|` inside either field makes the frame
//! ambiguous; the companion keeps the text before the first separator as
//! the title and the text after the last one as the URL.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Title used when the host reports none.
pub const UNTITLED: &str = "Untitled";

/// URL used when the host reports none.
pub const BLANK_URL: &str = "about:blank";

/// Field separator in the wire frame.
pub const SEPARATOR: char = '|';

// ============================================================================
// RawFocus
// ============================================================================

/// Focus information as reported by the host, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFocus {
    /// Surface title, if the host knows it.
    #[serde(default)]
    pub title: Option<String>,

    /// Surface URL, if the host knows it.
    #[serde(default)]
    pub url: Option<String>,
}

impl RawFocus {
    /// Creates raw focus info with both fields present.
    #[inline]
    #[must_use]
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            url: Some(url.into()),
        }
    }
}

// ============================================================================
// FocusFact
// ============================================================================

/// The (title, url) pair describing current user focus.
///
/// Always fully populated: missing values are replaced with
/// [`UNTITLED`] and [`BLANK_URL`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FocusFact {
    /// Surface title.
    pub title: String,
    /// Surface URL.
    pub url: String,
}

impl FocusFact {
    /// Creates a fact, substituting sentinels for blank fields.
    #[must_use]
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self::from_raw(RawFocus::new(title, url))
    }

    /// Normalizes raw host data into a fact.
    ///
    /// Absent and whitespace-only fields count as missing.
    #[must_use]
    pub fn from_raw(raw: RawFocus) -> Self {
        Self {
            title: present(raw.title).unwrap_or_else(|| UNTITLED.to_string()),
            url: present(raw.url).unwrap_or_else(|| BLANK_URL.to_string()),
        }
    }

    /// Encodes the fact as a wire frame.
    #[inline]
    #[must_use]
    pub fn to_wire(&self) -> String {
        format!("{}{SEPARATOR}{}", self.title, self.url)
    }
}

impl Default for FocusFact {
    fn default() -> Self {
        Self::from_raw(RawFocus::default())
    }
}

impl From<RawFocus> for FocusFact {
    fn from(raw: RawFocus) -> Self {
        Self::from_raw(raw)
    }
}

impl fmt::Display for FocusFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Tests
// ============================================================================
