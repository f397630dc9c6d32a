//! Host event input.
//!
//! The agent usually runs as a browser native-messaging host: the browser
//! starts it and writes one length-prefixed JSON message per event on stdin.
//! Newline-delimited JSON is accepted too, for other hosts and for manual
//! testing.
//!
//! # Framing
//!
//! | Framing | Layout |
//! |---------|--------|
//! | `native` | 4-byte native-endian length, then that many bytes of JSON |
//! | `lines` | one JSON object per line, blank lines skipped |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

use crate::error::{Error, Result};
use crate::protocol::HostEvent;

// ============================================================================
// Constants
// ============================================================================

/// Largest native message accepted (1 MiB).
pub const MAX_NATIVE_MESSAGE: usize = 1024 * 1024;

// ============================================================================
// Framing
// ============================================================================

/// How host events are delimited on the input stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// Native messaging length prefix.
    #[default]
    Native,
    /// Newline-delimited JSON.
    Lines,
}

impl FromStr for Framing {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "lines" | "jsonl" => Ok(Self::Lines),
            other => Err(Error::config(format!(
                "unknown framing '{other}', expected 'native' or 'lines'"
            ))),
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Native => "native",
            Self::Lines => "lines",
        })
    }
}

// ============================================================================
// EventReader
// ============================================================================

/// Reads [`HostEvent`]s from a byte stream.
pub struct EventReader<R> {
    reader: BufReader<R>,
    framing: Framing,
    line: Vec<u8>,
}

impl<R: AsyncRead + Unpin> EventReader<R> {
    /// Wraps `reader`.
    #[must_use]
    pub fn new(reader: R, framing: Framing) -> Self {
        Self {
            reader: BufReader::new(reader),
            framing,
            line: Vec::new(),
        }
    }

    /// Returns the framing in use.
    #[inline]
    #[must_use]
    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Reads the next event.
    ///
    /// Returns `Ok(None)` at end of input.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] for a well-framed but malformed event; the stream
    ///   stays usable
    /// - [`Error::Protocol`] for an oversized native message
    /// - [`Error::Io`] for read failures and truncated messages
    pub async fn next_event(&mut self) -> Result<Option<HostEvent>> {
        loop {
            let payload = match self.framing {
                Framing::Native => self.read_native().await?,
                Framing::Lines => self.read_line().await?,
            };

            let Some(payload) = payload else {
                return Ok(None);
            };

            if payload.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            return Ok(Some(serde_json::from_slice(&payload)?));
        }
    }

    async fn read_native(&mut self) -> Result<Option<Vec<u8>>> {
        let mut prefix = [0u8; 4];
        match self.reader.read_exact(&mut prefix).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_ne_bytes(prefix) as usize;
        if len > MAX_NATIVE_MESSAGE {
            return Err(Error::protocol(format!(
                "native message of {len} bytes exceeds {MAX_NATIVE_MESSAGE}"
            )));
        }

        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload).await?;
        Ok(Some(payload))
    }

    async fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        self.line.clear();
        if self.reader.read_until(b'\n', &mut self.line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(self.line.clone()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::RawFocus;

    fn native(json: &str) -> Vec<u8> {
        let mut frame = (json.len() as u32).to_ne_bytes().to_vec();
        frame.extend_from_slice(json.as_bytes());
        frame
    }

    const ACTIVATED: &str =
        r#"{"type":"activated","tab":{"title":"Example","url":"https://example.com"}}"#;

    #[tokio::test]
    async fn test_native_frames_split_across_reads() {
        let frame = native(ACTIVATED);
        let (head, tail) = frame.split_at(6);
        let mock = tokio_test::io::Builder::new().read(head).read(tail).build();
        let mut reader = EventReader::new(mock, Framing::Native);

        let event = reader.next_event().await.expect("read").expect("event");
        assert_eq!(
            event.into_focus(),
            Some(RawFocus::new("Example", "https://example.com"))
        );
        assert!(reader.next_event().await.expect("eof").is_none());
    }

    #[tokio::test]
    async fn test_lines_skip_blank() {
        let input = format!("\n{ACTIVATED}\n\n{{\"type\":\"activated\"}}\n");
        let mut reader = EventReader::new(input.as_bytes(), Framing::Lines);

        let first = reader.next_event().await.expect("read").expect("event");
        assert_eq!(first.kind(), "activated");
        let second = reader.next_event().await.expect("read").expect("event");
        assert_eq!(second.into_focus(), Some(RawFocus::default()));
        assert!(reader.next_event().await.expect("eof").is_none());
    }

    #[tokio::test]
    async fn test_malformed_event_keeps_stream_usable() {
        let mut input = native("{not json");
        input.extend(native(ACTIVATED));
        let mut reader = EventReader::new(input.as_slice(), Framing::Native);

        let err = reader.next_event().await.unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert!(reader.next_event().await.expect("read").is_some());
    }

    #[tokio::test]
    async fn test_lines_invalid_utf8_is_skipped() {
        let mut bytes = b"\xff\xfe bad\n".to_vec();
        bytes.extend_from_slice(ACTIVATED.as_bytes());
        bytes.push(b'\n');
        let mut reader = EventReader::new(bytes.as_slice(), Framing::Lines);

        let err = reader.next_event().await.unwrap_err();
        assert!(matches!(err, Error::Json(_)));

        let event = reader.next_event().await.expect("read").expect("event");
        assert_eq!(event.kind(), "activated");
        assert!(reader.next_event().await.expect("eof").is_none());
    }

    #[tokio::test]
    async fn test_oversized_native_message_rejected() {
        let prefix = ((MAX_NATIVE_MESSAGE + 1) as u32).to_ne_bytes();
        let mut reader = EventReader::new(&prefix[..], Framing::Native);

        let err = reader.next_event().await.unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_truncated_native_message_is_io_error() {
        let mut frame = native(ACTIVATED);
        frame.truncate(10);
        let mut reader = EventReader::new(frame.as_slice(), Framing::Native);

        assert!(matches!(reader.next_event().await, Err(Error::Io(_))));
    }

    #[test]
    fn test_framing_from_str() {
        assert_eq!("native".parse::<Framing>().ok(), Some(Framing::Native));
        assert_eq!("LINES".parse::<Framing>().ok(), Some(Framing::Lines));
        assert!("xml".parse::<Framing>().is_err());
    }
}
