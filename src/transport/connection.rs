//! WebSocket connection and event loop.
//!
//! A [`Connection`] is one live link to the companion. Writing is done
//! through a cloneable [`ConnectionSender`] that never blocks; the socket
//! itself is driven by a spawned event loop that reports how the link ended.
//!
//! # Event Loop
//!
//! The loop spawned by [`Connection::new`] handles:
//!
//! - Outgoing text frames queued by the manager
//! - Incoming frames from the companion (ignored, close/error detection only)
//! - Shutdown requests
//!
//! The loop side is a [`ConnectionPeer`]. [`Connection::pair`] hands it out
//! directly so a link can be driven without a socket.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

// ============================================================================
// CloseReason
// ============================================================================

/// How a link ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The companion sent a close frame.
    Remote,
    /// The stream ended without a close frame.
    Ended,
    /// A read or write failed.
    Error(String),
    /// The agent closed the link.
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote => f.write_str("closed by companion"),
            Self::Ended => f.write_str("stream ended"),
            Self::Error(message) => write!(f, "error: {message}"),
            Self::Shutdown => f.write_str("shutdown"),
        }
    }
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Commands for the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionCommand {
    /// Write a text frame.
    Send(String),
    /// Close the link.
    Shutdown,
}

// ============================================================================
// ConnectionSender
// ============================================================================

/// Write half of a [`Connection`].
///
/// Cheap to clone. Writes are queued to the event loop and never block.
#[derive(Debug, Clone)]
pub struct ConnectionSender {
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
}

impl ConnectionSender {
    /// Queues a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the event loop has stopped.
    pub fn send_text(&self, text: String) -> Result<()> {
        self.command_tx
            .send(ConnectionCommand::Send(text))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Asks the event loop to close the link.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Returns `true` if the event loop has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }
}

// ============================================================================
// ConnectionPeer
// ============================================================================

/// Event loop side of a [`Connection`].
#[derive(Debug)]
pub struct ConnectionPeer {
    command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
    closed_tx: oneshot::Sender<CloseReason>,
}

impl ConnectionPeer {
    /// Waits for the next command.
    ///
    /// Returns `None` once every sender is gone.
    pub async fn next_command(&mut self) -> Option<ConnectionCommand> {
        self.command_rx.recv().await
    }

    /// Returns a queued command without waiting.
    pub fn try_next_command(&mut self) -> Option<ConnectionCommand> {
        self.command_rx.try_recv().ok()
    }

    /// Reports the end of the link to the owning [`Connection`].
    pub fn close(self, reason: CloseReason) {
        let _ = self.closed_tx.send(reason);
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Live link to the companion.
///
/// Owned by the connection manager, which awaits [`Connection::closed`]
/// while handing [`ConnectionSender`]s out for writes.
#[derive(Debug)]
pub struct Connection {
    sender: ConnectionSender,
    closed_rx: oneshot::Receiver<CloseReason>,
}

impl Connection {
    /// Creates a connection from a WebSocket stream.
    ///
    /// Spawns the event loop task internally.
    pub fn new<S>(ws_stream: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (connection, peer) = Self::pair();
        tokio::spawn(Self::run_event_loop(ws_stream, peer));
        connection
    }

    /// Creates a connection and the peer that drives it.
    #[must_use]
    pub fn pair() -> (Self, ConnectionPeer) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = oneshot::channel();

        let connection = Self {
            sender: ConnectionSender { command_tx },
            closed_rx,
        };
        let peer = ConnectionPeer {
            command_rx,
            closed_tx,
        };

        (connection, peer)
    }

    /// Returns a write handle.
    #[inline]
    #[must_use]
    pub fn sender(&self) -> ConnectionSender {
        self.sender.clone()
    }

    /// Waits until the link ends.
    ///
    /// Cancel-safe. A peer dropped without reporting counts as
    /// [`CloseReason::Ended`].
    pub async fn closed(&mut self) -> CloseReason {
        (&mut self.closed_rx).await.unwrap_or(CloseReason::Ended)
    }

    /// Closes the link.
    pub fn shutdown(&self) {
        self.sender.shutdown();
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop<S>(ws_stream: WebSocketStream<S>, mut peer: ConnectionPeer)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        let reason = loop {
            tokio::select! {
                // Incoming frames from the companion
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Close(frame))) => {
                            debug!(?frame, "WebSocket closed by remote");
                            break CloseReason::Remote;
                        }

                        Some(Ok(Message::Text(text))) => {
                            trace!(len = text.len(), "Ignoring inbound text frame");
                        }

                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket error");
                            break CloseReason::Error(e.to_string());
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break CloseReason::Ended;
                        }

                        // Ignore Binary, Ping, Pong
                        Some(Ok(_)) => {}
                    }
                }

                // Commands from the manager
                command = peer.next_command() => {
                    match command {
                        Some(ConnectionCommand::Send(text)) => {
                            if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                                warn!(error = %e, "Failed to send frame");
                                break CloseReason::Error(e.to_string());
                            }
                            trace!("Frame sent");
                        }

                        Some(ConnectionCommand::Shutdown) | None => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break CloseReason::Shutdown;
                        }
                    }
                }
            }
        };

        peer.close(reason);
        debug!("Event loop terminated");
    }
}

// ============================================================================
// Tests
// ============================================================================
