//! Opening links to a resolved endpoint.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio_tungstenite::connect_async;
use tracing::debug;

use crate::discovery::Endpoint;
use crate::error::Result;

use super::connection::Connection;

// ============================================================================
// Connector
// ============================================================================

/// Opens a duplex link to an endpoint.
///
/// The connection manager bounds every call with its connect timeout.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Performs the handshake and returns the live link.
    ///
    /// # Errors
    ///
    /// Any handshake or transport failure.
    async fn connect(&self, endpoint: Endpoint) -> Result<Connection>;
}

// ============================================================================
// WsConnector
// ============================================================================

/// [`Connector`] speaking plain WebSocket (`ws://`).
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: Endpoint) -> Result<Connection> {
        let url = endpoint.ws_url();
        let (ws_stream, response) = connect_async(url.as_str()).await?;

        debug!(%url, status = %response.status(), "WebSocket handshake completed");

        Ok(Connection::new(ws_stream))
    }
}

// ============================================================================
// Tests
// ============================================================================
