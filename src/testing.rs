//! In-memory prober and connector for unit tests.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};

use crate::discovery::{DiscoveryPlan, Endpoint, ProbeTier, Prober};
use crate::error::{Error, Result};
use crate::transport::{Connection, ConnectionCommand, ConnectionPeer, Connector};

// ============================================================================
// Discovery
// ============================================================================

/// Discovery port the fakes answer on.
pub const DISCOVERY_PORT: u16 = 9999;

/// Single-tier plan probing [`DISCOVERY_PORT`].
pub fn single_port_plan() -> DiscoveryPlan {
    DiscoveryPlan {
        path: "/websocket_port.txt".into(),
        tiers: vec![ProbeTier::list(
            "fixed",
            vec![DISCOVERY_PORT],
            Duration::from_millis(100),
        )],
    }
}

/// Prober answering on [`DISCOVERY_PORT`] once a control port is set.
pub struct SwitchProber {
    /// Control port advertised; `None` refuses every probe.
    pub answer: Mutex<Option<u16>>,
    /// Number of probes made.
    pub calls: AtomicUsize,
}

impl SwitchProber {
    /// Creates a prober advertising `answer`.
    pub fn new(answer: Option<u16>) -> Self {
        Self {
            answer: Mutex::new(answer),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of probes made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for SwitchProber {
    async fn fetch(&self, port: u16, _path: &str, _timeout: Duration) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match *self.answer.lock() {
            Some(control) if port == DISCOVERY_PORT => Ok(control.to_string()),
            _ => Err(Error::connection("refused")),
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Connector handing the peer of every link to the test.
pub struct PeerConnector {
    refusals: Mutex<VecDeque<bool>>,
    attempts: AtomicUsize,
    peers: mpsc::UnboundedSender<ConnectionPeer>,
    gate: Option<Arc<Notify>>,
}

impl PeerConnector {
    /// Each `true` in `refusals` fails one attempt, in order.
    pub fn new(refusals: &[bool]) -> (Self, mpsc::UnboundedReceiver<ConnectionPeer>) {
        let (peers, peers_rx) = mpsc::unbounded_channel();
        let connector = Self {
            refusals: Mutex::new(refusals.iter().copied().collect()),
            attempts: AtomicUsize::new(0),
            peers,
            gate: None,
        };
        (connector, peers_rx)
    }

    /// Holds every handshake until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Returns the number of connect attempts made.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for PeerConnector {
    async fn connect(&self, _endpoint: Endpoint) -> Result<Connection> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.refusals.lock().pop_front().unwrap_or(false) {
            return Err(Error::connection("refused"));
        }
        let (connection, peer) = Connection::pair();
        let _ = self.peers.send(peer);
        Ok(connection)
    }
}

/// Drains the text frames queued on a peer.
pub fn frames(peer: &mut ConnectionPeer) -> Vec<String> {
    let mut frames = Vec::new();
    while let Some(command) = peer.try_next_command() {
        if let ConnectionCommand::Send(text) = command {
            frames.push(text);
        }
    }
    frames
}
