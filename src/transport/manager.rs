//! Self-healing link to the companion.
//!
//! [`ConnectionManager`] owns the [`LinkState`], the trusted [`Endpoint`] and
//! the live [`Connection`]. A single spawned task drives the cycle:
//!
//! ```text
//!            start / retry timer / reconnect
//! Disconnected ──────────────────────────────► Connecting
//!      ▲                                          │  resolve + handshake
//!      │  discovery failed / connect failed       │
//!      ├──────────────────────────────────────────┤
//!      │                                          ▼
//!      └────────────── link closed ────────────── Open ──► resend current focus
//!
//!  any state ── shutdown ──► Closing ──► Disconnected
//! ```
//!
//! Every failure schedules exactly one retry, forever. The pending retry
//! timer lives inside the task, so shutdown and manual reconnect cancel it
//! by message instead of racing a detached timer.
//!
//! Other components only touch the link through [`ConnectionManager::send`],
//! which takes the same lock the task uses to publish transitions.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, trace, warn};

use crate::discovery::{Endpoint, PortResolver};
use crate::error::{Error, Result};
use crate::protocol::FocusFact;

use super::connection::{Connection, ConnectionSender};
use super::connector::Connector;
use super::retry::{Backoff, RetryPolicy};
use super::state::{Disconnect, LinkEvent, LinkState};

// ============================================================================
// Constants
// ============================================================================

/// Default budget for the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the diagnostic event channel.
const EVENT_CAPACITY: usize = 64;

// ============================================================================
// ManagerConfig
// ============================================================================

/// Timing configuration of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Delay policy between attempts.
    pub retry: RetryPolicy,
    /// Budget for one handshake once an endpoint is resolved.
    pub connect_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

// ============================================================================
// Internal Types
// ============================================================================

/// Requests to the driving task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Reconnect,
    Shutdown,
}

/// State guarded by the link lock.
#[derive(Debug, Default)]
struct Link {
    state: LinkState,
    endpoint: Option<Endpoint>,
    sender: Option<ConnectionSender>,
}

/// Outcome of waiting on something the task can be interrupted during.
enum Wake<T> {
    Done(T),
    Reconnect,
    Shutdown,
}

struct Inner {
    resolver: Arc<PortResolver>,
    connector: Arc<dyn Connector>,
    config: ManagerConfig,
    /// Current focus fact, written by the tracker.
    focus: watch::Receiver<Option<FocusFact>>,
    link: Mutex<Link>,
    state_tx: watch::Sender<LinkState>,
    events: broadcast::Sender<LinkEvent>,
    control: Mutex<Option<mpsc::UnboundedSender<Control>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Owner of the link lifecycle.
///
/// Cheap to clone; clones share the same link.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Creates a manager in [`LinkState::Disconnected`].
    ///
    /// Nothing happens until [`ConnectionManager::start`].
    #[must_use]
    pub fn new(
        resolver: Arc<PortResolver>,
        connector: Arc<dyn Connector>,
        config: ManagerConfig,
        focus: watch::Receiver<Option<FocusFact>>,
    ) -> Self {
        let (state_tx, _) = watch::channel(LinkState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                resolver,
                connector,
                config,
                focus,
                link: Mutex::new(Link::default()),
                state_tx,
                events,
                control: Mutex::new(None),
                task: Mutex::new(None),
            }),
        }
    }

    /// Returns the current link state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> LinkState {
        self.inner.link.lock().state
    }

    /// Returns the endpoint of the open link, if any.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.inner.link.lock().endpoint
    }

    /// Watches state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<LinkState> {
        self.inner.state_tx.subscribe()
    }

    /// Subscribes to transition events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.inner.events.subscribe()
    }

    /// Returns `true` while the driving task runs.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner
            .task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Starts the driving task.
    ///
    /// Does nothing if it is already running.
    pub fn start(&self) {
        let mut task = self.inner.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            warn!("Connection manager already started");
            return;
        }

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        *self.inner.control.lock() = Some(control_tx);
        *task = Some(tokio::spawn(Inner::run(Arc::clone(&self.inner), control_rx)));

        debug!("Connection manager started");
    }

    /// Drops the current link or pending retry and connects again now.
    ///
    /// Returns `false` if the manager is not running.
    pub fn reconnect(&self) -> bool {
        self.inner
            .control
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(Control::Reconnect).is_ok())
    }

    /// Sends a focus fact over the open link.
    ///
    /// Returns `true` only if the link is open and accepted the frame.
    /// Never blocks and never queues for later delivery.
    pub fn send(&self, fact: &FocusFact) -> bool {
        let link = self.inner.link.lock();

        if !link.state.is_open() {
            trace!(state = %link.state, "Dropping focus fact, link not open");
            return false;
        }

        let Some(sender) = link.sender.as_ref() else {
            return false;
        };

        match sender.send_text(fact.to_wire()) {
            Ok(()) => {
                trace!(%fact, "Focus fact sent");
                true
            }
            Err(e) => {
                debug!(error = %e, "Link rejected focus fact");
                false
            }
        }
    }

    /// Stops the manager.
    ///
    /// Moves through [`LinkState::Closing`], closes the link, cancels any
    /// pending retry and waits for the driving task to finish.
    pub async fn shutdown(&self) {
        if let Some(control) = self.inner.control.lock().take() {
            let _ = control.send(Control::Shutdown);
        }

        let task = self.inner.task.lock().take();
        match task {
            Some(task) => {
                if let Err(e) = task.await {
                    warn!(error = %e, "Connection manager task failed");
                    self.inner.set_state(LinkState::Disconnected);
                }
            }
            None => {
                self.inner.set_state(LinkState::Closing);
                self.inner.set_state(LinkState::Disconnected);
                self.inner.emit(LinkEvent::Closed);
            }
        }
    }
}

// ============================================================================
// Inner - Driving Task
// ============================================================================

impl Inner {
    async fn run(self: Arc<Self>, mut control_rx: mpsc::UnboundedReceiver<Control>) {
        let mut backoff = Backoff::new(self.config.retry);
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            self.set_state(LinkState::Connecting);
            self.emit(LinkEvent::Connecting { attempt });
            debug!(attempt, "Connecting to companion");

            let cause = match Self::interruptible(&mut control_rx, self.establish()).await {
                Wake::Shutdown => break,
                Wake::Reconnect => {
                    self.disconnected(Disconnect::Reconnect);
                    continue;
                }
                Wake::Done(Err(e @ Error::DiscoveryFailed { .. })) => {
                    info!(error = %e, "Companion not found");
                    Disconnect::DiscoveryFailed
                }
                Wake::Done(Err(e)) => {
                    warn!(error = %e, "Connection attempt failed");
                    Disconnect::ConnectFailed(e.to_string())
                }
                Wake::Done(Ok((endpoint, mut connection))) => {
                    self.open(endpoint, connection.sender());
                    backoff.reset();

                    match Self::interruptible(&mut control_rx, connection.closed()).await {
                        Wake::Done(reason) => {
                            info!(%endpoint, %reason, "Link to companion lost");
                            Disconnect::Closed(reason)
                        }
                        Wake::Reconnect => {
                            connection.shutdown();
                            self.disconnected(Disconnect::Reconnect);
                            continue;
                        }
                        Wake::Shutdown => {
                            self.set_state(LinkState::Closing);
                            connection.shutdown();
                            break;
                        }
                    }
                }
            };

            self.disconnected(cause);

            let delay = backoff.next_delay();
            info!(delay_ms = delay.as_millis() as u64, "Retry scheduled");
            self.emit(LinkEvent::RetryScheduled { delay });

            match Self::interruptible(&mut control_rx, sleep(delay)).await {
                Wake::Done(()) => {}
                Wake::Reconnect => debug!("Retry timer cancelled by reconnect"),
                Wake::Shutdown => break,
            }
        }

        self.set_state(LinkState::Closing);
        self.set_state(LinkState::Disconnected);
        self.emit(LinkEvent::Closed);
        info!("Connection manager stopped");
    }

    /// Resolves the endpoint and opens a link to it.
    async fn establish(&self) -> Result<(Endpoint, Connection)> {
        let endpoint = self.resolver.resolve().await?;

        let budget = self.config.connect_timeout;
        let connected = match timeout(budget, self.connector.connect(endpoint)).await {
            Ok(result) => result,
            Err(_) => Err(Error::connection_timeout(budget.as_millis() as u64)),
        };

        match connected {
            Ok(connection) => Ok((endpoint, connection)),
            Err(e) => {
                debug!(%endpoint, "Discarding endpoint after failed connect");
                self.resolver.invalidate();
                Err(e)
            }
        }
    }

    /// Awaits `future` unless a control message arrives first.
    async fn interruptible<F: Future>(
        control_rx: &mut mpsc::UnboundedReceiver<Control>,
        future: F,
    ) -> Wake<F::Output> {
        tokio::select! {
            biased;

            control = control_rx.recv() => match control {
                Some(Control::Reconnect) => Wake::Reconnect,
                Some(Control::Shutdown) | None => Wake::Shutdown,
            },
            output = future => Wake::Done(output),
        }
    }
}

// ============================================================================
// Inner - Transitions
// ============================================================================

impl Inner {
    fn set_state(&self, state: LinkState) {
        {
            let mut link = self.link.lock();
            link.state = state;
            if !state.is_open() {
                link.sender = None;
                link.endpoint = None;
            }
        }
        self.state_tx.send_replace(state);
    }

    /// Publishes the open link and resends the current focus under one lock.
    fn open(&self, endpoint: Endpoint, sender: ConnectionSender) {
        let resynced = {
            let mut link = self.link.lock();

            let current = self.focus.borrow().clone();
            let resynced = current.is_some_and(|fact| sender.send_text(fact.to_wire()).is_ok());

            link.state = LinkState::Open;
            link.endpoint = Some(endpoint);
            link.sender = Some(sender);
            resynced
        };
        self.state_tx.send_replace(LinkState::Open);

        info!(%endpoint, resynced, "Connected to companion");
        self.emit(LinkEvent::Open { endpoint, resynced });
    }

    fn disconnected(&self, cause: Disconnect) {
        self.set_state(LinkState::Disconnected);
        debug!(%cause, "Link disconnected");
        self.emit(LinkEvent::Disconnected { cause });
    }

    fn emit(&self, event: LinkEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use tokio::sync::Notify;
    use tokio::time::Instant;

    use crate::testing::{PeerConnector, SwitchProber, frames, single_port_plan};
    use crate::transport::connection::{CloseReason, ConnectionCommand, ConnectionPeer};

    const RETRY: Duration = Duration::from_secs(5);

    struct Harness {
        manager: ConnectionManager,
        resolver: Arc<PortResolver>,
        prober: Arc<SwitchProber>,
        connector: Arc<PeerConnector>,
        focus: watch::Sender<Option<FocusFact>>,
        peers: mpsc::UnboundedReceiver<ConnectionPeer>,
        events: broadcast::Receiver<LinkEvent>,
    }

    impl Harness {
        fn new(answer: Option<u16>, refusals: &[bool]) -> Self {
            let (connector, peers) = PeerConnector::new(refusals);
            Self::with_connector(answer, connector, peers)
        }

        fn gated(answer: Option<u16>) -> (Self, Arc<Notify>) {
            let gate = Arc::new(Notify::new());
            let (connector, peers) = PeerConnector::new(&[]);
            let harness = Self::with_connector(answer, connector.gated(gate.clone()), peers);
            (harness, gate)
        }

        fn with_connector(
            answer: Option<u16>,
            connector: PeerConnector,
            peers: mpsc::UnboundedReceiver<ConnectionPeer>,
        ) -> Self {
            let prober = Arc::new(SwitchProber::new(answer));
            let resolver = Arc::new(PortResolver::new(prober.clone(), single_port_plan()));
            let connector = Arc::new(connector);

            let (focus, focus_rx) = watch::channel(None);
            let config = ManagerConfig {
                retry: RetryPolicy::Fixed(RETRY),
                connect_timeout: Duration::from_secs(1),
            };
            let manager =
                ConnectionManager::new(resolver.clone(), connector.clone(), config, focus_rx);
            let events = manager.subscribe();

            Self {
                manager,
                resolver,
                prober,
                connector,
                focus,
                peers,
                events,
            }
        }

        async fn next_event(&mut self) -> LinkEvent {
            self.events.recv().await.expect("event")
        }

        async fn expect_open(&mut self) -> ConnectionPeer {
            assert_eq!(self.next_event().await, LinkEvent::Connecting { attempt: 1 });
            let event = self.next_event().await;
            assert!(matches!(event, LinkEvent::Open { .. }), "{event:?}");
            self.peers.recv().await.expect("peer")
        }
    }

    fn fact(title: &str) -> FocusFact {
        FocusFact::new(title, format!("https://{title}.example"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_resends_current_focus_first() {
        let mut h = Harness::new(Some(54321), &[]);
        h.focus.send_replace(Some(fact("before")));

        h.manager.start();
        let mut peer = h.expect_open().await;

        assert_eq!(h.manager.state(), LinkState::Open);
        assert_eq!(h.manager.endpoint(), Some(Endpoint::loopback(54321)));
        assert!(h.manager.send(&fact("after")));

        assert_eq!(
            frames(&mut peer),
            ["before|https://before.example", "after|https://after.example"]
        );
        h.manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_without_focus_sends_nothing() {
        let mut h = Harness::new(Some(54321), &[]);

        h.manager.start();
        let mut peer = h.expect_open().await;

        assert!(frames(&mut peer).is_empty());
        h.manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_fact_twice_produces_two_frames() {
        let mut h = Harness::new(Some(54321), &[]);
        h.manager.start();
        let mut peer = h.expect_open().await;

        let example = FocusFact::new("Example", "https://example.com");
        assert!(h.manager.send(&example));
        assert!(h.manager.send(&example));

        assert_eq!(
            frames(&mut peer),
            ["Example|https://example.com", "Example|https://example.com"]
        );
        h.manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_failure_schedules_one_retry() {
        let mut h = Harness::new(None, &[]);
        let started = Instant::now();

        h.manager.start();

        assert_eq!(h.next_event().await, LinkEvent::Connecting { attempt: 1 });
        assert_eq!(
            h.next_event().await,
            LinkEvent::Disconnected {
                cause: Disconnect::DiscoveryFailed
            }
        );
        assert_eq!(h.next_event().await, LinkEvent::RetryScheduled { delay: RETRY });
        assert_eq!(h.manager.state(), LinkState::Disconnected);
        assert!(!h.manager.send(&fact("dropped")));

        assert_eq!(h.next_event().await, LinkEvent::Connecting { attempt: 2 });
        assert!(started.elapsed() >= RETRY);
        assert_eq!(h.connector.attempts(), 0);

        h.manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_invalidates_cache() {
        let mut h = Harness::new(Some(54321), &[true]);

        h.manager.start();

        assert_eq!(h.next_event().await, LinkEvent::Connecting { attempt: 1 });
        let event = h.next_event().await;
        assert!(
            matches!(
                event,
                LinkEvent::Disconnected {
                    cause: Disconnect::ConnectFailed(_)
                }
            ),
            "{event:?}"
        );
        assert_eq!(h.resolver.cached_port(), None);
        assert_eq!(h.next_event().await, LinkEvent::RetryScheduled { delay: RETRY });

        assert_eq!(h.next_event().await, LinkEvent::Connecting { attempt: 2 });
        assert!(matches!(h.next_event().await, LinkEvent::Open { .. }));
        assert_eq!(h.resolver.cached_port(), Some(9999));
        assert_eq!(h.connector.attempts(), 2);

        h.manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_drop_reconnects_after_delay() {
        let mut h = Harness::new(Some(54321), &[]);
        h.focus.send_replace(Some(fact("current")));
        h.manager.start();
        let peer = h.expect_open().await;

        let dropped_at = Instant::now();
        peer.close(CloseReason::Remote);

        assert_eq!(
            h.next_event().await,
            LinkEvent::Disconnected {
                cause: Disconnect::Closed(CloseReason::Remote)
            }
        );
        assert_eq!(h.next_event().await, LinkEvent::RetryScheduled { delay: RETRY });
        assert_eq!(h.manager.state(), LinkState::Disconnected);
        assert!(!h.manager.send(&fact("while-down")));

        assert_eq!(h.next_event().await, LinkEvent::Connecting { attempt: 2 });
        assert!(dropped_at.elapsed() >= RETRY);

        let event = h.next_event().await;
        assert!(matches!(event, LinkEvent::Open { resynced: true, .. }), "{event:?}");

        let mut peer = h.peers.recv().await.expect("second peer");
        assert_eq!(frames(&mut peer), ["current|https://current.example"]);
        assert_eq!(h.connector.attempts(), 2);

        h.manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_failure_schedules_exactly_one_retry() {
        let mut h = Harness::new(None, &[]);
        h.manager.start();

        let mut retries = 0;
        let mut connecting = 0;
        while connecting < 4 {
            match h.next_event().await {
                LinkEvent::Connecting { .. } => connecting += 1,
                LinkEvent::RetryScheduled { .. } => retries += 1,
                _ => {}
            }
        }

        assert_eq!(retries, 3);
        h.manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_retry() {
        let mut h = Harness::new(None, &[]);
        h.manager.start();

        while !matches!(h.next_event().await, LinkEvent::RetryScheduled { .. }) {}
        let probes = h.prober.calls();

        h.manager.shutdown().await;
        assert_eq!(h.next_event().await, LinkEvent::Closed);
        assert_eq!(h.manager.state(), LinkState::Disconnected);
        assert!(!h.manager.is_running());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(h.prober.calls(), probes);
        assert!(!h.manager.reconnect());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_open_link() {
        let mut h = Harness::new(Some(54321), &[]);
        h.manager.start();
        let mut peer = h.expect_open().await;

        let mut states = h.manager.watch_state();
        h.manager.shutdown().await;

        assert_eq!(peer.next_command().await, Some(ConnectionCommand::Shutdown));
        assert_eq!(*states.borrow_and_update(), LinkState::Disconnected);
        assert_eq!(h.next_event().await, LinkEvent::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_skips_retry_wait() {
        let mut h = Harness::new(None, &[]);
        h.manager.start();

        while !matches!(h.next_event().await, LinkEvent::RetryScheduled { .. }) {}
        let cancelled_at = Instant::now();
        *h.prober.answer.lock() = Some(54321);

        assert!(h.manager.reconnect());

        assert_eq!(h.next_event().await, LinkEvent::Connecting { attempt: 2 });
        assert!(cancelled_at.elapsed() < RETRY);
        assert!(matches!(h.next_event().await, LinkEvent::Open { .. }));

        h.manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_replaces_open_link() {
        let mut h = Harness::new(Some(54321), &[]);
        h.manager.start();
        let mut first = h.expect_open().await;

        assert!(h.manager.reconnect());

        assert_eq!(
            h.next_event().await,
            LinkEvent::Disconnected {
                cause: Disconnect::Reconnect
            }
        );
        assert_eq!(h.next_event().await, LinkEvent::Connecting { attempt: 2 });
        assert!(matches!(h.next_event().await, LinkEvent::Open { .. }));
        assert_eq!(first.next_command().await, Some(ConnectionCommand::Shutdown));
        assert_eq!(h.connector.attempts(), 2);

        h.manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_noop() {
        let mut h = Harness::new(Some(54321), &[]);
        h.manager.start();
        h.manager.start();
        let _peer = h.expect_open().await;

        assert_eq!(h.connector.attempts(), 1);
        h.manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_refused_while_connecting() {
        let (mut h, gate) = Harness::gated(Some(54321));
        h.manager.start();
        assert_eq!(h.next_event().await, LinkEvent::Connecting { attempt: 1 });

        sleep(Duration::from_millis(500)).await;
        assert_eq!(h.manager.state(), LinkState::Connecting);
        assert_eq!(h.connector.attempts(), 1);
        assert!(!h.manager.send(&fact("early")));

        gate.notify_one();
        assert!(matches!(h.next_event().await, LinkEvent::Open { .. }));
        let mut peer = h.peers.recv().await.expect("peer");

        assert!(frames(&mut peer).is_empty());
        h.manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_when_never_started() {
        let mut h = Harness::new(Some(54321), &[]);
        let mut states = h.manager.watch_state();

        h.manager.shutdown().await;

        assert_eq!(h.next_event().await, LinkEvent::Closed);
        assert!(states.has_changed().expect("sender alive"));
        assert_eq!(*states.borrow_and_update(), LinkState::Disconnected);
        assert_eq!(h.connector.attempts(), 0);
    }

    proptest! {
        #[test]
        fn prop_send_is_false_when_not_open(title in ".*", url in ".*") {
            let h = Harness::new(Some(54321), &[]);
            let fact = FocusFact::new(title, url);

            prop_assert_eq!(h.manager.state(), LinkState::Disconnected);
            prop_assert!(!h.manager.send(&fact));
        }
    }
}
