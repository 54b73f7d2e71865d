//! Connection resilience manager.
//!
//! [`ConnectionManager`] owns the single live connection and reacts to its
//! lifecycle reports:
//!
//! ```text
//! join ──▶ Connected ──drop──▶ Disconnected ──5 s, still down──▶ rejoin in place
//!                               │                                   ├─ ok   → Connected
//!                               └─ ready within 5 s → Connected     └─ fail → destroy, 10 s, rediscover
//! Connected ──destroyed──▶ Destroyed ──5 s──▶ rediscover + join
//! ```
//!
//! Only one timer (grace or rediscovery) is armed at a time.  Arming a new
//! one, joining, or receiving a ready report cancels it, and a timer message
//! that arrives after cancellation is recognised by its epoch and dropped.
//! Reports from connections the manager has already replaced or torn down
//! are dropped by [`ConnectionId`], so a teardown the manager performs itself
//! never triggers a second rediscovery.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::config::ConnectionConfig;
use crate::events::{publish, EventBus, RadioEvent};
use crate::playback::{AudioSink, PlaybackHandle};

use super::discovery::choose;
use super::transport::{
    Connection, ConnectionId, ConnectionReporter, ConnectionState, Destination, Transport,
    TransportSignal,
};

// ---------------------------------------------------------------------------
// Commands / handle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    /// Grace period after a drop has elapsed.
    Grace,
    /// Time to look for a destination again.
    Rediscover,
}

#[derive(Debug)]
pub(crate) enum ConnectionCommand {
    Join(Destination),
    Discover,
    Signal {
        conn: ConnectionId,
        signal: TransportSignal,
    },
    TimerDue {
        epoch: u64,
        kind: TimerKind,
    },
    Shutdown,
}

/// What the front-end can see about the connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub destination: Option<Destination>,
    /// Successful in-place rejoins since start.
    pub rejoins: u64,
}

pub struct ConnectionInbox {
    rx: mpsc::UnboundedReceiver<ConnectionCommand>,
}

/// Cloneable control handle for the connection manager.
#[derive(Clone)]
pub struct ConnectionHandle {
    tx: mpsc::UnboundedSender<ConnectionCommand>,
    status: Arc<Mutex<ConnectionStatus>>,
}

impl ConnectionHandle {
    pub fn channel() -> (Self, ConnectionInbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let status = Arc::new(Mutex::new(ConnectionStatus::default()));
        (Self { tx, status }, ConnectionInbox { rx })
    }

    /// Connect to `destination`, replacing any current connection.
    pub fn join(&self, destination: Destination) {
        self.send(ConnectionCommand::Join(destination));
    }

    /// Pick a destination from the transport's list and join it.
    pub fn discover(&self) {
        self.send(ConnectionCommand::Discover);
    }

    pub fn shutdown(&self) {
        self.send(ConnectionCommand::Shutdown);
    }

    pub fn state(&self) -> ConnectionState {
        self.status().state
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn send(&self, cmd: ConnectionCommand) {
        if self.tx.send(cmd).is_err() {
            log::warn!("connection: manager is gone, command dropped");
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Destination id to prefer when discovering.
    pub destination: Option<String>,
    pub grace_period: Duration,
    pub rejoin_failure_delay: Duration,
    pub destroyed_delay: Duration,
}

impl ConnectionSettings {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            destination: config.destination.clone(),
            grace_period: Duration::from_secs(config.grace_period_secs),
            rejoin_failure_delay: Duration::from_secs(config.rejoin_failure_delay_secs),
            destroyed_delay: Duration::from_secs(config.destroyed_delay_secs),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from_config(&ConnectionConfig::default())
    }
}

// ---------------------------------------------------------------------------
// ConnectionManager
// ---------------------------------------------------------------------------

struct Live {
    id: ConnectionId,
    destination: Destination,
    conn: Arc<dyn Connection>,
}

pub struct ConnectionManager {
    handle: ConnectionHandle,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn AudioSink>,
    settings: ConnectionSettings,
    events: EventBus,
    playback: Option<PlaybackHandle>,

    state: ConnectionState,
    current: Option<Live>,
    next_conn_id: u64,
    timer: Option<AbortHandle>,
    timer_epoch: u64,
}

impl ConnectionManager {
    pub fn new(
        handle: ConnectionHandle,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn AudioSink>,
        settings: ConnectionSettings,
        events: EventBus,
    ) -> Self {
        Self {
            handle,
            transport,
            sink,
            settings,
            events,
            playback: None,
            state: ConnectionState::Detached,
            current: None,
            next_conn_id: 0,
            timer: None,
            timer_epoch: 0,
        }
    }

    /// Ask `playback` to start (or keep) playing after every successful join.
    pub fn with_playback(mut self, playback: PlaybackHandle) -> Self {
        self.playback = Some(playback);
        self
    }

    pub async fn run(mut self, mut inbox: ConnectionInbox) {
        log::info!("connection: manager started");

        while let Some(cmd) = inbox.rx.recv().await {
            match cmd {
                ConnectionCommand::Join(dest) => self.connect_to(dest).await,
                ConnectionCommand::Discover => self.discover().await,
                ConnectionCommand::Signal { conn, signal } => self.on_signal(conn, signal),
                ConnectionCommand::TimerDue { epoch, kind } => self.on_timer(epoch, kind).await,
                ConnectionCommand::Shutdown => break,
            }
        }

        self.cancel_timer();
        self.teardown();
        self.set_state(ConnectionState::Detached);
        log::info!("connection: manager shutting down");
    }

    // -----------------------------------------------------------------------
    // Joining
    // -----------------------------------------------------------------------

    async fn discover(&mut self) {
        let destinations = match self.transport.list_destinations().await {
            Ok(d) => d,
            Err(e) => {
                log::warn!(
                    "connection: {e}; looking again in {:?}",
                    self.settings.rejoin_failure_delay
                );
                self.schedule(self.settings.rejoin_failure_delay, TimerKind::Rediscover);
                return;
            }
        };

        match choose(&destinations, self.settings.destination.as_deref()) {
            Some(dest) => self.connect_to(dest).await,
            None => {
                log::warn!(
                    "connection: no destination to join; looking again in {:?}",
                    self.settings.rejoin_failure_delay
                );
                self.schedule(self.settings.rejoin_failure_delay, TimerKind::Rediscover);
            }
        }
    }

    async fn connect_to(&mut self, dest: Destination) {
        self.cancel_timer();
        self.teardown();

        self.next_conn_id += 1;
        let id = ConnectionId(self.next_conn_id);
        let reporter = ConnectionReporter::new(id, self.handle.tx.clone());

        log::info!("connection: joining {dest}");
        match self.transport.connect(&dest, reporter).await {
            Ok(conn) => {
                conn.subscribe(Arc::clone(&self.sink));
                if let Ok(mut status) = self.handle.status.lock() {
                    status.destination = Some(dest.clone());
                }
                self.current = Some(Live {
                    id,
                    destination: dest,
                    conn,
                });
                self.set_state(ConnectionState::Connected);
                if let Some(playback) = &self.playback {
                    playback.request_advance();
                }
            }
            Err(e) => {
                log::warn!(
                    "connection: {e}; rediscovering in {:?}",
                    self.settings.rejoin_failure_delay
                );
                self.set_state(ConnectionState::Detached);
                self.schedule(self.settings.rejoin_failure_delay, TimerKind::Rediscover);
            }
        }
    }

    /// Destroy the current connection.  Its later reports become stale.
    fn teardown(&mut self) {
        if let Some(live) = self.current.take() {
            log::debug!("connection: tearing down {}", live.destination);
            live.conn.destroy();
        }
    }

    // -----------------------------------------------------------------------
    // Signals and timers
    // -----------------------------------------------------------------------

    fn on_signal(&mut self, conn: ConnectionId, signal: TransportSignal) {
        let destination = match &self.current {
            Some(live) if live.id == conn => live.destination.clone(),
            Some(_) => {
                log::debug!("connection: ignoring {signal:?} from superseded connection {conn:?}");
                return;
            }
            None => {
                log::debug!("connection: ignoring {signal:?} from retired connection {conn:?}");
                return;
            }
        };

        match signal {
            TransportSignal::Ready => {
                self.cancel_timer();
                if self.state != ConnectionState::Connected {
                    log::info!("connection: {destination} recovered");
                    self.set_state(ConnectionState::Connected);
                }
            }
            TransportSignal::Disconnected => {
                if self.state == ConnectionState::Disconnected {
                    return;
                }
                log::warn!(
                    "connection: disconnected from {destination}; rejoining in {:?} unless it recovers",
                    self.settings.grace_period
                );
                self.set_state(ConnectionState::Disconnected);
                self.schedule(self.settings.grace_period, TimerKind::Grace);
            }
            TransportSignal::Destroyed => {
                log::warn!(
                    "connection: {destination} destroyed; rediscovering in {:?}",
                    self.settings.destroyed_delay
                );
                self.current = None;
                self.set_state(ConnectionState::Destroyed);
                self.schedule(self.settings.destroyed_delay, TimerKind::Rediscover);
            }
            TransportSignal::Error(reason) => {
                log::error!("connection: transport error on {destination}: {reason}");
            }
        }
    }

    async fn on_timer(&mut self, epoch: u64, kind: TimerKind) {
        if epoch != self.timer_epoch || self.timer.is_none() {
            log::debug!("connection: ignoring cancelled {kind:?} timer");
            return;
        }
        self.timer = None;

        match kind {
            TimerKind::Grace => self.rejoin_after_grace().await,
            TimerKind::Rediscover => self.discover().await,
        }
    }

    async fn rejoin_after_grace(&mut self) {
        if self.state != ConnectionState::Disconnected {
            return;
        }
        let Some(live) = &self.current else {
            return;
        };
        let conn = Arc::clone(&live.conn);
        log::info!("connection: still disconnected, rejoining {}", live.destination);

        match conn.rejoin().await {
            Ok(()) => {
                if let Ok(mut status) = self.handle.status.lock() {
                    status.rejoins += 1;
                }
                self.set_state(ConnectionState::Connected);
            }
            Err(e) => {
                log::warn!(
                    "connection: {e}; rediscovering in {:?}",
                    self.settings.rejoin_failure_delay
                );
                self.teardown();
                self.set_state(ConnectionState::Destroyed);
                self.schedule(self.settings.rejoin_failure_delay, TimerKind::Rediscover);
            }
        }
    }

    fn schedule(&mut self, delay: Duration, kind: TimerKind) {
        self.cancel_timer();
        let epoch = self.timer_epoch;
        let tx = self.handle.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(ConnectionCommand::TimerDue { epoch, kind });
        });
        self.timer = Some(task.abort_handle());
    }

    fn cancel_timer(&mut self) {
        self.timer_epoch += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if let Ok(mut status) = self.handle.status.lock() {
            status.state = state;
            if state == ConnectionState::Detached {
                status.destination = None;
            }
        }
        if self.state != state {
            log::debug!("connection: state → {state}");
            self.state = state;
            publish(&self.events, RadioEvent::ConnectionChanged(state));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::connection::TransportError;
    use crate::events::event_bus;
    use crate::playback::handle::PlaybackCommand;
    use crate::playback::{new_shared_session, AudioClip, OutputError, PlayId};

    struct NullSink;

    impl AudioSink for NullSink {
        fn play(&self, _id: PlayId, _clip: AudioClip, _volume: f32) -> Result<(), OutputError> {
            Ok(())
        }
        fn stop(&self) {}
    }

    #[derive(Default)]
    struct FakeConnection {
        rejoin_ok: Arc<AtomicBool>,
        rejoins: AtomicUsize,
        destroyed: AtomicBool,
        subscribed: AtomicBool,
    }

    #[async_trait]
    impl Connection for FakeConnection {
        fn subscribe(&self, _sink: Arc<dyn AudioSink>) {
            self.subscribed.store(true, Ordering::SeqCst);
        }

        async fn rejoin(&self) -> Result<(), TransportError> {
            self.rejoins.fetch_add(1, Ordering::SeqCst);
            if self.rejoin_ok.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(TransportError::Rejoin("gateway timeout".into()))
            }
        }

        fn destroy(&self) {
            self.destroyed.store(true, Ordering::SeqCst);
        }
    }

    struct FakeTransport {
        destinations: Mutex<Vec<Destination>>,
        refuse: AtomicBool,
        rejoin_ok: Arc<AtomicBool>,
        opened: Mutex<Vec<(Destination, ConnectionReporter, Arc<FakeConnection>)>>,
    }

    impl FakeTransport {
        fn new(destinations: Vec<Destination>) -> Self {
            Self {
                destinations: Mutex::new(destinations),
                refuse: AtomicBool::new(false),
                rejoin_ok: Arc::new(AtomicBool::new(true)),
                opened: Mutex::new(Vec::new()),
            }
        }

        fn opened(&self) -> usize {
            self.opened.lock().unwrap().len()
        }

        fn connection(&self, n: usize) -> (ConnectionReporter, Arc<FakeConnection>) {
            let opened = self.opened.lock().unwrap();
            (opened[n].1.clone(), Arc::clone(&opened[n].2))
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn list_destinations(&self) -> Result<Vec<Destination>, TransportError> {
            Ok(self.destinations.lock().unwrap().clone())
        }

        async fn connect(
            &self,
            destination: &Destination,
            reporter: ConnectionReporter,
        ) -> Result<Arc<dyn Connection>, TransportError> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(TransportError::Connect {
                    destination: destination.id.clone(),
                    reason: "forbidden".into(),
                });
            }
            let conn = Arc::new(FakeConnection {
                rejoin_ok: Arc::clone(&self.rejoin_ok),
                ..FakeConnection::default()
            });
            self.opened
                .lock()
                .unwrap()
                .push((destination.clone(), reporter, Arc::clone(&conn)));
            Ok(conn as Arc<dyn Connection>)
        }
    }

    fn lounge() -> Destination {
        Destination::new("42", "Lounge", 2)
    }

    fn start(transport: Arc<FakeTransport>) -> ConnectionHandle {
        let (handle, inbox) = ConnectionHandle::channel();
        let manager = ConnectionManager::new(
            handle.clone(),
            transport,
            Arc::new(NullSink),
            ConnectionSettings::default(),
            event_bus(16),
        );
        tokio::spawn(manager.run(inbox));
        handle
    }

    async fn settle(d: Duration) {
        tokio::time::sleep(d).await;
    }

    const TICK: Duration = Duration::from_millis(1);

    #[tokio::test(start_paused = true)]
    async fn join_subscribes_sink_and_starts_playback() {
        let transport = Arc::new(FakeTransport::new(vec![lounge()]));
        let (handle, inbox) = ConnectionHandle::channel();
        let (playback, mut playback_inbox) = PlaybackHandle::channel(new_shared_session());
        let manager = ConnectionManager::new(
            handle.clone(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::new(NullSink),
            ConnectionSettings::default(),
            event_bus(16),
        )
        .with_playback(playback);
        tokio::spawn(manager.run(inbox));

        handle.discover();
        settle(TICK).await;

        assert_eq!(transport.opened(), 1);
        assert!(transport.connection(0).1.subscribed.load(Ordering::SeqCst));
        let status = handle.status();
        assert_eq!(status.state, ConnectionState::Connected);
        assert_eq!(status.destination, Some(lounge()));
        assert!(matches!(
            playback_inbox.rx.try_recv(),
            Ok(PlaybackCommand::RequestAdvance)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn recovery_within_grace_skips_rejoin() {
        let transport = Arc::new(FakeTransport::new(vec![]));
        let handle = start(Arc::clone(&transport));
        handle.join(lounge());
        settle(TICK).await;
        let (reporter, conn) = transport.connection(0);

        reporter.report(TransportSignal::Disconnected);
        settle(Duration::from_secs(2)).await;
        assert_eq!(handle.state(), ConnectionState::Disconnected);

        reporter.report(TransportSignal::Ready);
        settle(Duration::from_secs(10)).await;

        assert_eq!(conn.rejoins.load(Ordering::SeqCst), 0);
        assert_eq!(handle.state(), ConnectionState::Connected);
        assert_eq!(transport.opened(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_drop_rejoins_after_grace() {
        let transport = Arc::new(FakeTransport::new(vec![]));
        let handle = start(Arc::clone(&transport));
        handle.join(lounge());
        settle(TICK).await;
        let (reporter, conn) = transport.connection(0);

        reporter.report(TransportSignal::Disconnected);
        reporter.report(TransportSignal::Disconnected);
        settle(Duration::from_millis(4_900)).await;
        assert_eq!(conn.rejoins.load(Ordering::SeqCst), 0);

        settle(Duration::from_millis(200)).await;
        assert_eq!(conn.rejoins.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), ConnectionState::Connected);
        assert_eq!(handle.status().rejoins, 1);
        assert_eq!(transport.opened(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_rejoin_tears_down_and_rediscovers_once() {
        let transport = Arc::new(FakeTransport::new(vec![lounge()]));
        transport.rejoin_ok.store(false, Ordering::SeqCst);
        let handle = start(Arc::clone(&transport));
        handle.join(lounge());
        settle(TICK).await;
        let (reporter, conn) = transport.connection(0);

        reporter.report(TransportSignal::Disconnected);
        settle(Duration::from_millis(5_100)).await;
        assert_eq!(conn.rejoins.load(Ordering::SeqCst), 1);
        assert!(conn.destroyed.load(Ordering::SeqCst));
        assert_eq!(handle.state(), ConnectionState::Destroyed);

        // Our own teardown reports back; it must not schedule anything.
        reporter.report(TransportSignal::Destroyed);
        settle(Duration::from_secs(9)).await;
        assert_eq!(transport.opened(), 1);

        settle(Duration::from_millis(1_100)).await;
        assert_eq!(transport.opened(), 2);
        assert_eq!(handle.state(), ConnectionState::Connected);

        settle(Duration::from_secs(60)).await;
        assert_eq!(transport.opened(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn destroyed_connection_rediscovers_after_delay() {
        let transport = Arc::new(FakeTransport::new(vec![lounge()]));
        let handle = start(Arc::clone(&transport));
        handle.discover();
        settle(TICK).await;
        let (reporter, _) = transport.connection(0);

        reporter.report(TransportSignal::Destroyed);
        settle(Duration::from_millis(4_900)).await;
        assert_eq!(transport.opened(), 1);
        assert_eq!(handle.state(), ConnectionState::Destroyed);

        settle(Duration::from_millis(200)).await;
        assert_eq!(transport.opened(), 2);
        assert_eq!(handle.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_from_replaced_connection_are_ignored() {
        let transport = Arc::new(FakeTransport::new(vec![]));
        let handle = start(Arc::clone(&transport));
        handle.join(lounge());
        handle.join(Destination::new("7", "Studio", 0));
        settle(TICK).await;

        let (old_reporter, old_conn) = transport.connection(0);
        assert!(old_conn.destroyed.load(Ordering::SeqCst));

        old_reporter.report(TransportSignal::Disconnected);
        old_reporter.report(TransportSignal::Destroyed);
        settle(Duration::from_secs(30)).await;

        assert_eq!(transport.opened(), 2);
        assert_eq!(handle.state(), ConnectionState::Connected);
        assert_eq!(handle.status().destination.unwrap().id, "7");
    }

    #[tokio::test(start_paused = true)]
    async fn no_destination_retries_later() {
        let transport = Arc::new(FakeTransport::new(vec![]));
        let handle = start(Arc::clone(&transport));
        handle.discover();
        settle(TICK).await;
        assert_eq!(handle.state(), ConnectionState::Detached);

        transport.destinations.lock().unwrap().push(lounge());
        settle(Duration::from_millis(10_100)).await;

        assert_eq!(transport.opened(), 1);
        assert_eq!(handle.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn refused_connect_retries_after_delay() {
        let transport = Arc::new(FakeTransport::new(vec![lounge()]));
        transport.refuse.store(true, Ordering::SeqCst);
        let handle = start(Arc::clone(&transport));
        handle.discover();
        settle(TICK).await;
        assert_eq!(handle.state(), ConnectionState::Detached);

        transport.refuse.store(false, Ordering::SeqCst);
        settle(Duration::from_millis(10_100)).await;
        assert_eq!(transport.opened(), 1);
    }
}
