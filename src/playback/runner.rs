//! Playback orchestrator — keeps the output fed.
//!
//! [`PlaybackOrchestrator`] owns the state machine for one output target and
//! processes [`PlaybackCommand`]s from its inbox one at a time.  Nothing in
//! the loop awaits: slow work (track resolution, retry delays, queue
//! refills) runs in spawned tasks that report back through the same inbox.
//!
//! # Loop
//!
//! ```text
//! request_advance / resume / retry due / sink idle
//!   └─▶ begin_load: queue.next_track()
//!         ├─ None  → refill queue in background, retry in 10 s   [Loading]
//!         └─ Some  → spawn resolver.resolve(track)                [Loading]
//!               ├─ Ok  → sink.play(clip) → NowPlaying             [Playing]
//!               └─ Err → retry in 10 s                            [Loading]
//!
//! sink failed                  → retry in 5 s                     [Loading]
//! interjection clip            → sink.play(clip)                  [Interjecting]
//! interjection idle            → resume music in 2 s              [Loading]
//! stop                         → cancel retry, sink.stop()        [Stopped]
//! ```
//!
//! # Stale completions
//!
//! Each resolution is tagged with the epoch current when it started, each
//! clip with a [`PlayId`], and each retry timer with a sequence number.  Any
//! transition that supersedes pending work bumps the relevant tag, so a late
//! completion from a skipped track or a cancelled timer is dropped instead of
//! starting a second track.  At most one retry timer is armed at any time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::AbortHandle;

use crate::config::PlaybackConfig;
use crate::events::{publish, EventBus, RadioEvent};
use crate::queue::{refill, ContentLookup, QueueStore, SharedQueue, Track};
use crate::resolver::{ResolveError, TrackResolver};

use super::handle::{PlaybackCommand, PlaybackHandle, PlaybackInbox};
use super::sink::{AudioClip, AudioSink, OutputError, PlayId, SinkSignal};
use super::state::PlaybackState;

// ---------------------------------------------------------------------------
// PlaybackSettings
// ---------------------------------------------------------------------------

/// Delays and volumes used by the orchestrator.
#[derive(Debug, Clone)]
pub struct PlaybackSettings {
    /// Wait after an empty queue or a resolution failure.
    pub retry_delay: Duration,
    /// Wait after the sink reports an error.
    pub error_retry_delay: Duration,
    /// Pause between an interjection and the next track.
    pub interjection_pause: Duration,
    pub music_volume: f32,
    pub interjection_volume: f32,
}

impl PlaybackSettings {
    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self {
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            error_retry_delay: Duration::from_secs(config.error_retry_delay_secs),
            interjection_pause: Duration::from_secs(config.interjection_pause_secs),
            music_volume: config.music_volume.clamp(0.0, 1.0),
            interjection_volume: config.interjection_volume.clamp(0.0, 1.0),
        }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self::from_config(&PlaybackConfig::default())
    }
}

// ---------------------------------------------------------------------------
// QueueRefill
// ---------------------------------------------------------------------------

/// How to repopulate an empty queue.
pub struct QueueRefill {
    pub lookup: Arc<dyn ContentLookup>,
    pub seed_queries: Vec<String>,
    pub pause: Duration,
}

// ---------------------------------------------------------------------------
// PlaybackOrchestrator
// ---------------------------------------------------------------------------

struct PendingRetry {
    seq: u64,
    timer: AbortHandle,
}

/// Drives playback for one output target.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use sri_radio::playback::*;
/// # use sri_radio::queue::SharedQueue;
/// # use sri_radio::resolver::TrackResolver;
/// # async fn example(queue: SharedQueue, resolver: Arc<dyn TrackResolver>, sink: Arc<dyn AudioSink>) {
/// let (handle, inbox) = PlaybackHandle::channel(new_shared_session());
/// let events = sri_radio::events::event_bus(64);
/// let orchestrator = PlaybackOrchestrator::new(
///     handle.clone(), queue, resolver, sink, PlaybackSettings::default(), events,
/// );
/// tokio::spawn(orchestrator.run(inbox));
/// handle.request_advance();
/// # }
/// ```
pub struct PlaybackOrchestrator {
    handle: PlaybackHandle,
    queue: SharedQueue,
    resolver: Arc<dyn TrackResolver>,
    sink: Arc<dyn AudioSink>,
    settings: PlaybackSettings,
    events: EventBus,
    refill: Option<Arc<QueueRefill>>,
    refilling: Arc<AtomicBool>,

    state: PlaybackState,
    auto_advance: bool,
    /// Bumped whenever an in-flight resolution must be ignored.
    epoch: u64,
    resolving: Option<AbortHandle>,
    /// Track taken from the queue whose resolution is in flight.
    loading: Option<Track>,
    /// Track an interjection displaced before it reached the air; it plays
    /// next instead of a fresh queue read.
    held: Option<Track>,
    /// Clip currently on the sink.
    on_air: Option<PlayId>,
    next_play_id: u64,
    retry: Option<PendingRetry>,
    retry_seq: u64,
}

impl PlaybackOrchestrator {
    /// Create a new orchestrator.
    ///
    /// * `handle`   — the handle whose inbox will be passed to [`run`](Self::run);
    ///   the orchestrator uses it to publish its session and to message itself.
    /// * `queue`    — playlist shared with the front-end.
    /// * `resolver` — turns tracks into clips.
    /// * `sink`     — audio output, built with `handle.sink_reporter()`.
    pub fn new(
        handle: PlaybackHandle,
        queue: SharedQueue,
        resolver: Arc<dyn TrackResolver>,
        sink: Arc<dyn AudioSink>,
        settings: PlaybackSettings,
        events: EventBus,
    ) -> Self {
        Self {
            handle,
            queue,
            resolver,
            sink,
            settings,
            events,
            refill: None,
            refilling: Arc::new(AtomicBool::new(false)),
            state: PlaybackState::Idle,
            auto_advance: true,
            epoch: 0,
            resolving: None,
            loading: None,
            held: None,
            on_air: None,
            next_play_id: 0,
            retry: None,
            retry_seq: 0,
        }
    }

    /// Repopulate the queue through `refill` whenever it runs dry.
    pub fn with_refill(mut self, refill: QueueRefill) -> Self {
        self.refill = Some(Arc::new(refill));
        self
    }

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------

    /// Process commands until [`PlaybackHandle::shutdown`] is called.
    pub async fn run(mut self, mut inbox: PlaybackInbox) {
        log::info!("playback: orchestrator started");

        while let Some(cmd) = inbox.rx.recv().await {
            match cmd {
                PlaybackCommand::RequestAdvance => self.on_request_advance(),
                PlaybackCommand::Skip => self.on_skip(),
                PlaybackCommand::Stop => self.on_stop(),
                PlaybackCommand::Resume => self.on_resume(),
                PlaybackCommand::Interject(clip) => self.on_interject(clip),
                PlaybackCommand::Sink(signal) => self.on_sink_signal(signal),
                PlaybackCommand::Resolved {
                    epoch,
                    track,
                    result,
                } => self.on_resolved(epoch, track, result),
                PlaybackCommand::RetryDue { seq } => self.on_retry_due(seq),
                PlaybackCommand::Shutdown => break,
            }
        }

        self.cancel_retry();
        self.abandon_resolution();
        self.halt_output();
        log::info!("playback: orchestrator shutting down");
    }

    // -----------------------------------------------------------------------
    // Command handlers
    // -----------------------------------------------------------------------

    fn on_request_advance(&mut self) {
        if !self.auto_advance {
            log::debug!("playback: advance ignored while stopped");
            return;
        }
        match self.state {
            PlaybackState::Idle => self.begin_load("advance requested"),
            PlaybackState::Loading if self.retry.is_some() => self.begin_load("advance requested"),
            state => log::debug!("playback: advance ignored in state {state}"),
        }
    }

    fn on_skip(&mut self) {
        log::info!("playback: skipping to next track");
        self.auto_advance = true;
        self.held = None;
        self.halt_output();
        self.begin_load("skip");
    }

    fn on_stop(&mut self) {
        if self.state == PlaybackState::Stopped {
            log::debug!("playback: already stopped");
            return;
        }
        log::info!("playback: stopping");
        self.auto_advance = false;
        self.cancel_retry();
        self.abandon_resolution();
        self.halt_output();
        self.set_state(PlaybackState::Stopped);
    }

    fn on_resume(&mut self) {
        if matches!(self.state, PlaybackState::Idle | PlaybackState::Stopped) {
            log::info!("playback: resuming");
            self.auto_advance = true;
            self.begin_load("resume");
        } else {
            log::debug!("playback: resume ignored in state {}", self.state);
        }
    }

    fn on_interject(&mut self, clip: AudioClip) {
        if self.state == PlaybackState::Stopped || !self.auto_advance {
            log::info!("playback: interjection {:?} dropped while stopped", clip.label);
            return;
        }

        self.cancel_retry();
        if let Some(track) = self.loading.take() {
            log::debug!("playback: holding {track} until the interjection ends");
            self.held = Some(track);
        }
        self.abandon_resolution();

        let label = clip.label.clone();
        match self.start_clip(clip, self.settings.interjection_volume) {
            Ok(id) => {
                log::info!("playback: interjection {label:?} on air ({id})");
                if let Ok(mut session) = self.handle.session().lock() {
                    session.interjections_played += 1;
                }
                self.set_state(PlaybackState::Interjecting);
                publish(&self.events, RadioEvent::InterjectionStarted { label });
            }
            Err(e) => {
                log::warn!("playback: interjection {label:?} failed to start: {e}");
                self.begin_load("interjection failed");
            }
        }
    }

    fn on_sink_signal(&mut self, signal: SinkSignal) {
        let id = match &signal {
            SinkSignal::Idle(id) | SinkSignal::Failed(id, _) => *id,
        };
        if self.on_air != Some(id) {
            log::debug!("playback: ignoring stale sink signal {signal:?}");
            return;
        }
        self.on_air = None;

        match (signal, self.state) {
            (SinkSignal::Idle(_), PlaybackState::Playing) => {
                if self.auto_advance {
                    self.begin_load("track finished");
                } else {
                    self.set_state(PlaybackState::Idle);
                }
            }
            (SinkSignal::Idle(_), PlaybackState::Interjecting) => {
                self.set_state(PlaybackState::Loading);
                self.schedule_retry(self.settings.interjection_pause, "interjection finished");
            }
            (SinkSignal::Failed(_, reason), state @ (PlaybackState::Playing | PlaybackState::Interjecting)) => {
                log::warn!("playback: output failed in state {state}: {reason}");
                self.set_state(PlaybackState::Loading);
                self.schedule_retry(self.settings.error_retry_delay, "output failure");
            }
            (signal, state) => {
                log::debug!("playback: sink signal {signal:?} ignored in state {state}");
            }
        }
    }

    fn on_resolved(&mut self, epoch: u64, track: Track, result: Result<AudioClip, ResolveError>) {
        if epoch != self.epoch || self.state != PlaybackState::Loading {
            log::debug!("playback: dropping superseded resolution of {track}");
            return;
        }
        self.resolving = None;
        self.loading = None;

        let clip = match result {
            Ok(clip) => clip,
            Err(e) => {
                log::warn!("playback: could not resolve {track}: {e}");
                self.schedule_retry(self.settings.retry_delay, "resolution failure");
                return;
            }
        };

        match self.start_clip(clip, self.settings.music_volume) {
            Ok(id) => {
                log::info!("playback: now playing {track} ({id})");
                if let Ok(mut session) = self.handle.session().lock() {
                    session.current_track = Some(track.clone());
                }
                self.set_state(PlaybackState::Playing);
                publish(&self.events, RadioEvent::NowPlaying(track));
            }
            Err(e) => {
                log::warn!("playback: output refused {track}: {e}");
                self.schedule_retry(self.settings.error_retry_delay, "output failure");
            }
        }
    }

    fn on_retry_due(&mut self, seq: u64) {
        match &self.retry {
            Some(pending) if pending.seq == seq => {
                self.retry = None;
                self.sync_retry_flag();
            }
            _ => {
                log::debug!("playback: ignoring cancelled retry {seq}");
                return;
            }
        }
        if self.auto_advance {
            self.begin_load("retry");
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Enter `Loading` and start on the held track, or the next one.
    fn begin_load(&mut self, reason: &str) {
        self.cancel_retry();
        self.abandon_resolution();
        self.set_state(PlaybackState::Loading);

        let next = match self.held.take() {
            Some(track) => Some(track),
            None => lock_queue(&self.queue).next_track(),
        };
        let Some(track) = next else {
            log::warn!("playback: queue is empty ({reason})");
            self.start_refill();
            self.schedule_retry(self.settings.retry_delay, "empty queue");
            return;
        };

        log::debug!("playback: loading {track} ({reason})");
        self.loading = Some(track.clone());
        let epoch = self.epoch;
        let resolver = Arc::clone(&self.resolver);
        let handle = self.handle.clone();
        let task = tokio::spawn(async move {
            let result = resolver.resolve(&track).await;
            handle.send(PlaybackCommand::Resolved {
                epoch,
                track,
                result,
            });
        });
        self.resolving = Some(task.abort_handle());
    }

    fn start_clip(&mut self, clip: AudioClip, volume: f32) -> Result<PlayId, OutputError> {
        self.next_play_id += 1;
        let id = PlayId(self.next_play_id);
        // A replaced clip may still report; it no longer matches `on_air`.
        self.on_air = None;
        self.sink.play(id, clip, volume)?;
        self.on_air = Some(id);
        Ok(id)
    }

    fn halt_output(&mut self) {
        if self.on_air.take().is_some() {
            self.sink.stop();
        }
    }

    fn abandon_resolution(&mut self) {
        self.epoch += 1;
        self.loading = None;
        if let Some(task) = self.resolving.take() {
            task.abort();
        }
    }

    fn schedule_retry(&mut self, delay: Duration, reason: &str) {
        self.cancel_retry();
        self.retry_seq += 1;
        let seq = self.retry_seq;

        log::info!(
            "playback: {reason} in state {}; next attempt in {:?}",
            self.state,
            delay
        );

        let handle = self.handle.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            handle.send(PlaybackCommand::RetryDue { seq });
        });
        self.retry = Some(PendingRetry {
            seq,
            timer: task.abort_handle(),
        });
        self.sync_retry_flag();
    }

    fn cancel_retry(&mut self) {
        if let Some(pending) = self.retry.take() {
            pending.timer.abort();
            self.sync_retry_flag();
        }
    }

    fn start_refill(&self) {
        let Some(refill_cfg) = self.refill.clone() else {
            return;
        };
        if self.refilling.swap(true, Ordering::SeqCst) {
            return;
        }
        let queue = Arc::clone(&self.queue);
        let events = self.events.clone();
        let flag = Arc::clone(&self.refilling);
        tokio::spawn(async move {
            let len = refill(
                &queue,
                refill_cfg.lookup.as_ref(),
                &refill_cfg.seed_queries,
                refill_cfg.pause,
            )
            .await;
            if len > 0 {
                log::info!("playback: queue refilled with {len} tracks");
                publish(&events, RadioEvent::QueueChanged { len });
            }
            flag.store(false, Ordering::SeqCst);
        });
    }

    // -----------------------------------------------------------------------
    // Session publishing
    // -----------------------------------------------------------------------

    fn set_state(&mut self, state: PlaybackState) {
        let changed = self.state != state;
        self.state = state;
        if let Ok(mut session) = self.handle.session().lock() {
            session.state = state;
            session.is_playing = state == PlaybackState::Playing;
            session.auto_advance = self.auto_advance;
        }
        if changed {
            log::debug!("playback: state → {state}");
            publish(&self.events, RadioEvent::StateChanged(state));
        }
    }

    fn sync_retry_flag(&self) {
        if let Ok(mut session) = self.handle.session().lock() {
            session.retry_pending = self.retry.is_some();
        }
    }
}

fn lock_queue(queue: &SharedQueue) -> std::sync::MutexGuard<'_, QueueStore> {
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
