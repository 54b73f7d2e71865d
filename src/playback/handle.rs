//! Cloneable front door to the orchestrator task.
//!
//! Every request becomes a [`PlaybackCommand`] on the orchestrator's inbox,
//! so transitions are applied one at a time in arrival order.  The channel
//! is unbounded because sinks report from synchronous callbacks.

use tokio::sync::mpsc;

use crate::queue::Track;
use crate::resolver::ResolveError;

use super::sink::{AudioClip, SinkSignal};
use super::state::{PlaybackSession, PlaybackState, SharedSession};

// ---------------------------------------------------------------------------
// PlaybackCommand
// ---------------------------------------------------------------------------

/// Messages processed by the orchestrator loop.
#[derive(Debug)]
pub(crate) enum PlaybackCommand {
    RequestAdvance,
    Skip,
    Stop,
    Resume,
    Interject(AudioClip),
    Sink(SinkSignal),
    /// A resolution started under `epoch` finished.
    Resolved {
        epoch: u64,
        track: Track,
        result: Result<AudioClip, ResolveError>,
    },
    /// The retry timer armed as `seq` fired.
    RetryDue { seq: u64 },
    Shutdown,
}

/// Receiving end, consumed by [`PlaybackOrchestrator::run`](super::PlaybackOrchestrator::run).
pub struct PlaybackInbox {
    pub(crate) rx: mpsc::UnboundedReceiver<PlaybackCommand>,
}

// ---------------------------------------------------------------------------
// PlaybackHandle
// ---------------------------------------------------------------------------

/// Cheap-to-clone control handle for one output target.
#[derive(Clone)]
pub struct PlaybackHandle {
    tx: mpsc::UnboundedSender<PlaybackCommand>,
    session: SharedSession,
}

impl PlaybackHandle {
    /// Create the handle / inbox pair for an orchestrator that publishes its
    /// session into `session`.
    pub fn channel(session: SharedSession) -> (Self, PlaybackInbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, session }, PlaybackInbox { rx })
    }

    /// Start the next track if nothing is playing or loading.
    pub fn request_advance(&self) {
        self.send(PlaybackCommand::RequestAdvance);
    }

    /// Abandon the current track and load the next one.  Re-enables
    /// auto-advance.
    pub fn skip(&self) {
        self.send(PlaybackCommand::Skip);
    }

    /// Halt the output and disable auto-advance.
    pub fn stop(&self) {
        self.send(PlaybackCommand::Stop);
    }

    /// Re-enable auto-advance and load the next track if halted.
    pub fn resume(&self) {
        self.send(PlaybackCommand::Resume);
    }

    /// Put `clip` on the output in place of the music.  Ignored while
    /// stopped.
    pub fn interject(&self, clip: AudioClip) {
        self.send(PlaybackCommand::Interject(clip));
    }

    /// Ask the orchestrator loop to exit.
    pub fn shutdown(&self) {
        self.send(PlaybackCommand::Shutdown);
    }

    /// Reporter to give to the audio sink.
    pub fn sink_reporter(&self) -> SinkReporter {
        SinkReporter {
            tx: self.tx.clone(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.snapshot().state
    }

    /// Copy of the current session.
    pub fn snapshot(&self) -> PlaybackSession {
        self.session
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub(crate) fn session(&self) -> &SharedSession {
        &self.session
    }

    pub(crate) fn send(&self, cmd: PlaybackCommand) {
        if self.tx.send(cmd).is_err() {
            log::warn!("playback: orchestrator is gone, command dropped");
        }
    }
}

// ---------------------------------------------------------------------------
// SinkReporter
// ---------------------------------------------------------------------------

/// Used by an [`AudioSink`](super::AudioSink) to report clip outcomes.
#[derive(Clone)]
pub struct SinkReporter {
    tx: mpsc::UnboundedSender<PlaybackCommand>,
}

impl SinkReporter {
    pub fn report(&self, signal: SinkSignal) {
        if self.tx.send(PlaybackCommand::Sink(signal)).is_err() {
            log::debug!("playback: sink signal after orchestrator shutdown");
        }
    }
}
