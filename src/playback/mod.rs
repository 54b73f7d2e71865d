//! Playback orchestration.
//!
//! This module provides:
//! * [`PlaybackState`] / [`PlaybackSession`] — state machine tag and the
//!   snapshot shared with the front-end.
//! * [`AudioSink`] / [`AudioClip`] / [`SinkSignal`] — the output contract.
//! * [`PlaybackHandle`] — cloneable control surface (advance, skip, stop,
//!   resume, interject).
//! * [`PlaybackOrchestrator`] — the task that owns the state machine.

pub mod handle;
pub mod runner;
pub mod sink;
pub mod state;

pub use handle::{PlaybackHandle, PlaybackInbox, SinkReporter};
pub use runner::{PlaybackOrchestrator, PlaybackSettings, QueueRefill};
pub use sink::{AudioClip, AudioInput, AudioSink, ClipKind, OutputError, PlayId, SinkSignal};
pub use state::{new_shared_session, PlaybackSession, PlaybackState, SharedSession};
