//! Audio sink contract.
//!
//! The orchestrator hands [`AudioClip`]s to an [`AudioSink`] and learns about
//! their fate asynchronously through [`SinkSignal`]s sent on a
//! [`SinkReporter`](super::SinkReporter).  Every clip is started under a
//! [`PlayId`]; signals carry it back so the orchestrator can discard reports
//! about clips it has already moved past.

use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioClip
// ---------------------------------------------------------------------------

/// Where the sink reads the encoded audio from.
#[derive(Clone, PartialEq, Eq)]
pub enum AudioInput {
    /// Something the player can open itself: a URL or a file path.
    Location(String),
    /// Fully buffered encoded audio, e.g. synthesized speech.
    Buffer(Vec<u8>),
}

impl std::fmt::Debug for AudioInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioInput::Location(loc) => f.debug_tuple("Location").field(loc).finish(),
            AudioInput::Buffer(bytes) => write!(f, "Buffer({} bytes)", bytes.len()),
        }
    }
}

/// What a clip is, which decides its volume and how its end is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipKind {
    Music,
    Interjection,
}

/// A decodable audio handle plus a label for logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub label: String,
    pub kind: ClipKind,
    pub input: AudioInput,
}

impl AudioClip {
    pub fn music(label: impl Into<String>, input: AudioInput) -> Self {
        Self {
            label: label.into(),
            kind: ClipKind::Music,
            input,
        }
    }

    pub fn interjection(label: impl Into<String>, input: AudioInput) -> Self {
        Self {
            label: label.into(),
            kind: ClipKind::Interjection,
            input,
        }
    }
}

// ---------------------------------------------------------------------------
// PlayId / SinkSignal
// ---------------------------------------------------------------------------

/// Identifies one `play` call on the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayId(pub u64);

impl std::fmt::Display for PlayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Asynchronous report from the sink about a clip it was asked to play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkSignal {
    /// The clip played to its end, or was stopped; the output is idle.
    Idle(PlayId),
    /// The output failed while carrying the clip.
    Failed(PlayId, String),
}

// ---------------------------------------------------------------------------
// OutputError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum OutputError {
    /// The sink could not start the clip at all.
    #[error("failed to start output: {0}")]
    Start(String),

    /// The clip input is not something this sink can play.
    #[error("unsupported input: {0}")]
    Unsupported(String),
}

// ---------------------------------------------------------------------------
// AudioSink trait
// ---------------------------------------------------------------------------

/// The audio player whose output the transport carries.
///
/// `play` must return promptly: it starts the clip and later reports its
/// end through the reporter the sink was built with.  Starting a clip
/// replaces whatever was playing.
pub trait AudioSink: Send + Sync {
    /// Start `clip` at `volume` (0.0 – 1.0) under `id`.
    fn play(&self, id: PlayId, clip: AudioClip, volume: f32) -> Result<(), OutputError>;

    /// Stop the current clip, if any.
    fn stop(&self);
}

// Compile-time assertion: Box<dyn AudioSink> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn AudioSink>) {}
};
