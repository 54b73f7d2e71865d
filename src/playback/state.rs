//! Playback state machine tag and the shared session snapshot.
//!
//! [`PlaybackState`] is the orchestrator's state.  The front-end and the
//! interjection scheduler read it through [`SharedSession`].
//!
//! [`PlaybackSession`] is the per-target record the orchestrator keeps up to
//! date after every transition: state, auto-advance flag, current track and
//! whether a retry is pending.  It is rebuilt from scratch on every start.

use std::sync::{Arc, Mutex};

use crate::queue::Track;

// ---------------------------------------------------------------------------
// PlaybackState
// ---------------------------------------------------------------------------

/// States of the playback orchestrator.
///
/// ```text
/// Idle ──advance──▶ Loading ──resolved + started──▶ Playing
///                   Loading ──empty / unresolvable──▶ Loading   (retry 10 s)
/// Playing ──sink idle (auto-advance on)──▶ Loading
/// Playing ──interjection──▶ Interjecting ──clip ends──▶ Loading (after 2 s)
/// Playing / Interjecting ──sink error──▶ Loading                (retry 5 s)
/// any ──stop──▶ Stopped ──resume──▶ Loading
/// any ──skip──▶ Loading
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing requested yet.
    #[default]
    Idle,

    /// Picking and resolving the next track, or waiting to retry.
    Loading,

    /// A track is on the output.
    Playing,

    /// An interjection clip is on the output.
    Interjecting,

    /// Halted by the operator; nothing advances until resume or skip.
    Stopped,
}

impl PlaybackState {
    /// Returns `true` while something is on the output.
    ///
    /// ```
    /// use sri_radio::playback::PlaybackState;
    ///
    /// assert!(PlaybackState::Playing.is_audible());
    /// assert!(PlaybackState::Interjecting.is_audible());
    /// assert!(!PlaybackState::Loading.is_audible());
    /// assert!(!PlaybackState::Stopped.is_audible());
    /// ```
    pub fn is_audible(&self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Interjecting)
    }

    /// A short human-readable label for status displays.
    pub fn label(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "Idle",
            PlaybackState::Loading => "Loading",
            PlaybackState::Playing => "Playing",
            PlaybackState::Interjecting => "DJ break",
            PlaybackState::Stopped => "Stopped",
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// PlaybackSession
// ---------------------------------------------------------------------------

/// Snapshot of the orchestrator's session, written only by the orchestrator.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub state: PlaybackState,

    /// `true` while a track (not an interjection) is on the output.
    pub is_playing: bool,

    /// Cleared by stop, set again by resume or skip.
    pub auto_advance: bool,

    /// Track most recently started.
    pub current_track: Option<Track>,

    /// A delayed retry is armed.
    pub retry_pending: bool,

    /// Interjections played since start.
    pub interjections_played: u64,
}

impl PlaybackSession {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            is_playing: false,
            auto_advance: true,
            current_track: None,
            retry_pending: false,
            interjections_played: 0,
        }
    }
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// SharedSession
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`PlaybackSession`].
///
/// Cheap to clone.  Lock for a short critical section; do **not** hold the
/// lock across `.await` points.
pub type SharedSession = Arc<Mutex<PlaybackSession>>;

/// Construct a new [`SharedSession`] wrapping a fresh session.
pub fn new_shared_session() -> SharedSession {
    Arc::new(Mutex::new(PlaybackSession::new()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_idle() {
        assert_eq!(PlaybackState::default(), PlaybackState::Idle);
    }

    #[test]
    fn labels() {
        assert_eq!(PlaybackState::Interjecting.label(), "DJ break");
        assert_eq!(PlaybackState::Stopped.to_string(), "Stopped");
    }

    #[test]
    fn fresh_session_auto_advances() {
        let session = PlaybackSession::default();
        assert_eq!(session.state, PlaybackState::Idle);
        assert!(session.auto_advance);
        assert!(!session.is_playing);
        assert!(session.current_track.is_none());
    }

    #[test]
    fn shared_session_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedSession>();
    }
}
