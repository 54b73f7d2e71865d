//! Notifications for the front-end.
//!
//! Components publish [`RadioEvent`]s on a shared `tokio::sync::broadcast`
//! channel.  Publishing never blocks and never fails the publisher: with no
//! subscriber the event is simply dropped, and a subscriber that falls
//! behind sees `Lagged` on its side only.

use tokio::sync::broadcast;

use crate::connection::ConnectionState;
use crate::playback::PlaybackState;
use crate::queue::Track;

/// Something the front-end may want to render.
#[derive(Debug, Clone, PartialEq)]
pub enum RadioEvent {
    /// A track started playing.
    NowPlaying(Track),
    /// An interjection clip started playing.
    InterjectionStarted { label: String },
    /// The orchestrator moved to a new state.
    StateChanged(PlaybackState),
    /// The playlist changed shape.
    QueueChanged { len: usize },
    /// The transport connection changed state.
    ConnectionChanged(ConnectionState),
}

/// Sending half shared by all publishers.
pub type EventBus = broadcast::Sender<RadioEvent>;

/// Create an event bus with room for `capacity` undelivered events per
/// subscriber.
pub fn event_bus(capacity: usize) -> EventBus {
    let (tx, _rx) = broadcast::channel(capacity);
    tx
}

/// Publish `event`, ignoring the no-subscriber case.
pub fn publish(bus: &EventBus, event: RadioEvent) {
    let _ = bus.send(event);
}
