//! Playlist store for the station.
//!
//! This module provides:
//! * [`Track`] / [`TrackMetadata`] — immutable playlist entries.
//! * [`QueueStore`] — ordered playlist with cursor, Fisher–Yates reshuffle
//!   on wrap or after the shuffle interval, and write-through persistence.
//! * [`ContentLookup`] — search collaborator used by `add` and bootstrap.
//! * [`bootstrap`] / [`refill`] — first-run and empty-queue recovery.
//! * [`QueueError`] — error variants for queue operations.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use sri_radio::queue::{QueueStore, TrackMetadata};
//!
//! let mut store = QueueStore::open("playlist.json".into(), Duration::from_secs(1800)).unwrap();
//! store.add_track(TrackMetadata::new("Song", "https://example.com/song.mp3")).unwrap();
//! if let Some(track) = store.next_track() {
//!     println!("now playing {track}");
//! }
//! ```

pub mod bootstrap;
pub mod persist;
pub mod store;
pub mod track;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use bootstrap::{bootstrap, refill, ContentLookup, DirectUrlLookup, LookupError};
pub use store::{new_shared_queue, QueueInfo, QueueStore, SharedQueue};
pub use track::{Track, TrackMetadata};

// ---------------------------------------------------------------------------
// QueueError
// ---------------------------------------------------------------------------

/// Errors raised by queue mutation and playlist persistence.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A track was built without a source reference.
    #[error("track source reference is empty")]
    EmptySourceRef,

    /// Reading or writing the playlist file failed.
    #[error("playlist I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The playlist file is not valid JSON in the expected shape.
    #[error("playlist file is malformed: {0}")]
    Format(#[from] serde_json::Error),
}
