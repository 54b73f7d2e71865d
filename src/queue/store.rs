//! The rotating playlist.
//!
//! [`QueueStore`] owns the ordered tracks, the cursor pointing at the next
//! track to serve, and the time of the last full shuffle.
//!
//! # Serving order
//!
//! ```text
//! next_track()
//!   ├─ shuffle interval elapsed?  → reshuffle, cursor = 0
//!   ├─ cursor == len?             → reshuffle, cursor = 0
//!   ├─ empty?                     → None
//!   └─ tracks[cursor], cursor += 1
//! ```
//!
//! Every track is served once per cycle; a new cycle starts with a fresh
//! uniform permutation.  The playlist file is rewritten after every add,
//! remove and full reshuffle; a failed write is logged and never fails the
//! in-memory operation.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rand::seq::SliceRandom;
use tokio::time::Instant;

use tokio::task::JoinHandle;

use super::persist::{self, WriteBehind};
use super::{QueueError, Track, TrackMetadata};

// ---------------------------------------------------------------------------
// QueueInfo
// ---------------------------------------------------------------------------

/// Snapshot used by the front-end for status displays.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueInfo {
    pub total: usize,
    pub cursor: usize,
    pub current: Option<Track>,
    pub next: Option<Track>,
}

// ---------------------------------------------------------------------------
// QueueStore
// ---------------------------------------------------------------------------

/// Ordered, periodically reshuffled playlist with position tracking.
#[derive(Debug)]
pub struct QueueStore {
    tracks: Vec<Track>,
    /// Index of the next track to serve.  Always `<= tracks.len()`.
    cursor: usize,
    last_shuffle_at: Instant,
    shuffle_interval: Duration,
    /// `None` keeps the store in memory only.
    path: Option<PathBuf>,
    /// Background saver; without one, saves happen inline.
    writer: Option<WriteBehind>,
}

impl QueueStore {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// In-memory store holding `tracks` in the given order.
    pub fn new(tracks: Vec<Track>, shuffle_interval: Duration) -> Self {
        Self {
            tracks,
            cursor: 0,
            last_shuffle_at: Instant::now(),
            shuffle_interval,
            path: None,
            writer: None,
        }
    }

    /// Open the playlist persisted at `path`.
    ///
    /// The stored order is kept verbatim.  A missing file yields an empty
    /// store bound to `path`; the caller decides whether to bootstrap.
    pub fn open(path: PathBuf, shuffle_interval: Duration) -> Result<Self, QueueError> {
        let tracks = persist::load(&path)?.unwrap_or_default();
        log::info!("queue: loaded {} tracks from {}", tracks.len(), path.display());
        Ok(Self::new(tracks, shuffle_interval).persist_to(path))
    }

    /// Bind the store to a playlist file.  Nothing is written until the next
    /// structural change.
    pub fn persist_to(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    /// Move playlist writes onto a background task of the current runtime,
    /// so serving a track from an async task never blocks on the disk.
    ///
    /// Outside a runtime, or for an in-memory store, saves stay inline.
    pub fn write_behind(mut self) -> Self {
        if let Some(path) = &self.path {
            self.writer = WriteBehind::spawn(path.clone());
            if self.writer.is_none() {
                log::warn!("queue: no async runtime, saving playlist inline");
            }
        }
        self
    }

    /// Detach the background saver.  Await the handle to make sure every
    /// queued write has reached the disk.
    pub fn close_writer(&mut self) -> Option<JoinHandle<()>> {
        self.writer.take().map(WriteBehind::close)
    }

    // -----------------------------------------------------------------------
    // Serving
    // -----------------------------------------------------------------------

    /// Serve the next track, reshuffling first when the cycle is exhausted or
    /// the shuffle interval has elapsed.
    ///
    /// Returns `None` only when the playlist is empty.
    pub fn next_track(&mut self) -> Option<Track> {
        self.next_track_at(Instant::now())
    }

    fn next_track_at(&mut self, now: Instant) -> Option<Track> {
        if self.tracks.is_empty() {
            return None;
        }

        if now.saturating_duration_since(self.last_shuffle_at) > self.shuffle_interval {
            log::debug!("queue: shuffle interval elapsed, reshuffling");
            self.shuffle_at(now);
        } else if self.cursor >= self.tracks.len() {
            log::debug!("queue: cycle exhausted, reshuffling");
            self.shuffle_at(now);
        }

        let track = self.tracks[self.cursor].clone();
        self.cursor += 1;
        Some(track)
    }

    /// Full Fisher–Yates reshuffle; resets the cursor and persists.
    pub fn shuffle(&mut self) {
        self.shuffle_at(Instant::now());
    }

    fn shuffle_at(&mut self, now: Instant) {
        log::info!("queue: shuffling {} tracks", self.tracks.len());
        self.tracks.shuffle(&mut rand::rng());
        self.cursor = 0;
        self.last_shuffle_at = now;
        self.persist();
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Append a track at the end of the current order (no reshuffle).
    pub fn add_track(&mut self, meta: TrackMetadata) -> Result<Track, QueueError> {
        let track = Track::from_metadata(meta, Utc::now())?;
        self.tracks.push(track.clone());
        self.persist();
        log::info!("queue: added {}", track.title());
        Ok(track)
    }

    /// Remove the track at `index`.
    ///
    /// Removing before the cursor shifts later tracks down by one, so one
    /// track of the current cycle is skipped; that is accepted.  The cursor is
    /// clamped so it never exceeds the new length.
    pub fn remove_track(&mut self, index: usize) -> Option<Track> {
        if index >= self.tracks.len() {
            return None;
        }
        let removed = self.tracks.remove(index);
        self.cursor = self.cursor.min(self.tracks.len());
        self.persist();
        log::info!("queue: removed {}", removed.title());
        Some(removed)
    }

    /// Replace the whole playlist (reload / bootstrap) and persist it.
    pub fn replace_all(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        self.cursor = 0;
        self.last_shuffle_at = Instant::now();
        self.persist();
    }

    /// Re-read the bound playlist file, if any.
    ///
    /// Returns the number of tracks now held.  A missing file leaves the
    /// store untouched.
    pub fn reload(&mut self) -> Result<usize, QueueError> {
        let Some(path) = self.path.clone() else {
            return Ok(self.tracks.len());
        };
        if let Some(tracks) = persist::load(&path)? {
            self.tracks = tracks;
            self.cursor = 0;
            self.last_shuffle_at = Instant::now();
        }
        Ok(self.tracks.len())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Most recently served track.
    pub fn current_track(&self) -> Option<&Track> {
        self.cursor.checked_sub(1).and_then(|i| self.tracks.get(i))
    }

    /// Track the next call to [`next_track`](Self::next_track) would serve,
    /// unless a reshuffle intervenes.
    pub fn peek_next(&self) -> Option<&Track> {
        self.tracks.get(self.cursor)
    }

    pub fn info(&self) -> QueueInfo {
        QueueInfo {
            total: self.tracks.len(),
            cursor: self.cursor,
            current: self.current_track().cloned(),
            next: self.peek_next().cloned(),
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Some(writer) = &self.writer {
            match writer.submit(self.tracks.clone()) {
                Ok(()) => return,
                Err(_) => log::warn!("queue: background saver gone, saving inline"),
            }
        }
        match persist::save(path, &self.tracks) {
            Ok(()) => log::debug!("queue: playlist saved ({} tracks)", self.tracks.len()),
            Err(e) => log::error!("queue: failed to save playlist to {}: {e}", path.display()),
        }
    }
}

// ---------------------------------------------------------------------------
// SharedQueue
// ---------------------------------------------------------------------------

/// Handle to the queue shared by the orchestrator and the front-end.
///
/// Lock for short critical sections only; never hold it across `.await`.
pub type SharedQueue = Arc<Mutex<QueueStore>>;

pub fn new_shared_queue(store: QueueStore) -> SharedQueue {
    Arc::new(Mutex::new(store))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
