//! Front-end façade.
//!
//! [`Station`] bundles the handles a chat or console front-end needs: queue
//! edits through the content lookup, transport controls, custom
//! announcements and a combined status snapshot.  It owns no task of its
//! own; every call is a short lock or a message to one of the actors.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;

use crate::connection::{ConnectionHandle, ConnectionStatus};
use crate::events::{publish, EventBus, RadioEvent};
use crate::interjection::{DjStats, InterjectionProvider};
use crate::playback::{PlaybackHandle, PlaybackSession, PlaybackState};
use crate::queue::{ContentLookup, LookupError, QueueError, QueueInfo, QueueStore, SharedQueue, Track, TrackMetadata};

#[derive(Debug, Error)]
pub enum StationError {
    #[error("nothing found for {0:?}")]
    NotFound(String),

    #[error("no track at position {0}")]
    InvalidPosition(usize),

    #[error("playback is stopped")]
    Stopped,

    #[error("announcement could not be spoken")]
    AnnouncementFailed,

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Everything the status command shows.
#[derive(Debug, Clone)]
pub struct StationStatus {
    pub name: String,
    pub playback: PlaybackSession,
    pub connection: ConnectionStatus,
    pub queue: QueueInfo,
    pub dj: DjStats,
}

/// One row of the playlist view.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistEntry {
    /// Zero-based position in the queue.
    pub position: usize,
    pub track: Track,
    /// The most recently started track.
    pub is_current: bool,
}

pub struct Station {
    name: String,
    queue: SharedQueue,
    lookup: Arc<dyn ContentLookup>,
    playback: PlaybackHandle,
    connection: ConnectionHandle,
    provider: Arc<dyn InterjectionProvider>,
    events: EventBus,
}

impl Station {
    pub fn new(
        name: impl Into<String>,
        queue: SharedQueue,
        lookup: Arc<dyn ContentLookup>,
        playback: PlaybackHandle,
        connection: ConnectionHandle,
        provider: Arc<dyn InterjectionProvider>,
        events: EventBus,
    ) -> Self {
        Self {
            name: name.into(),
            queue,
            lookup,
            playback,
            connection,
            provider,
            events,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RadioEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> StationStatus {
        StationStatus {
            name: self.name.clone(),
            playback: self.playback.snapshot(),
            connection: self.connection.status(),
            queue: self.lock_queue().info(),
            dj: self.provider.stats(),
        }
    }

    // -----------------------------------------------------------------------
    // Queue
    // -----------------------------------------------------------------------

    /// Look `query` up and append the best match.
    pub async fn add_track(&self, query: &str) -> Result<Track, StationError> {
        let meta = self
            .lookup
            .search(query, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StationError::NotFound(query.to_string()))?;

        let (track, len) = {
            let mut queue = self.lock_queue();
            let track = queue.add_track(meta)?;
            (track, queue.len())
        };
        publish(&self.events, RadioEvent::QueueChanged { len });
        Ok(track)
    }

    /// Remove the track at zero-based `position`.
    pub fn remove_track(&self, position: usize) -> Result<Track, StationError> {
        let (removed, len) = {
            let mut queue = self.lock_queue();
            let removed = queue.remove_track(position);
            (removed, queue.len())
        };
        let track = removed.ok_or(StationError::InvalidPosition(position))?;
        publish(&self.events, RadioEvent::QueueChanged { len });
        Ok(track)
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<TrackMetadata>, StationError> {
        Ok(self.lookup.search(query, limit).await?)
    }

    /// Tracks around the current position: up to `before` already played
    /// (including the current one) and up to `after` upcoming.
    pub fn playlist_window(&self, before: usize, after: usize) -> Vec<PlaylistEntry> {
        let queue = self.lock_queue();
        let cursor = queue.cursor();
        let start = cursor.saturating_sub(before);
        let end = (cursor + after).min(queue.len());

        queue.tracks()[start..end]
            .iter()
            .enumerate()
            .map(|(i, track)| {
                let position = start + i;
                PlaylistEntry {
                    position,
                    track: track.clone(),
                    is_current: position + 1 == cursor,
                }
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Transport controls
    // -----------------------------------------------------------------------

    pub fn skip(&self) {
        self.playback.skip();
    }

    pub fn stop(&self) {
        self.playback.stop();
    }

    pub fn resume(&self) {
        self.playback.resume();
    }

    /// Speak `text` now, in place of the music.
    pub async fn announce(&self, text: &str) -> Result<(), StationError> {
        if self.playback.state() == PlaybackState::Stopped {
            return Err(StationError::Stopped);
        }
        let clip = self
            .provider
            .announce(text)
            .await
            .ok_or(StationError::AnnouncementFailed)?;
        self.playback.interject(clip);
        Ok(())
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, QueueStore> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::events::event_bus;
    use crate::playback::handle::PlaybackCommand;
    use crate::playback::{new_shared_session, AudioClip, AudioInput, PlaybackInbox};
    use crate::queue::new_shared_queue;

    struct CatalogLookup;

    #[async_trait]
    impl ContentLookup for CatalogLookup {
        async fn search(&self, query: &str, limit: usize) -> Result<Vec<TrackMetadata>, LookupError> {
            if query == "nothing" {
                return Ok(Vec::new());
            }
            Ok((0..limit)
                .map(|i| TrackMetadata::new(format!("{query} #{i}"), format!("https://example.com/{i}")))
                .collect())
        }
    }

    struct Announcer {
        works: bool,
    }

    #[async_trait]
    impl InterjectionProvider for Announcer {
        async fn next_interjection(&self) -> Option<AudioClip> {
            None
        }

        async fn announce(&self, text: &str) -> Option<AudioClip> {
            self.works
                .then(|| AudioClip::interjection("announcement", AudioInput::Buffer(text.into())))
        }
    }

    fn track(title: &str) -> Track {
        Track::from_metadata(TrackMetadata::new(title, format!("https://example.com/{title}")), Utc::now())
            .unwrap()
    }

    fn station(titles: &[&str], announcer_works: bool) -> (Station, PlaybackInbox) {
        let queue = new_shared_queue(QueueStore::new(
            titles.iter().map(|t| track(t)).collect(),
            Duration::from_secs(3600),
        ));
        let (playback, inbox) = PlaybackHandle::channel(new_shared_session());
        let (connection, _conn_inbox) = ConnectionHandle::channel();
        let station = Station::new(
            "Test FM",
            queue,
            Arc::new(CatalogLookup),
            playback,
            connection,
            Arc::new(Announcer {
                works: announcer_works,
            }),
            event_bus(16),
        );
        (station, inbox)
    }

    #[tokio::test]
    async fn add_appends_first_match_and_notifies() {
        let (station, _inbox) = station(&["A"], true);
        let mut events = station.subscribe();

        let track = station.add_track("lofi beats").await.unwrap();

        assert_eq!(track.title(), "lofi beats #0");
        assert_eq!(station.status().queue.total, 2);
        assert_eq!(events.recv().await.unwrap(), RadioEvent::QueueChanged { len: 2 });
    }

    #[tokio::test]
    async fn add_without_match_is_not_found() {
        let (station, _inbox) = station(&[], true);
        let err = station.add_track("nothing").await.unwrap_err();
        assert!(matches!(err, StationError::NotFound(_)));
        assert_eq!(station.status().queue.total, 0);
    }

    #[test]
    fn remove_out_of_range_is_an_error() {
        let (station, _inbox) = station(&["A", "B"], true);
        assert_eq!(station.remove_track(1).unwrap().title(), "B");
        assert!(matches!(
            station.remove_track(5),
            Err(StationError::InvalidPosition(5))
        ));
    }

    #[tokio::test]
    async fn search_passes_limit_through() {
        let (station, _inbox) = station(&[], true);
        assert_eq!(station.search("jazz", 5).await.unwrap().len(), 5);
    }

    #[test]
    fn playlist_window_marks_current() {
        let (station, _inbox) = station(&["A", "B", "C", "D", "E"], true);
        {
            let mut queue = station.queue.lock().unwrap();
            queue.next_track();
            queue.next_track();
        }

        let window = station.playlist_window(3, 2);
        let titles: Vec<_> = window.iter().map(|e| e.track.title().to_string()).collect();
        assert_eq!(titles, vec!["A", "B", "C", "D"]);
        assert!(window[1].is_current);
        assert_eq!(window.iter().filter(|e| e.is_current).count(), 1);
    }

    #[tokio::test]
    async fn announce_hands_clip_to_playback() {
        let (station, mut inbox) = station(&["A"], true);
        station.announce("Happy birthday").await.unwrap();
        assert!(matches!(inbox.rx.try_recv(), Ok(PlaybackCommand::Interject(_))));
    }

    #[tokio::test]
    async fn announce_refused_while_stopped() {
        let (station, mut inbox) = station(&["A"], true);
        station.playback.session().lock().unwrap().state = PlaybackState::Stopped;
        assert!(matches!(station.announce("hi").await, Err(StationError::Stopped)));
        assert!(inbox.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_announcement_is_reported() {
        let (station, _inbox) = station(&["A"], false);
        assert!(matches!(
            station.announce("hi").await,
            Err(StationError::AnnouncementFailed)
        ));
    }

    #[test]
    fn controls_reach_playback() {
        let (station, mut inbox) = station(&["A"], true);
        station.stop();
        station.resume();
        station.skip();
        assert!(matches!(inbox.rx.try_recv(), Ok(PlaybackCommand::Stop)));
        assert!(matches!(inbox.rx.try_recv(), Ok(PlaybackCommand::Resume)));
        assert!(matches!(inbox.rx.try_recv(), Ok(PlaybackCommand::Skip)));
    }
}
