//! Content lookup and first-run playlist bootstrap.
//!
//! When no playlist file exists the station builds an initial set by running
//! each seed query through a [`ContentLookup`] and keeping the first hit.
//! Queries are spaced out by a short pause so a remote search service is not
//! hammered.  A failing query is logged and skipped; bootstrap itself never
//! fails.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use super::{QueueStore, SharedQueue, Track, TrackMetadata};

// ---------------------------------------------------------------------------
// LookupError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LookupError {
    /// The search backend could not be reached.
    #[error("lookup request failed: {0}")]
    Request(String),

    /// The query cannot be handled by this lookup.
    #[error("unsupported query: {0}")]
    Unsupported(String),
}

// ---------------------------------------------------------------------------
// ContentLookup trait
// ---------------------------------------------------------------------------

/// Turns a free-text query into playable track metadata.
#[async_trait]
pub trait ContentLookup: Send + Sync {
    /// Return up to `limit` matches, best first.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<TrackMetadata>, LookupError>;
}

// ---------------------------------------------------------------------------
// DirectUrlLookup
// ---------------------------------------------------------------------------

/// Lookup that accepts direct `http(s)` links and nothing else.
///
/// The title is derived from the last path segment of the URL.
#[derive(Debug, Default, Clone)]
pub struct DirectUrlLookup;

#[async_trait]
impl ContentLookup for DirectUrlLookup {
    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<TrackMetadata>, LookupError> {
        let url = query.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(LookupError::Unsupported(url.to_string()));
        }
        let title = url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.trim_end_matches('/').rsplit('/').next())
            .filter(|segment| !segment.is_empty() && !segment.contains(':'))
            .unwrap_or(url)
            .to_string();
        Ok(vec![TrackMetadata::new(title, url)])
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

/// Resolve every seed query to at most one track.
///
/// When the lookup does not report an artist, the last word of the query is
/// used as a rough guess.
pub async fn bootstrap(
    lookup: &dyn ContentLookup,
    seed_queries: &[String],
    pause: Duration,
) -> Vec<Track> {
    log::info!("queue: bootstrapping playlist from {} seed queries", seed_queries.len());
    let mut tracks = Vec::with_capacity(seed_queries.len());

    for (i, query) in seed_queries.iter().enumerate() {
        if i > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        let mut meta = match lookup.search(query, 1).await {
            Ok(mut hits) if !hits.is_empty() => hits.remove(0),
            Ok(_) => {
                log::warn!("queue: no result for seed {query:?}");
                continue;
            }
            Err(e) => {
                log::warn!("queue: seed lookup {query:?} failed: {e}");
                continue;
            }
        };
        if meta.artist.is_none() {
            meta.artist = query.split_whitespace().last().map(str::to_string);
        }

        match Track::from_metadata(meta, Utc::now()) {
            Ok(track) => {
                log::debug!("queue: seeded {}", track.title());
                tracks.push(track);
            }
            Err(e) => log::warn!("queue: seed {query:?} rejected: {e}"),
        }
    }

    log::info!("queue: bootstrap produced {} tracks", tracks.len());
    tracks
}

/// Refill an empty queue: re-read the playlist file first, then fall back to
/// a bootstrap.  Returns the resulting queue length.
///
/// The lock is only held for the synchronous parts; lookups run unlocked.
pub async fn refill(
    queue: &SharedQueue,
    lookup: &dyn ContentLookup,
    seed_queries: &[String],
    pause: Duration,
) -> usize {
    let reloaded = {
        let mut store = lock(queue);
        match store.reload() {
            Ok(n) => n,
            Err(e) => {
                log::warn!("queue: reload failed: {e}");
                store.len()
            }
        }
    };
    if reloaded > 0 {
        return reloaded;
    }

    let tracks = bootstrap(lookup, seed_queries, pause).await;
    if tracks.is_empty() {
        return 0;
    }

    let mut store = lock(queue);
    // Someone may have added tracks while the lookups ran.
    if store.is_empty() {
        store.replace_all(tracks);
    }
    store.len()
}

fn lock(queue: &SharedQueue) -> std::sync::MutexGuard<'_, QueueStore> {
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
