//! Playlist file I/O.
//!
//! The file holds the full ordered list plus a last-updated stamp:
//!
//! ```json
//! {
//!   "songs": [ { "title": "…", "url": "…", "duration": "3:45",
//!                "artist": "…", "addedAt": "2024-05-01T10:00:00Z" } ],
//!   "lastUpdated": "2024-05-01T10:00:00Z"
//! }
//! ```
//!
//! It is read wholesale at boot and rewritten wholesale after every
//! structural change.  Writes go through a sibling temp file and a rename so
//! a crash mid-write never leaves a truncated playlist behind.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{QueueError, Track};

#[derive(Debug, Serialize, Deserialize)]
struct PlaylistFile {
    #[serde(default)]
    songs: Vec<Track>,
    #[serde(rename = "lastUpdated")]
    last_updated: Option<DateTime<Utc>>,
}

/// Read the playlist at `path`.
///
/// Returns `Ok(None)` when the file does not exist (first run).  Entries
/// with an empty source reference are dropped with a warning.
pub fn load(path: &Path) -> Result<Option<Vec<Track>>, QueueError> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    let file: PlaylistFile = serde_json::from_str(&data)?;

    let total = file.songs.len();
    let songs: Vec<Track> = file.songs.into_iter().filter(Track::is_valid).collect();
    if songs.len() != total {
        log::warn!(
            "queue: dropped {} playlist entries without a source reference",
            total - songs.len()
        );
    }
    Ok(Some(songs))
}

/// Write `tracks` to `path`, creating parent directories as needed.
pub fn save(path: &Path, tracks: &[Track]) -> Result<(), QueueError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = PlaylistFile {
        songs: tracks.to_vec(),
        last_updated: Some(Utc::now()),
    };
    let data = serde_json::to_string_pretty(&file)?;

    let tmp = temp_path(path);
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// WriteBehind
// ---------------------------------------------------------------------------

/// Background saver so callers on the async runtime never touch the disk.
///
/// Snapshots are written in order by one task through `spawn_blocking`;
/// when several queue up only the newest is written.
#[derive(Debug)]
pub struct WriteBehind {
    tx: mpsc::UnboundedSender<Vec<Track>>,
    task: JoinHandle<()>,
}

impl WriteBehind {
    /// Start the saver on the current runtime.  `None` outside a runtime.
    pub fn spawn(path: PathBuf) -> Option<Self> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Track>>();
        let task = runtime.spawn(async move {
            while let Some(mut tracks) = rx.recv().await {
                while let Ok(newer) = rx.try_recv() {
                    tracks = newer;
                }
                let target = path.clone();
                let len = tracks.len();
                match tokio::task::spawn_blocking(move || save(&target, &tracks)).await {
                    Ok(Ok(())) => log::debug!("queue: playlist saved ({len} tracks)"),
                    Ok(Err(e)) => {
                        log::error!("queue: failed to save playlist to {}: {e}", path.display())
                    }
                    Err(e) => log::error!("queue: playlist save task failed: {e}"),
                }
            }
        });
        Some(Self { tx, task })
    }

    /// Queue a snapshot.  Hands it back if the saver is gone.
    pub fn submit(&self, tracks: Vec<Track>) -> Result<(), Vec<Track>> {
        self.tx.send(tracks).map_err(|e| e.0)
    }

    /// Stop accepting snapshots; the returned task ends once the last one
    /// is on disk.
    pub fn close(self) -> JoinHandle<()> {
        self.task
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
