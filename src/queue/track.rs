//! Playlist entries.
//!
//! [`Track`] is immutable once built; the only way in is through
//! [`Track::from_metadata`] (or deserialisation of the playlist file, which
//! the store validates).  [`TrackMetadata`] is what a content lookup hands
//! back before the track is stamped with its insertion time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::QueueError;

const UNKNOWN: &str = "Unknown";

fn unknown() -> String {
    UNKNOWN.to_string()
}

// ---------------------------------------------------------------------------
// TrackMetadata
// ---------------------------------------------------------------------------

/// Lookup result describing a track that is not yet in the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: String,
    /// Opaque identifier the resolver understands (usually a URL).
    pub source_ref: String,
    /// Display-only length such as `"3:45"`.
    pub duration_label: Option<String>,
    pub artist: Option<String>,
}

impl TrackMetadata {
    pub fn new(title: impl Into<String>, source_ref: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_ref: source_ref.into(),
            duration_label: None,
            artist: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Track
// ---------------------------------------------------------------------------

/// One playable entry of the playlist.
///
/// The serialised field names (`url`, `duration`, `addedAt`) are the ones
/// used by the playlist file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    title: String,
    #[serde(rename = "url")]
    source_ref: String,
    #[serde(rename = "duration", default = "unknown")]
    duration_label: String,
    #[serde(default = "unknown")]
    artist: String,
    #[serde(rename = "addedAt")]
    added_at: DateTime<Utc>,
}

impl Track {
    /// Stamp `meta` with `added_at`.
    ///
    /// Fails with [`QueueError::EmptySourceRef`] when the source reference is
    /// blank, since such a track could never be resolved.
    pub fn from_metadata(meta: TrackMetadata, added_at: DateTime<Utc>) -> Result<Self, QueueError> {
        if meta.source_ref.trim().is_empty() {
            return Err(QueueError::EmptySourceRef);
        }
        Ok(Self {
            title: meta.title,
            source_ref: meta.source_ref,
            duration_label: meta.duration_label.unwrap_or_else(unknown),
            artist: meta.artist.unwrap_or_else(unknown),
            added_at,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn source_ref(&self) -> &str {
        &self.source_ref
    }

    pub fn duration_label(&self) -> &str {
        &self.duration_label
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    /// `true` when the record satisfies the non-empty source invariant.
    /// Used to screen entries read from disk.
    pub(crate) fn is_valid(&self) -> bool {
        !self.source_ref.trim().is_empty()
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.title, self.duration_label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_metadata_fills_unknowns() {
        let track = Track::from_metadata(
            TrackMetadata::new("Song", "https://example.com/a"),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(track.duration_label(), "Unknown");
        assert_eq!(track.artist(), "Unknown");
        assert_eq!(track.to_string(), "Song [Unknown]");
    }

    #[test]
    fn empty_source_ref_is_rejected() {
        let err = Track::from_metadata(TrackMetadata::new("Song", "  "), Utc::now()).unwrap_err();
        assert!(matches!(err, QueueError::EmptySourceRef));
    }

    #[test]
    fn reads_playlist_record_without_optional_fields() {
        let json = r#"{"title":"T","url":"https://x/y","addedAt":"2024-05-01T10:00:00Z"}"#;
        let track: Track = serde_json::from_str(json).unwrap();
        assert_eq!(track.source_ref(), "https://x/y");
        assert_eq!(track.duration_label(), "Unknown");
        assert!(track.is_valid());
    }
}
