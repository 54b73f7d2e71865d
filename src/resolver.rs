//! Track resolution: playlist entry → playable audio handle.
//!
//! [`TrackResolver`] is the seam the orchestrator depends on.  Any error it
//! returns is treated the same way (retry after the normal delay), so
//! implementors only need to say *that* a source is unusable.
//!
//! [`DirectResolver`] handles the two kinds of references the station can
//! play without help: `http(s)` URLs, checked with a `HEAD` request, and
//! paths to local files.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::playback::{AudioClip, AudioInput};
use crate::queue::Track;

// ---------------------------------------------------------------------------
// ResolveError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The reference is not something this resolver understands.
    #[error("unsupported source: {0}")]
    Unsupported(String),

    /// The source answered but cannot be streamed.
    #[error("source unavailable ({status}): {source_ref}")]
    Unavailable { source_ref: String, status: String },

    /// Transport-level failure while probing the source.
    #[error("request failed: {0}")]
    Request(String),

    /// The resolver gave up waiting.
    #[error("resolution timed out")]
    Timeout,
}

impl From<reqwest::Error> for ResolveError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ResolveError::Timeout
        } else {
            ResolveError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// TrackResolver trait
// ---------------------------------------------------------------------------

/// Turns a queue entry into a streamable clip.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, track: &Track) -> Result<AudioClip, ResolveError>;
}

// ---------------------------------------------------------------------------
// DirectResolver
// ---------------------------------------------------------------------------

/// Resolves direct links and local files.
pub struct DirectResolver {
    client: reqwest::Client,
}

impl DirectResolver {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    async fn probe_url(&self, url: &str) -> Result<(), ResolveError> {
        let response = self.client.head(url).send().await?;
        let status = response.status();
        // Some media hosts refuse HEAD but serve GET fine.
        if status.is_success() || status == reqwest::StatusCode::METHOD_NOT_ALLOWED {
            Ok(())
        } else {
            Err(ResolveError::Unavailable {
                source_ref: url.to_string(),
                status: status.to_string(),
            })
        }
    }
}

impl Default for DirectResolver {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl TrackResolver for DirectResolver {
    async fn resolve(&self, track: &Track) -> Result<AudioClip, ResolveError> {
        let source = track.source_ref();

        if source.starts_with("http://") || source.starts_with("https://") {
            self.probe_url(source).await?;
            return Ok(AudioClip::music(track.title(), AudioInput::Location(source.into())));
        }

        let path = source.strip_prefix("file://").unwrap_or(source);
        if Path::new(path).is_file() {
            return Ok(AudioClip::music(track.title(), AudioInput::Location(path.into())));
        }

        Err(ResolveError::Unsupported(source.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::TrackMetadata;
    use chrono::Utc;

    fn track(source: &str) -> Track {
        Track::from_metadata(TrackMetadata::new("t", source), Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn local_file_resolves_to_location() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("song.mp3");
        std::fs::write(&path, b"ID3").unwrap();
        let source = format!("file://{}", path.display());

        let clip = DirectResolver::default().resolve(&track(&source)).await.unwrap();

        assert_eq!(clip.input, AudioInput::Location(path.display().to_string()));
        assert_eq!(clip.label, "t");
    }

    #[tokio::test]
    async fn unknown_scheme_is_unsupported() {
        let err = DirectResolver::default()
            .resolve(&track("spotify:track:123"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Unsupported(_)));
    }

    #[test]
    fn resolver_is_object_safe() {
        let resolver: Box<dyn TrackResolver> = Box::new(DirectResolver::default());
        drop(resolver);
    }
}
