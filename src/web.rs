//! HTTP status page.
//!
//! `GET /` answers with a JSON summary suitable for uptime monitors:
//!
//! ```json
//! { "status": "online", "station": "SriRadio", "uptime": 42.5,
//!   "playing": true, "state": "Playing", "now_playing": "Song",
//!   "queue_length": 20, "connection": "connected" }
//! ```

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;

use crate::station::Station;

#[derive(Clone)]
struct WebState {
    station: Arc<Station>,
    started: Instant,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: &'static str,
    station: String,
    /// Seconds since the page came up.
    uptime: f64,
    playing: bool,
    state: String,
    now_playing: Option<String>,
    queue_length: usize,
    connection: String,
}

/// Routes for the status page.
pub fn router(station: Arc<Station>) -> Router {
    let state = WebState {
        station,
        started: Instant::now(),
    };
    Router::new().route("/", get(status)).with_state(state)
}

/// Serve the status page on `addr` until the task is aborted.
pub async fn serve(addr: &str, station: Arc<Station>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("web: status page on http://{addr}/");
    axum::serve(listener, router(station)).await?;
    Ok(())
}

async fn status(State(web): State<WebState>) -> Json<StatusBody> {
    let status = web.station.status();
    Json(StatusBody {
        status: "online",
        station: status.name,
        uptime: web.started.elapsed().as_secs_f64(),
        playing: status.playback.is_playing,
        state: status.playback.state.to_string(),
        now_playing: status
            .playback
            .current_track
            .map(|track| track.title().to_string()),
        queue_length: status.queue.total,
        connection: status.connection.state.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::connection::ConnectionHandle;
    use crate::events::event_bus;
    use crate::interjection::InterjectionProvider;
    use crate::playback::{new_shared_session, AudioClip, PlaybackHandle, PlaybackState};
    use crate::queue::{new_shared_queue, ContentLookup, LookupError, QueueStore, Track, TrackMetadata};

    struct NoLookup;

    #[async_trait]
    impl ContentLookup for NoLookup {
        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<TrackMetadata>, LookupError> {
            Ok(Vec::new())
        }
    }

    struct Silent;

    #[async_trait]
    impl InterjectionProvider for Silent {
        async fn next_interjection(&self) -> Option<AudioClip> {
            None
        }

        async fn announce(&self, _text: &str) -> Option<AudioClip> {
            None
        }
    }

    fn station() -> (Arc<Station>, PlaybackHandle) {
        let tracks = ["A", "B"]
            .iter()
            .map(|t| {
                Track::from_metadata(TrackMetadata::new(*t, format!("https://example.com/{t}")), Utc::now())
                    .unwrap()
            })
            .collect();
        let queue = new_shared_queue(QueueStore::new(tracks, Duration::from_secs(3600)));
        let (playback, _inbox) = PlaybackHandle::channel(new_shared_session());
        let (connection, _conn_inbox) = ConnectionHandle::channel();
        let station = Station::new(
            "Test FM",
            queue,
            Arc::new(NoLookup),
            playback.clone(),
            connection,
            Arc::new(Silent),
            event_bus(4),
        );
        (Arc::new(station), playback)
    }

    async fn get_root(app: Router) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn root_reports_idle_station() {
        let (station, _playback) = station();
        let (code, body) = get_root(router(station)).await;

        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "online");
        assert_eq!(body["station"], "Test FM");
        assert_eq!(body["playing"], false);
        assert_eq!(body["queue_length"], 2);
        assert_eq!(body["connection"], "detached");
        assert!(body["now_playing"].is_null());
        assert!(body["uptime"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn root_reports_current_track() {
        let (station, playback) = station();
        {
            let session = playback.session();
            let mut session = session.lock().unwrap();
            session.state = PlaybackState::Playing;
            session.is_playing = true;
            session.current_track = Some(
                Track::from_metadata(TrackMetadata::new("Anthem", "https://example.com/anthem"), Utc::now())
                    .unwrap(),
            );
        }

        let (_, body) = get_root(router(station)).await;
        assert_eq!(body["playing"], true);
        assert_eq!(body["state"], "Playing");
        assert_eq!(body["now_playing"], "Anthem");
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let (station, _playback) = station();
        let response = router(station)
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
