//! Transport contract.
//!
//! A [`Transport`] knows which destinations exist and how to open a
//! [`Connection`] to one of them.  A connection reports its lifecycle through
//! the [`ConnectionReporter`] it was opened with; every report is tagged with
//! the [`ConnectionId`] the manager assigned, so reports from a connection
//! that has since been replaced are recognised and dropped.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::playback::AudioSink;

use super::manager::ConnectionCommand;

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Connection state as seen by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection has been made, or the last one was torn down and no
    /// destination is known yet.
    #[default]
    Detached,
    Connected,
    /// The transport dropped; a rejoin happens after the grace period.
    Disconnected,
    /// The connection is gone for good; rediscovery follows.
    Destroyed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Detached => "detached",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Destroyed => "destroyed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

/// Somewhere the station can broadcast to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub id: String,
    pub name: String,
    /// Listeners currently present.
    pub occupants: usize,
}

impl Destination {
    pub fn new(id: impl Into<String>, name: impl Into<String>, occupants: usize) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            occupants,
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

// ---------------------------------------------------------------------------
// Signals and errors
// ---------------------------------------------------------------------------

/// Identifies one opened connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// Lifecycle report from a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSignal {
    /// The connection is (again) carrying audio.
    Ready,
    Disconnected,
    Destroyed,
    /// Non-fatal error; logged only.
    Error(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("destination lookup failed: {0}")]
    Discovery(String),

    #[error("could not connect to {destination}: {reason}")]
    Connect { destination: String, reason: String },

    #[error("rejoin failed: {0}")]
    Rejoin(String),
}

/// Handed to a connection so it can report its lifecycle to the manager.
#[derive(Clone)]
pub struct ConnectionReporter {
    conn: ConnectionId,
    tx: mpsc::UnboundedSender<ConnectionCommand>,
}

impl ConnectionReporter {
    pub(crate) fn new(conn: ConnectionId, tx: mpsc::UnboundedSender<ConnectionCommand>) -> Self {
        Self { conn, tx }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.conn
    }

    pub fn report(&self, signal: TransportSignal) {
        let cmd = ConnectionCommand::Signal {
            conn: self.conn,
            signal,
        };
        if self.tx.send(cmd).is_err() {
            log::debug!("connection: signal after manager shutdown");
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Opens connections to destinations.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Destinations currently available.
    async fn list_destinations(&self) -> Result<Vec<Destination>, TransportError>;

    /// Open a connection to `destination`.  The connection reports through
    /// `reporter` until it is destroyed.
    async fn connect(
        &self,
        destination: &Destination,
        reporter: ConnectionReporter,
    ) -> Result<Arc<dyn Connection>, TransportError>;
}

/// One live connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Route `sink`'s output through this connection.
    fn subscribe(&self, sink: Arc<dyn AudioSink>);

    /// Re-establish a dropped connection in place.
    async fn rejoin(&self) -> Result<(), TransportError>;

    /// Tear the connection down.  Further reports are ignored by the manager.
    fn destroy(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display() {
        assert_eq!(ConnectionState::default().to_string(), "detached");
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
    }

    #[test]
    fn reporter_tags_signals() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reporter = ConnectionReporter::new(ConnectionId(7), tx);
        reporter.report(TransportSignal::Disconnected);

        match rx.try_recv().unwrap() {
            ConnectionCommand::Signal { conn, signal } => {
                assert_eq!(conn, ConnectionId(7));
                assert_eq!(signal, TransportSignal::Disconnected);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
