//! Transport for a station that plays on the local machine.
//!
//! There is exactly one destination, the local audio device, and the
//! connection to it never drops on its own.  It lets the connection manager
//! run unchanged when no network transport is configured.

use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::{
    Connection, ConnectionReporter, Destination, Transport, TransportError, TransportSignal,
};
use crate::playback::AudioSink;

pub const LOCAL_DESTINATION_ID: &str = "local";

#[derive(Debug, Default, Clone)]
pub struct LocalTransport;

impl LocalTransport {
    pub fn destination() -> Destination {
        Destination::new(LOCAL_DESTINATION_ID, "Local output", 1)
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn list_destinations(&self) -> Result<Vec<Destination>, TransportError> {
        Ok(vec![Self::destination()])
    }

    async fn connect(
        &self,
        destination: &Destination,
        reporter: ConnectionReporter,
    ) -> Result<Arc<dyn Connection>, TransportError> {
        if destination.id != LOCAL_DESTINATION_ID {
            return Err(TransportError::Connect {
                destination: destination.id.clone(),
                reason: "only the local output is available".into(),
            });
        }
        reporter.report(TransportSignal::Ready);
        Ok(Arc::new(LocalConnection { reporter }))
    }
}

struct LocalConnection {
    reporter: ConnectionReporter,
}

#[async_trait]
impl Connection for LocalConnection {
    fn subscribe(&self, _sink: Arc<dyn AudioSink>) {
        log::debug!("output: local output subscribed");
    }

    async fn rejoin(&self) -> Result<(), TransportError> {
        self.reporter.report(TransportSignal::Ready);
        Ok(())
    }

    fn destroy(&self) {
        self.reporter.report(TransportSignal::Destroyed);
    }
}
