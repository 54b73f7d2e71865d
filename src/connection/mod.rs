//! Transport supervision.
//!
//! * [`Transport`] / [`Connection`] — the seam to whatever carries audio to
//!   listeners.
//! * [`ConnectionManager`] — keeps exactly one connection alive, rejoining
//!   after drops and rediscovering after teardown.
//! * [`choose`] — destination preference.

pub mod discovery;
pub mod manager;
pub mod transport;

pub use discovery::choose;
pub use manager::{ConnectionHandle, ConnectionInbox, ConnectionManager, ConnectionSettings, ConnectionStatus};
pub use transport::{
    Connection, ConnectionId, ConnectionReporter, ConnectionState, Destination, Transport,
    TransportError, TransportSignal,
};
