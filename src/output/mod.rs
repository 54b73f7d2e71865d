//! Concrete output used by the binary: a player-process sink and the
//! local-machine transport.

pub mod local;
pub mod process;

pub use local::{LocalTransport, LOCAL_DESTINATION_ID};
pub use process::ProcessSink;
