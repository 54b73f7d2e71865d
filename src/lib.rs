//! Continuous radio station core.
//!
//! Keeps one audio output fed from a rotating playlist, survives transport
//! drops, and drops in short spoken DJ breaks on a timer.
//!
//! * [`queue`]: playlist with reshuffle policy and JSON persistence.
//! * [`resolver`]: playlist entry → playable audio.
//! * [`playback`]: the orchestrator state machine.
//! * [`connection`]: transport supervision and reconnects.
//! * [`interjection`]: DJ script writing, speech and scheduling.
//! * [`station`]: façade for front-ends.
//! * [`output`]: player-process sink and local transport.
//! * [`web`]: JSON status page.

pub mod config;
pub mod connection;
pub mod events;
pub mod interjection;
pub mod output;
pub mod playback;
pub mod queue;
pub mod resolver;
pub mod station;
pub mod web;
