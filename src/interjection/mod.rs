//! Spoken interjections ("DJ breaks").
//!
//! This module provides:
//! * [`PromptCatalog`] / [`PromptKind`] — script kinds with time-of-day bias.
//! * [`ScriptHistory`] — rolling window of aired scripts.
//! * [`ScriptWriter`] / [`ApiScriptWriter`] — OpenAI-compatible script writer.
//! * [`SpeechSynthesizer`] / [`HttpSpeechSynthesizer`] — text-to-speech.
//! * [`InterjectionProvider`] — [`DjProvider`] and [`FallbackProvider`].
//! * [`InterjectionScheduler`] — the recurring timer.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sri_radio::config::AppConfig;
//! use sri_radio::interjection::*;
//!
//! # fn example(playback: sri_radio::playback::PlaybackHandle) {
//! let config = AppConfig::default();
//! let speech: Arc<dyn SpeechSynthesizer> =
//!     Arc::new(HttpSpeechSynthesizer::from_config(&config.speech));
//! let writer = Arc::new(ApiScriptWriter::from_config(&config.llm, &config.station.name));
//! let dj = DjProvider::new(writer, Arc::clone(&speech), PromptCatalog::new(&config.station.name));
//! let provider = FallbackProvider::new(dj, speech, default_lines(&config.station.name));
//!
//! let scheduler = InterjectionScheduler::new(Arc::new(provider), playback, config.interjection.interval());
//! tokio::spawn(scheduler.run());
//! # }
//! ```

pub mod history;
pub mod prompt;
pub mod provider;
pub mod scheduler;
pub mod speech;
pub mod writer;

pub use history::ScriptHistory;
pub use prompt::{PromptCatalog, PromptKind};
pub use provider::{default_lines, DjProvider, DjStats, FallbackProvider, InterjectionProvider};
pub use scheduler::InterjectionScheduler;
pub use speech::{HttpSpeechSynthesizer, SpeechError, SpeechSynthesizer};
pub use writer::{ApiScriptWriter, ScriptError, ScriptWriter};
