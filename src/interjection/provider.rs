//! Interjection content.
//!
//! [`DjProvider`] writes a fresh script for a prompt kind drawn from the
//! [`PromptCatalog`] and speaks it.  [`FallbackProvider`] wraps any provider
//! and, when it produces nothing, speaks one of the stock station lines
//! instead.  If speech fails as well the cycle yields `None` and the
//! scheduler leaves playback alone.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::seq::IndexedRandom;

use crate::playback::{AudioClip, AudioInput};

use super::history::ScriptHistory;
use super::prompt::PromptCatalog;
use super::speech::SpeechSynthesizer;
use super::writer::ScriptWriter;

// ---------------------------------------------------------------------------
// DjStats
// ---------------------------------------------------------------------------

/// What the front-end shows about the DJ.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DjStats {
    pub writer_enabled: bool,
    /// Last five scripts, oldest first.
    pub recent_scripts: Vec<String>,
    pub total_scripts: usize,
}

// ---------------------------------------------------------------------------
// InterjectionProvider trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait InterjectionProvider: Send + Sync {
    /// Produce the next scheduled interjection, if any.
    async fn next_interjection(&self) -> Option<AudioClip>;

    /// Speak arbitrary operator text.
    async fn announce(&self, text: &str) -> Option<AudioClip>;

    fn stats(&self) -> DjStats {
        DjStats::default()
    }
}

/// Speak `text` as an interjection clip labelled `label`.
async fn speak(speech: &dyn SpeechSynthesizer, label: String, text: &str) -> Option<AudioClip> {
    match speech.synthesize(text).await {
        Ok(bytes) => Some(AudioClip::interjection(label, AudioInput::Buffer(bytes))),
        Err(e) => {
            log::warn!("interjection: speech failed for {label:?}: {e}");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// DjProvider
// ---------------------------------------------------------------------------

pub struct DjProvider {
    writer: Arc<dyn ScriptWriter>,
    speech: Arc<dyn SpeechSynthesizer>,
    catalog: PromptCatalog,
    history: Mutex<ScriptHistory>,
}

impl DjProvider {
    pub fn new(
        writer: Arc<dyn ScriptWriter>,
        speech: Arc<dyn SpeechSynthesizer>,
        catalog: PromptCatalog,
    ) -> Self {
        Self {
            writer,
            speech,
            catalog,
            history: Mutex::new(ScriptHistory::new()),
        }
    }

    fn history(&self) -> std::sync::MutexGuard<'_, ScriptHistory> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl InterjectionProvider for DjProvider {
    async fn next_interjection(&self) -> Option<AudioClip> {
        if !self.writer.is_enabled() {
            log::debug!("interjection: script writer disabled");
            return None;
        }

        let kind = self.catalog.pick();
        let recent = self.history().prompt_feedback();

        let script = match self.writer.write(kind, &recent).await {
            Ok(script) => script,
            Err(e) => {
                log::warn!("interjection: could not write {kind} script: {e}");
                return None;
            }
        };
        self.history().push(script.clone());

        speak(self.speech.as_ref(), format!("DJ {kind}"), &script).await
    }

    async fn announce(&self, text: &str) -> Option<AudioClip> {
        log::info!("interjection: custom announcement: {text}");
        speak(self.speech.as_ref(), "announcement".into(), text).await
    }

    fn stats(&self) -> DjStats {
        let history = self.history();
        DjStats {
            writer_enabled: self.writer.is_enabled(),
            recent_scripts: history.recent(5),
            total_scripts: history.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// FallbackProvider
// ---------------------------------------------------------------------------

/// Stock lines for `station`, spoken when no script could be written.
pub fn default_lines(station: &str) -> Vec<String> {
    vec![
        format!("You're listening to {station}, where the music never stops!"),
        format!("{station} keeps the beats flowing twenty four seven."),
        format!("Thanks for tuning in to {station}, your non-stop music destination."),
        format!("This is {station}, bringing you continuous music all day long."),
        format!("Keep it locked to {station} for the best music mix."),
        format!("{station}, where every song is a good song."),
        format!("You're vibing with {station}, your favorite music stream."),
        format!("Stay tuned to {station} for more amazing music."),
        format!("{station}, broadcasting the best tunes around the clock."),
        format!("Thanks for listening to {station}, where music lives."),
    ]
}

/// Wraps any [`InterjectionProvider`]; when it yields nothing a stock line
/// is spoken instead.
pub struct FallbackProvider<P: InterjectionProvider> {
    inner: P,
    speech: Arc<dyn SpeechSynthesizer>,
    lines: Vec<String>,
}

impl<P: InterjectionProvider> FallbackProvider<P> {
    pub fn new(inner: P, speech: Arc<dyn SpeechSynthesizer>, lines: Vec<String>) -> Self {
        Self {
            inner,
            speech,
            lines,
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: InterjectionProvider> InterjectionProvider for FallbackProvider<P> {
    async fn next_interjection(&self) -> Option<AudioClip> {
        if let Some(clip) = self.inner.next_interjection().await {
            return Some(clip);
        }

        let line = {
            let mut rng = rand::rng();
            self.lines.choose(&mut rng).cloned()
        }?;
        log::info!("interjection: using stock line: {line}");
        speak(self.speech.as_ref(), "station line".into(), &line).await
    }

    async fn announce(&self, text: &str) -> Option<AudioClip> {
        self.inner.announce(text).await
    }

    fn stats(&self) -> DjStats {
        self.inner.stats()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
