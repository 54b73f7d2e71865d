//! Script prompts for the station DJ.
//!
//! [`PromptCatalog`] holds seven kinds of on-air script, each with its own
//! instruction, and picks one at random with a bias that depends on the hour
//! of day (mornings favour time-of-day greetings, afternoons transitions,
//! evenings music facts, nights community messages).
//!
//! [`PromptCatalog::build_chat`] turns a kind into the `(system, user)`
//! message pair sent to the chat-completions endpoint.  Recent scripts are
//! appended to the system message so the writer avoids repeating itself.

use rand::seq::IndexedRandom;
use rand::Rng;

// ---------------------------------------------------------------------------
// PromptKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Welcome,
    Transition,
    TimeOfDay,
    MusicFact,
    StationId,
    WeatherMusic,
    Community,
}

impl PromptKind {
    pub const ALL: [PromptKind; 7] = [
        PromptKind::Welcome,
        PromptKind::Transition,
        PromptKind::TimeOfDay,
        PromptKind::MusicFact,
        PromptKind::StationId,
        PromptKind::WeatherMusic,
        PromptKind::Community,
    ];

    /// Identifier used in the user message and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptKind::Welcome => "welcome",
            PromptKind::Transition => "transition",
            PromptKind::TimeOfDay => "time_of_day",
            PromptKind::MusicFact => "music_fact",
            PromptKind::StationId => "station_id",
            PromptKind::WeatherMusic => "weather_music",
            PromptKind::Community => "community",
        }
    }

    /// The kind favoured at `hour` (0–23) and how many extra draws it gets.
    fn hour_bias(hour: u32) -> (PromptKind, usize) {
        match hour {
            6..=11 => (PromptKind::TimeOfDay, 3),
            12..=17 => (PromptKind::Transition, 2),
            18..=21 => (PromptKind::MusicFact, 2),
            _ => (PromptKind::Community, 2),
        }
    }
}

impl std::fmt::Display for PromptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// Rules appended to every instruction.  `{recent}` is replaced by the last
/// few scripts.
const SPOKEN_RULES: &str = "\
IMPORTANT RULES:
- Keep the response very brief and conversational.
- It must sound natural when spoken aloud.
- No hashtags, emojis or special characters.
- Speak directly to the listeners.";

fn instruction(kind: PromptKind, station: &str) -> String {
    match kind {
        PromptKind::Welcome => format!(
            "You are a friendly radio DJ for {station}. Create a warm, enthusiastic welcome \
             message for new listeners. Keep it under 30 words. Be energetic and mention the \
             continuous music stream."
        ),
        PromptKind::Transition => format!(
            "You are a smooth radio DJ. Create a brief transition comment between songs. \
             Mention how the music never stops on {station}. Keep it under 25 words and sound \
             natural."
        ),
        PromptKind::TimeOfDay => format!(
            "You are a radio DJ. Create a time-appropriate greeting (morning, afternoon, \
             evening or late night) for {station} listeners. Keep it under 30 words and be \
             engaging."
        ),
        PromptKind::MusicFact => "You are a knowledgeable radio DJ. Share a brief, interesting \
             music fact or piece of trivia. Keep it under 35 words and make it engaging for \
             music lovers."
            .to_string(),
        PromptKind::StationId => format!(
            "You are a radio DJ doing a station identification. Mention {station} in a \
             creative, memorable way. Keep it under 20 words and make it catchy."
        ),
        PromptKind::WeatherMusic => "You are a radio DJ. Make a brief comment connecting the \
             current weather or season to the mood of the music. Keep it under 30 words and be \
             relatable."
            .to_string(),
        PromptKind::Community => format!(
            "You are a radio DJ. Create a brief message thanking listeners and building \
             community around {station}. Keep it under 30 words and be genuine."
        ),
    }
}

// ---------------------------------------------------------------------------
// PromptCatalog
// ---------------------------------------------------------------------------

/// Chooses script kinds and builds chat prompts for one station.
///
/// # Example
/// ```rust
/// use sri_radio::interjection::{PromptCatalog, PromptKind};
///
/// let catalog = PromptCatalog::new("SriRadio");
/// let (system, user) = catalog.build_chat(PromptKind::StationId, &[]);
/// assert!(system.contains("SriRadio"));
/// assert!(user.contains("station_id"));
/// ```
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    station: String,
}

impl PromptCatalog {
    pub fn new(station: impl Into<String>) -> Self {
        Self {
            station: station.into(),
        }
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    /// Every kind once, plus the extra draws for the kind favoured at `hour`.
    pub fn candidates(hour: u32) -> Vec<PromptKind> {
        let (favoured, extra) = PromptKind::hour_bias(hour);
        let mut pool = PromptKind::ALL.to_vec();
        pool.extend(std::iter::repeat(favoured).take(extra));
        pool
    }

    /// Draw a kind for `hour` using `rng`.
    pub fn pick_with<R: Rng + ?Sized>(&self, hour: u32, rng: &mut R) -> PromptKind {
        Self::candidates(hour)
            .choose(rng)
            .copied()
            .unwrap_or(PromptKind::StationId)
    }

    /// Draw a kind for the current local hour.
    pub fn pick(&self) -> PromptKind {
        use chrono::Timelike;
        let hour = chrono::Local::now().hour();
        self.pick_with(hour, &mut rand::rng())
    }

    /// Build the `(system, user)` pair for `kind`.
    ///
    /// `recent` are the last scripts aired, oldest first.
    pub fn build_chat(&self, kind: PromptKind, recent: &[String]) -> (String, String) {
        let mut system = instruction(kind, &self.station);
        system.push_str("\n\n");
        system.push_str(SPOKEN_RULES);
        if !recent.is_empty() {
            system.push_str("\n- Avoid repeating previous content: ");
            system.push_str(&recent.join(", "));
        }

        let user = format!("Generate a {} message for {}.", kind.as_str(), self.station);
        (system, user)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
