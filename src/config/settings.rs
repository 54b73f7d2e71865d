//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Every section is `#[serde(default)]`, so a partial `settings.toml` only
//! needs the keys it wants to change.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// StationConfig
// ---------------------------------------------------------------------------

/// Station identity and the seed list used to bootstrap an empty playlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Station name spoken in interjections (e.g. `"SriRadio"`).
    pub name: String,
    /// Search queries resolved through the content lookup when no persisted
    /// playlist exists yet.
    pub seed_queries: Vec<String>,
}

impl Default for StationConfig {
    fn default() -> Self {
        let seed = [
            "Bohemian Rhapsody Queen",
            "Hotel California Eagles",
            "Stairway to Heaven Led Zeppelin",
            "Imagine John Lennon",
            "Sweet Child O Mine Guns N Roses",
            "Billie Jean Michael Jackson",
            "Smells Like Teen Spirit Nirvana",
            "Wonderwall Oasis",
            "Hey Jude The Beatles",
            "Don't Stop Believin Journey",
            "Thunderstruck AC/DC",
            "Bohemian Like You The Dandy Warhols",
            "Mr. Brightside The Killers",
            "Seven Nation Army The White Stripes",
            "Radioactive Imagine Dragons",
            "Uptown Funk Bruno Mars",
            "Shape of You Ed Sheeran",
            "Blinding Lights The Weeknd",
            "Levitating Dua Lipa",
            "Good 4 U Olivia Rodrigo",
        ];
        Self {
            name: "SriRadio".into(),
            seed_queries: seed.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// QueueConfig
// ---------------------------------------------------------------------------

/// Settings for the playlist store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Explicit playlist file; `None` uses the platform data directory.
    pub playlist_file: Option<PathBuf>,
    /// Minutes after which the order is reshuffled even if the cursor has
    /// not wrapped.
    pub reshuffle_interval_mins: u64,
    /// Pause between seed lookups while bootstrapping.
    pub bootstrap_pause_ms: u64,
}

impl QueueConfig {
    pub fn reshuffle_interval(&self) -> Duration {
        Duration::from_secs(self.reshuffle_interval_mins * 60)
    }

    /// Resolved playlist location.
    pub fn playlist_path(&self) -> PathBuf {
        self.playlist_file
            .clone()
            .unwrap_or_else(|| AppPaths::new().playlist_file)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            playlist_file: None,
            reshuffle_interval_mins: 30,
            bootstrap_pause_ms: 1_000,
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// Retry delays, volumes and the external player used by the process sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Delay before retrying after an empty queue or a resolution failure.
    pub retry_delay_secs: u64,
    /// Delay before retrying after the sink reported an error.
    pub error_retry_delay_secs: u64,
    /// Pause between the end of an interjection and the next track.
    pub interjection_pause_secs: u64,
    /// Music volume (0.0 – 1.0).
    pub music_volume: f32,
    /// Interjection volume (0.0 – 1.0).
    pub interjection_volume: f32,
    /// Program spawned by the process sink for every clip.
    pub player_program: String,
    /// Arguments for `player_program`.  `{input}` is replaced with the clip
    /// location (`pipe:0` for in-memory audio) and `{volume}` with 0 – 100.
    pub player_args: Vec<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            retry_delay_secs: 10,
            error_retry_delay_secs: 5,
            interjection_pause_secs: 2,
            music_volume: 0.8,
            interjection_volume: 0.9,
            player_program: "ffplay".into(),
            player_args: [
                "-nodisp",
                "-autoexit",
                "-loglevel",
                "error",
                "-volume",
                "{volume}",
                "{input}",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionConfig
// ---------------------------------------------------------------------------

/// Transport destination and reconnect timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Preferred destination id.  `None` lets discovery pick one.
    pub destination: Option<String>,
    /// Wait after a drop before attempting an in-place rejoin.
    pub grace_period_secs: u64,
    /// Wait after a failed rejoin before rediscovering.
    pub rejoin_failure_delay_secs: u64,
    /// Wait after the transport reports destruction before rediscovering.
    pub destroyed_delay_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            destination: None,
            grace_period_secs: 5,
            rejoin_failure_delay_secs: 10,
            destroyed_delay_secs: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// InterjectionConfig
// ---------------------------------------------------------------------------

/// DJ break timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterjectionConfig {
    /// Whether the scheduler runs at all.
    pub enabled: bool,
    /// Interval between interjections, in milliseconds.
    pub interval_ms: u64,
}

impl InterjectionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for InterjectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 300_000,
        }
    }
}

// ---------------------------------------------------------------------------
// WebConfig
// ---------------------------------------------------------------------------

/// HTTP status page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
}

impl WebConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Settings for the script writer (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Whether generated scripts are attempted at all.  When `false` (or no
    /// API key is configured for a remote endpoint) only default lines are
    /// spoken.
    pub enabled: bool,
    /// Base URL of the API endpoint.
    pub base_url: String,
    /// API key — `None` for local providers.
    pub api_key: Option<String>,
    /// Model identifier sent to the API.
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).
    pub temperature: f32,
    /// Upper bound on the generated script length.
    pub max_tokens: u32,
    /// Maximum seconds to wait for a response.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com".into(),
            api_key: None,
            model: "gpt-4o-mini".into(),
            temperature: 0.8,
            max_tokens: 100,
            timeout_secs: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Settings for text-to-speech (OpenAI-compatible `/v1/audio/speech`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub voice: String,
    /// ISO-639-1 language hint.
    pub language: String,
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            api_key: None,
            model: "tts-1".into(),
            voice: "alloy".into(),
            language: "en".into(),
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use sri_radio::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub station: StationConfig,
    pub queue: QueueConfig,
    pub playback: PlaybackConfig,
    pub connection: ConnectionConfig,
    pub interjection: InterjectionConfig,
    pub llm: LlmConfig,
    pub speech: SpeechConfig,
    pub web: WebConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`,
    /// then apply environment overrides.
    ///
    /// Returns the defaults when the file does not exist yet.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&AppPaths::new().settings_file)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply the environment variables the station honours on top of the
    /// file settings.
    ///
    /// | Variable            | Setting                       |
    /// |---------------------|-------------------------------|
    /// | `VOICE_CHANNEL_ID`  | `connection.destination`      |
    /// | `DJ_BREAK_INTERVAL` | `interjection.interval_ms`    |
    /// | `TTS_LANGUAGE`      | `speech.language`             |
    /// | `LLM_API_KEY`       | `llm.api_key`                 |
    /// | `TTS_API_KEY`       | `speech.api_key`              |
    /// | `PORT`              | `web.port`                    |
    ///
    /// Unparseable numbers are ignored with a warning.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(id) = non_empty("VOICE_CHANNEL_ID") {
            self.connection.destination = Some(id);
        }
        if let Some(raw) = non_empty("DJ_BREAK_INTERVAL") {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.interjection.interval_ms = ms,
                _ => log::warn!("config: ignoring invalid DJ_BREAK_INTERVAL={raw:?}"),
            }
        }
        if let Some(lang) = non_empty("TTS_LANGUAGE") {
            self.speech.language = lang;
        }
        if let Some(key) = non_empty("LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(key) = non_empty("TTS_API_KEY") {
            self.speech.api_key = Some(key);
        }
        if let Some(raw) = non_empty("PORT") {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.web.port = port,
                Err(_) => log::warn!("config: ignoring invalid PORT={raw:?}"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.station.name, "SriRadio");
        assert_eq!(config.interjection.interval_ms, 300_000);
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.queue.reshuffle_interval(), Duration::from_secs(30 * 60));
        assert_eq!(cfg.station.seed_queries.len(), 20);
        assert_eq!(cfg.playback.retry_delay_secs, 10);
        assert_eq!(cfg.playback.error_retry_delay_secs, 5);
        assert_eq!(cfg.playback.interjection_pause_secs, 2);
        assert_eq!(cfg.connection.grace_period_secs, 5);
        assert_eq!(cfg.connection.rejoin_failure_delay_secs, 10);
        assert_eq!(cfg.connection.destroyed_delay_secs, 5);
        assert!(cfg.connection.destination.is_none());
        assert_eq!(cfg.interjection.interval(), Duration::from_millis(300_000));
        assert!(cfg.llm.api_key.is_none());
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let mut cfg = AppConfig::default();
        cfg.station.name = "Night Owl FM".into();
        cfg.queue.playlist_file = Some(dir.path().join("list.json"));
        cfg.queue.reshuffle_interval_mins = 45;
        cfg.playback.music_volume = 0.5;
        cfg.connection.destination = Some("1234".into());
        cfg.interjection.interval_ms = 60_000;
        cfg.llm.api_key = Some("sk-test".into());
        cfg.speech.voice = "nova".into();

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.station.name, "Night Owl FM");
        assert_eq!(loaded.queue.playlist_file, Some(dir.path().join("list.json")));
        assert_eq!(loaded.queue.reshuffle_interval_mins, 45);
        assert_eq!(loaded.playback.music_volume, 0.5);
        assert_eq!(loaded.connection.destination.as_deref(), Some("1234"));
        assert_eq!(loaded.interjection.interval_ms, 60_000);
        assert_eq!(loaded.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(loaded.speech.voice, "nova");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[interjection]\ninterval_ms = 1000\n").unwrap();

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(loaded.interjection.interval_ms, 1000);
        assert!(loaded.interjection.enabled);
        assert_eq!(loaded.playback.retry_delay_secs, 10);
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[
            ("VOICE_CHANNEL_ID", "987"),
            ("DJ_BREAK_INTERVAL", "120000"),
            ("TTS_LANGUAGE", "fr"),
            ("LLM_API_KEY", "key"),
            ("PORT", "8080"),
        ]));
        assert_eq!(cfg.web.addr(), "0.0.0.0:8080");

        assert_eq!(cfg.connection.destination.as_deref(), Some("987"));
        assert_eq!(cfg.interjection.interval_ms, 120_000);
        assert_eq!(cfg.speech.language, "fr");
        assert_eq!(cfg.llm.api_key.as_deref(), Some("key"));
    }

    #[test]
    fn invalid_interval_env_is_ignored() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[
            ("DJ_BREAK_INTERVAL", "soon"),
            ("VOICE_CHANNEL_ID", "  "),
            ("PORT", "99999"),
        ]));
        assert_eq!(cfg.web.port, 3000);

        assert_eq!(cfg.interjection.interval_ms, 300_000);
        assert!(cfg.connection.destination.is_none());
    }
}
