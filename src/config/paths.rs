//! Where the station keeps its files.
//!
//! By default settings live in the platform config dir and the playlist in
//! the local data dir (`dirs`):
//!
//!   Linux:   ~/.config/sri-radio/settings.toml, ~/.local/share/sri-radio/playlist.json
//!   macOS:   ~/Library/Application Support/sri-radio/{settings.toml,playlist.json}
//!   Windows: %APPDATA%\sri-radio\settings.toml, %LOCALAPPDATA%\sri-radio\playlist.json
//!
//! Setting `SRI_RADIO_HOME` puts both files in that one directory, which is
//! handy when several stations run from one account.

use std::path::{Path, PathBuf};

/// Environment variable that relocates every station file.
pub const HOME_VAR: &str = "SRI_RADIO_HOME";

const APP_NAME: &str = "sri-radio";
const SETTINGS_FILE: &str = "settings.toml";
const PLAYLIST_FILE: &str = "playlist.json";

#[derive(Debug, Clone, PartialEq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    /// `settings.toml`.
    pub settings_file: PathBuf,
    pub data_dir: PathBuf,
    /// Persisted playlist, unless `queue.playlist_file` overrides it.
    pub playlist_file: PathBuf,
}

impl AppPaths {
    /// Platform directories, or `$SRI_RADIO_HOME` when set and non-empty.
    pub fn new() -> Self {
        match std::env::var_os(HOME_VAR).filter(|v| !v.is_empty()) {
            Some(home) => Self::under(Path::new(&home)),
            None => Self::platform(),
        }
    }

    /// Everything inside `root`.
    pub fn under(root: &Path) -> Self {
        Self::split(root.to_path_buf(), root.to_path_buf())
    }

    fn platform() -> Self {
        // Fall back to the working directory on platforms without the
        // standard locations.
        let base = |dir: Option<PathBuf>| dir.unwrap_or_else(|| PathBuf::from(".")).join(APP_NAME);
        Self::split(base(dirs::config_dir()), base(dirs::data_local_dir()))
    }

    fn split(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            settings_file: config_dir.join(SETTINGS_FILE),
            playlist_file: data_dir.join(PLAYLIST_FILE),
            config_dir,
            data_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
