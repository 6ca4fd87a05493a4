//! Configuration management

use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "iptv-catalog";

pub const DEFAULT_PROVIDER: &str =
    "Free-TV:::url:::https://raw.githubusercontent.com/Free-TV/IPTV/master/playlist.m3u8:::::::::";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum ConnectionQuality {
    Fast,
    #[default]
    Normal,
    Slow,
    VerySlow,
    Custom,
}

impl ConnectionQuality {
    pub fn buffer_seconds(&self, custom: u32) -> u32 {
        match self {
            ConnectionQuality::Fast => 2,
            ConnectionQuality::Normal => 5,
            ConnectionQuality::Slow => 15,
            ConnectionQuality::VerySlow => 30,
            ConnectionQuality::Custom => custom,
        }
    }
}

/// Tuning handed to whatever plays the stream URLs.
///
/// Every recognized key is a field; there is no free-form map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackOptions {
    /// Hardware decoding mode (`auto-safe`, `auto`, `no`, ...)
    #[serde(default = "default_hwdec")]
    pub hwdec: String,
    /// Picks the network buffer size
    #[serde(default)]
    pub connection_quality: ConnectionQuality,
    /// Buffer size used when `connection_quality` is `Custom`
    #[serde(default = "default_buffer")]
    pub custom_buffer_seconds: u32,
    /// Enable the player's demuxer cache
    #[serde(default = "default_true")]
    pub cache: bool,
    /// Send the configured User-Agent/Referer with stream requests
    #[serde(default = "default_true")]
    pub user_agent_passthrough: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            hwdec: default_hwdec(),
            connection_quality: ConnectionQuality::Normal,
            custom_buffer_seconds: default_buffer(),
            cache: true,
            user_agent_passthrough: true,
        }
    }
}

impl PlaybackOptions {
    pub fn buffer_seconds(&self) -> u32 {
        self.connection_quality.buffer_seconds(self.custom_buffer_seconds)
    }

    /// Read an old-style `key=value,key=value` option string.
    /// Unknown keys are logged and dropped.
    pub fn from_legacy(options: &str) -> Self {
        let mut parsed = Self::default();
        for pair in options.split([',', ' ']).filter(|p| !p.trim().is_empty()) {
            let Some((key, value)) = pair.split_once('=') else {
                warn!("Ignoring playback option without value: `{}`", pair);
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "hwdec" => parsed.hwdec = value.to_string(),
                "cache" => parsed.cache = matches!(value, "yes" | "true" | "1"),
                "cache-secs" | "buffer" => match value.parse() {
                    Ok(secs) => {
                        parsed.connection_quality = ConnectionQuality::Custom;
                        parsed.custom_buffer_seconds = secs;
                    }
                    Err(_) => warn!("Ignoring invalid buffer size `{}`", value),
                },
                other => warn!("Ignoring unknown playback option `{}`", other),
            }
        }
        parsed
    }

    /// Command line switches for an external player
    pub fn to_player_args(&self, user_agent: &str, referer: &str) -> Vec<String> {
        let mut args = vec![
            format!("--hwdec={}", self.hwdec),
            format!("--cache={}", if self.cache { "yes" } else { "no" }),
            format!("--cache-secs={}", self.buffer_seconds()),
        ];
        if self.user_agent_passthrough {
            if !user_agent.is_empty() {
                args.push(format!("--user-agent={}", user_agent));
            }
            if !referer.is_empty() {
                args.push(format!("--referrer={}", referer));
            }
        }
        args
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub http_referer: String,
    #[serde(default = "default_active_provider")]
    pub active_provider: String,
    #[serde(default = "default_providers")]
    pub providers: Vec<String>,
    #[serde(default)]
    pub hide_adult_content: bool,
    #[serde(default = "default_playback_library")]
    pub playback_library: String,
    #[serde(default)]
    pub playback: PlaybackOptions,
    #[serde(default = "default_recordings_path")]
    pub recordings_path: PathBuf,
    /// Overrides the platform cache directory
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

fn default_buffer() -> u32 { 5 }
fn default_true() -> bool { true }
fn default_hwdec() -> String { "auto-safe".to_string() }
fn default_user_agent() -> String { "Mozilla/5.0".to_string() }
fn default_active_provider() -> String { "Free-TV".to_string() }
fn default_providers() -> Vec<String> { vec![DEFAULT_PROVIDER.to_string()] }
fn default_playback_library() -> String { "mpv".to_string() }
fn default_recordings_path() -> PathBuf { dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")) }

impl Default for Settings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            http_referer: String::new(),
            active_provider: default_active_provider(),
            providers: default_providers(),
            hide_adult_content: false,
            playback_library: default_playback_library(),
            playback: PlaybackOptions::default(),
            recordings_path: default_recordings_path(),
            cache_dir: None,
        }
    }
}

impl Settings {
    fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        fs::create_dir_all(&path).ok();
        path.push("config.json");
        path
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(settings) => return settings,
                    Err(e) => warn!("Ignoring unreadable settings {}: {}", path.display(), e),
                },
                Err(e) => warn!("Could not read settings {}: {}", path.display(), e),
            }
        }

        Self::default()
    }

    pub fn save(&self) {
        self.save_to(&Self::config_path());
    }

    pub fn save_to(&self, path: &Path) {
        match serde_json::to_string_pretty(self) {
            Ok(content) => {
                if let Err(e) = fs::write(path, content) {
                    warn!("Could not save settings {}: {}", path.display(), e);
                }
            }
            Err(e) => warn!("Could not serialize settings: {}", e),
        }
    }

    /// String setting by key, empty when the key is unknown
    pub fn get_string(&self, key: &str) -> String {
        match key {
            "user-agent" => self.user_agent.clone(),
            "http-referer" => self.http_referer.clone(),
            "active-provider" => self.active_provider.clone(),
            "playback-library" => self.playback_library.clone(),
            "recordings-path" => self.recordings_path.to_string_lossy().into_owned(),
            _ => String::new(),
        }
    }

    /// Returns false when the key is not a string setting
    pub fn set_string(&mut self, key: &str, value: &str) -> bool {
        match key {
            "user-agent" => self.user_agent = value.to_string(),
            "http-referer" => self.http_referer = value.to_string(),
            "active-provider" => self.active_provider = value.to_string(),
            "playback-library" => self.playback_library = value.to_string(),
            "recordings-path" => self.recordings_path = PathBuf::from(value),
            _ => return false,
        }
        true
    }

    pub fn providers(&self) -> &[String] {
        &self.providers
    }

    pub fn set_providers(&mut self, providers: Vec<String>) {
        self.providers = providers;
    }

    /// Restore one key to its default
    pub fn reset(&mut self, key: &str) {
        let defaults = Self::default();
        match key {
            "providers" => self.providers = defaults.providers,
            "playback" => self.playback = defaults.playback,
            "hide-adult-content" => self.hide_adult_content = defaults.hide_adult_content,
            "cache-dir" => self.cache_dir = None,
            other => {
                let value = defaults.get_string(other);
                if !self.set_string(other, &value) {
                    warn!("Cannot reset unknown setting `{}`", other);
                }
            }
        }
    }

    pub fn cache_root(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            let mut path = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
            path.push(APP_DIR);
            path
        })
    }

    pub fn providers_dir(&self) -> PathBuf {
        self.cache_root().join("providers")
    }

    pub fn epg_dir(&self) -> PathBuf {
        self.cache_root().join("epg")
    }
}
