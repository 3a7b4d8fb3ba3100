//! Configuration for matrixterm.
//!
//! Settings are read from `~/.matrixterm/config.toml`. Every field is optional;
//! anything missing falls back to its default, and a file that fails to parse
//! is ignored with a warning in the log.
//!
//! ```toml
//! # Backend the `health` and `chat` commands talk to
//! api_base_url = "http://localhost:8000/api"
//!
//! # System prompt sent with every chat message
//! developer_message = "You are an AI assistant in a Matrix-style terminal."
//!
//! [rain]
//! tick_ms = 66
//! reset_probability = 0.02
//! fade = 0.05
//! column_spacing = 2
//!
//! [panel]
//! width_percent = 80
//! height_percent = 80
//!
//! [welcome]
//! enabled = true
//! line_delay_ms = 100
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Directory under the home directory holding config, credentials and log
pub const APP_DIR: &str = ".matrixterm";

/// Environment variable overriding `api_base_url`
pub const API_BASE_ENV: &str = "MATRIXTERM_API_BASE";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

pub const DEFAULT_DEVELOPER_MESSAGE: &str =
    "You are an AI assistant in a Matrix-style terminal. Keep responses concise and slightly dramatic.";

/// Symbols the rain draws from
pub const DEFAULT_GLYPHS: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789$&+,:;=?@#|<>._^%()![]{}\"`~*/\\ﾊﾐﾑﾒﾓｩｷｸｹｺｻｼｽｾｿﾀﾁﾂﾃﾄｶ";

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the backend (`/health` and `/chat` are appended)
    pub api_base_url: String,
    /// System prompt sent with every chat message
    pub developer_message: String,
    /// Overall request timeout; streaming responses are not limited when unset
    pub request_timeout_secs: Option<u64>,
    pub rain: RainConfig,
    pub panel: PanelConfig,
    pub welcome: WelcomeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            developer_message: DEFAULT_DEVELOPER_MESSAGE.to_string(),
            request_timeout_secs: None,
            rain: RainConfig::default(),
            panel: PanelConfig::default(),
            welcome: WelcomeConfig::default(),
        }
    }
}

/// Background rain settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RainConfig {
    pub enabled: bool,
    /// Fixed tick interval
    pub tick_ms: u64,
    /// Chance per tick that a column past the bottom edge restarts at the top
    pub reset_probability: f64,
    /// Opacity of the background overlay painted each tick
    pub fade: f32,
    /// Cells between rain columns
    pub column_spacing: u16,
    pub glyphs: String,
}

impl Default for RainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_ms: 66,
            reset_probability: 0.02,
            fade: 0.05,
            column_spacing: 2,
            glyphs: DEFAULT_GLYPHS.to_string(),
        }
    }
}

impl RainConfig {
    pub const MIN_RESET_PROBABILITY: f64 = 0.02;
    pub const MAX_RESET_PROBABILITY: f64 = 0.05;

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(10))
    }

    /// Reset probability held inside the staggered-cascade range
    pub fn reset_probability(&self) -> f64 {
        if self.reset_probability.is_nan() {
            return Self::MIN_RESET_PROBABILITY;
        }
        self.reset_probability
            .clamp(Self::MIN_RESET_PROBABILITY, Self::MAX_RESET_PROBABILITY)
    }

    pub fn fade(&self) -> f32 {
        if self.fade.is_nan() {
            return 0.05;
        }
        self.fade.clamp(0.01, 1.0)
    }

    pub fn glyphs(&self) -> Vec<char> {
        let glyphs: Vec<char> = self.glyphs.chars().filter(|c| !c.is_control()).collect();
        if glyphs.is_empty() {
            DEFAULT_GLYPHS.chars().collect()
        } else {
            glyphs
        }
    }
}

/// Terminal panel placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub width_percent: u16,
    pub height_percent: u16,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            width_percent: 80,
            height_percent: 80,
        }
    }
}

/// Start-up banner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WelcomeConfig {
    pub enabled: bool,
    pub line_delay_ms: u64,
}

impl Default for WelcomeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            line_delay_ms: 100,
        }
    }
}

impl WelcomeConfig {
    pub fn line_delay(&self) -> Duration {
        Duration::from_millis(self.line_delay_ms.max(1))
    }
}

impl Config {
    /// Load from the given file, or the default location
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path(),
        };
        let Some(path) = path else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                warn!("Ignoring malformed config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                warn!("Could not read config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply the environment override for the backend URL
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_BASE_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Default config file path
    pub fn default_path() -> Option<PathBuf> {
        app_dir().map(|dir| dir.join("config.toml"))
    }
}

/// `~/.matrixterm`
pub fn app_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(APP_DIR))
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
