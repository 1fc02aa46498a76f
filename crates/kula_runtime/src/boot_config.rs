//! Boot Configuration
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Command line: first positional argument is the level file
//! 2. Environment variables: `KULA_LEVEL`, `KULA_FRAMES`
//! 3. Config file: `$KULA_CONFIG`, else `kula.toml` in the working directory
//!
//! # Example Config File
//!
//! ```toml
//! level = "levels/arena.json"
//! frames = 600
//! frame_ms = 16
//! dump_json = true
//!
//! [parse]
//! expression_delimiters = ["<<<", ">>>"]
//! max_depth = 64
//! split_dotted_keys = false
//! ```

use std::path::{Path, PathBuf};

use kula_parse::ParseConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "kula.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Complete runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Level JSON to load at startup
    pub level: Option<PathBuf>,
    /// Frames to run before exiting
    pub frames: u32,
    /// Fixed frame step in milliseconds; 0 samples the wall clock instead
    pub frame_ms: u64,
    /// Print the scope tree as JSON after the last frame
    pub dump_json: bool,
    pub parse: ParseConfig,
    /// Config file path (for reloading)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            level: None,
            frames: 60,
            frame_ms: 16,
            dump_json: false,
            parse: ParseConfig::default(),
            config_path: None,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from all sources
    pub fn load() -> Self {
        let path = std::env::var_os("KULA_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = match Self::load_from_file(&path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(ConfigError::Io { .. }) => Self::default(),
            Err(err) => {
                log::warn!("Ignoring {}: {}", path.display(), err);
                Self::default()
            }
        };

        config.apply_overrides(|name| std::env::var(name).ok());

        // First non-flag argument is the level path
        if let Some(arg) = std::env::args().skip(1).find(|arg| !arg.starts_with("--")) {
            config.level = Some(PathBuf::from(arg));
            log::info!("Level from args: {:?}", config.level);
        }

        config
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `KULA_LEVEL` and `KULA_FRAMES` as reported by `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup("KULA_LEVEL").filter(|level| !level.is_empty()) {
            self.level = Some(PathBuf::from(level));
            log::info!("Level from env: {:?}", self.level);
        }

        if let Some(frames) = lookup("KULA_FRAMES") {
            match frames.trim().parse() {
                Ok(frames) => self.frames = frames,
                Err(_) => log::warn!("Ignoring KULA_FRAMES={}", frames),
            }
        }
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        log::info!("Runtime Configuration:");
        log::info!("  Level: {}", self.level.as_deref().map_or("<none>".into(), |p| p.display().to_string()));
        log::info!("  Frames: {} x {}ms", self.frames, self.frame_ms);
        log::info!("  Dump JSON: {}", self.dump_json);
        if let Some(path) = &self.config_path {
            log::info!("  Config: {}", path.display());
        }
    }
}
