//! Layered configuration.
//!
//! Sources, lowest precedence first:
//! - Built-in defaults
//! - Global config file (`<config dir>/zipwatch/settings.toml`)
//! - Workspace config file (`.zipwatch/settings.toml`, searched upwards)
//! - Environment variables
//!
//! # Environment Variables
//!
//! Variables are prefixed with `ZIPWATCH_` and use double underscores to
//! separate nested levels:
//! - `ZIPWATCH_ARCHIVE__COMPRESSION=stored` sets `archive.compression`
//! - `ZIPWATCH_WATCH__DEBOUNCE_MS=0` sets `watch.debounce_ms`
//! - `ZIPWATCH_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = ".zipwatch";
const CONFIG_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "ZIPWATCH_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Archive writing options
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// File watching options
    #[serde(default)]
    pub watch: WatchConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Compression method for file entries.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// DEFLATE, readable by every zip tool.
    #[default]
    Deflated,
    /// No compression.
    Stored,
}

/// Where `ZipWriter::add_all_from` roots the entries it adds.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AddAllRoot {
    /// `assets/` added as `assets/a.png`, `assets/ui/b.png`.
    #[default]
    DirName,
    /// `assets/` added as `a.png`, `ui/b.png`.
    ArchiveRoot,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub compression: Compression,

    /// DEFLATE level (0-9). Ignored for stored entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_level: Option<i64>,

    #[serde(default)]
    pub add_all_root: AddAllRoot,

    /// Include dot-files and dot-directories when adding a directory tree
    #[serde(default = "default_true")]
    pub include_hidden: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WatchConfig {
    /// Quiet period before a burst of OS notifications becomes one event.
    /// Zero delivers every notification.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level for all targets
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `zipwatch::watcher = "debug"`
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_debounce_ms() -> u64 {
    50
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            archive: ArchiveConfig::default(),
            watch: WatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            compression_level: None,
            add_all_root: AddAllRoot::default(),
            include_hidden: true,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));

        if let Some(global) = Self::global_config_path() {
            figment = figment.merge(Toml::file(global));
        }

        let workspace = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));

        figment
            .merge(Toml::file(workspace))
            .merge(Self::env_provider())
            .extract()
            .map_err(Box::new)
    }

    /// Load configuration from a specific file (plus environment overrides).
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Self::env_provider())
            .extract()
            .map_err(Box::new)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    // Double underscore separates nesting levels; single underscores stay
    // part of the field name.
    fn env_provider() -> Env {
        Env::prefixed(ENV_PREFIX).map(|key| key.as_str().to_lowercase().replace("__", ".").into())
    }

    /// Find `.zipwatch/settings.toml` in the current directory or an ancestor.
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join(CONFIG_FILE))
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("zipwatch").join(CONFIG_FILE))
    }
}
