use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::grab::{TargetLists, Timeframe};

/// Config written by `config edit` when no file exists yet.
pub const EMBEDDED_CONFIG: &str = include_str!("../../embedded/grabbit.toml");

pub const DEFAULT_SUBREDDIT_NAME: &str = "wallpapers";
pub const DEFAULT_SUBREDDIT_DESTINATION: &str = "~/Pictures/grabbit";
pub const DEFAULT_SUBREDDIT_TIMEFRAME: Timeframe = Timeframe::Week;
pub const DEFAULT_SUBREDDIT_LIMIT: u32 = 5;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Cannot determine the home directory")]
    NoHomeDirectory,

    #[error("Editor error: {0}")]
    Editor(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Logging {
    pub directory: String,
    pub file_prefix: String,
    pub level: String,
    pub max_files: usize,
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            directory: "~/.config/grabbit/logs".to_string(),
            file_prefix: "grabbit.jsonl".to_string(),
            level: "debug".to_string(),
            max_files: 5,
            format: LogFormat::Json,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Network {
    pub timeout_secs: u64,
    pub base_url: String,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            base_url: crate::reddit::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// One `[[subreddits]]` table.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SubredditEntry {
    pub name: String,
    pub destination: String,
    pub timeframe: Timeframe,
    pub limit: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub logging: Logging,
    pub network: Network,
    pub subreddits: Vec<SubredditEntry>,
}

impl AppConfig {
    pub fn parse(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reads the config at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            warn!("Config file not found: {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        debug!(
            "Loaded config from {} with {} subreddits",
            path.display(),
            config.subreddits.len()
        );
        Ok(config)
    }
}

/// Per-field values passed on the command line. Empty means "not passed".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetOverrides {
    pub names: Vec<String>,
    pub destinations: Vec<String>,
    pub timeframes: Vec<Timeframe>,
    pub limits: Vec<u32>,
}

fn pick<T: Clone>(flags: &[T], configured: Vec<T>, default: T) -> Vec<T> {
    if !flags.is_empty() {
        flags.to_vec()
    } else if !configured.is_empty() {
        configured
    } else {
        vec![default]
    }
}

/// Builds the target lists, one field at a time: flags, then config, then defaults.
///
/// Fields are resolved independently, so the resulting lists may disagree in
/// length. That is left for the runner to reject.
pub fn resolve_target_lists(overrides: &TargetOverrides, config: &AppConfig) -> TargetLists {
    let entries = &config.subreddits;

    let names = pick(
        &overrides.names,
        entries.iter().map(|e| e.name.clone()).collect(),
        DEFAULT_SUBREDDIT_NAME.to_string(),
    );
    let destinations = pick(
        &overrides.destinations,
        entries.iter().map(|e| e.destination.clone()).collect(),
        DEFAULT_SUBREDDIT_DESTINATION.to_string(),
    );
    let timeframes = pick(
        &overrides.timeframes,
        entries.iter().map(|e| e.timeframe).collect(),
        DEFAULT_SUBREDDIT_TIMEFRAME,
    );
    let limits = pick(
        &overrides.limits,
        entries.iter().map(|e| e.limit).collect(),
        DEFAULT_SUBREDDIT_LIMIT,
    );

    TargetLists {
        names,
        destinations: destinations.iter().map(|d| expand_home(d)).collect(),
        timeframes,
        limits,
    }
}

/// Expands a leading `~` to the home directory. Other paths pass through untouched.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = if path == "~" {
        ""
    } else if let Some(rest) = path.strip_prefix("~/") {
        rest
    } else {
        return PathBuf::from(path);
    };

    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => {
            warn!("No home directory found, leaving '{}' unexpanded", path);
            PathBuf::from(path)
        }
    }
}

/// `~/.config/grabbit.toml`
pub fn default_config_path() -> ConfigResult<PathBuf> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
    Ok(home.join(".config").join("grabbit.toml"))
}

/// Writes the embedded config to `path` unless something is already there.
///
/// Returns whether the file was created.
pub fn seed_config(path: &Path) -> ConfigResult<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            info!("Creating config directory: {}", parent.display());
            fs::create_dir_all(parent)?;
        }
    }

    fs::write(path, EMBEDDED_CONFIG)?;
    info!("Created config file {}", path.display());
    Ok(true)
}

/// Validates `content` and only then replaces the file at `path`.
pub fn save_config_text(path: &Path, content: &str) -> ConfigResult<()> {
    AppConfig::parse(content)?;
    fs::write(path, content)?;
    Ok(())
}

/// Opens the config in an editor, seeding it first if needed.
///
/// `editor` falls back to `$VISUAL`/`$EDITOR`. Returns `false` when the editor
/// was closed without saving.
pub fn edit_config(path: &Path, editor: Option<&str>) -> ConfigResult<bool> {
    seed_config(path)?;
    let current = fs::read_to_string(path)?;

    let mut prompt = dialoguer::Editor::new();
    prompt.extension(".toml").require_save(true);
    if let Some(editor) = editor {
        prompt.executable(editor);
    }

    let edited = prompt
        .edit(&current)
        .map_err(|e| ConfigError::Editor(e.to_string()))?;

    match edited {
        Some(content) => {
            save_config_text(path, &content)?;
            info!("Saved config {}", path.display());
            Ok(true)
        }
        None => {
            info!("Config {} left unchanged", path.display());
            Ok(false)
        }
    }
}
