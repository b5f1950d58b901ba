use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// Reviewer configuration. Every field has a default, so a partial file
/// (or none at all) is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub normalize: NormalizeSettings,
    pub review: ReviewSettings,
}

/// Tunables of the markdown normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeSettings {
    /// Share of list-marker lines from which a block counts as a list.
    pub list_threshold: f32,
    pub bullet_indent: usize,
    pub ordered_indent: usize,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            list_threshold: 0.5,
            bullet_indent: 2,
            ordered_indent: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSettings {
    /// Name recorded on operations; the user name when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Where drafts are kept between sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_dir: Option<PathBuf>,
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        if let Some(draft_dir) = config.review.draft_dir.take() {
            config.review.draft_dir = Some(Self::expand_path(&draft_dir).unwrap_or(draft_dir));
        }

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// The configuration file if there is one, the defaults otherwise.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        Ok(Self::load()?.unwrap_or_default())
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/markdown-review");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// Configured author, falling back to `$USER`.
    pub fn author(&self) -> Option<String> {
        self.review
            .author
            .clone()
            .or_else(|| std::env::var("USER").ok())
    }

    /// Configured draft directory, `~/.local/share/markdown-review/drafts`
    /// by default.
    pub fn draft_dir(&self) -> PathBuf {
        self.review.draft_dir.clone().unwrap_or_else(|| {
            let data_dir = shellexpand::tilde("~/.local/share/markdown-review");
            PathBuf::from(data_dir.as_ref()).join("drafts")
        })
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}
