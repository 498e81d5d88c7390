use crate::CommitMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "outline.config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Editor options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Mode used by `Editor::update_default`
    #[serde(default)]
    pub default_commit_mode: CommitMode,

    /// Call a snapshot change handler with the initial snapshot on creation
    #[serde(default = "default_true")]
    pub notify_on_attach: bool,

    /// Run registered text transforms at commit
    #[serde(default = "default_true")]
    pub run_transforms: bool,
}

fn default_true() -> bool {
    true
}

impl EditorConfig {
    /// Load `outline.config.json` from a directory, or defaults if missing
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_json(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_commit_mode: CommitMode::default(),
            notify_on_attach: true,
            run_transforms: true,
        }
    }
}
