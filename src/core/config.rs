use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::ConfigError;

pub const CONFIG_PATH_ENV: &str = "CHARACTER_PIPELINE_CONFIG";
pub const MIN_NARRATIVE_DEPTH: i64 = 1;
pub const MAX_NARRATIVE_DEPTH: i64 = 5;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GenerationConfig {
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    #[serde(default = "default_model_name")]
    pub model_name: String,

    #[serde(default = "default_narrative_depth")]
    pub default_narrative_depth: i64,

    #[serde(default = "default_dialogue_style")]
    pub default_dialogue_style: String,
}

/// Explicit per-call arguments. Blank strings count as absent.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub model_name: Option<String>,
    pub narrative_depth: Option<i64>,
    pub dialogue_style: Option<String>,
}

/// Call-scoped merge of overrides, file values and built-in defaults.
#[derive(Clone, PartialEq)]
pub struct EffectiveConfig {
    pub api_key: String,
    pub model_name: String,
    pub narrative_depth: i64,
    pub dialogue_style: String,
}

// Hand-written so the key never ends up in logs.
impl std::fmt::Debug for EffectiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectiveConfig")
            .field("api_key", &"<redacted>")
            .field("model_name", &self.model_name)
            .field("narrative_depth", &self.narrative_depth)
            .field("dialogue_style", &self.dialogue_style)
            .finish()
    }
}

fn default_model_name() -> String {
    "gemini-pro".to_string()
}
fn default_narrative_depth() -> i64 {
    3
}
fn default_dialogue_style() -> String {
    "casual".to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            model_name: default_model_name(),
            default_narrative_depth: default_narrative_depth(),
            default_dialogue_style: default_dialogue_style(),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.json"))
}

pub fn clamp_depth(depth: i64) -> i64 {
    depth.clamp(MIN_NARRATIVE_DEPTH, MAX_NARRATIVE_DEPTH)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl GenerationConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: GenerationConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        info!(
            "Loaded config from {:?} (model: {}, api key: {})",
            path,
            config.model_name,
            if non_blank(config.gemini_api_key.as_deref()).is_some() { "set" } else { "missing" }
        );
        Ok(config)
    }

    /// Like [`load`](Self::load), but a bad or missing file yields the built-in defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{}; falling back to built-in defaults", e);
                Self::default()
            }
        }
    }

    pub fn resolve(&self, overrides: &ConfigOverrides) -> Result<EffectiveConfig, ConfigError> {
        let api_key = non_blank(overrides.api_key.as_deref())
            .or_else(|| non_blank(self.gemini_api_key.as_deref()))
            .ok_or(ConfigError::MissingApiKey)?
            .to_string();

        let model_name = non_blank(overrides.model_name.as_deref())
            .or_else(|| non_blank(Some(self.model_name.as_str())))
            .map(str::to_string)
            .unwrap_or_else(default_model_name);

        let dialogue_style = non_blank(overrides.dialogue_style.as_deref())
            .or_else(|| non_blank(Some(self.default_dialogue_style.as_str())))
            .map(str::to_string)
            .unwrap_or_else(default_dialogue_style);

        let narrative_depth =
            clamp_depth(overrides.narrative_depth.unwrap_or(self.default_narrative_depth));

        Ok(EffectiveConfig {
            api_key,
            model_name,
            narrative_depth,
            dialogue_style,
        })
    }
}
