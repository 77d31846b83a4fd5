use std::path::PathBuf;
use thiserror::Error;

/// Failures while loading or resolving the generation config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Gemini API key missing: set `gemini_api_key` in config.json or pass an api_key input")]
    MissingApiKey,
}

/// Everything a node invocation can fail with. The host shows the message and aborts the node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("Gemini API call failed: {0}")]
    Api(String),
}

impl NodeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        NodeError::Validation(msg.into())
    }

    /// Flattens a client error, keeping the whole context chain.
    pub fn api(err: anyhow::Error) -> Self {
        NodeError::Api(format!("{:#}", err))
    }
}
