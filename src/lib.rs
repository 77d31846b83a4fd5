//! Character backstory and portrait-prompt nodes for a node-graph image pipeline, backed by
//! Google Gemini.

pub mod core;
pub mod nodes;
pub mod services;

pub use crate::core::config::{ConfigOverrides, EffectiveConfig, GenerationConfig};
pub use crate::core::error::{ConfigError, NodeError};
pub use crate::nodes::{Node, NodeRegistry};
