//! Node definitions the host graph runtime discovers and invokes.

use async_trait::async_trait;
use log::info;
use serde::Serialize;
use serde_json::Value;

use crate::core::config::GenerationConfig;
use crate::core::error::NodeError;
use crate::services::llm::LlmConnector;

pub mod backstory;
pub mod descriptor;
pub mod prompt;

pub use backstory::GeminiBackstoryNode;
pub use descriptor::{InputKind, InputSpec, NodeDescriptor, OutputKind, OutputSpec};
pub use prompt::BackstoryToPromptNode;

/// Resolved input values, keyed by input name.
pub type NodeInputs = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutputValue {
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeOutput {
    pub name: &'static str,
    pub value: OutputValue,
}

/// Output tuple in declaration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NodeOutputs(pub Vec<NodeOutput>);

impl NodeOutputs {
    pub fn push(&mut self, name: &'static str, value: OutputValue) {
        self.0.push(NodeOutput { name, value });
    }

    pub fn get(&self, name: &str) -> Option<&OutputValue> {
        self.0.iter().find(|o| o.name == name).map(|o| &o.value)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            OutputValue::Text(s) => Some(s),
            OutputValue::List(_) => None,
        }
    }

    pub fn list(&self, name: &str) -> Option<&[String]> {
        match self.get(name)? {
            OutputValue::List(l) => Some(l),
            OutputValue::Text(_) => None,
        }
    }
}

#[async_trait]
pub trait Node: Send + Sync {
    fn descriptor(&self) -> NodeDescriptor;

    /// Runs one invocation: at most one `connect` and one API call.
    async fn invoke(
        &self,
        inputs: &NodeInputs,
        config: &GenerationConfig,
        connector: &dyn LlmConnector,
    ) -> Result<NodeOutputs, NodeError>;
}

// --- input readers ---

pub(crate) fn read_string(inputs: &NodeInputs, name: &str) -> Result<Option<String>, NodeError> {
    match inputs.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(NodeError::validation(format!(
            "input `{}` must be a string, got {}",
            name, other
        ))),
    }
}

pub(crate) fn require_string(inputs: &NodeInputs, name: &str) -> Result<String, NodeError> {
    read_string(inputs, name)?
        .ok_or_else(|| NodeError::validation(format!("missing required input `{}`", name)))
}

/// Accepts JSON integers or numeric strings; a blank string counts as absent.
pub(crate) fn read_int(inputs: &NodeInputs, name: &str) -> Result<Option<i64>, NodeError> {
    let invalid = |v: &Value| {
        NodeError::validation(format!("input `{}` must be an integer, got {}", name, v))
    };
    let Some(value) = inputs.get(name) else {
        return Ok(None);
    };
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n.as_i64().map(Some).ok_or_else(|| invalid(value)),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse().map(Some).map_err(|_| invalid(value))
            }
        }
        other => Err(invalid(other)),
    }
}

// --- registry ---

pub struct NodeRegistry {
    nodes: Vec<Box<dyn Node>>,
}

impl NodeRegistry {
    pub fn new(nodes: Vec<Box<dyn Node>>) -> Self {
        Self { nodes }
    }

    pub fn builtin() -> Self {
        Self::new(vec![
            Box::new(GeminiBackstoryNode),
            Box::new(BackstoryToPromptNode),
        ])
    }

    pub fn descriptors(&self) -> Vec<NodeDescriptor> {
        self.nodes.iter().map(|n| n.descriptor()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Node> {
        self.nodes
            .iter()
            .find(|n| n.descriptor().name == name)
            .map(|n| n.as_ref())
    }

    pub async fn invoke(
        &self,
        name: &str,
        inputs: &NodeInputs,
        config: &GenerationConfig,
        connector: &dyn LlmConnector,
    ) -> Result<NodeOutputs, NodeError> {
        let node = self
            .get(name)
            .ok_or_else(|| NodeError::validation(format!("unknown node `{}`", name)))?;
        info!("Invoking node {}", name);
        node.invoke(inputs, config, connector).await
    }
}
