use async_trait::async_trait;

use crate::core::config::{
    ConfigOverrides, GenerationConfig, MAX_NARRATIVE_DEPTH, MIN_NARRATIVE_DEPTH,
};
use crate::core::error::NodeError;
use crate::nodes::{
    read_int, read_string, require_string, InputSpec, Node, NodeDescriptor, NodeInputs,
    NodeOutputs, OutputKind, OutputSpec, OutputValue,
};
use crate::services::backstory::{self, split_traits, BackstoryRequest, Gender};
use crate::services::llm::LlmConnector;

/// Character backstory and sample dialogue from Gemini.
pub struct GeminiBackstoryNode;

impl GeminiBackstoryNode {
    pub const NAME: &'static str = "GeminiBackstoryNode";
}

#[async_trait]
impl Node for GeminiBackstoryNode {
    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor {
            name: Self::NAME,
            display_name: "Gemini Character Backstory Generator",
            category: "Character Backstory Generator",
            inputs: vec![
                InputSpec::text("api_key", "", "Google Gemini key, overrides config.json").optional(),
                InputSpec::choice("character_gender", &Gender::CHOICES, "female", "Character gender"),
                InputSpec::text("character_role", "merchant", "The role/occupation of the character"),
                InputSpec::text("personality_traits", "friendly, honest", "Comma-separated personality traits"),
                InputSpec::text("environment", "medieval town", "The setting where the character lives/works"),
                InputSpec::int(
                    "narrative_depth",
                    3,
                    MIN_NARRATIVE_DEPTH,
                    MAX_NARRATIVE_DEPTH,
                    "Level of detail in backstory",
                )
                .optional(),
                InputSpec::text("dialogue_style", "casual", "Style of the character's dialogue").optional(),
                InputSpec::text("model_name", "", "Gemini model, overrides config.json").optional(),
                InputSpec::multiline("custom_prompt", "Optional custom prompt template").optional(),
            ],
            outputs: vec![
                OutputSpec::new("backstory", OutputKind::String),
                OutputSpec::new("dialogue_lines", OutputKind::StringList),
            ],
        }
    }

    async fn invoke(
        &self,
        inputs: &NodeInputs,
        config: &GenerationConfig,
        connector: &dyn LlmConnector,
    ) -> Result<NodeOutputs, NodeError> {
        let overrides = ConfigOverrides {
            api_key: read_string(inputs, "api_key")?,
            model_name: read_string(inputs, "model_name")?,
            narrative_depth: read_int(inputs, "narrative_depth")?,
            dialogue_style: read_string(inputs, "dialogue_style")?,
        };

        let gender = match read_string(inputs, "character_gender")? {
            Some(g) if !g.trim().is_empty() => g.parse()?,
            _ => Gender::default(),
        };
        let request = BackstoryRequest {
            gender,
            role: require_string(inputs, "character_role")?,
            traits: split_traits(&require_string(inputs, "personality_traits")?),
            environment: require_string(inputs, "environment")?,
            narrative_depth: None,
            dialogue_style: None,
            custom_prompt: read_string(inputs, "custom_prompt")?,
        };

        let effective = config.resolve(&overrides)?;
        let llm = connector.connect(&effective).map_err(NodeError::api)?;
        let result = backstory::generate(&request, &effective, llm.as_ref()).await?;

        let mut outputs = NodeOutputs::default();
        outputs.push("backstory", OutputValue::Text(result.backstory));
        outputs.push("dialogue_lines", OutputValue::List(result.dialogue_lines));
        Ok(outputs)
    }
}
