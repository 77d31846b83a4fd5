use async_trait::async_trait;

use crate::core::config::{ConfigOverrides, GenerationConfig};
use crate::core::error::NodeError;
use crate::nodes::{
    read_string, require_string, InputSpec, Node, NodeDescriptor, NodeInputs, NodeOutputs,
    OutputKind, OutputSpec, OutputValue,
};
use crate::services::llm::LlmConnector;
use crate::services::prompt_converter::{self, ArtStyle, PromptConversionRequest};

/// Turns a backstory into a Stable Diffusion positive/negative prompt pair.
pub struct BackstoryToPromptNode;

impl BackstoryToPromptNode {
    pub const NAME: &'static str = "BackstoryToPromptNode";
}

#[async_trait]
impl Node for BackstoryToPromptNode {
    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor {
            name: Self::NAME,
            display_name: "Backstory to Prompt (Gemini)",
            category: "Character Generator",
            inputs: vec![
                InputSpec::multiline("backstory", "Character backstory to illustrate"),
                InputSpec::choice("art_style", &ArtStyle::CHOICES, "realistic", "Art style of the portrait"),
                InputSpec::text("gemini_api_key", "", "Optional: override the API key from config.json")
                    .optional(),
                InputSpec::text("model_name", "", "Gemini model, overrides config.json").optional(),
            ],
            outputs: vec![
                OutputSpec::new("positive_prompt", OutputKind::String),
                OutputSpec::new("negative_prompt", OutputKind::String),
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
            api_key: read_string(inputs, "gemini_api_key")?,
            model_name: read_string(inputs, "model_name")?,
            ..Default::default()
        };
        let request = PromptConversionRequest {
            backstory: require_string(inputs, "backstory")?,
            art_style: require_string(inputs, "art_style")?,
        };

        let effective = config.resolve(&overrides)?;
        let llm = connector.connect(&effective).map_err(NodeError::api)?;
        let result = prompt_converter::convert(&request, llm.as_ref()).await?;

        let mut outputs = NodeOutputs::default();
        outputs.push("positive_prompt", OutputValue::Text(result.positive_prompt));
        outputs.push("negative_prompt", OutputValue::Text(result.negative_prompt));
        Ok(outputs)
    }
}
