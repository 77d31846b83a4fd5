use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::core::config::EffectiveConfig;
use crate::services::llm::{LlmClient, LlmConnector};

/// Canned-response client that records every prompt it receives.
#[derive(Debug, Clone)]
pub struct MockLlmClient {
    response: std::result::Result<String, String>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl MockLlmClient {
    pub fn replying(text: &str) -> Self {
        Self {
            response: Ok(text.to_string()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.response.clone().map_err(|e| anyhow!(e))
    }
}

/// Hands out clones of one mock and remembers which configs it was asked to connect with.
pub struct MockConnector {
    pub client: MockLlmClient,
    pub connected: Arc<Mutex<Vec<EffectiveConfig>>>,
}

impl MockConnector {
    pub fn new(client: MockLlmClient) -> Self {
        Self {
            client,
            connected: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connected.lock().unwrap().len()
    }
}

impl LlmConnector for MockConnector {
    fn connect(&self, config: &EffectiveConfig) -> Result<Box<dyn LlmClient>> {
        self.connected.lock().unwrap().push(config.clone());
        Ok(Box::new(self.client.clone()))
    }
}

pub fn effective_config() -> EffectiveConfig {
    EffectiveConfig {
        api_key: "test-key".to_string(),
        model_name: "gemini-pro".to_string(),
        narrative_depth: 3,
        dialogue_style: "casual".to_string(),
    }
}
