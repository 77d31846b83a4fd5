use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::core::config::EffectiveConfig;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Builds a client for one call's effective config.
pub trait LlmConnector: Send + Sync {
    fn connect(&self, config: &EffectiveConfig) -> Result<Box<dyn LlmClient>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GeminiConnector;

impl LlmConnector for GeminiConnector {
    fn connect(&self, config: &EffectiveConfig) -> Result<Box<dyn LlmClient>> {
        Ok(Box::new(GeminiClient::new(&config.api_key, &config.model_name)))
    }
}

// --- Gemini ---

pub struct GeminiClient {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

/// Body of a single-turn `generateContent` call.
#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: [PromptTurn<'a>; 1],
}

#[derive(Serialize)]
struct PromptTurn<'a> {
    role: &'static str,
    parts: [TextPart<'a>; 1],
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

impl<'a> GenerateContentRequest<'a> {
    fn user(prompt: &'a str) -> Self {
        Self {
            contents: [PromptTurn {
                role: "user",
                parts: [TextPart { text: prompt }],
            }],
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl Candidate {
    fn text(&self) -> String {
        self.content
            .iter()
            .flat_map(|c| c.parts.iter())
            .map(|p| p.text.as_str())
            .collect()
    }
}

/// Pulls the reply text out of a `generateContent` body. Only the first candidate is read.
fn extract_text(body: &str) -> Result<String> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| anyhow!("unreadable generateContent body ({}): {}", e, body))?;

    if let Some(err) = response.error {
        return Err(anyhow!("model rejected the request: {}", err.message));
    }

    let candidate = response
        .candidates
        .first()
        .ok_or_else(|| anyhow!("model returned no candidates: {}", body))?;

    let text = candidate.text();
    if text.is_empty() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("UNKNOWN");
        return Err(anyhow!("model returned no text (finish reason {})", reason));
    }
    Ok(text)
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            GEMINI_API_BASE, self.model, self.api_key
        );

        let request_body = GenerateContentRequest::user(prompt);

        debug!("Sending {} prompt chars to {}", prompt.len(), self.model);
        // without_url keeps the key out of transport error messages
        let resp = self
            .client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| anyhow!("request to {} failed: {}", self.model, e.without_url()))?;

        let status = resp.status();
        let response_text = resp
            .text()
            .await
            .map_err(|e| anyhow!("reading reply from {} failed: {}", self.model, e.without_url()))?;

        if !status.is_success() {
            return Err(anyhow!("{} answered {}: {}", self.model, status, response_text));
        }

        let text = extract_text(&response_text)?;
        debug!("Gemini returned {} chars", text.len());
        Ok(text)
    }
}
