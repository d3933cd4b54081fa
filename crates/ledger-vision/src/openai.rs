//! Recognizer backed by an OpenAI-compatible chat-completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ledger_core::RecognitionResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::VisionConfig;
use crate::error::VisionError;
use crate::parse::parse_recognition;
use crate::recognizer::Recognizer;

/// Recognizer that sends the image as a base64 data URL to a vision model.
#[derive(Debug, Clone)]
pub struct OpenAiRecognizer {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiRecognizer {
    /// Create a new recognizer from configuration.
    pub fn new(config: &VisionConfig) -> Result<Self, VisionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// The full URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request<'a>(&'a self, image: &[u8], mime_type: &str, prompt: &'a str) -> ChatRequest<'a> {
        let url = format!("data:{};base64,{}", mime_type, STANDARD.encode(image));
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: prompt },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url, detail: "high" },
                    },
                ],
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl Recognizer for OpenAiRecognizer {
    async fn recognize(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<RecognitionResult, VisionError> {
        debug!(
            model = %self.model,
            mime_type = %mime_type,
            image_bytes = image.len(),
            prompt_len = prompt.len(),
            "Sending recognition request"
        );

        let request = self.build_request(image, mime_type, prompt);
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body_len = body.len(), "Recognition service rejected request");
            return Err(VisionError::Api {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let completion: ChatResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(VisionError::EmptyResponse)?;

        parse_recognition(&content)
    }
}

/// Error bodies end up in per-image failure reasons; keep them short.
const MAX_ERROR_BODY_CHARS: usize = 200;

fn truncate_body(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
