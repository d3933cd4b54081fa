//! Recognition service configuration.

/// Default endpoint for OpenAI-compatible APIs.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default vision-capable model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Connection settings for the recognition service.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// API key sent as a bearer token.
    pub api_key: String,

    /// Base URL of the OpenAI-compatible API (without `/chat/completions`).
    pub base_url: String,

    /// Model name.
    pub model: String,

    /// Completion token cap per request.
    pub max_tokens: u32,

    /// Sampling temperature; kept low so the JSON stays stable.
    pub temperature: f32,

    /// Upper bound on a single HTTP exchange (seconds).
    pub request_timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1000,
            temperature: 0.1,
            request_timeout_secs: 120,
        }
    }
}

impl VisionConfig {
    /// Builder method to set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Builder method to set the base URL. An empty value keeps the default.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if !base_url.is_empty() {
            self.base_url = base_url;
        }
        self
    }

    /// Builder method to set the model. An empty value keeps the default.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.is_empty() {
            self.model = model;
        }
        self
    }
}
