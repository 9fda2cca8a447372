//! `papergrid-ai` — blocking chat-completions client for cell extraction.
//!
//! Talks to any OpenAI-compatible endpoint (OpenAI itself, or a local
//! model behind Ollama). The extraction engine only needs raw reply
//! text; all prompt construction and reply parsing live in the engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use papergrid_config::{AiProvider, ResolvedAiConfig};
use papergrid_engine::{Completer, GridError};

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Error from the chat client
#[derive(Debug, Clone)]
pub enum AiError {
    /// Provider not configured or disabled
    NotConfigured(String),
    /// API key missing for a provider that needs one
    MissingKey,
    /// Network error
    Network(String),
    /// API error response
    Api { status: u16, message: String },
    /// Provider returned unexpected format
    InvalidResponse(String),
}

impl std::fmt::Display for AiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiError::NotConfigured(msg) => write!(f, "AI not configured: {}", msg),
            AiError::MissingKey => write!(f, "API key not configured"),
            AiError::Network(msg) => write!(f, "Network error: {}", msg),
            AiError::Api { status, message } => write!(f, "API error ({}): {}", status, message),
            AiError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for AiError {}

// ============================================================================
// OpenAI API types
// ============================================================================

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// Client
// ============================================================================

/// Blocking chat client for one resolved provider configuration.
///
/// Calls are synchronous; the caller decides whether to move them off
/// the main thread.
pub struct ChatClient {
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl ChatClient {
    /// Build a client from resolved configuration.
    ///
    /// Fails early when the provider is disabled or the key is missing,
    /// so extraction runs never start with a config that cannot work.
    pub fn from_config(config: &ResolvedAiConfig) -> Result<Self, AiError> {
        match config.provider {
            AiProvider::None => {
                return Err(AiError::NotConfigured("AI is disabled".to_string()));
            }
            AiProvider::OpenAI | AiProvider::Local => {}
        }

        let api_key = if config.provider.needs_api_key() {
            Some(config.api_key.clone().ok_or(AiError::MissingKey)?)
        } else {
            None
        };

        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| OPENAI_ENDPOINT.to_string());

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            api_key,
        })
    }

    /// Build a client against an explicit endpoint (used in tests and
    /// for nonstandard deployments).
    pub fn with_endpoint(endpoint: &str, model: &str, api_key: Option<&str>) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.map(|k| k.to_string()),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one chat turn and return the raw assistant reply.
    pub fn send(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AiError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AiError::Network(e.to_string()))?;

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            temperature: 0.2, // Low temperature for consistent extraction
            max_tokens: 1024,
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));
        let mut builder = client.post(&url).header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder
            .json(&request)
            .send()
            .map_err(|e| AiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().unwrap_or_default();
            let message = match serde_json::from_str::<ApiError>(&error_text) {
                Ok(parsed) => parsed.error.message,
                Err(_) => error_text,
            };
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .map_err(|e| AiError::InvalidResponse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AiError::InvalidResponse("no choices in response".to_string()))
    }
}

impl Completer for ChatClient {
    /// A malformed provider response maps to a parse error; everything
    /// else (network, API, configuration) is a service error.
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, GridError> {
        self.send(system_prompt, user_prompt).map_err(|e| match e {
            AiError::InvalidResponse(msg) => GridError::Parse(msg),
            other => GridError::Service(other.to_string()),
        })
    }
}
