//! Anthropic Messages API client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::provider::{GenerateRequest, GeneratedText, GenerationProvider, ProviderError};

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub model: String,
    pub api_url: String,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

/// HTTP client for the Anthropic Messages API.
///
/// Does no retrying or rate limiting of its own; wrap it in a
/// [`Gateway`](crate::Gateway).
pub struct AnthropicClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl AnthropicClient {
    pub fn new(mut config: ClientConfig) -> Self {
        config.api_url = config.api_url.trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl GenerationProvider for AnthropicClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GeneratedText, ProviderError> {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: request.max_tokens,
            system: (!request.system.is_empty()).then_some(request.system.as_str()),
            messages: vec![Message {
                role: "user",
                content: &request.content,
            }],
            temperature: request.temperature,
        };

        debug!(
            model = %self.config.model,
            max_tokens = request.max_tokens,
            "sending messages request"
        );
        let resp = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &body));
        }

        let text = resp.text().await?;
        parse_response(&text)
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    message: String,
}

/// Concatenate the text blocks of a successful response.
fn parse_response(body: &str) -> Result<GeneratedText, ProviderError> {
    let resp: MessagesResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    let texts: Vec<String> = resp
        .content
        .into_iter()
        .filter(|b| b.block_type == "text")
        .map(|b| b.text)
        .collect();
    if texts.is_empty() {
        return Err(ProviderError::Parse("no text content in response".to_string()));
    }

    Ok(GeneratedText {
        text: texts.join("\n"),
        input_tokens: resp.usage.input_tokens,
        output_tokens: resp.usage.output_tokens,
    })
}

/// Map a non-success status and body onto a [`ProviderError`].
///
/// Throttling is recognised by status 429, an `error.type` of
/// `rate_limit_error`, or a message mentioning a rate limit.
fn classify_error(status: u16, body: &str) -> ProviderError {
    let (error_type, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => (env.error.error_type, env.error.message),
        Err(_) => (String::new(), body.to_string()),
    };

    let throttled = status == 429
        || error_type == "rate_limit_error"
        || message.to_ascii_lowercase().contains("rate limit");

    if throttled {
        ProviderError::RateLimited { status, message }
    } else {
        ProviderError::Api { status, message }
    }
}
