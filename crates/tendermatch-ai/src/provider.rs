//! The single request/response contract with the external generation service.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// One generation call: instruction, user content, and sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub system: String,
    pub content: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedText {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("rate limited ({status}): {message}")]
    RateLimited { status: u16, message: String },
    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to parse provider response: {0}")]
    Parse(String),
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    /// Transient throttling that is worth retrying after a backoff.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Api { status, message } => {
                *status == 429 || message.to_ascii_lowercase().contains("rate limit")
            }
            _ => false,
        }
    }
}

/// Anything that can turn a [`GenerateRequest`] into text.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<GeneratedText, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_detection() {
        let throttled = ProviderError::RateLimited {
            status: 429,
            message: "slow down".into(),
        };
        assert!(throttled.is_rate_limit());

        let by_message = ProviderError::Api {
            status: 400,
            message: "Rate limit exceeded for organization".into(),
        };
        assert!(by_message.is_rate_limit());

        let server = ProviderError::Api {
            status: 500,
            message: "internal error".into(),
        };
        assert!(!server.is_rate_limit());
        assert!(!ProviderError::Parse("bad".into()).is_rate_limit());
        assert!(!ProviderError::Timeout(Duration::from_secs(1)).is_rate_limit());
    }
}
