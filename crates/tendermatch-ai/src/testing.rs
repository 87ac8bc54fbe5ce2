//! Scripted providers for unit tests.

use std::future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::provider::{GenerateRequest, GeneratedText, GenerationProvider, ProviderError};

/// Answers each call with `respond(call_index, request)` and records when it was dispatched.
pub struct FnProvider<F> {
    respond: F,
    calls: AtomicUsize,
    dispatched: Mutex<Vec<Instant>>,
}

impl<F> FnProvider<F>
where
    F: Fn(usize, &GenerateRequest) -> Result<GeneratedText, ProviderError> + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            calls: AtomicUsize::new(0),
            dispatched: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn dispatch_times(&self) -> Vec<Instant> {
        self.dispatched.lock().unwrap().clone()
    }
}

#[async_trait]
impl<F> GenerationProvider for FnProvider<F>
where
    F: Fn(usize, &GenerateRequest) -> Result<GeneratedText, ProviderError> + Send + Sync,
{
    async fn generate(&self, request: &GenerateRequest) -> Result<GeneratedText, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.dispatched.lock().unwrap().push(Instant::now());
        (self.respond)(n, request)
    }
}

/// Never answers.
pub struct HangingProvider;

#[async_trait]
impl GenerationProvider for HangingProvider {
    async fn generate(&self, _request: &GenerateRequest) -> Result<GeneratedText, ProviderError> {
        future::pending().await
    }
}

pub fn text(body: &str) -> Result<GeneratedText, ProviderError> {
    Ok(GeneratedText {
        text: body.to_string(),
        input_tokens: 10,
        output_tokens: 20,
    })
}

pub fn throttled() -> Result<GeneratedText, ProviderError> {
    Err(ProviderError::RateLimited {
        status: 429,
        message: "rate_limit_error: too many tokens".into(),
    })
}

pub fn server_error() -> Result<GeneratedText, ProviderError> {
    Err(ProviderError::Api {
        status: 500,
        message: "overloaded".into(),
    })
}
