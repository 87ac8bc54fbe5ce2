//! The Generation Gateway: the single chokepoint for outbound generation calls.
//!
//! Every call is estimated, paced against a minimum spacing, admitted against
//! a sliding per-minute token window, and retried with exponential backoff
//! while the provider reports throttling. Admission runs under one async
//! mutex, so check-then-record is atomic and concurrent callers are served in
//! arrival order.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tracing::{debug, info, warn};

use crate::budget::estimate_cost;
use crate::provider::{GenerateRequest, GeneratedText, GenerationProvider, ProviderError};
use crate::window::{Admission, TokenWindow};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Token budget per sliding window.
    pub tokens_per_minute: u64,
    pub window: Duration,
    /// Minimum gap between two dispatches, retries included.
    pub min_interval: Duration,
    /// Retries after the first attempt, rate-limit errors only.
    pub max_retries: u32,
    /// First backoff delay; doubles on each retry.
    pub backoff_base: Duration,
    pub chars_per_token: u64,
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            tokens_per_minute: 40_000,
            window: Duration::from_secs(60),
            min_interval: Duration::from_millis(1500),
            max_retries: 3,
            backoff_base: Duration::from_secs(2),
            chars_per_token: 4,
            request_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(
        "estimated cost of {estimated} tokens exceeds the budget of {budget} tokens per window; split the input"
    )]
    BudgetExceeded { estimated: u64, budget: u64 },
    #[error("generation failed after {attempts} attempt(s): {source}")]
    Upstream {
        attempts: u32,
        #[source]
        source: ProviderError,
    },
}

#[derive(Debug)]
struct RateState {
    window: TokenWindow,
    last_dispatch: Option<Instant>,
}

pub struct Gateway<P> {
    provider: P,
    config: GatewayConfig,
    state: Mutex<RateState>,
}

impl<P: GenerationProvider> Gateway<P> {
    pub fn new(provider: P, config: GatewayConfig) -> Self {
        let window = TokenWindow::new(config.tokens_per_minute, config.window);
        Self {
            provider,
            config,
            state: Mutex::new(RateState {
                window,
                last_dispatch: None,
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn provider(&self) -> &P {
        &self.provider
    }

    /// Tokens currently recorded in the sliding window.
    pub async fn window_usage(&self) -> u64 {
        let mut state = self.state.lock().await;
        state.window.prune(Instant::now());
        state.window.used()
    }

    pub async fn generate(&self, request: &GenerateRequest) -> Result<GeneratedText, GatewayError> {
        let estimate = estimate_cost(request, self.config.chars_per_token);
        let cost = estimate.total();
        if estimate.suspect_binary {
            warn!(
                bytes = request.content.len(),
                estimated = cost,
                "input looks like an embedded binary payload; token estimate is unreliable"
            );
        }
        if cost > self.config.tokens_per_minute {
            return Err(GatewayError::BudgetExceeded {
                estimated: cost,
                budget: self.config.tokens_per_minute,
            });
        }

        self.admit(cost).await?;

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            info!(attempt, estimated = cost, "dispatching generation request");
            let call = self.provider.generate(request);
            let outcome = match timeout(self.config.request_timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.config.request_timeout)),
            };

            match outcome {
                Ok(generated) => {
                    info!(
                        attempt,
                        input_tokens = generated.input_tokens,
                        output_tokens = generated.output_tokens,
                        "generation complete"
                    );
                    return Ok(generated);
                }
                Err(err) if err.is_rate_limit() && attempt <= self.config.max_retries => {
                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "rate limited; backing off"
                    );
                    sleep(delay).await;
                    self.pace().await;
                }
                Err(source) => {
                    warn!(attempt, error = %source, "generation failed");
                    return Err(GatewayError::Upstream {
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }

    /// Wait for spacing and window room, then record `cost` and the dispatch instant.
    async fn admit(&self, cost: u64) -> Result<(), GatewayError> {
        let mut state = self.state.lock().await;
        loop {
            if let Some(ready) = self.spacing_deadline(&state) {
                let wait = ready.saturating_duration_since(Instant::now());
                debug!(wait_ms = wait.as_millis() as u64, "spacing calls");
                sleep_until(ready).await;
            }

            let now = Instant::now();
            match state.window.try_admit(cost, now) {
                Admission::Admitted => {
                    state.last_dispatch = Some(now);
                    return Ok(());
                }
                Admission::RetryAt(at) => {
                    debug!(
                        used = state.window.used(),
                        estimated = cost,
                        budget = state.window.budget(),
                        wait_ms = at.saturating_duration_since(now).as_millis() as u64,
                        "token window full; waiting"
                    );
                    sleep_until(at).await;
                }
                Admission::TooLarge => {
                    return Err(GatewayError::BudgetExceeded {
                        estimated: cost,
                        budget: state.window.budget(),
                    });
                }
            }
        }
    }

    /// Re-apply minimum spacing before a retry. The window is not charged again.
    async fn pace(&self) {
        let mut state = self.state.lock().await;
        if let Some(ready) = self.spacing_deadline(&state) {
            sleep_until(ready).await;
        }
        state.last_dispatch = Some(Instant::now());
    }

    fn spacing_deadline(&self, state: &RateState) -> Option<Instant> {
        let ready = state.last_dispatch? + self.config.min_interval;
        (ready > Instant::now()).then_some(ready)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.config.backoff_base.saturating_mul(1u32 << exp)
    }
}
