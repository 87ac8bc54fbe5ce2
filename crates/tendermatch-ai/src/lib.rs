//! Generation layer: provider contract, Anthropic client, rate-limited gateway, report assembly.

pub mod assess;
pub mod budget;
pub mod client;
pub mod gateway;
pub mod provider;
pub mod window;

#[cfg(test)]
mod testing;

pub use assess::{AssessmentResponse, Assessor, GenerationSettings};
pub use client::{AnthropicClient, ClientConfig};
pub use gateway::{Gateway, GatewayConfig, GatewayError};
pub use provider::{GenerateRequest, GeneratedText, GenerationProvider, ProviderError};
