//! Completion API access for Coachdesk.
//!
//! [`CompletionClient`] is the seam the chat handlers call through;
//! [`OpenAiClient`] talks to any OpenAI-compatible endpoint and
//! [`MockCompletionClient`] serves local development and tests. The
//! [`prompt`] and [`review`] modules hold the per-mode behaviour.

pub mod client;
pub mod config;
pub mod error;
pub mod mock;
pub mod openai;
pub mod prompt;
pub mod review;

pub use client::{Completion, CompletionClient, CompletionRequest, PromptMessage};
pub use config::{LlmConfig, Provider};
pub use error::LlmError;
pub use mock::{MockCompletionClient, MockReply};
pub use openai::OpenAiClient;
pub use prompt::{build_messages, system_prompt};
pub use review::parse_scorecard;

use std::sync::Arc;

/// Build the client selected by `config.provider`
pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn CompletionClient>, LlmError> {
    match config.provider {
        Provider::OpenAi => Ok(Arc::new(OpenAiClient::new(config.clone())?)),
        Provider::Mock => Ok(Arc::new(MockCompletionClient::new())),
    }
}
