use crate::error::LlmError;
use async_trait::async_trait;
use coachdesk_models::TokenUsage;
use serde::{Deserialize, Serialize};

/// A prompt message sent to the completion API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    /// "system", "user" or "assistant"
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<PromptMessage>,
    /// Ask the API for a JSON object instead of free text
    pub json_output: bool,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
    pub model: String,
}

/// Seam between the chat handlers and the hosted completion API
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError>;

    fn name(&self) -> &str;
}
