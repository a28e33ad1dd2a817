use crate::client::{Completion, CompletionClient, CompletionRequest};
use crate::error::LlmError;
use async_trait::async_trait;
use coachdesk_models::TokenUsage;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Scripted reply for [`MockCompletionClient`]
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fail(u16),
}

/// Completion client that replays scripted replies, then echoes.
///
/// Used for local development (`LLM_PROVIDER=mock`) and in tests.
#[derive(Default)]
pub struct MockCompletionClient {
    script: Mutex<VecDeque<MockReply>>,
}

impl MockCompletionClient {
    pub fn new() -> Self {
        Self::with_replies(Vec::new())
    }

    pub fn with_replies(replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
        }
    }

    fn next_reply(&self) -> Option<MockReply> {
        self.script.lock().ok().and_then(|mut s| s.pop_front())
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        let prompt_tokens = request
            .messages
            .iter()
            .map(|m| m.content.split_whitespace().count())
            .sum::<usize>();

        let text = match self.next_reply() {
            Some(MockReply::Text(text)) => text,
            Some(MockReply::Fail(status)) => {
                return Err(LlmError::Api {
                    status,
                    message: "scripted failure".to_string(),
                })
            }
            None => {
                let last = request
                    .messages
                    .last()
                    .map(|m| m.content.as_str())
                    .unwrap_or_default();
                format!("Mock reply to: {}", last)
            }
        };

        Ok(Completion {
            usage: TokenUsage {
                prompt_tokens: prompt_tokens as i32,
                completion_tokens: text.split_whitespace().count() as i32,
            },
            text,
            model: "mock".to_string(),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
