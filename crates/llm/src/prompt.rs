//! System prompts and message assembly per chat mode.

use crate::client::PromptMessage;
use coachdesk_models::{ChatMessage, ChatMode, MessageRole};

const COACH_PROMPT: &str = "You are a supportive communication coach. \
Give concrete, practical guidance in plain prose. Keep answers focused on \
the user's latest message and refer back to earlier turns when useful.";

const REVIEW_PROMPT: &str = r#"You are a strict reviewer. Score the user's latest submission and reply with a single JSON object and nothing else, using exactly this shape:
{
  "overall_score": <number 0-10>,
  "summary": "<one paragraph>",
  "criteria": [ { "name": "<criterion>", "score": <number 0-10>, "comment": "<short comment>" } ],
  "strengths": ["<strength>"],
  "improvements": ["<improvement>"]
}
Use between one and twenty criteria. Scores are numbers, not strings."#;

pub fn system_prompt(mode: ChatMode) -> &'static str {
    match mode {
        ChatMode::Coach => COACH_PROMPT,
        ChatMode::Review => REVIEW_PROMPT,
    }
}

/// System prompt, then `history` in order, then the new user turn
pub fn build_messages(mode: ChatMode, history: &[ChatMessage], user_text: &str) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(PromptMessage::system(system_prompt(mode)));

    for message in history {
        messages.push(match message.role {
            MessageRole::User => PromptMessage::user(message.content.clone()),
            MessageRole::Assistant => PromptMessage::assistant(message.content.clone()),
        });
    }

    messages.push(PromptMessage::user(user_text));
    messages
}
