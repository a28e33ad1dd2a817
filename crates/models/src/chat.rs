use crate::pagination::{Cursor, Keyed};
use crate::scorecard::Scorecard;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Conversation mode. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    /// Free-form guidance
    Coach,
    /// Structured scoring
    Review,
}

impl ChatMode {
    pub const ALL: [ChatMode; 2] = [ChatMode::Coach, ChatMode::Review];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coach => "coach",
            Self::Review => "review",
        }
    }
}

impl std::fmt::Display for ChatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatSession {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub owner_subject: String,
    pub mode: ChatMode,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Keyed for ChatSession {
    fn cursor(&self) -> Cursor {
        Cursor::new(self.created_at, self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
}

impl Keyed for ChatMessage {
    fn cursor(&self) -> Cursor {
        Cursor::new(self.created_at, self.id)
    }
}

#[derive(Debug, Clone)]
pub struct NewChatSession {
    pub organization_id: Uuid,
    pub owner_subject: String,
    pub mode: ChatMode,
    pub title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub session_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
    pub correlation_id: String,
}

/// Session a completed exchange is written to
#[derive(Debug, Clone)]
pub enum ExchangeSession {
    Existing { id: Uuid, owner_subject: String },
    New(NewChatSession),
}

/// One completed turn: the caller's message and the assistant's reply
#[derive(Debug, Clone)]
pub struct NewChatExchange {
    pub session: ExchangeSession,
    pub user_content: String,
    pub reply_content: String,
    pub usage: TokenUsage,
    pub correlation_id: String,
}

// ============================================================================
// REQUESTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SendMessageRequest {
    pub mode: ChatMode,

    #[validate(length(min = 1))]
    pub message: String,

    pub session_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RenameSessionRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
}

/// Default title: the first `max_chars` characters of the opening message
pub fn derive_title(message: &str, max_chars: usize) -> String {
    let line = message.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let trimmed = line.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut title: String = trimmed.chars().take(max_chars).collect();
    title.push('…');
    title
}

// ============================================================================
// RESPONSES
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
}

/// Mode-dependent payload of a chat reply
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatOutcome {
    Coach { reply: String },
    Scored { scorecard: Scorecard },
    /// Review output that failed the shape check; surfaced raw
    Unscored { raw: String, error: String },
}

impl ChatOutcome {
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Unscored { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub ok: bool,
    pub mode: ChatMode,
    pub session_id: Uuid,
    pub message_id: Uuid,
    #[serde(flatten)]
    pub outcome: ChatOutcome,
    pub usage: TokenUsage,
    pub balance: i64,
}

impl ChatResponse {
    pub fn new(
        mode: ChatMode,
        session_id: Uuid,
        message_id: Uuid,
        outcome: ChatOutcome,
        usage: TokenUsage,
        balance: i64,
    ) -> Self {
        Self {
            ok: outcome.is_ok(),
            mode,
            session_id,
            message_id,
            outcome,
            usage,
            balance,
        }
    }
}
