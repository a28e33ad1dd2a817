use coachdesk_auth::BillingConfig;
use coachdesk_cache::CacheConfig;
use coachdesk_database::DatabaseConfig;
use coachdesk_llm::LlmConfig;
use coachdesk_models::ChatMode;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub body_limit_bytes: usize,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub llm: LlmConfig,
    pub billing: BillingConfig,
    pub chat: ChatConfig,
    pub rate_limit: RateLimitConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_env("SERVER_PORT", 3000),
            body_limit_bytes: parse_env("SERVER_BODY_LIMIT_BYTES", 256 * 1024),
            database: DatabaseConfig::from_env(),
            cache: CacheConfig::from_env(),
            llm: LlmConfig::from_env()?,
            billing: BillingConfig::from_env(),
            chat: ChatConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Prior messages replayed to the model
    pub max_history_messages: i64,
    pub max_message_chars: usize,
    pub coach_cost: i64,
    pub review_cost: i64,
    pub title_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_history_messages: 12,
            max_message_chars: 8000,
            coach_cost: 1,
            review_cost: 2,
            title_chars: 60,
        }
    }
}

impl ChatConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_history_messages: parse_env("CHAT_MAX_HISTORY_MESSAGES", defaults.max_history_messages)
                .max(0),
            max_message_chars: parse_env("CHAT_MAX_MESSAGE_CHARS", defaults.max_message_chars),
            coach_cost: parse_env("CHAT_COACH_COST", defaults.coach_cost).max(1),
            review_cost: parse_env("CHAT_REVIEW_COST", defaults.review_cost).max(1),
            title_chars: defaults.title_chars,
        }
    }

    pub fn cost(&self, mode: ChatMode) -> i64 {
        match mode {
            ChatMode::Coach => self.coach_cost,
            ChatMode::Review => self.review_cost,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 20,
            window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_requests: parse_env("RATE_LIMIT_MAX_REQUESTS", defaults.max_requests).max(1),
            window_secs: parse_env("RATE_LIMIT_WINDOW_SECS", defaults.window_secs).max(1),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_per_mode() {
        let chat = ChatConfig::default();
        assert_eq!(chat.cost(ChatMode::Coach), 1);
        assert_eq!(chat.cost(ChatMode::Review), 2);
    }
}
