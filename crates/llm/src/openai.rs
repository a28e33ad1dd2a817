//! Client for OpenAI-compatible chat completion endpoints.

use async_trait::async_trait;
use coachdesk_models::TokenUsage;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{Completion, CompletionClient, CompletionRequest, PromptMessage};
use crate::config::LlmConfig;
use crate::error::LlmError;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

pub struct OpenAiClient {
    client: Client,
    config: LlmConfig,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::Configuration("API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.config.api_url)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: &request.messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            response_format: request.json_output.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            json_output = request.json_output,
            "Sending completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(LlmError::RateLimited);
            }
            let message = serde_json::from_str::<ApiError>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(format!("Failed to parse response: {}", e)))?;

        parse_completion(completion, &self.config.model)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

fn parse_completion(
    completion: ChatCompletionResponse,
    default_model: &str,
) -> Result<Completion, LlmError> {
    let text = completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| LlmError::MalformedResponse("no content in completion".to_string()))?;

    let usage = completion
        .usage
        .map(|u| TokenUsage {
            prompt_tokens: i32::try_from(u.prompt_tokens).unwrap_or(i32::MAX),
            completion_tokens: i32::try_from(u.completion_tokens).unwrap_or(i32::MAX),
        })
        .unwrap_or_default();

    Ok(Completion {
        text,
        usage,
        model: completion.model.unwrap_or_else(|| default_model.to_string()),
    })
}
