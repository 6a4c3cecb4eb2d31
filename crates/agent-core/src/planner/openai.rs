use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Planner, PlannerInput};
use crate::agent_loop::prompt::format_system_prompt;
use crate::errors::AgentError;

/// Settings for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Tried in order; a 429 moves on to the next key.
    pub api_keys: Vec<String>,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub timeout_ms: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            model: "gpt-4o-mini".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            temperature: 0.2,
            timeout_ms: 60_000,
        }
    }
}

pub struct OpenAiPlanner {
    client: Client,
    config: PlannerConfig,
}

impl OpenAiPlanner {
    pub fn new(config: PlannerConfig) -> Result<Self, AgentError> {
        if config.api_keys.is_empty() {
            return Err(AgentError::invalid_request(
                "missing OpenAI API key for planner",
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| {
                AgentError::invalid_request(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }
}

#[async_trait]
impl Planner for OpenAiPlanner {
    async fn decide(&self, input: &PlannerInput) -> Result<String, AgentError> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        let body = ChatCompletionRequest {
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                r#type: "json_object".to_string(),
            },
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: format_system_prompt().to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: input.render(),
                },
            ],
        };

        let mut last_error: Option<AgentError> = None;
        for (index, key) in self.config.api_keys.iter().enumerate() {
            let response = self
                .client
                .post(&url)
                .bearer_auth(key)
                .json(&body)
                .send()
                .await;

            let response = match response {
                Ok(resp) => resp,
                Err(err) => {
                    last_error = Some(AgentError::planner(format!(
                        "openai request failed: {err}"
                    )));
                    continue;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<response unavailable>".to_string());
                if status.as_u16() == 429 && index + 1 < self.config.api_keys.len() {
                    let friendly = openai_rate_limit_message(&text);
                    warn!(
                        target: "openai",
                        message = %friendly,
                        attempt = index + 1,
                        remaining = self.config.api_keys.len() - index - 1,
                        "OpenAI rate limited planner request; switching API key"
                    );
                    last_error = Some(AgentError::planner(friendly));
                    continue;
                }
                return Err(AgentError::planner(format!(
                    "openai returned {status}: {text}"
                )));
            }

            let response: ChatCompletionResponse = response.json().await.map_err(|err| {
                AgentError::planner(format!("openai response invalid: {err}"))
            })?;
            if let Some(usage) = &response.usage {
                debug!(
                    target: "openai",
                    step = input.step,
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "planner call finished"
                );
            }

            return response
                .choices
                .first()
                .and_then(|choice| choice.message.content.as_text())
                .ok_or_else(|| AgentError::planner("openai response missing content"));
        }

        Err(last_error
            .unwrap_or_else(|| AgentError::planner("OpenAI request exhausted all API keys")))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: ChatCompletionContent,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatCompletionContent {
    Text(String),
    Parts(Vec<ChatCompletionPart>),
}

impl ChatCompletionContent {
    fn as_text(&self) -> Option<String> {
        match self {
            ChatCompletionContent::Text(value) => Some(value.clone()),
            ChatCompletionContent::Parts(parts) => {
                let text = parts
                    .iter()
                    .filter_map(|part| part.text.as_ref())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join("\n");
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorEnvelope {
    error: OpenAiErrorMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorMessage {
    message: Option<String>,
}

fn openai_rate_limit_message(raw: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<OpenAiErrorEnvelope>(raw) {
        if let Some(message) = envelope.error.message {
            return format!("OpenAI rate limit exceeded: {}", message.trim());
        }
    }
    "OpenAI rate limit exceeded; retry later or add another API key".to_string()
}
