//! OpenAI-compatible chat completions client.

use serde::{Deserialize, Serialize};

use super::{CompletionRequest, LanguageModel, LlmError};
use crate::config::ModelConfig;

/// Blocking client for `POST {base_url}/chat/completions`.
pub struct OpenAiCompatible {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiCompatible {
    pub fn new(config: &ModelConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey(config.base_url.clone()));
        }

        // Non-2xx answers are read below so the provider's message reaches the logs.
        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout)
            .build();

        Ok(Self {
            agent: ureq::Agent::new_with_config(agent_config),
            endpoint: chat_endpoint(&config.base_url),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    /// Returns the model name
    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request<'a>(&'a self, request: &'a CompletionRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.params.temperature,
            top_p: request.params.top_p,
            max_tokens: request.params.max_tokens,
        }
    }
}

impl LanguageModel for OpenAiCompatible {
    fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        log::info!("Requesting completion from {} ({})", self.endpoint, self.model);

        let mut response = self
            .agent
            .post(self.endpoint.as_str())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send_json(self.build_request(request))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .body_mut()
                .read_to_string()
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.body_mut().read_json()?;
        let content = first_content(parsed)?;
        log::info!("Completion received ({} bytes)", content.len());
        Ok(content)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

fn chat_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn first_content(response: ChatResponse) -> Result<String, LlmError> {
    let choice = response.choices.into_iter().next().ok_or(LlmError::NoChoices)?;
    Ok(choice.message.content.unwrap_or_default())
}
