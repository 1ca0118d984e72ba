use crate::error::LlmError;
use log::warn;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

/// One role-tagged message of a chat request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// What a generation backend hands back for one request.
///
/// Reasoning-capable providers return their chain of thought in a separate
/// `reasoning_content` field; both strings are empty when the transport failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatReply {
    pub content: String,
    pub reasoning: String,
}

/// The text-generation capability the agents talk to.
///
/// A request-time failure degrades to an empty [`ChatReply`]; the caller's
/// retry loop treats that like any other contract violation. Only failures
/// that make the backend unusable surface as [`LlmError`].
pub trait ChatBackend {
    fn chat(
        &self,
        messages: &[ChatMessage],
        model: &str,
    ) -> impl Future<Output = Result<ChatReply, LlmError>>;
}

impl<B: ChatBackend> ChatBackend for &B {
    async fn chat(&self, messages: &[ChatMessage], model: &str) -> Result<ChatReply, LlmError> {
        (**self).chat(messages, model).await
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
}

impl LlmClient {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| LlmError::Transport(format!("unusable api key: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| LlmError::Transport(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl ChatBackend for LlmClient {
    async fn chat(&self, messages: &[ChatMessage], model: &str) -> Result<ChatReply, LlmError> {
        let request = ChatCompletionRequest {
            model,
            messages,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!("LLM request to {} failed: {}", model, e);
                return Ok(ChatReply::default());
            }
        };

        match response.json::<ChatCompletionResponse>().await {
            Ok(body) => {
                let reply = body
                    .choices
                    .into_iter()
                    .next()
                    .map(|choice| ChatReply {
                        content: choice.message.content.unwrap_or_default(),
                        reasoning: choice.message.reasoning_content.unwrap_or_default(),
                    })
                    .unwrap_or_default();
                Ok(reply)
            }
            Err(e) => {
                warn!("LLM response from {} could not be decoded: {}", model, e);
                Ok(ChatReply::default())
            }
        }
    }
}
