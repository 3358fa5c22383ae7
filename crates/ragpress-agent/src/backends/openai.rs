use super::wire::{
    ApiErrorEnvelope, ChatCompletionRequest, ChatCompletionResponse, EmbeddingRequest,
    EmbeddingResponse, WireFunction, WireFunctionCall, WireMessage, WireTool, WireToolCall,
};
use super::LlmBackend;
use crate::config::{LlmProvider, ModelConfig};
use crate::llm::{ChatRequest, LlmResponse};
use async_trait::async_trait;
use ragpress_core::{Message, RagpressError, RagpressResult, Role, ToolCall};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// OpenAI-compatible API backend.
///
/// Works with OpenAI, OpenRouter, Groq, and any other provider that
/// implements the chat completions and embeddings endpoints. Requests are
/// sent once; there is no retry.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    /// Builds the HTTP client with the configured timeout.
    pub fn new(config: ModelConfig) -> RagpressResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagpressError::Http(e.to_string()))?;
        Ok(Self { config, http })
    }

    /// The configuration this backend was built with.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Embeds each input, returning vectors in input order.
    pub async fn embed_texts(&self, inputs: &[&str]) -> RagpressResult<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbeddingRequest {
            model: &self.config.embedding_model,
            input: inputs,
        };
        let response: EmbeddingResponse = self.post_json("embeddings", &body).await?;

        let mut data = response.data;
        if data.len() != inputs.len() {
            return Err(RagpressError::Parse(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                data.len()
            )));
        }
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.config.base_url())
    }

    fn add_provider_headers(
        &self,
        request: reqwest::RequestBuilder,
    ) -> RagpressResult<reqwest::RequestBuilder> {
        let mut request = request.header("Content-Type", "application/json");
        if let Some(key) = self.config.require_api_key()? {
            request = request.bearer_auth(key);
        }

        // OpenRouter ranks apps by these
        if matches!(self.config.provider, LlmProvider::OpenRouter) {
            request = request
                .header("HTTP-Referer", "https://github.com/ragpress/ragpress")
                .header("X-Title", "Ragpress");
        }
        Ok(request)
    }

    /// POSTs `body` to `/v1/{path}` and decodes the JSON reply.
    ///
    /// A non-2xx status becomes [`RagpressError::Upstream`] carrying the API's
    /// own error message. A 2xx body that does not decode becomes
    /// [`RagpressError::Parse`], unless it is an error envelope.
    async fn post_json<B, R>(&self, path: &str, body: &B) -> RagpressResult<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path);
        let request = self.add_provider_headers(self.http.post(&url))?;

        let resp = request.json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                RagpressError::Http(format!(
                    "request to {url} timed out after {}s",
                    self.config.timeout_secs
                ))
            } else {
                RagpressError::Http(e.to_string())
            }
        })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| RagpressError::Http(e.to_string()))?;
        debug!(%url, status = status.as_u16(), bytes = text.len(), "API response");

        if !status.is_success() {
            let message = error_message(&text).unwrap_or_else(|| {
                if text.trim().is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                } else {
                    text.clone()
                }
            });
            return Err(RagpressError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| match error_message(&text) {
            Some(message) => RagpressError::Upstream {
                status: status.as_u16(),
                message,
            },
            None => RagpressError::Parse(e.to_string()),
        })
    }

    fn build_request<'a>(&'a self, request: &'a ChatRequest) -> ChatCompletionRequest<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_prompt {
            messages.push(WireMessage {
                role: "system",
                content: Some(system.clone()),
                tool_calls: Vec::new(),
                tool_call_id: None,
            });
        }
        messages.extend(request.messages.iter().map(to_wire_message));

        let tools = request
            .tools
            .iter()
            .map(|t| WireTool {
                kind: "function",
                function: WireFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                },
            })
            .collect();

        ChatCompletionRequest {
            model: &self.config.model_id,
            messages,
            tools,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: request.response_format.as_ref().map(|f| f.to_wire()),
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn chat(&self, request: &ChatRequest) -> RagpressResult<LlmResponse> {
        let body = self.build_request(request);
        let response: ChatCompletionResponse = self.post_json("chat/completions", &body).await?;
        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "chat completion usage"
            );
        }
        parse_chat_response(response)
    }
}

fn to_wire_message(message: &Message) -> WireMessage {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    let tool_calls: Vec<WireToolCall> = message
        .tool_calls
        .iter()
        .map(|c| WireToolCall {
            id: c.id.clone(),
            kind: "function".to_string(),
            function: WireFunctionCall {
                name: c.name.clone(),
                arguments: c.arguments.to_string(),
            },
        })
        .collect();
    // Assistant turns that only call tools carry no content.
    let content = if message.content.is_empty() && !tool_calls.is_empty() {
        None
    } else {
        Some(message.content.clone())
    };
    WireMessage {
        role,
        content,
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
    }
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
}

pub(crate) fn parse_chat_response(response: ChatCompletionResponse) -> RagpressResult<LlmResponse> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| RagpressError::Parse("response contained no choices".into()))?;

    let message = choice.message;
    let content = message.content.or(message.refusal).unwrap_or_default();
    let wire_calls = message.tool_calls.unwrap_or_default();

    if !wire_calls.is_empty() {
        let tool_calls = wire_calls
            .into_iter()
            .map(|call| {
                let arguments = if call.function.arguments.trim().is_empty() {
                    serde_json::Value::Object(serde_json::Map::new())
                } else {
                    serde_json::from_str(&call.function.arguments).map_err(|e| {
                        RagpressError::Parse(format!(
                            "invalid arguments for tool `{}`: {e}",
                            call.function.name
                        ))
                    })?
                };
                Ok(ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments,
                })
            })
            .collect::<RagpressResult<Vec<_>>>()?;

        return Ok(LlmResponse::ToolUse {
            content: if content.is_empty() {
                None
            } else {
                Some(content)
            },
            tool_calls,
        });
    }

    match choice.finish_reason.as_deref() {
        None | Some("stop") => Ok(LlmResponse::Done(content)),
        Some(_) => Ok(LlmResponse::Text(content)),
    }
}
