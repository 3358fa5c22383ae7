use crate::backends::openai::OpenAiBackend;
use crate::backends::LlmBackend;
use crate::config::ModelConfig;
use ragpress_core::{Message, RagpressError, RagpressResult, ToolCall, ToolDefinition};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Response from the LLM: final text or a tool call request.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmResponse {
    /// Text that ended for a reason other than `stop` (e.g. `length`).
    Text(String),
    /// The model wants tools run before it answers.
    ToolUse {
        /// Text sent alongside the calls, if any.
        content: Option<String>,
        /// Calls to run, in the order the model listed them.
        tool_calls: Vec<ToolCall>,
    },
    /// A complete answer (`finish_reason` was `stop`).
    Done(String),
}

impl LlmResponse {
    /// The text of a final answer, or `None` for a tool call request.
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) | Self::Done(text) => Some(text),
            Self::ToolUse { .. } => None,
        }
    }
}

/// Constrains the shape of the model's reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFormat {
    /// Any valid JSON object.
    JsonObject,
    /// JSON matching `schema`; `strict` asks the API to enforce it.
    JsonSchema {
        /// Schema name reported to the API.
        name: String,
        /// JSON Schema of the expected reply.
        schema: Value,
        /// Ask the API to enforce the schema.
        strict: bool,
    },
}

impl ResponseFormat {
    /// A strict JSON schema format.
    pub fn json_schema(name: impl Into<String>, schema: Value) -> Self {
        Self::JsonSchema {
            name: name.into(),
            schema,
            strict: true,
        }
    }

    /// The `response_format` object of a chat completion request.
    pub fn to_wire(&self) -> Value {
        match self {
            Self::JsonObject => serde_json::json!({ "type": "json_object" }),
            Self::JsonSchema {
                name,
                schema,
                strict,
            } => serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name": name,
                    "schema": schema,
                    "strict": strict,
                }
            }),
        }
    }
}

/// Everything a backend needs for one chat completion call.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Sent as the leading `system` message.
    pub system_prompt: Option<String>,
    /// Conversation so far, oldest first.
    pub messages: Vec<Message>,
    /// Tools the model may call; empty means none are offered.
    pub tools: Vec<ToolDefinition>,
    /// Constrains the reply shape; `None` allows free text.
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    /// A request with one user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(content)],
            ..Self::default()
        }
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Offers `tools` to the model.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Constrains the reply to `format`.
    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }
}

/// LLM client that dispatches to a provider backend.
///
/// Cheap to clone; clones share the backend (and its HTTP connection pool).
#[derive(Clone)]
pub struct LlmClient {
    backend: Arc<dyn LlmBackend>,
}

impl LlmClient {
    /// Client for the OpenAI-compatible provider named in `config`.
    pub fn new(config: ModelConfig) -> RagpressResult<Self> {
        Ok(Self {
            backend: Arc::new(OpenAiBackend::new(config)?),
        })
    }

    /// Create from a pre-built backend (for custom providers and tests).
    pub fn from_backend(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    /// One chat completion call.
    pub async fn chat(&self, request: &ChatRequest) -> RagpressResult<LlmResponse> {
        self.backend.chat(request).await
    }

    /// Single-turn completion returning the reply text.
    pub async fn complete(&self, system_prompt: Option<&str>, user: &str) -> RagpressResult<String> {
        let mut request = ChatRequest::user(user);
        request.system_prompt = system_prompt.map(str::to_string);
        self.chat(&request)
            .await?
            .into_text()
            .ok_or_else(|| RagpressError::Parse("expected a text reply, got tool calls".into()))
    }

    /// Chat completion whose reply is decoded into `T`.
    ///
    /// `request.response_format` should describe `T`; a reply that does not
    /// decode is a [`RagpressError::Parse`].
    pub async fn chat_structured<T: DeserializeOwned>(
        &self,
        request: &ChatRequest,
    ) -> RagpressResult<T> {
        let text = self
            .chat(request)
            .await?
            .into_text()
            .ok_or_else(|| RagpressError::Parse("expected a JSON reply, got tool calls".into()))?;
        serde_json::from_str(text.trim()).map_err(|e| {
            RagpressError::Parse(format!("structured reply did not match the schema: {e}"))
        })
    }
}
