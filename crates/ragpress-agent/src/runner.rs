use crate::llm::{ChatRequest, LlmClient, LlmResponse};
use crate::tools::ToolRegistry;
use ragpress_core::{Message, RagpressError, RagpressResult};
use std::sync::Arc;
use tracing::{error, info, warn};

/// System prompt for tool-assisted chat.
pub const DEFAULT_CHAT_PROMPT: &str = "You are a helpful assistant for a WordPress site. \
Use the search_posts tool to look up the site's posts before answering questions about its content, \
and mention the titles of the posts you relied on.";

/// The tool-calling loop.
/// Prompt → LLM → tool calls → execute → backfill results → repeat.
pub struct ToolRunner {
    llm: LlmClient,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    max_turns: u32,
}

impl ToolRunner {
    /// `max_turns` below 1 is raised to 1.
    pub fn new(llm: LlmClient, tools: Arc<ToolRegistry>, max_turns: u32) -> Self {
        Self {
            llm,
            tools,
            system_prompt: DEFAULT_CHAT_PROMPT.to_string(),
            max_turns: max_turns.max(1),
        }
    }

    /// Replaces [`DEFAULT_CHAT_PROMPT`].
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Runs the loop for one user prompt and returns the final assistant text.
    ///
    /// Fails with [`RagpressError::ToolLoop`] when the model is still calling
    /// tools after `max_turns` model calls.
    pub async fn run(&self, user_input: &str) -> RagpressResult<String> {
        let mut messages = vec![Message::user(user_input)];
        let tool_definitions = self.tools.definitions();

        info!(tools = tool_definitions.len(), "Starting tool loop");

        for turn in 0..self.max_turns {
            let request = ChatRequest {
                system_prompt: Some(self.system_prompt.clone()),
                messages: messages.clone(),
                tools: tool_definitions.clone(),
                response_format: None,
            };

            match self.llm.chat(&request).await? {
                LlmResponse::Done(text) => {
                    info!(turns = turn + 1, "Tool loop completed");
                    return Ok(text);
                }

                LlmResponse::Text(text) => {
                    warn!(turns = turn + 1, "Reply was cut short by the model");
                    return Ok(text);
                }

                LlmResponse::ToolUse {
                    content,
                    tool_calls,
                } => {
                    messages.push(Message::assistant_tool_calls(
                        content.unwrap_or_default(),
                        tool_calls.clone(),
                    ));

                    for call in &tool_calls {
                        info!(turn, tool = %call.name, call_id = %call.id, "Executing tool call");
                        let result = self.tools.execute(call).await;
                        messages.push(Message::tool(result.call_id, result.content));
                    }
                }
            }
        }

        error!(max_turns = self.max_turns, "Tool loop exceeded max turns");
        Err(RagpressError::ToolLoop(format!(
            "no final answer after {} turns",
            self.max_turns
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backends::LlmBackend;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use ragpress_core::{Role, ToolCall, ToolDefinition};
    use serde_json::Value;

    /// Replays scripted responses and records every request.
    struct Scripted {
        responses: Mutex<Vec<LlmResponse>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl Scripted {
        fn new(mut responses: Vec<LlmResponse>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmBackend for Scripted {
        async fn chat(&self, request: &ChatRequest) -> RagpressResult<LlmResponse> {
            self.requests.lock().push(request.clone());
            self.responses
                .lock()
                .pop()
                .ok_or_else(|| RagpressError::Parse("script exhausted".into()))
        }
    }

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "upper".into(),
                description: "Uppercase text".into(),
                parameters: serde_json::json!({"type": "object"}),
            }
        }

        async fn call(&self, arguments: Value) -> RagpressResult<String> {
            Ok(arguments["text"].as_str().unwrap_or_default().to_uppercase())
        }
    }

    fn tool_use(text: &str) -> LlmResponse {
        LlmResponse::ToolUse {
            content: None,
            tool_calls: vec![ToolCall {
                id: "call_1".into(),
                name: "upper".into(),
                arguments: serde_json::json!({ "text": text }),
            }],
        }
    }

    fn runner(backend: Arc<Scripted>, max_turns: u32) -> ToolRunner {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(Upper));
        ToolRunner::new(LlmClient::from_backend(backend), Arc::new(tools), max_turns)
    }

    #[tokio::test]
    async fn test_tool_result_is_backfilled() {
        let backend = Scripted::new(vec![tool_use("hi"), LlmResponse::Done("done".into())]);
        let answer = runner(backend.clone(), 5).run("shout hi").await.unwrap();
        assert_eq!(answer, "done");

        let requests = backend.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools[0].name, "upper");
        let second = &requests[1].messages;
        assert_eq!(second.len(), 3);
        assert_eq!(second[1].tool_calls[0].id, "call_1");
        assert_eq!(second[2].role, Role::Tool);
        assert_eq!(second[2].content, "HI");
        assert_eq!(second[2].tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn test_max_turns_exceeded() {
        let backend = Scripted::new(vec![tool_use("a"), tool_use("b"), tool_use("c")]);
        let err = runner(backend.clone(), 2).run("loop").await.unwrap_err();
        assert!(matches!(err, RagpressError::ToolLoop(_)));
        assert_eq!(backend.requests.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_truncated_reply_is_returned() {
        let backend = Scripted::new(vec![LlmResponse::Text("partial".into())]);
        let answer = runner(backend, 3).run("x").await.unwrap();
        assert_eq!(answer, "partial");
    }
}
