use async_trait::async_trait;
use ragpress_core::{Query, RagpressError, RagpressResult, ToolCall, ToolDefinition, ToolResult};
use ragpress_memory::Retriever;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// A function the model may call during a [`crate::ToolRunner`] loop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and JSON Schema of the arguments, as sent to the model.
    fn definition(&self) -> ToolDefinition;

    /// Runs the tool; the returned string is handed back to the model.
    async fn call(&self, arguments: Value) -> RagpressResult<String>;
}

/// Ordered set of tools, unique by name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        self.tools.retain(|t| t.definition().name != name);
        self.tools.push(tool);
    }

    /// Definitions sent to the model, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// True when no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Executes a model-requested call. Failures, including unknown tools,
    /// come back as an error result for the model to read.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.tools.iter().find(|t| t.definition().name == call.name) else {
            warn!(tool = %call.name, "model requested an unknown tool");
            return ToolResult::error(&call.id, format!("Unknown tool: {}", call.name));
        };

        match tool.call(call.arguments.clone()).await {
            Ok(content) => ToolResult::success(&call.id, content),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool call failed");
                ToolResult::error(&call.id, e.user_message())
            }
        }
    }
}

/// Full-text and semantic search over the synced posts.
pub struct SearchPostsTool {
    retriever: Arc<Retriever>,
}

#[derive(Debug, Deserialize)]
struct SearchPostsArgs {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SearchPostsHit<'a> {
    id: u64,
    title: &'a str,
    excerpt: &'a str,
    score: f32,
}

impl SearchPostsTool {
    /// Tool name the model calls.
    pub const NAME: &'static str = "search_posts";

    /// Searches through `retriever` with its configured mode.
    pub fn new(retriever: Arc<Retriever>) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Tool for SearchPostsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Search the site's published posts. Returns matching posts with id, title and excerpt.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Keywords or a question to search for"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of posts to return (1-20)",
                        "minimum": 1,
                        "maximum": 20
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, arguments: Value) -> RagpressResult<String> {
        let args: SearchPostsArgs = serde_json::from_value(arguments).map_err(|e| {
            RagpressError::InvalidInput(format!("search_posts arguments: {e}"))
        })?;
        let query = Query::new(args.query, args.limit.unwrap_or(Query::DEFAULT_LIMIT));
        let retrieval = self.retriever.retrieve(&query).await?;
        info!(
            query = %query.text,
            hits = retrieval.results.len(),
            vector_used = retrieval.vector_used,
            "search_posts"
        );

        let hits: Vec<SearchPostsHit<'_>> = retrieval
            .results
            .iter()
            .map(|r| SearchPostsHit {
                id: r.document_id,
                title: &r.title,
                excerpt: &r.excerpt,
                score: r.score,
            })
            .collect();
        Ok(serde_json::to_string(&hits)?)
    }
}
