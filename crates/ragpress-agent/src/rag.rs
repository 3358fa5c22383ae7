use crate::llm::{ChatRequest, LlmClient};
use ragpress_core::{Query, RagpressError, RagpressResult, SearchResult};
use ragpress_memory::{ContextBuilder, Retriever};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// System prompt placed before the retrieved context.
pub const DEFAULT_RAG_PROMPT: &str = "You are a helpful assistant for a WordPress site. \
Answer the user's question using only the posts in the context below. \
If the context does not contain the answer, say that you could not find it on the site.";

const NO_CONTEXT: &str = "No relevant posts were found for this question.";

/// An answer together with the posts it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    /// The model's reply.
    pub answer: String,
    /// Retrieved posts, best first.
    pub sources: Vec<SearchResult>,
    /// Whether vector search contributed to `sources`.
    pub vector_used: bool,
}

/// Retrieve → build context → ask the model.
pub struct RagPipeline {
    retriever: Arc<Retriever>,
    llm: LlmClient,
    context: ContextBuilder,
    system_prompt: String,
}

impl RagPipeline {
    /// Pipeline with the default context budget and system prompt.
    pub fn new(retriever: Arc<Retriever>, llm: LlmClient) -> Self {
        Self {
            retriever,
            llm,
            context: ContextBuilder::default(),
            system_prompt: DEFAULT_RAG_PROMPT.to_string(),
        }
    }

    /// Replaces the context budget.
    pub fn with_context_builder(mut self, context: ContextBuilder) -> Self {
        self.context = context;
        self
    }

    /// Replaces [`DEFAULT_RAG_PROMPT`].
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Answers `question` from at most `limit` retrieved posts.
    ///
    /// Retrieval errors (empty corpus, blank question) are returned before
    /// the model is called. When nothing matches, the model is still asked
    /// and told that no posts were found.
    pub async fn answer(&self, question: &str, limit: usize) -> RagpressResult<RagAnswer> {
        let query = Query::new(question, limit);
        let retrieval = self.retriever.retrieve(&query).await?;
        let context = self
            .context
            .build(self.retriever.store().as_ref(), &retrieval.results)
            .await?;

        let context = if context.is_empty() {
            NO_CONTEXT
        } else {
            context.as_str()
        };
        let system_prompt = format!("{}\n\nContext:\n{context}", self.system_prompt);

        let request = ChatRequest::user(question).with_system_prompt(system_prompt);
        let answer = self
            .llm
            .chat(&request)
            .await?
            .into_text()
            .ok_or_else(|| RagpressError::Parse("expected a text answer, got tool calls".into()))?;

        info!(
            sources = retrieval.results.len(),
            vector_used = retrieval.vector_used,
            "RAG answer ready"
        );

        Ok(RagAnswer {
            answer,
            sources: retrieval.results,
            vector_used: retrieval.vector_used,
        })
    }
}
