#![allow(clippy::unwrap_used, clippy::expect_used)]

//! HTTP-level tests of the OpenAI-compatible backend against a mock server.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ragpress_agent::{
    ChatRequest, LlmClient, LlmProvider, LlmResponse, ModelConfig, OpenAiEmbedding,
    ResponseFormat, SearchPostsTool, ToolRegistry, ToolRunner,
};
use ragpress_core::{Document, RagpressError};
use ragpress_memory::{
    sync_documents, EmbeddingProvider, InMemoryDocumentStore, LocalEmbedding, Retriever,
    SearchMode,
};

fn config_for(server: &MockServer) -> ModelConfig {
    let mut config = ModelConfig::openai("gpt-4o-mini", Some("sk-test-key".into()));
    config.api_base_url = Some(server.uri());
    config.embedding_dimension = 3;
    config
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
    })
}

// ---------------------------------------------------------------------------
// Chat completions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chat_sends_bearer_token_and_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test-key"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini", "max_tokens": 1024})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Hello!")))
        .expect(1)
        .mount(&server)
        .await;

    let llm = LlmClient::new(config_for(&server)).unwrap();
    let reply = llm.complete(Some("Be brief."), "Hi").await.unwrap();
    assert_eq!(reply, "Hello!");
}

#[tokio::test]
async fn upstream_error_message_is_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {
                "message": "Incorrect API key provided: sk-test-key.",
                "type": "invalid_request_error",
                "code": "invalid_api_key"
            }
        })))
        .mount(&server)
        .await;

    let llm = LlmClient::new(config_for(&server)).unwrap();
    let err = llm.chat(&ChatRequest::user("Hi")).await.unwrap_err();
    match &err {
        RagpressError::Upstream { status, message } => {
            assert_eq!(*status, 401);
            assert_eq!(message, "Incorrect API key provided: sk-test-key.");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
    assert_eq!(err.user_message(), "Incorrect API key provided: sk-test-key.");
}

#[tokio::test]
async fn server_error_without_envelope_keeps_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad gateway"))
        .mount(&server)
        .await;

    let llm = LlmClient::new(config_for(&server)).unwrap();
    let err = llm.chat(&ChatRequest::user("Hi")).await.unwrap_err();
    assert!(matches!(
        err,
        RagpressError::Upstream { status: 502, ref message } if message == "Bad gateway"
    ));
}

#[tokio::test]
async fn malformed_success_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let llm = LlmClient::new(config_for(&server)).unwrap();
    let err = llm.chat(&ChatRequest::user("Hi")).await.unwrap_err();
    assert!(matches!(err, RagpressError::Parse(_)));
}

#[tokio::test]
async fn missing_api_key_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("unused")))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.api_key = None;
    let llm = LlmClient::new(config).unwrap();
    let err = llm.chat(&ChatRequest::user("Hi")).await.unwrap_err();
    assert!(matches!(err, RagpressError::MissingConfig(_)));
}

#[tokio::test]
async fn openrouter_sends_attribution_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("X-Title", "Ragpress"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.provider = LlmProvider::OpenRouter;
    let llm = LlmClient::new(config).unwrap();
    let response = llm.chat(&ChatRequest::user("Hi")).await.unwrap();
    assert_eq!(response, LlmResponse::Done("ok".into()));
}

// ---------------------------------------------------------------------------
// Structured output
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Summary {
    title: String,
    keywords: Vec<String>,
}

#[tokio::test]
async fn structured_output_sends_schema_and_decodes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "response_format": {"type": "json_schema", "json_schema": {"name": "summary"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"title": "Object caching", "keywords": ["redis", "cache"]}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let schema = json!({
        "type": "object",
        "properties": {
            "title": {"type": "string"},
            "keywords": {"type": "array", "items": {"type": "string"}}
        },
        "required": ["title", "keywords"],
        "additionalProperties": false
    });
    let request = ChatRequest::user("Summarize the post")
        .with_response_format(ResponseFormat::json_schema("summary", schema));

    let llm = LlmClient::new(config_for(&server)).unwrap();
    let summary: Summary = llm.chat_structured(&request).await.unwrap();
    assert_eq!(summary.title, "Object caching");
    assert_eq!(summary.keywords, vec!["redis", "cache"]);
}

// ---------------------------------------------------------------------------
// Embeddings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn embeddings_are_returned_in_input_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_partial_json(json!({
            "model": "text-embedding-3-small",
            "input": ["first", "second"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.0, 1.0, 0.0]},
                {"object": "embedding", "index": 0, "embedding": [1.0, 0.0, 0.0]}
            ],
            "model": "text-embedding-3-small"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = OpenAiEmbedding::new(config_for(&server)).unwrap();
    let vectors = embedder.embed_batch(&["first", "second"]).await.unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
    assert_eq!(embedder.dimension(), 3);
}

#[tokio::test]
async fn embedding_blank_text_is_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let embedder = OpenAiEmbedding::new(config_for(&server)).unwrap();
    let err = embedder.embed("   ").await.unwrap_err();
    assert!(matches!(err, RagpressError::InvalidInput(_)));
}

// ---------------------------------------------------------------------------
// Tool loop over HTTP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tool_loop_runs_search_posts() {
    let server = MockServer::start().await;

    // Second call: the tool result is in the transcript.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("\"tool_call_id\":\"call_search\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "See \"Speeding up WordPress with object caching\".",
        )))
        .expect(1)
        .mount(&server)
        .await;

    // First call: the model asks for a search.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"tools": [{"function": {"name": "search_posts"}}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_search",
                        "type": "function",
                        "function": {
                            "name": "search_posts",
                            "arguments": "{\"query\":\"object caching\",\"limit\":2}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryDocumentStore::new());
    sync_documents(
        store.as_ref(),
        vec![Document::new(
            1,
            "Speeding up WordPress with object caching",
            "<p>Redis keeps query results in memory.</p>",
        )],
        false,
    )
    .await
    .unwrap();
    let retriever = Retriever::new(store.clone(), store, Arc::new(LocalEmbedding::default()))
        .with_mode(SearchMode::Lexical);

    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(SearchPostsTool::new(Arc::new(retriever))));

    let config = config_for(&server);
    let max_turns = config.max_turns;
    let runner = ToolRunner::new(LlmClient::new(config).unwrap(), Arc::new(tools), max_turns);
    let answer = runner.run("How do I cache queries?").await.unwrap();
    assert!(answer.contains("object caching"));
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn model_config_defaults_from_toml() {
    let config: ModelConfig = toml::from_str(
        r#"
        provider = "groq"
        model_id = "llama-3.1-8b-instant"
        "#,
    )
    .unwrap();
    assert_eq!(config.provider, LlmProvider::Groq);
    assert_eq!(config.base_url(), "https://api.groq.com/openai");
    assert_eq!(config.embedding_model, "text-embedding-3-small");
    assert_eq!(config.embedding_dimension, 1536);
    assert_eq!(config.max_turns, 5);
    assert_eq!(config.timeout_secs, 30);
    assert!(config.api_key.is_none());
}
