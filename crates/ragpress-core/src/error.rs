use thiserror::Error;

/// A convenience `Result` alias using [`RagpressError`].
pub type RagpressResult<T> = Result<T, RagpressError>;

/// Top-level error type for Ragpress.
///
/// Nothing in the stack retries; every failure ends up as one of these
/// variants and is rendered for the user with [`RagpressError::user_message`].
#[derive(Error, Debug)]
pub enum RagpressError {
    /// Required configuration is absent (e.g. no API key).
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// The upstream API answered with a non-2xx status or an error payload.
    #[error("Upstream API error ({status}): {message}")]
    Upstream {
        /// HTTP status code returned by the API.
        status: u16,
        /// Error message from the API, verbatim.
        message: String,
    },

    /// A response body could not be decoded into the expected schema.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Nothing to search: no documents synced, or no embeddings yet.
    #[error("Empty corpus: {0}")]
    EmptyCorpus(String),

    /// Caller-supplied input was rejected.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transport failure talking to an HTTP API (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The tool-calling loop did not reach a final answer.
    #[error("Tool loop error: {0}")]
    ToolLoop(String),

    /// Failure in the document store.
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration could not be parsed or is inconsistent.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagpressError {
    /// Message suitable for showing to an end user.
    ///
    /// Upstream messages are passed through untouched; empty-corpus errors
    /// already name the step the user has to run.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingConfig(msg) | Self::EmptyCorpus(msg) | Self::InvalidInput(msg) => {
                msg.clone()
            }
            Self::Upstream { message, .. } => message.clone(),
            Self::Parse(msg) => format!("Could not parse the API response: {msg}"),
            other => other.to_string(),
        }
    }

    /// Shorthand for the "no documents synced yet" case.
    pub fn no_documents() -> Self {
        Self::EmptyCorpus("No documents have been synced yet. Run `ragpress sync` first.".into())
    }

    /// Shorthand for the "no embeddings yet" case.
    pub fn no_embeddings() -> Self {
        Self::EmptyCorpus(
            "No document embeddings are available. Run `ragpress embed` first.".into(),
        )
    }
}
