use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Identifier of a synced post.
pub type DocumentId = u64;

/// Maximum excerpt length in characters (before the ellipsis).
const EXCERPT_CHARS: usize = 200;

// Static patterns, cannot fail to compile.
#[allow(clippy::unwrap_used)]
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

#[allow(clippy::unwrap_used)]
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// A post synced from the content source.
///
/// The embedding is only ever replaced as a whole; a sync that changes the
/// text clears it so the embed step picks the document up again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Post identifier.
    pub id: DocumentId,
    /// Post title.
    pub title: String,
    /// Post body, possibly containing HTML.
    pub body: String,
    /// Category labels.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Tag labels.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Embedding vector, absent until the embed step has run.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    /// Last modification time reported by the source.
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Creates a document without labels or embedding.
    pub fn new(id: DocumentId, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            categories: Vec::new(),
            tags: Vec::new(),
            embedding: None,
            modified_at: None,
        }
    }

    /// Builder: set category labels.
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set tag labels.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: attach an embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Whether the text-bearing fields differ from `other`.
    ///
    /// Embedding and timestamps are ignored.
    pub fn content_differs(&self, other: &Document) -> bool {
        self.title != other.title
            || self.body != other.body
            || self.categories != other.categories
            || self.tags != other.tags
    }

    /// Text fed to the embedding model: title, labels and stripped body.
    pub fn embedding_text(&self) -> String {
        let mut text = self.title.clone();
        if !self.categories.is_empty() {
            text.push_str("\nCategories: ");
            text.push_str(&self.categories.join(", "));
        }
        if !self.tags.is_empty() {
            text.push_str("\nTags: ");
            text.push_str(&self.tags.join(", "));
        }
        let body = strip_html(&self.body);
        if !body.is_empty() {
            text.push('\n');
            text.push_str(&body);
        }
        text
    }

    /// Short plain-text excerpt of the body.
    pub fn excerpt(&self) -> String {
        excerpt(&self.body, EXCERPT_CHARS)
    }
}

/// A free-text query with a bounded result count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// The query text.
    pub text: String,
    /// Maximum number of results, always within `MIN_LIMIT..=MAX_LIMIT`.
    pub limit: usize,
}

impl Query {
    /// Smallest accepted limit.
    pub const MIN_LIMIT: usize = 1;
    /// Largest accepted limit.
    pub const MAX_LIMIT: usize = 20;
    /// Limit used when the caller does not pick one.
    pub const DEFAULT_LIMIT: usize = 5;

    /// Creates a query, clamping `limit` into the accepted range.
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            limit: limit.clamp(Self::MIN_LIMIT, Self::MAX_LIMIT),
        }
    }

    /// Whether the query text has anything searchable in it.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Self::new(text, Self::DEFAULT_LIMIT)
    }
}

/// Which search path produced a [`SearchResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
    /// Full-text search; score is an unbounded rank score.
    Lexical,
    /// Embedding search; score is cosine similarity in `[-1, 1]`.
    Vector,
    /// Re-scored by a fusion policy.
    Fused,
}

/// A scored reference to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// The matched document.
    pub document_id: DocumentId,
    /// Title of the matched document.
    pub title: String,
    /// Relevance score; its domain depends on `source`.
    pub score: f32,
    /// Plain-text excerpt of the body.
    pub excerpt: String,
    /// Search path that produced the score.
    pub source: SearchSource,
}

impl SearchResult {
    /// Builds a result for `document` with the given score.
    pub fn from_document(document: &Document, score: f32, source: SearchSource) -> Self {
        Self {
            document_id: document.id,
            title: document.title.clone(),
            score,
            excerpt: document.excerpt(),
            source,
        }
    }
}

/// Removes HTML tags and collapses whitespace.
pub fn strip_html(html: &str) -> String {
    let without_tags = HTML_TAG.replace_all(html, " ");
    WHITESPACE.replace_all(&without_tags, " ").trim().to_string()
}

/// Plain-text excerpt of at most `max_chars` characters, cut at a word
/// boundary when possible. An ellipsis is appended when text was cut.
pub fn excerpt(html: &str, max_chars: usize) -> String {
    let text = strip_html(html);
    if text.chars().count() <= max_chars {
        return text;
    }

    let cut: String = text.chars().take(max_chars).collect();
    let trimmed = match cut.rfind(' ') {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{}…", trimmed.trim_end())
}
