//! Reading post exports for `ragpress sync`.
//!
//! Two shapes are accepted, and may be mixed in one array: the plain
//! document shape (`id`, `title`, `body`, `categories`, `tags`,
//! `modified_at`) and the WordPress REST API post shape, where `title` and
//! `content` are `{ "rendered": ... }` objects.

use chrono::{DateTime, NaiveDateTime, Utc};
use ragpress_core::{Document, DocumentId, RagpressError, RagpressResult};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum ExportedPost {
    Plain(Document),
    Rest(RestPost),
}

#[derive(Deserialize)]
struct RestPost {
    id: DocumentId,
    title: Rendered,
    content: Rendered,
    #[serde(default)]
    modified_gmt: Option<String>,
}

#[derive(Deserialize)]
struct Rendered {
    rendered: String,
}

impl From<ExportedPost> for Document {
    fn from(post: ExportedPost) -> Self {
        match post {
            ExportedPost::Plain(document) => document,
            ExportedPost::Rest(post) => {
                let mut document = Document::new(post.id, post.title.rendered, post.content.rendered);
                document.modified_at = post.modified_gmt.as_deref().and_then(parse_gmt);
                document
            }
        }
    }
}

/// REST timestamps carry no offset; `modified_gmt` is UTC.
fn parse_gmt(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parses a JSON array of posts.
pub fn parse_posts(json: &str) -> RagpressResult<Vec<Document>> {
    let posts: Vec<ExportedPost> = serde_json::from_str(json).map_err(|e| {
        RagpressError::InvalidInput(format!("post export is not a JSON array of posts: {e}"))
    })?;
    Ok(posts.into_iter().map(Document::from).collect())
}
