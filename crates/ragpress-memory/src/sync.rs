use crate::embedding::EmbeddingProvider;
use crate::store::DocumentStore;
use ragpress_core::{Document, DocumentId, RagpressResult};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

/// Counts from a sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Documents that were not in the store.
    pub inserted: usize,
    /// Documents whose text changed; their embeddings were cleared.
    pub updated: usize,
    /// Documents identical to the stored version.
    pub unchanged: usize,
    /// Stored documents absent from the batch and deleted (prune only).
    pub removed: usize,
}

/// Counts from an embed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmbedReport {
    /// Documents that received a new embedding.
    pub embedded: usize,
    /// Documents whose batch failed; they stay pending.
    pub failed: usize,
    /// Documents that already had an embedding.
    pub skipped: usize,
}

/// Writes `documents` into `store`.
///
/// A document whose title, body or labels changed replaces the stored one
/// and loses its embedding, unless the incoming document carries one. With
/// `prune`, stored documents missing from the batch are deleted.
pub async fn sync_documents(
    store: &dyn DocumentStore,
    documents: Vec<Document>,
    prune: bool,
) -> RagpressResult<SyncReport> {
    let mut report = SyncReport::default();
    let mut seen: HashSet<DocumentId> = HashSet::with_capacity(documents.len());

    for incoming in documents {
        seen.insert(incoming.id);
        match store.get(incoming.id).await? {
            None => {
                store.upsert(incoming).await?;
                report.inserted += 1;
            }
            Some(existing) if existing.content_differs(&incoming) => {
                store.upsert(incoming).await?;
                report.updated += 1;
            }
            Some(existing) => {
                if incoming.modified_at.is_some() && incoming.modified_at != existing.modified_at {
                    let embedding = incoming.embedding.clone().or(existing.embedding);
                    store.upsert(Document { embedding, ..incoming }).await?;
                }
                report.unchanged += 1;
            }
        }
    }

    if prune {
        for doc in store.list().await? {
            if !seen.contains(&doc.id) && store.delete(doc.id).await? {
                report.removed += 1;
            }
        }
    }

    info!(
        inserted = report.inserted,
        updated = report.updated,
        unchanged = report.unchanged,
        removed = report.removed,
        "Sync complete"
    );
    Ok(report)
}

/// Embeds documents lacking an embedding (all documents with `force`).
///
/// Documents are sent in batches of `batch_size`. A failed batch is logged
/// and counted; the run continues with the next one.
pub async fn embed_documents(
    store: &dyn DocumentStore,
    embedder: &dyn EmbeddingProvider,
    force: bool,
    batch_size: usize,
) -> RagpressResult<EmbedReport> {
    let documents = store.list().await?;
    let total = documents.len();
    let pending: Vec<Document> = documents
        .into_iter()
        .filter(|d| force || d.embedding.is_none())
        .collect();

    let mut report = EmbedReport {
        skipped: total - pending.len(),
        ..EmbedReport::default()
    };

    for batch in pending.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(Document::embedding_text).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();

        let vectors = match embedder.embed_batch(&refs).await {
            Ok(vectors) if vectors.len() == batch.len() => vectors,
            Ok(vectors) => {
                warn!(
                    expected = batch.len(),
                    received = vectors.len(),
                    "Embedding batch size mismatch"
                );
                report.failed += batch.len();
                continue;
            }
            Err(e) => {
                warn!(error = %e, documents = batch.len(), "Embedding batch failed");
                report.failed += batch.len();
                continue;
            }
        };

        for (doc, vector) in batch.iter().zip(vectors) {
            if vector.is_empty() {
                report.failed += 1;
            } else if store.set_embedding(doc.id, vector).await? {
                report.embedded += 1;
            }
        }
    }

    info!(
        embedded = report.embedded,
        failed = report.failed,
        skipped = report.skipped,
        "Embedding complete"
    );
    Ok(report)
}
