use crate::lexical::{fts_match_expression, LexicalSearch};
use crate::store::DocumentStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use ragpress_core::{strip_html, Document, DocumentId, RagpressError, RagpressResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id          INTEGER PRIMARY KEY,
    title       TEXT NOT NULL,
    body        TEXT NOT NULL,
    categories  TEXT NOT NULL DEFAULT '[]',
    tags        TEXT NOT NULL DEFAULT '[]',
    embedding   TEXT,
    modified_at TEXT
);
CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(title, body);
";

const SELECT_COLUMNS: &str =
    "SELECT id, title, body, categories, tags, embedding, modified_at FROM documents";

/// SQLite document store.
///
/// Embeddings are stored as JSON arrays in a text column. Title and
/// markup-free body are mirrored into an FTS5 table that serves lexical
/// search, ranked with FTS5's `bm25()`.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    /// Opens (or creates) the database at `path` and applies the schema.
    pub fn open(path: impl AsRef<Path>) -> RagpressResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(store_err)?;
        debug!(path = %path.display(), "Opened SQLite document store");
        Self::init(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> RagpressResult<Self> {
        Self::init(Connection::open_in_memory().map_err(store_err)?)
    }

    fn init(conn: Connection) -> RagpressResult<Self> {
        conn.execute_batch(SCHEMA).map_err(store_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn store_err(e: rusqlite::Error) -> RagpressError {
    RagpressError::Store(e.to_string())
}

fn to_sql_id(id: DocumentId) -> RagpressResult<i64> {
    i64::try_from(id)
        .map_err(|_| RagpressError::InvalidInput(format!("Document id {id} is out of range")))
}

/// Column values as stored, decoded into a [`Document`] outside the row callback.
struct StoredRow {
    id: i64,
    title: String,
    body: String,
    categories: String,
    tags: String,
    embedding: Option<String>,
    modified_at: Option<String>,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            body: row.get(2)?,
            categories: row.get(3)?,
            tags: row.get(4)?,
            embedding: row.get(5)?,
            modified_at: row.get(6)?,
        })
    }
}

impl TryFrom<StoredRow> for Document {
    type Error = RagpressError;

    fn try_from(row: StoredRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str, e: &dyn std::fmt::Display| {
            RagpressError::Store(format!("Corrupt {what} for document {}: {e}", row.id))
        };

        let id = u64::try_from(row.id).map_err(|e| corrupt("id", &e))?;
        let categories =
            serde_json::from_str(&row.categories).map_err(|e| corrupt("categories", &e))?;
        let tags = serde_json::from_str(&row.tags).map_err(|e| corrupt("tags", &e))?;
        let embedding = row
            .embedding
            .as_deref()
            .map(serde_json::from_str::<Vec<f32>>)
            .transpose()
            .map_err(|e| corrupt("embedding", &e))?;
        let modified_at = row
            .modified_at
            .as_deref()
            .map(DateTime::parse_from_rfc3339)
            .transpose()
            .map_err(|e| corrupt("modified_at", &e))?
            .map(|dt| dt.with_timezone(&Utc));

        Ok(Document {
            id,
            title: row.title,
            body: row.body,
            categories,
            tags,
            embedding,
            modified_at,
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn upsert(&self, document: Document) -> RagpressResult<()> {
        let id = to_sql_id(document.id)?;
        let categories = serde_json::to_string(&document.categories)?;
        let tags = serde_json::to_string(&document.tags)?;
        let embedding = document
            .embedding
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let modified_at = document.modified_at.map(|dt| dt.to_rfc3339());
        let fts_body = strip_html(&document.body);

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(store_err)?;
        tx.execute(
            "INSERT INTO documents (id, title, body, categories, tags, embedding, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                body = excluded.body,
                categories = excluded.categories,
                tags = excluded.tags,
                embedding = excluded.embedding,
                modified_at = excluded.modified_at",
            params![
                id,
                document.title,
                document.body,
                categories,
                tags,
                embedding,
                modified_at
            ],
        )
        .map_err(store_err)?;
        tx.execute("DELETE FROM documents_fts WHERE rowid = ?1", params![id])
            .map_err(store_err)?;
        tx.execute(
            "INSERT INTO documents_fts (rowid, title, body) VALUES (?1, ?2, ?3)",
            params![id, document.title, fts_body],
        )
        .map_err(store_err)?;
        tx.commit().map_err(store_err)
    }

    async fn get(&self, id: DocumentId) -> RagpressResult<Option<Document>> {
        let sql_id = to_sql_id(id)?;
        let row = {
            let conn = self.conn.lock();
            conn.query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![sql_id],
                StoredRow::from_row,
            )
            .optional()
            .map_err(store_err)?
        };
        row.map(Document::try_from).transpose()
    }

    async fn list(&self) -> RagpressResult<Vec<Document>> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare(&format!("{SELECT_COLUMNS} ORDER BY id"))
                .map_err(store_err)?;
            let rows = stmt
                .query_map([], StoredRow::from_row)
                .map_err(store_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(store_err)?;
            rows
        };
        rows.into_iter().map(Document::try_from).collect()
    }

    async fn set_embedding(&self, id: DocumentId, embedding: Vec<f32>) -> RagpressResult<bool> {
        let sql_id = to_sql_id(id)?;
        let json = serde_json::to_string(&embedding)?;
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE documents SET embedding = ?2 WHERE id = ?1",
                params![sql_id, json],
            )
            .map_err(store_err)?;
        Ok(changed > 0)
    }

    async fn delete(&self, id: DocumentId) -> RagpressResult<bool> {
        let sql_id = to_sql_id(id)?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(store_err)?;
        let deleted = tx
            .execute("DELETE FROM documents WHERE id = ?1", params![sql_id])
            .map_err(store_err)?;
        tx.execute("DELETE FROM documents_fts WHERE rowid = ?1", params![sql_id])
            .map_err(store_err)?;
        tx.commit().map_err(store_err)?;
        Ok(deleted > 0)
    }

    async fn count(&self) -> RagpressResult<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(store_err)?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    async fn embedded_count(&self) -> RagpressResult<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE embedding IS NOT NULL",
                [],
                |row| row.get(0),
            )
            .map_err(store_err)?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}

#[async_trait]
impl LexicalSearch for SqliteDocumentStore {
    async fn search(&self, text: &str, limit: usize) -> RagpressResult<Vec<(DocumentId, f32)>> {
        let Some(expression) = fts_match_expression(text) else {
            return Ok(Vec::new());
        };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT rowid, bm25(documents_fts) AS rank
                 FROM documents_fts
                 WHERE documents_fts MATCH ?1
                 ORDER BY rank, rowid
                 LIMIT ?2",
            )
            .map_err(store_err)?;
        let hits = stmt
            .query_map(params![expression, limit], |row| {
                let id: i64 = row.get(0)?;
                let rank: f64 = row.get(1)?;
                Ok((id, rank))
            })
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;

        // bm25() is lower-is-better; negate so higher means more relevant.
        Ok(hits
            .into_iter()
            .filter_map(|(id, rank)| u64::try_from(id).ok().map(|id| (id, -rank as f32)))
            .collect())
    }
}
