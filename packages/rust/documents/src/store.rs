//! libSQL-backed document store.
//!
//! Every document lives in a single `documents` table, keyed by
//! `(collection, pk)`, with its fields serialized as a JSON object. Queries
//! reach into the JSON with `json_extract`, so documents need no schema.

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use serde_json::Value;
use tool_shared::{DocumentId, Result, ToolError};
use tracing::{debug, info, instrument};

use crate::document::{Document, Stored};
use crate::migrations;
use crate::query::{Query, RawQuery};

/// Path that keeps the whole database in memory.
pub const MEMORY: &str = ":memory:";

/// Handle to the document database.
pub struct DocumentStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    location: String,
}

impl DocumentStore {
    /// Open or create the database at `location` (a file path or
    /// [`MEMORY`]) and apply pending migrations.
    #[instrument]
    pub async fn open(location: &str) -> Result<Self> {
        if location != MEMORY {
            let path = Path::new(location);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| ToolError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(location)
            .build()
            .await
            .map_err(|e| ToolError::Storage(e.to_string()))?;

        // one shared connection: every connect() to :memory: is a fresh database
        let conn = db.connect().map_err(|e| ToolError::Storage(e.to_string()))?;

        let store = Self {
            db,
            conn,
            location: location.to_string(),
        };
        store.run_migrations().await?;
        info!(location, "document store ready");
        Ok(store)
    }

    /// Open a private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        Self::open(MEMORY).await
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        ToolError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// The current schema version, or 0 if no migrations have been applied.
    pub async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Untyped operations
    // -----------------------------------------------------------------------

    /// Insert `data` as a new document and return its primary key.
    pub async fn insert_raw(&self, collection: &str, data: &Value) -> Result<DocumentId> {
        let pk = DocumentId::new();
        self.put_raw(collection, &pk, data).await?;
        Ok(pk)
    }

    /// Insert or replace the document with key `pk`.
    pub async fn put_raw(&self, collection: &str, pk: &DocumentId, data: &Value) -> Result<()> {
        if !data.is_object() {
            return Err(ToolError::validation(format!(
                "documents must be JSON objects, got {data}"
            )));
        }
        let now = Utc::now().to_rfc3339();
        let pk = pk.to_string();
        let json = data.to_string();
        self.conn
            .execute(
                "INSERT INTO documents (collection, pk, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT (collection, pk)
                 DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
                params![collection, pk.as_str(), json.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| ToolError::Storage(e.to_string()))?;
        debug!(collection, pk, "document saved");
        Ok(())
    }

    pub async fn get_raw(&self, collection: &str, pk: &DocumentId) -> Result<Option<Value>> {
        let mut rows = self
            .conn
            .query(
                "SELECT data FROM documents WHERE collection = ?1 AND pk = ?2",
                params![collection, pk.to_string()],
            )
            .await
            .map_err(|e| ToolError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let data = row
                    .get::<String>(0)
                    .map_err(|e| ToolError::Storage(e.to_string()))?;
                Ok(Some(parse_data(&data)?))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(ToolError::Storage(e.to_string())),
        }
    }

    /// Delete one document. Returns `false` if it did not exist.
    pub async fn delete_raw(&self, collection: &str, pk: &DocumentId) -> Result<bool> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM documents WHERE collection = ?1 AND pk = ?2",
                params![collection, pk.to_string()],
            )
            .await
            .map_err(|e| ToolError::Storage(e.to_string()))?;
        debug!(collection, %pk, deleted, "document deleted");
        Ok(deleted > 0)
    }

    /// Remove every document in every collection.
    pub async fn clear(&self) -> Result<u64> {
        let deleted = self
            .conn
            .execute("DELETE FROM documents", params![])
            .await
            .map_err(|e| ToolError::Storage(e.to_string()))?;
        info!(deleted, "document store cleared");
        Ok(deleted)
    }

    /// Collection names with their document counts.
    pub async fn collections(&self) -> Result<Vec<(String, u64)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT collection, COUNT(*) FROM documents GROUP BY collection ORDER BY collection",
                params![],
            )
            .await
            .map_err(|e| ToolError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| ToolError::Storage(e.to_string()))?
        {
            results.push((
                row.get::<String>(0)
                    .map_err(|e| ToolError::Storage(e.to_string()))?,
                row.get::<u64>(1)
                    .map_err(|e| ToolError::Storage(e.to_string()))?,
            ));
        }
        Ok(results)
    }

    /// Query any collection without a document type.
    pub fn raw_query(&self, collection: &str) -> RawQuery<'_> {
        RawQuery::new(self, collection)
    }

    // -----------------------------------------------------------------------
    // Typed operations
    // -----------------------------------------------------------------------

    /// Fill defaults, validate and insert `doc`.
    pub async fn save<D: Document>(&self, mut doc: D) -> Result<Stored<D>> {
        doc.prepare();
        doc.validate()?;
        let pk = self.insert_raw(D::COLLECTION, &serde_json::to_value(&doc)?).await?;
        Ok(Stored { pk, doc })
    }

    /// Fill defaults, validate and write back an already stored document.
    pub async fn update<D: Document>(&self, stored: &mut Stored<D>) -> Result<()> {
        stored.doc.prepare();
        stored.doc.validate()?;
        self.put_raw(D::COLLECTION, &stored.pk, &serde_json::to_value(&stored.doc)?)
            .await
    }

    pub async fn get<D: Document>(&self, pk: &DocumentId) -> Result<Option<Stored<D>>> {
        match self.get_raw(D::COLLECTION, pk).await? {
            Some(data) => Ok(Some(Stored {
                pk: *pk,
                doc: decode(data)?,
            })),
            None => Ok(None),
        }
    }

    pub async fn delete<D: Document>(&self, pk: &DocumentId) -> Result<bool> {
        self.delete_raw(D::COLLECTION, pk).await
    }

    /// Query documents of type `D`.
    pub fn query<D: Document>(&self) -> Query<'_, D> {
        Query::new(self)
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("location", &self.location)
            .finish()
    }
}

pub(crate) fn parse_data(data: &str) -> Result<Value> {
    serde_json::from_str(data).map_err(|e| ToolError::Storage(format!("corrupt document: {e}")))
}

pub(crate) fn decode<D: Document>(data: Value) -> Result<D> {
    serde_json::from_value(data).map_err(|e| {
        ToolError::Storage(format!(
            "document in {:?} does not fit its type: {e}",
            D::COLLECTION
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    /// Create a temp file store for testing.
    async fn test_store() -> DocumentStore {
        let tmp = std::env::temp_dir().join(format!("tool_test_{}.db", Uuid::now_v7()));
        DocumentStore::open(tmp.to_str().expect("utf-8 temp path"))
            .await
            .expect("open test db")
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let store = test_store().await;
        assert_eq!(store.schema_version().await, 1);

        let memory = DocumentStore::in_memory().await.expect("memory");
        assert_eq!(memory.schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("tool_test_{}.db", Uuid::now_v7()));
        let path = tmp.to_str().expect("utf-8 temp path");
        let first = DocumentStore::open(path).await.expect("first open");
        let pk = first
            .insert_raw("notes", &json!({"text": "kept"}))
            .await
            .expect("insert");
        drop(first);

        let second = DocumentStore::open(path).await.expect("second open");
        assert_eq!(second.schema_version().await, 1);
        assert!(second.get_raw("notes", &pk).await.expect("get").is_some());
    }

    #[tokio::test]
    async fn raw_crud() {
        let store = test_store().await;
        let pk = store
            .insert_raw("notes", &json!({"text": "hello"}))
            .await
            .expect("insert");

        let data = store.get_raw("notes", &pk).await.expect("get").expect("present");
        assert_eq!(data["text"], "hello");
        // collections are separate namespaces
        assert!(store.get_raw("users", &pk).await.expect("get").is_none());

        store
            .put_raw("notes", &pk, &json!({"text": "bye"}))
            .await
            .expect("update");
        let data = store.get_raw("notes", &pk).await.expect("get").expect("present");
        assert_eq!(data["text"], "bye");

        assert_eq!(
            store.collections().await.expect("collections"),
            [("notes".to_string(), 1)]
        );
        assert!(store.delete_raw("notes", &pk).await.expect("delete"));
        assert!(!store.delete_raw("notes", &pk).await.expect("delete again"));
    }

    #[tokio::test]
    async fn rejects_non_objects_and_clears() {
        let store = DocumentStore::in_memory().await.expect("memory");
        assert!(store.insert_raw("notes", &json!([1, 2])).await.is_err());

        store.insert_raw("a", &json!({})).await.expect("insert");
        store.insert_raw("b", &json!({})).await.expect("insert");
        assert_eq!(store.clear().await.expect("clear"), 2);
        assert!(store.collections().await.expect("collections").is_empty());
    }
}
