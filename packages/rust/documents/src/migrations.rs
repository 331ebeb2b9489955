//! Schema of the document database, applied by [`DocumentStore::open`].
//!
//! [`DocumentStore::open`]: crate::DocumentStore::open

/// One schema step; steps already recorded in `schema_migrations` are skipped.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// Schema steps, oldest first.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: schema-less documents keyed by collection and pk",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per document; the document itself is a JSON object
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    pk         TEXT NOT NULL,
    data       TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (collection, pk)
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
