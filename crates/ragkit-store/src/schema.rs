//! Database schema definitions.
//!
//! Each storage or vector store name maps to its own tables; the names are
//! validated before being spliced into SQL.

use ragkit_core::{RagError, Result};

/// Shared counter table, one row per storage name.
pub const COUNTER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS unique_counters (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL DEFAULT 0
);
"#;

/// Check that a collection name is safe to use as a table suffix.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(RagError::config(format!(
            "invalid collection name {:?}: only ASCII letters, digits and '_' are allowed",
            name
        )));
    }
    Ok(())
}

/// Key-value table name for a storage.
pub fn storage_table(name: &str) -> String {
    format!("kv_{}", name)
}

/// FTS5 table name for a storage.
pub fn fts_table(name: &str) -> String {
    format!("kv_{}_fts", name)
}

/// Vector table name for a vector store.
pub fn vector_table(name: &str) -> String {
    format!("vec_{}", name)
}

/// Schema for a storage's key-value table and, when searchable, its FTS5
/// index kept in sync by triggers.
pub fn storage_schema(name: &str, searchable: bool) -> String {
    let table = storage_table(name);
    let mut sql = format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    rowid INTEGER PRIMARY KEY,
    key TEXT NOT NULL UNIQUE,
    value BLOB NOT NULL,
    search_text TEXT
);
"#
    );

    if searchable {
        let fts = fts_table(name);
        sql.push_str(&format!(
            r#"
CREATE VIRTUAL TABLE IF NOT EXISTS {fts} USING fts5(
    search_text,
    content={table},
    content_rowid=rowid
);

CREATE TRIGGER IF NOT EXISTS {table}_ai AFTER INSERT ON {table} BEGIN
    INSERT INTO {fts}(rowid, search_text) VALUES (NEW.rowid, NEW.search_text);
END;

CREATE TRIGGER IF NOT EXISTS {table}_ad AFTER DELETE ON {table} BEGIN
    INSERT INTO {fts}({fts}, rowid, search_text) VALUES ('delete', OLD.rowid, OLD.search_text);
END;

CREATE TRIGGER IF NOT EXISTS {table}_au AFTER UPDATE ON {table} BEGIN
    INSERT INTO {fts}({fts}, rowid, search_text) VALUES ('delete', OLD.rowid, OLD.search_text);
    INSERT INTO {fts}(rowid, search_text) VALUES (NEW.rowid, NEW.search_text);
END;
"#
        ));
    }

    sql
}

/// Schema for a vector store table.
pub fn vector_schema(name: &str) -> String {
    let table = vector_table(name);
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    seq INTEGER PRIMARY KEY,
    id TEXT NOT NULL UNIQUE,
    metadata TEXT NOT NULL,
    payload BLOB NOT NULL,
    embedding BLOB NOT NULL
);
"#
    )
}
