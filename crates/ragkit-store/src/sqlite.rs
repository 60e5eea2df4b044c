//! SQLite-based storage and vector store implementations.

use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};
use ulid::Ulid;

use ragkit_core::record::{decode_payload, encode_payload, scalar_fields, text_field};
use ragkit_core::{
    Condition, Embedder, FilterAdapter, RagError, RankedHit, Record, Result, Storage, VectorStore,
};

use crate::filter::SqlFilter;
use crate::schema::{
    fts_table, storage_schema, storage_table, validate_name, vector_schema, vector_table,
    COUNTER_SCHEMA,
};
use crate::vector::{bytes_to_vec, embed_batch, embed_query, l2_distance, nearest, vec_to_bytes};

fn db_err(e: rusqlite::Error) -> RagError {
    RagError::database(e.to_string())
}

/// Open or create a database at the given path.
fn open_connection(path: &Path) -> Result<Connection> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| RagError::connection("sqlite", format!("Failed to open {:?}: {}", path, e)))?;

    configure_connection(&conn)?;
    Ok(conn)
}

fn open_memory_connection() -> Result<Connection> {
    let conn = Connection::open_in_memory().map_err(|e| {
        RagError::connection("sqlite", format!("Failed to open in-memory database: {}", e))
    })?;
    configure_connection(&conn)?;
    Ok(conn)
}

/// Configure SQLite connection for optimal performance.
fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA cache_size = -64000;
        PRAGMA busy_timeout = 30000;
        PRAGMA temp_store = MEMORY;
        "#,
    )
    .map_err(|e| RagError::database(format!("Failed to configure connection: {}", e)))?;

    conn.execute_batch(COUNTER_SCHEMA)
        .map_err(|e| RagError::database(format!("Failed to initialize schema: {}", e)))?;

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(db_err)
}

/// Turn free text into an FTS5 query matching any of its terms.
fn fts5_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .filter(|term| term.chars().any(char::is_alphanumeric))
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// Key-value storage in a SQLite table, with an FTS5 index over the
/// configured search target field.
pub struct SqliteStorage<T> {
    /// Connection wrapped in blocking Mutex.
    conn: Mutex<Connection>,

    name: String,

    /// Record field indexed for keyword search.
    search_target: Option<String>,

    _record: PhantomData<fn() -> T>,
}

impl<T: Record> SqliteStorage<T> {
    /// Open or create a storage in the database at the given path.
    pub fn open(path: impl AsRef<Path>, name: &str, search_target: Option<String>) -> Result<Self> {
        let path = path.as_ref();
        validate_name(name)?;
        let conn = open_connection(path)?;
        info!("Storage {} opened at {:?}", name, path);
        Ok(Self::init(conn, name, search_target))
    }

    /// Open a storage in a private in-memory database (for testing).
    pub fn open_memory(name: &str, search_target: Option<String>) -> Result<Self> {
        validate_name(name)?;
        let conn = open_memory_connection()?;
        Ok(Self::init(conn, name, search_target))
    }

    fn init(conn: Connection, name: &str, search_target: Option<String>) -> Self {
        Self {
            conn: Mutex::new(conn),
            name: name.to_string(),
            search_target,
            _record: PhantomData,
        }
    }

    fn table(&self) -> String {
        storage_table(&self.name)
    }

    /// Execute a blocking operation on the connection.
    fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self.conn.lock().map_err(|e| RagError::database(e.to_string()))?;
        f(&conn)
    }

    /// Execute a mutable blocking operation on the connection.
    fn with_conn_mut<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> Result<R>,
    {
        let mut conn = self.conn.lock().map_err(|e| RagError::database(e.to_string()))?;
        f(&mut conn)
    }

    fn require_table(&self, conn: &Connection) -> Result<()> {
        if table_exists(conn, &self.table())? {
            Ok(())
        } else {
            Err(RagError::index_not_found(&self.name))
        }
    }
}

#[async_trait]
impl<T: Record> Storage<T> for SqliteStorage<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn searchable(&self) -> bool {
        self.search_target.is_some()
    }

    async fn insert(&self, keys: &[String], values: &[T]) -> Result<()> {
        if keys.len() != values.len() {
            return Err(RagError::invalid_argument(
                "keys and values must have same length",
            ));
        }

        let mut rows = Vec::with_capacity(values.len());
        for (key, value) in keys.iter().zip(values) {
            let search_text = match &self.search_target {
                Some(field) => text_field(value, field)?,
                None => None,
            };
            rows.push((key, encode_payload(value)?, search_text));
        }

        let table = self.table();
        let schema = storage_schema(&self.name, self.searchable());

        self.with_conn_mut(|conn| {
            let tx = conn.transaction().map_err(db_err)?;
            tx.execute_batch(&schema)
                .map_err(|e| RagError::database(format!("Failed to create {}: {}", table, e)))?;

            {
                let mut stmt = tx
                    .prepare(&format!(
                        r#"
                        INSERT INTO {table} (key, value, search_text) VALUES (?1, ?2, ?3)
                        ON CONFLICT(key) DO UPDATE SET
                            value = excluded.value,
                            search_text = excluded.search_text
                        "#
                    ))
                    .map_err(db_err)?;

                for (key, payload, search_text) in &rows {
                    stmt.execute(params![key, payload, search_text])
                        .map_err(|e| {
                            RagError::database(format!("Failed to insert {}: {}", key, e))
                        })?;
                }
            }

            tx.commit().map_err(db_err)?;

            debug!("Inserted {} values into {}", rows.len(), table);
            Ok(())
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.with_conn(|conn| {
            self.require_table(conn)?;
            conn.execute(&format!("DELETE FROM {} WHERE key = ?1", self.table()), params![key])
                .map_err(db_err)?;
            Ok(())
        })
    }

    async fn query(&self, key: &str) -> Result<Option<T>> {
        let payload: Option<Vec<u8>> = self.with_conn(|conn| {
            if !table_exists(conn, &self.table())? {
                return Ok(None);
            }
            conn.query_row(
                &format!("SELECT value FROM {} WHERE key = ?1", self.table()),
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
        })?;

        payload.map(|p| decode_payload(&p)).transpose()
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RankedHit<T>>> {
        if !self.searchable() {
            return Err(RagError::NotSearchable {
                name: self.name.clone(),
            });
        }

        let table = self.table();
        let fts = fts_table(&self.name);

        let rows: Vec<(Vec<u8>, f64)> = self.with_conn(|conn| {
            self.require_table(conn)?;

            let Some(fts_query) = fts5_query(query) else {
                return Ok(Vec::new());
            };
            if top_k == 0 {
                return Ok(Vec::new());
            }

            let mut stmt = conn
                .prepare(&format!(
                    r#"
                    SELECT {table}.value, bm25({fts}) AS score
                    FROM {fts}
                    JOIN {table} ON {table}.rowid = {fts}.rowid
                    WHERE {fts} MATCH ?1
                    ORDER BY score, {table}.key
                    LIMIT ?2
                    "#
                ))
                .map_err(db_err)?;

            let rows = stmt
                .query_map(params![fts_query, top_k as i64], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .map_err(db_err)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(db_err)?;

            Ok(rows)
        })?;

        rows.into_iter()
            .map(|(payload, score)| {
                // bm25() is smaller for better matches
                let relevance = (-score) as f32;
                debug!("Keyword hit in {} scored {}", self.name, relevance);
                Ok(RankedHit::new(decode_payload(&payload)?, relevance))
            })
            .collect()
    }

    async fn exists(&self) -> Result<bool> {
        self.with_conn(|conn| table_exists(conn, &self.table()))
    }

    async fn destroy(&self) -> Result<()> {
        self.with_conn(|conn| {
            self.require_table(conn)?;
            conn.execute_batch(&format!(
                "DROP TABLE IF EXISTS {}; DROP TABLE {};",
                fts_table(&self.name),
                self.table()
            ))
            .map_err(db_err)?;
            conn.execute("DELETE FROM unique_counters WHERE name = ?1", params![self.name])
                .map_err(db_err)?;

            info!("Destroyed storage {}", self.name);
            Ok(())
        })
    }

    async fn unique_get(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let value: Option<i64> = conn
                .query_row(
                    "SELECT value FROM unique_counters WHERE name = ?1",
                    params![self.name],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;
            Ok(value.unwrap_or(0) as u64)
        })
    }

    async fn unique_incr(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO unique_counters (name, value) VALUES (?1, 1)
                ON CONFLICT(name) DO UPDATE SET value = value + 1
                "#,
                params![self.name],
            )
            .map_err(db_err)?;
            Ok(())
        })
    }

    async fn unique_reset(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO unique_counters (name, value) VALUES (?1, 0)
                ON CONFLICT(name) DO UPDATE SET value = 0
                "#,
                params![self.name],
            )
            .map_err(db_err)?;
            Ok(())
        })
    }
}

/// Vector store in a SQLite table, searched by exact L2 scan over the rows
/// that pass the metadata filter.
pub struct SqliteVectorStore<T> {
    /// Connection wrapped in blocking Mutex.
    conn: Mutex<Connection>,

    name: String,

    embedder: Arc<dyn Embedder>,

    /// Rows embedded and written per transaction.
    batch_size: usize,

    _record: PhantomData<fn() -> T>,
}

impl<T: Record> SqliteVectorStore<T> {
    /// Open or create a vector store in the database at the given path.
    pub fn open(
        path: impl AsRef<Path>,
        name: &str,
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
    ) -> Result<Self> {
        let path = path.as_ref();
        validate_name(name)?;
        let conn = open_connection(path)?;
        info!("Vector store {} opened at {:?}", name, path);
        Ok(Self::init(conn, name, embedder, batch_size))
    }

    /// Open a vector store in a private in-memory database (for testing).
    pub fn open_memory(name: &str, embedder: Arc<dyn Embedder>, batch_size: usize) -> Result<Self> {
        validate_name(name)?;
        let conn = open_memory_connection()?;
        Ok(Self::init(conn, name, embedder, batch_size))
    }

    fn init(conn: Connection, name: &str, embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            conn: Mutex::new(conn),
            name: name.to_string(),
            embedder,
            batch_size: batch_size.max(1),
            _record: PhantomData,
        }
    }

    fn table(&self) -> String {
        vector_table(&self.name)
    }

    /// Execute a blocking operation on the connection.
    fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self.conn.lock().map_err(|e| RagError::database(e.to_string()))?;
        f(&conn)
    }

    /// Execute a mutable blocking operation on the connection.
    fn with_conn_mut<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> Result<R>,
    {
        let mut conn = self.conn.lock().map_err(|e| RagError::database(e.to_string()))?;
        f(&mut conn)
    }

    fn require_table(&self, conn: &Connection) -> Result<()> {
        if table_exists(conn, &self.table())? {
            Ok(())
        } else {
            Err(RagError::index_not_found(&self.name))
        }
    }
}

#[async_trait]
impl<T: Record> VectorStore<T> for SqliteVectorStore<T> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert(&self, texts: &[&str], records: &[T]) -> Result<()> {
        if texts.len() != records.len() {
            return Err(RagError::invalid_argument(
                "texts and records must have same length",
            ));
        }

        // Scalar metadata is checked before anything is embedded or written.
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let metadata = serde_json::to_string(&scalar_fields(record)?)?;
            rows.push((metadata, encode_payload(record)?));
        }

        let table = self.table();
        self.with_conn(|conn| {
            conn.execute_batch(&vector_schema(&self.name))
                .map_err(|e| RagError::database(format!("Failed to create {}: {}", table, e)))
        })?;

        for (batch, (texts, rows)) in texts
            .chunks(self.batch_size)
            .zip(rows.chunks(self.batch_size))
            .enumerate()
        {
            let embeddings = embed_batch(self.embedder.as_ref(), texts).await?;

            self.with_conn_mut(|conn| {
                let tx = conn.transaction().map_err(db_err)?;
                {
                    let mut stmt = tx
                        .prepare(&format!(
                            "INSERT INTO {table} (id, metadata, payload, embedding) \
                             VALUES (?1, ?2, ?3, ?4)"
                        ))
                        .map_err(db_err)?;

                    for ((metadata, payload), embedding) in rows.iter().zip(&embeddings) {
                        stmt.execute(params![
                            Ulid::new().to_string(),
                            metadata,
                            payload,
                            vec_to_bytes(embedding),
                        ])
                        .map_err(|e| {
                            RagError::database(format!("Failed to insert vector: {}", e))
                        })?;
                    }
                }
                tx.commit().map_err(db_err)
            })?;

            debug!("Inserted batch {} ({} rows) into {}", batch, rows.len(), table);
        }

        Ok(())
    }

    async fn delete(&self, condition: &Condition) -> Result<()> {
        let filter = SqlFilter.to_filter(condition)?;
        self.with_conn(|conn| {
            self.require_table(conn)?;
            let deleted = conn
                .execute(
                    &format!("DELETE FROM {} WHERE {}", self.table(), filter.clause),
                    params_from_iter(filter.params.iter()),
                )
                .map_err(db_err)?;

            debug!("Deleted {} vectors from {}", deleted, self.name);
            Ok(())
        })
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
        condition: Option<&Condition>,
    ) -> Result<Vec<RankedHit<T>>> {
        let filter = condition.map(|c| SqlFilter.to_filter(c)).transpose()?;
        self.with_conn(|conn| self.require_table(conn))?;

        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = embed_query(self.embedder.as_ref(), query).await?;

        let scored: Vec<(f32, Vec<u8>)> = self.with_conn(|conn| {
            self.require_table(conn)?;

            let (clause, params) = match &filter {
                Some(filter) => (filter.clause.as_str(), filter.params.as_slice()),
                None => ("1", &[][..]),
            };

            let mut stmt = conn
                .prepare(&format!(
                    "SELECT payload, embedding FROM {} WHERE {} ORDER BY seq",
                    self.table(),
                    clause
                ))
                .map_err(db_err)?;

            let rows = stmt
                .query_map(params_from_iter(params.iter()), |row| {
                    let payload: Vec<u8> = row.get(0)?;
                    let embedding: Vec<u8> = row.get(1)?;
                    Ok((payload, embedding))
                })
                .map_err(db_err)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(db_err)?;

            Ok(rows
                .into_iter()
                .map(|(payload, embedding)| {
                    let distance = l2_distance(&query_vec, &bytes_to_vec(&embedding));
                    (distance, payload)
                })
                .collect())
        })?;

        nearest(scored, top_k)
            .into_iter()
            .map(|(distance, payload)| Ok(RankedHit::new(decode_payload(&payload)?, distance)))
            .collect()
    }

    async fn exists(&self) -> Result<bool> {
        self.with_conn(|conn| table_exists(conn, &self.table()))
    }

    async fn destroy(&self) -> Result<()> {
        self.with_conn(|conn| {
            self.require_table(conn)?;
            conn.execute_batch(&format!("DROP TABLE {};", self.table()))
                .map_err(db_err)?;

            info!("Destroyed vector store {}", self.name);
            Ok(())
        })
    }

    async fn flush(&self) -> Result<()> {
        // Writes are committed per batch; nothing is pending.
        self.with_conn(|conn| self.require_table(conn))
    }
}
