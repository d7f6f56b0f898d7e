//! The vector store: an append-only table of memory rows keyed by id,
//! backed by SQLite (WAL pragmas behind a `parking_lot::Mutex`-guarded
//! connection), with brute-force cosine similarity search, scan, delete,
//! and refresh. Corpora are bounded to a modest row count, so similarity
//! search is a brute-force scan in Rust over vectors stored as BLOB
//! columns rather than an ANN index.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::migrations::run_migrations;
use crate::error::{CodexfiError, Result};
use crate::id::{is_valid_raw_id, MemoryId};
use crate::types::{MemoryPatch, MemoryRow, MemoryType, NewMemoryRow, ScanOptions, ScoredRow};

/// SQLite-backed vector store. `refresh()` reopens the handle so writes
/// from other in-process writers become visible — there is no
/// cross-process coordination.
pub struct VectorStore {
    path: StorePath,
    dims: usize,
    conn: Arc<Mutex<Connection>>,
}

enum StorePath {
    Memory,
    File(std::path::PathBuf),
}

impl VectorStore {
    /// Opens (creating if needed) the store at `dir/memories.db`.
    pub fn open(dir: &Path, dims: usize) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("memories.db");
        let conn = Self::connect(&path)?;
        run_migrations(&conn)?;
        Ok(Self {
            path: StorePath::File(path),
            dims,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory(dims: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure_pragmas(&conn)?;
        run_migrations(&conn)?;
        Ok(Self {
            path: StorePath::Memory,
            dims,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn connect(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path)?;
        Self::configure_pragmas(&conn)?;
        Ok(conn)
    }

    fn configure_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA busy_timeout=10000;
            PRAGMA foreign_keys=ON;
            "#,
        )?;
        Ok(())
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Reopens the table handle so writes from other writers in this
    /// process become visible. Idempotent and safe across tasks.
    pub fn refresh(&self) -> Result<()> {
        let mut guard = self.conn.lock();
        let fresh = match &self.path {
            StorePath::Memory => return Ok(()), // nothing to reopen
            StorePath::File(p) => Self::connect(p)?,
        };
        *guard = fresh;
        Ok(())
    }

    /// Atomic append of one or more rows. Rejects dimension mismatch and
    /// duplicate ids.
    pub fn insert(&self, rows: &[NewMemoryRow]) -> Result<()> {
        for row in rows {
            if row.vector.len() != self.dims {
                return Err(CodexfiError::DimensionMismatch {
                    expected: self.dims,
                    actual: row.vector.len(),
                });
            }
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for row in rows {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM memories WHERE id = ?",
                    params![row.id.to_crockford()],
                    |r| r.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Err(CodexfiError::InvalidArg(format!(
                    "memory id already exists: {}",
                    row.id
                )));
            }

            tx.execute(
                "INSERT INTO memories
                    (id, memory, chunk, user_id, vector, metadata, memory_type, hash, superseded_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    row.id.to_crockford(),
                    row.memory,
                    row.chunk,
                    row.user_id,
                    encode_vector(&row.vector),
                    serde_json::to_string(&row.metadata)?,
                    row.memory_type.as_str(),
                    row.hash,
                    row.superseded_by.map(|id| id.to_crockford()),
                    row.created_at.to_rfc3339(),
                    row.updated_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// In-place mutation of the bounded field set the contract allows.
    /// Vector rewrites are not permitted here — delete + insert instead.
    pub fn update(&self, id: MemoryId, patch: &MemoryPatch) -> Result<()> {
        let conn = self.conn.lock();
        let id_str = id.to_crockford();

        let current = Self::fetch_row(&conn, &id_str)?
            .ok_or_else(|| CodexfiError::NotFound(id.to_string()))?;

        let memory = patch.memory.clone().unwrap_or(current.memory);
        let chunk = patch.chunk.clone().unwrap_or(current.chunk);
        let metadata = patch.metadata.clone().unwrap_or(current.metadata);
        let memory_type = patch.memory_type.unwrap_or(current.memory_type);
        let superseded_by = patch
            .superseded_by
            .clone()
            .unwrap_or(current.superseded_by);
        let updated_at = patch.updated_at.unwrap_or_else(Utc::now);

        conn.execute(
            "UPDATE memories SET memory = ?1, chunk = ?2, metadata = ?3, memory_type = ?4,
                superseded_by = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                memory,
                chunk,
                serde_json::to_string(&metadata)?,
                memory_type.as_str(),
                superseded_by.map(|sid| sid.to_crockford()),
                updated_at.to_rfc3339(),
                id_str,
            ],
        )?;
        Ok(())
    }

    /// Hard delete by id. Rejects ids that don't match the whitelist
    /// `[A-Za-z0-9_-]{1,64}` since ids are attacker-controlled in some
    /// call paths (e.g. a delete request forwarded from a host).
    pub fn delete(&self, raw_id: &str) -> Result<()> {
        if !is_valid_raw_id(raw_id) {
            return Err(CodexfiError::InvalidArg(format!(
                "invalid memory id: {raw_id}"
            )));
        }
        let conn = self.conn.lock();
        let affected = conn.execute("DELETE FROM memories WHERE id = ?1", params![raw_id])?;
        if affected == 0 {
            return Err(CodexfiError::NotFound(raw_id.to_string()));
        }
        Ok(())
    }

    /// Returns up to `limit` active rows in `user_id` with cosine
    /// similarity >= `threshold` to `query`, descending by score, ties
    /// broken by `updated_at` desc then `id` desc.
    pub fn search_by_vector(
        &self,
        query: &[f32],
        user_id: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredRow>> {
        if query.len() != self.dims {
            return Err(CodexfiError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, memory, chunk, user_id, vector, metadata, memory_type, hash,
                    superseded_by, created_at, updated_at
             FROM memories
             WHERE user_id = ?1 AND superseded_by IS NULL",
        )?;

        let mut scored = Vec::new();
        let mut rows = stmt.query(params![user_id])?;
        while let Some(row) = rows.next()? {
            let memory_row = row_to_memory(row)?;
            let score = cosine_similarity(query, &memory_row.vector);
            if score >= threshold {
                scored.push(ScoredRow {
                    row: memory_row,
                    score,
                });
            }
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.row.updated_at.cmp(&a.row.updated_at))
                .then_with(|| b.row.id.cmp(&a.row.id))
        });
        scored.truncate(limit);
        Ok(scored)
    }

    /// Non-ranked enumeration. Excludes superseded rows unless opted in.
    pub fn scan(&self, user_id: &str, options: &ScanOptions) -> Result<Vec<MemoryRow>> {
        let conn = self.conn.lock();
        let sql = if options.include_superseded {
            "SELECT id, memory, chunk, user_id, vector, metadata, memory_type, hash,
                    superseded_by, created_at, updated_at
             FROM memories WHERE user_id = ?1"
        } else {
            "SELECT id, memory, chunk, user_id, vector, metadata, memory_type, hash,
                    superseded_by, created_at, updated_at
             FROM memories WHERE user_id = ?1 AND superseded_by IS NULL"
        };
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params![user_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row_to_memory(row)?);
            if let Some(limit) = options.limit {
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    /// Active row count for `user_id`.
    pub fn count(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memories WHERE user_id = ?1 AND superseded_by IS NULL",
            params![user_id],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    /// Fetches a single row by id regardless of active/superseded state.
    pub fn get(&self, id: MemoryId) -> Result<Option<MemoryRow>> {
        let conn = self.conn.lock();
        Self::fetch_row(&conn, &id.to_crockford())
    }

    fn fetch_row(conn: &Connection, id_str: &str) -> Result<Option<MemoryRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, memory, chunk, user_id, vector, metadata, memory_type, hash,
                    superseded_by, created_at, updated_at
             FROM memories WHERE id = ?1",
        )?;
        let result = stmt
            .query_row(params![id_str], row_to_memory)
            .optional()?;
        Ok(result)
    }
}

impl Clone for VectorStore {
    fn clone(&self) -> Self {
        Self {
            path: match &self.path {
                StorePath::Memory => StorePath::Memory,
                StorePath::File(p) => StorePath::File(p.clone()),
            },
            dims: self.dims,
            conn: self.conn.clone(),
        }
    }
}

fn row_to_memory(row: &Row) -> rusqlite::Result<MemoryRow> {
    let id_str: String = row.get("id")?;
    let vector_blob: Vec<u8> = row.get("vector")?;
    let metadata_str: String = row.get("metadata")?;
    let memory_type_str: String = row.get("memory_type")?;
    let superseded_by: Option<String> = row.get("superseded_by")?;
    let created_at_str: String = row.get("created_at")?;
    let updated_at_str: String = row.get("updated_at")?;

    Ok(MemoryRow {
        id: id_str
            .parse()
            .map_err(|_| rusqlite::Error::InvalidColumnType(0, "id".into(), rusqlite::types::Type::Text))?,
        memory: row.get("memory")?,
        chunk: row.get("chunk")?,
        user_id: row.get("user_id")?,
        vector: decode_vector(&vector_blob),
        metadata: serde_json::from_str(&metadata_str).unwrap_or_default(),
        memory_type: MemoryType::parse_or_conversation(&memory_type_str),
        hash: row.get("hash")?,
        superseded_by: superseded_by.and_then(|s| s.parse().ok()),
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity between two equal-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemoryType;
    use std::collections::HashMap;

    fn unit(dims: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dims];
        v[hot] = 1.0;
        v
    }

    fn sample_row(id: MemoryId, user_id: &str, vector: Vec<f32>) -> NewMemoryRow {
        let now = Utc::now();
        NewMemoryRow {
            id,
            memory: "test memory".to_string(),
            chunk: String::new(),
            user_id: user_id.to_string(),
            vector,
            metadata: HashMap::new(),
            memory_type: MemoryType::Conversation,
            hash: "deadbeef".to_string(),
            superseded_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn insert_rejects_dimension_mismatch() {
        let store = VectorStore::open_in_memory(4).unwrap();
        let row = sample_row(MemoryId::new(), "u1", vec![1.0, 0.0]);
        let err = store.insert(&[row]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Dim);
    }

    #[test]
    fn insert_rejects_duplicate_id() {
        let store = VectorStore::open_in_memory(4).unwrap();
        let id = MemoryId::new();
        let row = sample_row(id, "u1", unit(4, 0));
        store.insert(&[row.clone()]).unwrap();
        assert!(store.insert(&[row]).is_err());
    }

    #[test]
    fn search_filters_by_scope_and_threshold() {
        let store = VectorStore::open_in_memory(4).unwrap();
        let a = sample_row(MemoryId::new(), "u1", unit(4, 0));
        let b = sample_row(MemoryId::new(), "u2", unit(4, 0));
        store.insert(&[a, b]).unwrap();

        let results = store.search_by_vector(&unit(4, 0), "u1", 10, 0.5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].row.user_id, "u1");
    }

    #[test]
    fn search_excludes_superseded_rows() {
        let store = VectorStore::open_in_memory(4).unwrap();
        let old_id = MemoryId::new();
        let row = sample_row(old_id, "u1", unit(4, 0));
        store.insert(&[row]).unwrap();

        let new_id = MemoryId::new();
        store
            .update(
                old_id,
                &MemoryPatch {
                    superseded_by: Some(Some(new_id)),
                    ..Default::default()
                },
            )
            .unwrap();

        let results = store.search_by_vector(&unit(4, 0), "u1", 10, 0.0).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn delete_rejects_malformed_ids() {
        let store = VectorStore::open_in_memory(4).unwrap();
        assert!(store.delete("../etc/passwd").is_err());
        assert!(store.delete("has a space").is_err());
    }

    #[test]
    fn delete_removes_a_row() {
        let store = VectorStore::open_in_memory(4).unwrap();
        let id = MemoryId::new();
        store.insert(&[sample_row(id, "u1", unit(4, 0))]).unwrap();
        store.delete(&id.to_crockford()).unwrap();
        assert!(store.get(id).unwrap().is_none());
    }

    #[test]
    fn scan_can_include_superseded() {
        let store = VectorStore::open_in_memory(4).unwrap();
        let old_id = MemoryId::new();
        store.insert(&[sample_row(old_id, "u1", unit(4, 0))]).unwrap();
        let new_id = MemoryId::new();
        store
            .update(
                old_id,
                &MemoryPatch {
                    superseded_by: Some(Some(new_id)),
                    ..Default::default()
                },
            )
            .unwrap();

        let active = store.scan("u1", &ScanOptions::default()).unwrap();
        assert!(active.is_empty());

        let all = store
            .scan(
                "u1",
                &ScanOptions {
                    include_superseded: true,
                    limit: None,
                },
            )
            .unwrap();
        assert_eq!(all.len(), 1);
    }
}
