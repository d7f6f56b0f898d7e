//! Lifecycle operations: list, profile, delete, cleanup. `cleanup` is a
//! best-effort sweep: a single delete failure is logged and does not
//! abort it.

use crate::error::Result;
use crate::id::MemoryId;
use crate::store::VectorStore;
use crate::types::{ListOptions, MemoryRow, ScanOptions};

pub struct LifecycleOps {
    store: VectorStore,
}

impl LifecycleOps {
    pub fn new(store: VectorStore) -> Self {
        Self { store }
    }

    /// Unordered slice of rows for `user_id`.
    pub fn list(&self, user_id: &str, options: &ListOptions) -> Result<Vec<MemoryRow>> {
        self.store.scan(
            user_id,
            &ScanOptions {
                include_superseded: options.include_superseded,
                limit: options.limit,
            },
        )
    }

    /// `n` most recent active rows by `updated_at` desc, then `id` desc.
    pub fn profile(&self, user_id: &str, n: usize) -> Result<Vec<MemoryRow>> {
        let mut rows = self.store.scan(user_id, &ScanOptions::default())?;
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| b.id.cmp(&a.id)));
        rows.truncate(n);
        Ok(rows)
    }

    pub fn delete(&self, id: MemoryId) -> Result<()> {
        self.store.delete(&id.to_crockford())
    }

    /// Enumerates including superseded rows and deletes each, best-effort:
    /// a single failure is logged and does not abort the sweep.
    pub fn cleanup(&self, user_id: &str) -> Result<usize> {
        let rows = self.store.scan(
            user_id,
            &ScanOptions {
                include_superseded: true,
                limit: None,
            },
        )?;
        let mut deleted = 0;
        for row in rows {
            match self.store.delete(&row.id.to_crockford()) {
                Ok(()) => deleted += 1,
                Err(err) => {
                    tracing::warn!(error = %err, id = %row.id, "cleanup: failed to delete row, continuing sweep");
                }
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MemoryPatch, MemoryType, NewMemoryRow};
    use chrono::Utc;
    use std::collections::HashMap;

    fn row(user_id: &str, memory: &str) -> NewMemoryRow {
        let now = Utc::now();
        NewMemoryRow {
            id: MemoryId::new(),
            memory: memory.to_string(),
            chunk: String::new(),
            user_id: user_id.to_string(),
            vector: vec![1.0, 0.0],
            metadata: HashMap::new(),
            memory_type: MemoryType::Conversation,
            hash: crate::dedup::compute_hash(memory),
            superseded_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn profile_orders_by_recency_then_id() {
        let store = VectorStore::open_in_memory(2).unwrap();
        let ops = LifecycleOps::new(store.clone());
        let a = row("u1", "first");
        let a_id = a.id;
        store.insert(&[a]).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = row("u1", "second");
        let b_id = b.id;
        store.insert(&[b]).unwrap();

        let profile = ops.profile("u1", 10).unwrap();
        assert_eq!(profile[0].id, b_id);
        assert_eq!(profile[1].id, a_id);
    }

    #[test]
    fn cleanup_removes_active_and_superseded_rows() {
        let store = VectorStore::open_in_memory(2).unwrap();
        let ops = LifecycleOps::new(store.clone());
        let old = row("u1", "old fact");
        let old_id = old.id;
        store.insert(&[old]).unwrap();
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

        let deleted = ops.cleanup("u1").unwrap();
        assert_eq!(deleted, 1);
        assert!(store.get(old_id).unwrap().is_none());
    }
}
