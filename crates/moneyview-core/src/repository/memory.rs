use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::{Repository, RowFilter};
use crate::error::StoreError;
use crate::id::ResourceId;
use crate::models::Record;

/// In-memory table.
///
/// Counts every query it serves and can be switched into a failing mode,
/// which makes it the collaborator of choice for exercising slot behaviour.
pub struct MemoryRepository<R> {
    name: String,
    rows: RwLock<Vec<R>>,
    failing: AtomicBool,
    queries: AtomicUsize,
}

impl<R: Record> MemoryRepository<R> {
    pub fn new(rows: Vec<R>) -> Self {
        Self {
            name: R::NAME.to_string(),
            rows: RwLock::new(rows),
            failing: AtomicBool::new(false),
            queries: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent query fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of queries served so far, failed ones included.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Insert or replace a row by id.
    pub fn upsert(&self, row: R) {
        let mut rows = self.rows.write();
        match rows.iter_mut().find(|r| r.id() == row.id()) {
            Some(slot) => *slot = row,
            None => rows.push(row),
        }
    }

    pub fn remove(&self, id: ResourceId) -> Option<R> {
        let mut rows = self.rows.write();
        let pos = rows.iter().position(|r| r.id() == id)?;
        Some(rows.remove(pos))
    }

    fn begin_query(&self) -> Result<(), StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{} is offline", self.name)));
        }
        Ok(())
    }
}

impl<R: Record> Repository for MemoryRepository<R> {
    type Row = R;

    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_all(&self) -> Result<Vec<R>, StoreError> {
        self.begin_query()?;
        Ok(self.rows.read().clone())
    }

    fn fetch_by_id(&self) -> Result<HashMap<ResourceId, R>, StoreError> {
        self.begin_query()?;
        Ok(self
            .rows
            .read()
            .iter()
            .map(|row| (row.id(), row.clone()))
            .collect())
    }

    fn fetch_count(&self) -> Result<usize, StoreError> {
        self.begin_query()?;
        Ok(self.rows.read().len())
    }

    fn fetch_filtered_ids(&self, filter: RowFilter<'_, R>) -> Result<Vec<ResourceId>, StoreError> {
        self.begin_query()?;
        Ok(self
            .rows
            .read()
            .iter()
            .filter(|&row| filter(row))
            .map(|row| row.id())
            .collect())
    }
}
