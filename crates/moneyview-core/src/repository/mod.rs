//! Capability interface over the persistence collaborator.
//!
//! The loading layer never talks to storage directly. Each entity table is
//! reached through a [`Repository`], whose four query shapes are all
//! synchronous and may block; they are only ever called from worker threads.
//!
//! Two implementations ship with the crate:
//! - [`MemoryRepository`]: an in-memory table (tests, demos)
//! - [`SnapshotTable`]: a JSON snapshot file inside a [`SnapshotStore`]

pub mod memory;
pub mod snapshot;

pub use memory::MemoryRepository;
pub use snapshot::{Snapshot, SnapshotAges, SnapshotStore, SnapshotTable};

use std::collections::HashMap;

use crate::error::StoreError;
use crate::id::ResourceId;
use crate::models::Record;

/// Row filter passed to [`Repository::fetch_filtered_ids`].
pub type RowFilter<'a, R> = &'a (dyn Fn(&R) -> bool + Send + Sync);

pub trait Repository: Send + Sync + 'static {
    type Row: Record;

    /// Name used in slot names and logs, e.g. `Category`.
    fn name(&self) -> &str;

    fn fetch_all(&self) -> Result<Vec<Self::Row>, StoreError>;

    fn fetch_by_id(&self) -> Result<HashMap<ResourceId, Self::Row>, StoreError> {
        Ok(self
            .fetch_all()?
            .into_iter()
            .map(|row| (row.id(), row))
            .collect())
    }

    fn fetch_count(&self) -> Result<usize, StoreError> {
        Ok(self.fetch_all()?.len())
    }

    /// Ids of the rows accepted by `filter`, in storage order.
    fn fetch_filtered_ids(&self, filter: RowFilter<'_, Self::Row>) -> Result<Vec<ResourceId>, StoreError> {
        Ok(self
            .fetch_all()?
            .iter()
            .filter(|&row| filter(row))
            .map(|row| row.id())
            .collect())
    }
}
