use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{Load, LoadJob, SlotRef};
use crate::id::ResourceId;
use crate::models::Record;
use crate::repository::Repository;

/// A repository shared between a session and its fetch workers.
pub type SharedRepository<R> = Arc<dyn Repository<Row = R>>;

/// Job filling a slot with the table's row count.
pub fn count<S: 'static, R: Record>(
    slot: SlotRef<S, usize>,
    repo: &SharedRepository<R>,
) -> Box<dyn LoadJob<S>> {
    let repo = Arc::clone(repo);
    Load::new(slot, move || Ok(repo.fetch_count()?))
}

/// Job filling a slot with every row, keyed by id.
pub fn by_id<S: 'static, R: Record>(
    slot: SlotRef<S, HashMap<ResourceId, R>>,
    repo: &SharedRepository<R>,
) -> Box<dyn LoadJob<S>> {
    let repo = Arc::clone(repo);
    Load::new(slot, move || Ok(repo.fetch_by_id()?))
}

/// Job filling a slot with the ids of the rows accepted by `filter`.
pub fn filtered_ids<S: 'static, R: Record>(
    slot: SlotRef<S, HashSet<ResourceId>>,
    repo: &SharedRepository<R>,
    filter: fn(&R) -> bool,
) -> Box<dyn LoadJob<S>> {
    let repo = Arc::clone(repo);
    Load::new(slot, move || {
        Ok(repo.fetch_filtered_ids(&filter)?.into_iter().collect())
    })
}
