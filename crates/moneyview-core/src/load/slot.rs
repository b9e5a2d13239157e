use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::LoadState;
use crate::error::LoadError;

/// Outcome of trying to start a load on a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Begin {
    /// The caller owns the load and must commit (or abandon) it.
    Started,
    /// Nothing to do; carries whether the slot is ready.
    Settled(bool),
    /// Someone else owns the load in flight.
    InFlight,
}

struct SlotCell<V> {
    state: LoadState,
    value: Arc<V>,
    last_error: Option<String>,
}

/// One cached value, its load state and the bookkeeping to fetch it at most once.
///
/// The value is held behind an `Arc` and replaced in a single assignment under
/// the same write lock that flips the state, so readers see either the old
/// value or the new one, and `Ready` only once the new value is in place.
/// Waiters are woken through a `watch` channel mirroring the state.
pub struct LoadSlot<V> {
    name: String,
    cell: RwLock<SlotCell<V>>,
    settled: watch::Sender<LoadState>,
}

impl<V: Default> LoadSlot<V> {
    /// An idle slot holding `V::default()`.
    pub fn new(name: impl Into<String>) -> Self {
        let (settled, _) = watch::channel(LoadState::Idle);
        Self {
            name: name.into(),
            cell: RwLock::new(SlotCell {
                state: LoadState::Idle,
                value: Arc::new(V::default()),
                last_error: None,
            }),
            settled,
        }
    }

    /// Drop the cached value and return to `Idle`. No-op unless settled.
    pub fn unload(&self) {
        let mut cell = self.cell.write();
        if !cell.state.begin_unload() {
            return;
        }
        cell.value = Arc::new(V::default());
        cell.last_error = None;
        cell.state.finish_unload();
        self.settled.send_replace(cell.state);
        debug!(slot = %self.name, "Unloaded");
    }
}

impl<V> LoadSlot<V> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LoadState {
        self.cell.read().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LoadState::Ready
    }

    pub fn is_error(&self) -> bool {
        self.state() == LoadState::Error
    }

    /// Last committed value. While loading this is the previous value, never a partial one.
    pub fn current_value(&self) -> Arc<V> {
        Arc::clone(&self.cell.read().value)
    }

    /// The value, only when the slot is ready.
    pub fn ready_value(&self) -> Option<Arc<V>> {
        let cell = self.cell.read();
        (cell.state == LoadState::Ready).then(|| Arc::clone(&cell.value))
    }

    /// Message of the most recent failure, cleared by a successful load or an unload.
    pub fn last_error(&self) -> Option<String> {
        self.cell.read().last_error.clone()
    }

    /// Try to take ownership of a load. A slot in `Error` is re-entered (retry).
    pub fn begin(&self) -> Begin {
        let mut cell = self.cell.write();
        let began = if cell.state == LoadState::Error {
            debug!(slot = %self.name, "Retrying after error");
            cell.state.begin_reload()
        } else {
            cell.state.begin_load()
        };
        if began {
            self.settled.send_replace(cell.state);
            return Begin::Started;
        }
        match cell.state {
            LoadState::Loading => Begin::InFlight,
            state => Begin::Settled(state == LoadState::Ready),
        }
    }

    /// Record the outcome of a load started with [`LoadSlot::begin`].
    ///
    /// Returns whether the slot ended up ready. A result arriving for a slot
    /// that is no longer loading is dropped.
    pub fn commit(&self, result: Result<V, LoadError>) -> bool {
        let mut cell = self.cell.write();
        if cell.state != LoadState::Loading {
            warn!(slot = %self.name, state = cell.state.display_name(), "Discarding result for slot that is not loading");
            return false;
        }
        let ok = match result {
            Ok(value) => {
                cell.value = Arc::new(value);
                cell.last_error = None;
                true
            }
            Err(e) => {
                warn!(slot = %self.name, error = %e, "Load failed");
                cell.last_error = Some(e.to_string());
                false
            }
        };
        cell.state.finish_load(ok);
        self.settled.send_replace(cell.state);
        if ok {
            info!(slot = %self.name, "Loaded");
        }
        ok
    }

    /// Give up a load that will never be committed; the slot returns to `Idle`.
    pub fn abandon(&self) {
        let mut cell = self.cell.write();
        if cell.state != LoadState::Loading {
            return;
        }
        cell.state.finish_unload();
        self.settled.send_replace(cell.state);
        debug!(slot = %self.name, "Abandoned in-flight load");
    }

    /// Wait until the slot is not loading; returns whether it is ready.
    pub async fn wait_settled(&self) -> bool {
        let mut rx = self.settled.subscribe();
        let ready = match rx.wait_for(|state| *state != LoadState::Loading).await {
            Ok(state) => *state == LoadState::Ready,
            Err(_) => false,
        };
        ready
    }

    /// Edit a ready value in place without refetching.
    ///
    /// The slot passes through `Loading` while the edit runs, all under the
    /// write lock, so readers never observe the intermediate state.
    pub fn patch(&self, edit: impl FnOnce(&mut V)) -> bool
    where
        V: Clone,
    {
        let mut cell = self.cell.write();
        if cell.state != LoadState::Ready || !cell.state.begin_unload() {
            return false;
        }
        edit(Arc::make_mut(&mut cell.value));
        cell.state.finish_load(true);
        debug!(slot = %self.name, "Patched in place");
        true
    }
}

impl<V: Send + 'static> LoadSlot<V> {
    /// Load the value unless it is already loaded or being loaded.
    ///
    /// Exactly one of any number of concurrent callers runs `fetcher`, on the
    /// blocking worker pool; the others wait for its outcome. A slot in
    /// `Error` is retried. Returns whether the slot is ready afterwards.
    pub async fn request_load<F>(&self, fetcher: F) -> bool
    where
        F: FnOnce() -> Result<V, LoadError> + Send + 'static,
    {
        match self.begin() {
            Begin::Started => {}
            Begin::Settled(ready) => return ready,
            Begin::InFlight => return self.wait_settled().await,
        }
        let ticket = LoadTicket::new(self);
        let result = run_blocking(fetcher).await;
        ticket.commit(result)
    }

    /// Refetch regardless of the current settled state, keeping the old value
    /// visible until the new one is committed.
    pub async fn reload<F>(&self, fetcher: F) -> bool
    where
        F: FnOnce() -> Result<V, LoadError> + Send + 'static,
    {
        let began = {
            let mut cell = self.cell.write();
            let began = cell.state.begin_reload();
            if began {
                self.settled.send_replace(cell.state);
            }
            began
        };
        if !began {
            return self.wait_settled().await;
        }
        let ticket = LoadTicket::new(self);
        let result = run_blocking(fetcher).await;
        ticket.commit(result)
    }
}

/// Run a synchronous fetch on the blocking pool.
pub(crate) async fn run_blocking<V, F>(fetcher: F) -> Result<V, LoadError>
where
    F: FnOnce() -> Result<V, LoadError> + Send + 'static,
    V: Send + 'static,
{
    tokio::task::spawn_blocking(fetcher)
        .await
        .unwrap_or_else(|e| Err(e.into()))
}

/// Ownership of a started load. Dropped uncommitted, it abandons the load so
/// a cancelled caller never leaves the slot stuck in `Loading`.
struct LoadTicket<'a, V> {
    slot: &'a LoadSlot<V>,
    committed: bool,
}

impl<'a, V> LoadTicket<'a, V> {
    fn new(slot: &'a LoadSlot<V>) -> Self {
        Self {
            slot,
            committed: false,
        }
    }

    fn commit(mut self, result: Result<V, LoadError>) -> bool {
        self.committed = true;
        self.slot.commit(result)
    }
}

impl<V> Drop for LoadTicket<'_, V> {
    fn drop(&mut self) {
        if !self.committed {
            self.slot.abandon();
        }
    }
}

/// Type-erased handle on a slot, for code that drives slots of different value types together.
pub trait SlotControl: Send + Sync {
    fn name(&self) -> &str;
    fn state(&self) -> LoadState;
    fn begin(&self) -> Begin;
    fn fail(&self, error: LoadError) -> bool;
    fn abandon(&self);
    fn unload(&self);
    fn wait_settled(&self) -> BoxFuture<'_, bool>;
}

impl<V: Default + Send + Sync> SlotControl for LoadSlot<V> {
    fn name(&self) -> &str {
        LoadSlot::name(self)
    }

    fn state(&self) -> LoadState {
        LoadSlot::state(self)
    }

    fn begin(&self) -> Begin {
        LoadSlot::begin(self)
    }

    fn fail(&self, error: LoadError) -> bool {
        self.commit(Err(error))
    }

    fn abandon(&self) {
        LoadSlot::abandon(self)
    }

    fn unload(&self) {
        LoadSlot::unload(self)
    }

    fn wait_settled(&self) -> BoxFuture<'_, bool> {
        Box::pin(LoadSlot::wait_settled(self))
    }
}
