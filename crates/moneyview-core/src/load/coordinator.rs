use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::slot::{Begin, LoadSlot, SlotControl};
use super::LoadState;
use crate::error::LoadError;

/// Buffer size for the completion channel of one batch.
/// Batches are a handful of slots; 32 leaves plenty of headroom.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Accessor from a session's slot set to one of its slots.
pub type SlotRef<S, V> = fn(&S) -> &LoadSlot<V>;

/// A finished fetch, packaged to be committed into the slot set.
type Merge<S> = Box<dyn FnOnce(&S) -> bool + Send>;

type Fetch<V> = Box<dyn FnOnce() -> Result<V, LoadError> + Send>;

/// Turns the slot set into a fetch, reading whatever inputs the fetch needs.
type Bind<S, V> = Box<dyn FnOnce(&S) -> Fetch<V> + Send>;

/// Something that loads one slot of a slot set `S`.
pub trait LoadJob<S>: Send {
    fn slot<'s>(&self, slots: &'s S) -> &'s dyn SlotControl;

    /// Slots whose values this job reads.
    fn upstream<'s>(&self, _slots: &'s S) -> Vec<&'s dyn SlotControl> {
        Vec::new()
    }

    /// Read inputs from the slot set. Called on the coordinator task once the
    /// job owns its slot and every upstream slot has settled.
    fn bind(&mut self, _slots: &S) {}

    /// Execute the fetch. Blocking; called on a worker thread.
    fn run(self: Box<Self>) -> Merge<S>;
}

/// Type-erased accessor to an upstream slot.
trait Upstream<S>: Send + Sync {
    fn control<'s>(&self, slots: &'s S) -> &'s dyn SlotControl;
}

struct Input<S, U>(SlotRef<S, U>);

impl<S, U: Default + Send + Sync + 'static> Upstream<S> for Input<S, U> {
    fn control<'s>(&self, slots: &'s S) -> &'s dyn SlotControl {
        (self.0)(slots)
    }
}

/// Value of a slot that must be ready before a derived value can be evaluated.
fn ready_input<V>(slot: &LoadSlot<V>) -> Result<Arc<V>, LoadError> {
    slot.ready_value()
        .ok_or_else(|| LoadError::NotReady(slot.name().to_string()))
}

/// A fetch (or evaluation) bound to the slot that caches its result.
pub struct Load<S, V> {
    slot: SlotRef<S, V>,
    upstream: Vec<Box<dyn Upstream<S>>>,
    bind: Option<Bind<S, V>>,
    fetch: Option<Fetch<V>>,
}

impl<S: 'static, V: Default + Send + Sync + 'static> Load<S, V> {
    pub fn new(
        slot: SlotRef<S, V>,
        fetch: impl FnOnce() -> Result<V, LoadError> + Send + 'static,
    ) -> Box<dyn LoadJob<S>> {
        Box::new(Self {
            slot,
            upstream: Vec::new(),
            bind: None,
            fetch: Some(Box::new(fetch)),
        })
    }

    /// A value derived from another slot's ready value.
    ///
    /// The upstream value is read when the job starts, after any load of the
    /// upstream slot in the same batch has been merged. If the upstream slot
    /// is not ready then, the job fails with [`LoadError::NotReady`] and the
    /// target slot lands in `Error`.
    pub fn eval<U>(
        slot: SlotRef<S, V>,
        upstream: SlotRef<S, U>,
        eval: impl FnOnce(&U) -> V + Send + 'static,
    ) -> Box<dyn LoadJob<S>>
    where
        U: Default + Send + Sync + 'static,
    {
        let bind: Bind<S, V> = Box::new(move |slots: &S| {
            let input = ready_input(upstream(slots));
            let fetch: Fetch<V> = Box::new(move || Ok(eval(&*input?)));
            fetch
        });
        Box::new(Self {
            slot,
            upstream: vec![Box::new(Input(upstream))],
            bind: Some(bind),
            fetch: None,
        })
    }

    /// A value derived from two other slots, both of which must be ready.
    pub fn eval2<U, W>(
        slot: SlotRef<S, V>,
        first: SlotRef<S, U>,
        second: SlotRef<S, W>,
        eval: impl FnOnce(&U, &W) -> V + Send + 'static,
    ) -> Box<dyn LoadJob<S>>
    where
        U: Default + Send + Sync + 'static,
        W: Default + Send + Sync + 'static,
    {
        let bind: Bind<S, V> = Box::new(move |slots: &S| {
            let a = ready_input(first(slots));
            let b = ready_input(second(slots));
            let fetch: Fetch<V> = Box::new(move || Ok(eval(&*a?, &*b?)));
            fetch
        });
        Box::new(Self {
            slot,
            upstream: vec![Box::new(Input(first)), Box::new(Input(second))],
            bind: Some(bind),
            fetch: None,
        })
    }
}

impl<S: 'static, V: Default + Send + Sync + 'static> LoadJob<S> for Load<S, V> {
    fn slot<'s>(&self, slots: &'s S) -> &'s dyn SlotControl {
        (self.slot)(slots)
    }

    fn upstream<'s>(&self, slots: &'s S) -> Vec<&'s dyn SlotControl> {
        self.upstream.iter().map(|input| input.control(slots)).collect()
    }

    fn bind(&mut self, slots: &S) {
        if let Some(bind) = self.bind.take() {
            self.fetch = Some(bind(slots));
        }
    }

    fn run(self: Box<Self>) -> Merge<S> {
        let result = match self.fetch {
            Some(fetch) => fetch(),
            None => Err(LoadError::NotReady("unbound inputs".to_string())),
        };
        let slot = self.slot;
        Box::new(move |slots: &S| slot(slots).commit(result))
    }
}

fn same_slot(a: &dyn SlotControl, b: &dyn SlotControl) -> bool {
    std::ptr::eq(a as *const _ as *const (), b as *const _ as *const ())
}

/// Result of one worker, sent back to the batch that launched it.
struct Completion<S> {
    index: usize,
    merge: Result<Merge<S>, LoadError>,
}

/// Slots a batch started and has not yet merged.
///
/// If the batch is dropped before every completion arrives (its future was
/// cancelled), the remaining slots are abandoned back to `Idle`.
#[derive(Default)]
struct Batch<'a> {
    slots: Vec<&'a dyn SlotControl>,
    pending: Vec<bool>,
}

impl<'a> Batch<'a> {
    fn push(&mut self, slot: &'a dyn SlotControl) -> usize {
        self.slots.push(slot);
        self.pending.push(true);
        self.slots.len() - 1
    }

    fn has_pending(&self) -> bool {
        self.pending.iter().any(|&p| p)
    }

    fn is_pending(&self, slot: &dyn SlotControl) -> bool {
        self.slots
            .iter()
            .zip(&self.pending)
            .any(|(s, &p)| p && same_slot(*s, slot))
    }

    fn settle(&mut self, index: usize) {
        if let Some(p) = self.pending.get_mut(index) {
            *p = false;
        }
    }
}

impl Drop for Batch<'_> {
    fn drop(&mut self) {
        for (slot, pending) in self.slots.iter().zip(&self.pending) {
            if *pending {
                warn!(slot = slot.name(), "Batch dropped before fetch completed");
                slot.abandon();
            }
        }
    }
}

/// Owns the slots of one view session and drives their loads.
///
/// Fetches run on the blocking worker pool; their results come back as
/// messages over a channel private to the batch and are committed from the
/// coordinator's own task, one at a time. Workers never hold a reference to
/// the slots, only a weak sender: once the batch (or the whole coordinator)
/// is gone, a late result fails to upgrade and is dropped.
pub struct LoadCoordinator<S> {
    name: String,
    slots: S,
}

impl<S: Send + Sync + 'static> LoadCoordinator<S> {
    pub fn new(name: impl Into<String>, slots: S) -> Self {
        Self {
            name: name.into(),
            slots,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slots(&self) -> &S {
        &self.slots
    }

    /// Load a single slot; returns whether it is ready.
    pub async fn load(&self, job: Box<dyn LoadJob<S>>) -> bool {
        self.load_all(vec![job]).await
    }

    /// Load every slot of `jobs` concurrently; true only if all end up ready.
    ///
    /// Idle (or failed) slots are fetched, ready slots are left alone, and
    /// slots already loading elsewhere are waited for. One failing slot does
    /// not stop the others. A job whose upstream slot is loaded by this same
    /// batch starts only after that load has been merged.
    pub async fn load_all(&self, jobs: Vec<Box<dyn LoadJob<S>>>) -> bool {
        let (tx, mut rx) = mpsc::channel::<Completion<S>>(CHANNEL_BUFFER_SIZE);
        let mut ok = true;
        let mut batch = Batch::default();
        let mut in_flight: Vec<&dyn SlotControl> = Vec::new();
        let mut queue = jobs;

        loop {
            while let Some(pos) = self.next_startable(&queue, &batch) {
                let mut job = queue.remove(pos);
                for upstream in job.upstream(&self.slots) {
                    if upstream.state() == LoadState::Loading {
                        upstream.wait_settled().await;
                    }
                }
                let slot = job.slot(&self.slots);
                match slot.begin() {
                    Begin::Settled(ready) => ok &= ready,
                    Begin::InFlight => in_flight.push(slot),
                    Begin::Started => {
                        job.bind(&self.slots);
                        let index = batch.push(slot);
                        debug!(coordinator = %self.name, slot = slot.name(), "Fetch started");
                        tokio::spawn(Self::execute(job, index, tx.downgrade()));
                    }
                }
            }

            if !batch.has_pending() {
                break;
            }
            let Some(Completion { index, merge }) = rx.recv().await else {
                break;
            };
            let ready = match merge {
                Ok(merge) => merge(&self.slots),
                Err(e) => batch.slots[index].fail(e),
            };
            batch.settle(index);
            ok &= ready;
        }
        drop(tx);

        for slot in in_flight {
            ok &= slot.wait_settled().await;
        }

        if ok {
            debug!(coordinator = %self.name, "Batch ready");
        } else {
            warn!(coordinator = %self.name, "Batch finished with errors");
        }
        ok
    }

    /// Position of the next queued job none of whose upstream slots is still
    /// being produced by this batch. When every queued job waits on another
    /// queued job and nothing is pending, the first one is released.
    fn next_startable(&self, queue: &[Box<dyn LoadJob<S>>], batch: &Batch<'_>) -> Option<usize> {
        let waiting = |job: &Box<dyn LoadJob<S>>| {
            job.upstream(&self.slots).into_iter().any(|upstream| {
                batch.is_pending(upstream)
                    || queue
                        .iter()
                        .any(|other| same_slot(other.slot(&self.slots), upstream))
            })
        };
        queue
            .iter()
            .position(|job| !waiting(job))
            .or_else(|| (!queue.is_empty() && !batch.has_pending()).then_some(0))
    }

    /// Worker body: fetch on the blocking pool, then hand the result back if
    /// the batch is still listening.
    async fn execute(
        job: Box<dyn LoadJob<S>>,
        index: usize,
        inbox: mpsc::WeakSender<Completion<S>>,
    ) {
        let merge = tokio::task::spawn_blocking(move || job.run())
            .await
            .map_err(LoadError::from);
        match inbox.upgrade() {
            Some(inbox) => {
                if inbox.send(Completion { index, merge }).await.is_err() {
                    debug!(index, "Batch closed, discarding fetch result");
                }
            }
            None => debug!(index, "Coordinator gone, discarding fetch result"),
        }
    }

    /// Return every slot to `Idle`, waiting out loads in flight first.
    pub async fn unload_all(&self, slots: &[&dyn SlotControl]) {
        for slot in slots {
            loop {
                match slot.state() {
                    LoadState::Idle => break,
                    LoadState::Loading => {
                        slot.wait_settled().await;
                    }
                    LoadState::Ready | LoadState::Error => slot.unload(),
                }
            }
        }
        debug!(coordinator = %self.name, count = slots.len(), "Unloaded");
    }

    /// Unload the slots of `jobs`, then load them again from scratch.
    pub async fn refresh(&self, jobs: Vec<Box<dyn LoadJob<S>>>) -> bool {
        let slots: Vec<&dyn SlotControl> = jobs.iter().map(|job| job.slot(&self.slots)).collect();
        self.unload_all(&slots).await;
        info!(coordinator = %self.name, count = slots.len(), "Refreshing");
        self.load_all(jobs).await
    }
}
