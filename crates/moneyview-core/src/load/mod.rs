//! Load-once caching primitives.
//!
//! - [`LoadState`]: the four-state lifecycle with guarded transitions
//! - [`LoadSlot`]: one cached value plus its state; fetches at most once
//! - [`LoadCoordinator`]: owns a session's slots and loads them in parallel,
//!   merging results from a single writer
//! - [`fetch`]: jobs for the repository query shapes

pub mod coordinator;
pub mod fetch;
pub mod slot;
pub mod state;

pub use coordinator::{Load, LoadCoordinator, LoadJob, SlotRef};
pub use slot::{Begin, LoadSlot, SlotControl};
pub use state::LoadState;
