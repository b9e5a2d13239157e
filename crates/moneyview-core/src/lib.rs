//! Core library for moneyview.
//!
//! Resource loading and caching for a personal-finance client: per-resource
//! load state machines, a coordinator that fetches independent resources in
//! parallel and merges them from a single writer, and the category hierarchy
//! (pre-order tree, display paths) evaluated on top of the cached rows.

pub mod config;
pub mod error;
pub mod group;
pub mod id;
pub mod load;
pub mod models;
pub mod repository;
pub mod search;
pub mod session;
pub mod tree;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{LoadError, StoreError};
pub use group::{AccountGroupChoice, CategoryGroupChoice, CurrencyGroupChoice, GroupData, GroupIndex};
pub use id::ResourceId;
pub use load::{Load, LoadCoordinator, LoadSlot, LoadState};
pub use models::{Account, AccountStatus, Category, Currency};
pub use repository::{MemoryRepository, Repository, SnapshotStore};
pub use search::{Search, SearchArea};
pub use session::{Repositories, ViewSession};
pub use tree::{CategoryTree, PathIndex, TreeFold, TreeNode};
