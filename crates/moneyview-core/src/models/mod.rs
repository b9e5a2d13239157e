//! Data models for the records the view layer browses.
//!
//! Only the fields the loading layer needs are modelled:
//!
//! - `Category`: self-referencing hierarchy (`parent_id`)
//! - `Currency`: display symbol and scale
//! - `Account`: status, favorite flag and currency reference

pub mod account;
pub mod category;
pub mod currency;

pub use account::{Account, AccountStatus};
pub use category::Category;
pub use currency::Currency;

use crate::id::ResourceId;

/// A stored row with an identity and a display name.
pub trait Record: Clone + Send + Sync + 'static {
    /// Table (and snapshot file) name.
    const TABLE: &'static str;
    /// Display name used in slot names and logs.
    const NAME: &'static str;

    fn id(&self) -> ResourceId;
    fn name(&self) -> &str;
}

/// A row that may point at a parent row of the same table.
pub trait ParentLink: Record {
    /// Parent id, or [`ResourceId::VOID`] for a root.
    fn parent_id(&self) -> ResourceId;
}
