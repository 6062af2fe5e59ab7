#![forbid(unsafe_code)]

//! References and keyed list reconciliation.
//!
//! [`PathRef`] is the memoized, tag-validated handle templates read values
//! through. [`iterable`] keeps a keyed list of per-item references in sync
//! with an array reference and reports the minimal structural edits to a
//! [`ListDelegate`].

pub mod config;
pub mod error;
pub mod iterable;
pub mod reference;

pub use config::ChildPolicy;
pub use error::ReferenceError;
pub use iterable::{
    ItemKey, KeyPath, ListDelegate, ListIterator, ListManager, SyncStats,
};
pub use reference::{PathRef, ToBool};
