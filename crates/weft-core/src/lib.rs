#![forbid(unsafe_code)]

//! Core: revision tags, tracking frames, and the dynamic value model.
//!
//! Everything in this crate is single-threaded. The revision clock, the
//! tracking frame stack, and every [`Tag`] live on the current thread and are
//! `!Send`.

pub mod error;
pub mod tag;
pub mod tracking;
pub mod value;

pub use error::TrackingError;
pub use tag::{
    CONSTANT, INITIAL, Revision, Tag, TagId, consume_tag, create_tag, current_revision, dirty_tag,
    try_dirty_tag,
};
pub use tracking::{Dependencies, is_tracking, track, untrack};
pub use value::{Array, IdentityKey, Object, Value};
