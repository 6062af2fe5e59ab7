use thiserror::Error;

use crate::tag::TagId;

/// Misuse of the tracking machinery.
///
/// These are programming errors: nothing in the core retries or recovers from
/// them. The panicking entry points ([`dirty_tag`](crate::dirty_tag)) format
/// the same message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackingError {
    #[error(
        "tag {tag} was dirtied while a computation that already consumed it is still running \
         (a value may not invalidate its own inputs)"
    )]
    TagConsumedDuringComputation { tag: TagId },
}
