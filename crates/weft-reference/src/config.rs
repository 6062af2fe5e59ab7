#![forbid(unsafe_code)]

//! Child-reference strategy.

/// How [`PathRef::get`](crate::PathRef::get) hands out child references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ChildPolicy {
    /// One child per key, reused while alive.
    #[default]
    Memoized,
    /// A fresh child per call, each carrying a debug label such as
    /// `this.user.name`. Values are identical to [`ChildPolicy::Memoized`].
    Unique,
}

impl ChildPolicy {
    /// Whether references built under this policy record debug labels.
    #[must_use]
    pub const fn labels(self) -> bool {
        matches!(self, ChildPolicy::Unique)
    }

    /// `Unique` when `debug` is set.
    #[must_use]
    pub const fn from_debug(debug: bool) -> Self {
        if debug {
            ChildPolicy::Unique
        } else {
            ChildPolicy::Memoized
        }
    }
}
