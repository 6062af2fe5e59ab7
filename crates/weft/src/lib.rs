#![forbid(unsafe_code)]

//! Weft public facade crate.
//!
//! Re-exports the core, reference, and runtime crates under one roof. Most
//! users only need the prelude.

pub mod prelude {
    pub use weft_core as core;
    pub use weft_core::{Array, Object, Tag, Value, consume_tag, create_tag, dirty_tag, track};
    pub use weft_reference as reference;
    pub use weft_reference::{
        ChildPolicy, ItemKey, KeyPath, ListDelegate, ListManager, PathRef, SyncStats,
    };
    #[cfg(feature = "runtime")]
    pub use weft_runtime as runtime;
    #[cfg(feature = "runtime")]
    pub use weft_runtime::{
        CommitSummary, ComponentManager, Destructor, Environment, EnvironmentConfig,
        EnvironmentDelegate, HookResult, ModifierManager, RuntimeError, Scope,
    };
}
