#![forbid(unsafe_code)]

//! Runtime services of a render pass: the environment, transactions of
//! lifecycle effects, lexical scopes, and the resolver boundary.

pub mod config;
pub mod environment;
pub mod error;
pub mod lifecycle;
pub mod resolver;
pub mod scope;
pub mod transaction;

pub use config::EnvironmentConfig;
pub use environment::{DefaultDelegate, Environment, EnvironmentDelegate};
pub use error::{HookError, Phase, ResolverError, Result, RuntimeError};
pub use lifecycle::{ComponentManager, Destructor, HookResult, ModifierManager};
pub use resolver::{DefaultResolver, Resolution, ResolverDelegate};
pub use scope::{Block, EvalScope, PartialMap, Scope, ScopeSlot};
pub use transaction::{CommitSummary, Transaction};
