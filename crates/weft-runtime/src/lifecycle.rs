#![forbid(unsafe_code)]

//! Lifecycle hooks.
//!
//! The tree layer hands the runtime a manager per component or modifier and
//! an instance value. The runtime never calls a hook directly: it queues the
//! pair into the open transaction and the hook fires at commit.

use weft_core::Value;

use crate::error::HookError;

pub type HookResult = Result<(), HookError>;

/// Component lifecycle callbacks.
pub trait ComponentManager {
    /// The component was created during the render pass.
    fn did_create(&self, component: &Value) -> HookResult;

    /// The component was updated during the render pass.
    fn did_update(&self, component: &Value) -> HookResult;
}

/// Element modifier callbacks.
pub trait ModifierManager {
    fn install(&self, modifier: &Value) -> HookResult;

    fn update(&self, modifier: &Value) -> HookResult;
}

/// Something torn down when its owner leaves the tree.
pub trait Destructor {
    fn destroy(&self) -> HookResult;
}

/// Any `Fn() -> HookResult` closure is a destructor.
impl<F> Destructor for F
where
    F: Fn() -> HookResult,
{
    fn destroy(&self) -> HookResult {
        self()
    }
}
