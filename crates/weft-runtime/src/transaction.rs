#![forbid(unsafe_code)]

//! Batched lifecycle effects.
//!
//! A [`Transaction`] collects the side effects of one render pass and runs
//! them at [`Transaction::commit`] in a fixed order:
//!
//! 1. `did_create` for created components
//! 2. `did_update` for updated components
//! 3. `destroy` for destructors
//! 4. `install` for new modifiers
//! 5. `update` for updated modifiers
//!
//! Within each category effects run in enqueue order.
//!
//! # Invariants
//!
//! 1. At most one transaction is open per thread.
//! 2. Nothing queued runs before commit.
//! 3. The thread is free to open a new transaction once commit starts
//!    flushing, or once an open transaction is dropped.
//!
//! # Failure Modes
//!
//! - **Hook error**: commit stops at the failing hook and returns
//!   [`RuntimeError::Hook`]; effects queued after it never run.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use weft_core::Value;

use crate::error::{Phase, Result, RuntimeError};
use crate::lifecycle::{ComponentManager, Destructor, ModifierManager};

thread_local! {
    static OPEN: Cell<bool> = const { Cell::new(false) };
}

/// Whether a transaction is open on this thread.
#[must_use]
pub fn is_open() -> bool {
    OPEN.with(Cell::get)
}

struct Queued<M: ?Sized> {
    manager: Rc<M>,
    instance: Value,
}

/// Per-category effect counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CommitSummary {
    pub created: usize,
    pub updated: usize,
    pub destroyed: usize,
    pub installed_modifiers: usize,
    pub updated_modifiers: usize,
}

impl CommitSummary {
    #[must_use]
    pub fn total(&self) -> usize {
        self.created
            + self.updated
            + self.destroyed
            + self.installed_modifiers
            + self.updated_modifiers
    }
}

/// The open batch of lifecycle effects.
pub struct Transaction {
    created: Vec<Queued<dyn ComponentManager>>,
    updated: Vec<Queued<dyn ComponentManager>>,
    destroyed: Vec<Rc<dyn Destructor>>,
    install_modifiers: Vec<Queued<dyn ModifierManager>>,
    update_modifiers: Vec<Queued<dyn ModifierManager>>,
    live: bool,
}

impl Transaction {
    /// Open a transaction on this thread.
    pub fn begin() -> Result<Self> {
        if OPEN.with(|open| open.replace(true)) {
            return Err(RuntimeError::TransactionAlreadyOpen);
        }
        tracing::debug!(message = "transaction.begin");
        Ok(Self {
            created: Vec::new(),
            updated: Vec::new(),
            destroyed: Vec::new(),
            install_modifiers: Vec::new(),
            update_modifiers: Vec::new(),
            live: true,
        })
    }

    pub fn did_create(&mut self, component: Value, manager: Rc<dyn ComponentManager>) {
        self.created.push(Queued {
            manager,
            instance: component,
        });
    }

    pub fn did_update(&mut self, component: Value, manager: Rc<dyn ComponentManager>) {
        self.updated.push(Queued {
            manager,
            instance: component,
        });
    }

    pub fn did_destroy(&mut self, destructor: Rc<dyn Destructor>) {
        self.destroyed.push(destructor);
    }

    pub fn schedule_install_modifier(&mut self, modifier: Value, manager: Rc<dyn ModifierManager>) {
        self.install_modifiers.push(Queued {
            manager,
            instance: modifier,
        });
    }

    pub fn schedule_update_modifier(&mut self, modifier: Value, manager: Rc<dyn ModifierManager>) {
        self.update_modifiers.push(Queued {
            manager,
            instance: modifier,
        });
    }

    /// Counts of what is queued so far.
    #[must_use]
    pub fn pending(&self) -> CommitSummary {
        CommitSummary {
            created: self.created.len(),
            updated: self.updated.len(),
            destroyed: self.destroyed.len(),
            installed_modifiers: self.install_modifiers.len(),
            updated_modifiers: self.update_modifiers.len(),
        }
    }

    /// Close the transaction and run every queued effect.
    pub fn commit(mut self) -> Result<CommitSummary> {
        self.close();
        let summary = self.pending();
        tracing::debug!(
            message = "transaction.commit",
            created = summary.created,
            updated = summary.updated,
            destroyed = summary.destroyed,
            installed_modifiers = summary.installed_modifiers,
            updated_modifiers = summary.updated_modifiers
        );

        for Queued { manager, instance } in std::mem::take(&mut self.created) {
            flush(Phase::Created, || manager.did_create(&instance))?;
        }
        for Queued { manager, instance } in std::mem::take(&mut self.updated) {
            flush(Phase::Updated, || manager.did_update(&instance))?;
        }
        for destructor in std::mem::take(&mut self.destroyed) {
            flush(Phase::Destroyed, || destructor.destroy())?;
        }
        for Queued { manager, instance } in std::mem::take(&mut self.install_modifiers) {
            flush(Phase::InstallModifier, || manager.install(&instance))?;
        }
        for Queued { manager, instance } in std::mem::take(&mut self.update_modifiers) {
            flush(Phase::UpdateModifier, || manager.update(&instance))?;
        }
        Ok(summary)
    }

    fn close(&mut self) {
        if std::mem::replace(&mut self.live, false) {
            OPEN.with(|open| open.set(false));
        }
    }
}

fn flush(phase: Phase, hook: impl FnOnce() -> crate::lifecycle::HookResult) -> Result<()> {
    tracing::trace!(message = "transaction.flush", phase = phase.as_str());
    hook().map_err(|source| {
        tracing::debug!(message = "transaction.hook_failed", phase = phase.as_str(), error = %source);
        RuntimeError::hook(phase, source)
    })
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("pending", &self.pending())
            .field("live", &self.live)
            .finish()
    }
}
