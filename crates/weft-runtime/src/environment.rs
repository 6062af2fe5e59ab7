#![forbid(unsafe_code)]

//! The render environment.
//!
//! An [`Environment`] owns the transaction slot of a renderer, its host
//! hooks ([`EnvironmentDelegate`]), and its [`EnvironmentConfig`]. Render
//! passes queue lifecycle effects through it and build roots, conditionals,
//! and keyed lists with the host's semantics.
//!
//! # Invariants
//!
//! 1. Effects are queued only while a transaction is open; otherwise
//!    [`RuntimeError::NoTransaction`].
//! 2. A non-interactive environment never queues modifier effects.
//! 3. References built here use the configured [`ChildPolicy`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use weft_core::Value;
use weft_reference::{ChildPolicy, ListManager, PathRef};

use crate::config::EnvironmentConfig;
use crate::error::{Result, RuntimeError};
use crate::lifecycle::{ComponentManager, Destructor, ModifierManager};
use crate::transaction::{CommitSummary, Transaction};

/// Host semantics the runtime defers to.
pub trait EnvironmentDelegate {
    /// Whether this host runs modifiers (false when rendering to a string).
    fn is_interactive(&self) -> bool {
        true
    }

    /// Truthiness of a condition.
    fn to_bool(&self, value: &Value) -> bool {
        value.is_truthy()
    }

    /// Property lookup used for list keys.
    fn get_path(&self, item: &Value, path: &str) -> Value {
        item.get_prop(path)
    }

    /// Items of an iterable value, `None` when the value is not iterable.
    fn to_iterator(&self, value: &Value) -> Option<Vec<Value>> {
        value.iter_items()
    }
}

/// Delegate with template semantics for every hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDelegate;

impl EnvironmentDelegate for DefaultDelegate {}

pub struct Environment<D = DefaultDelegate> {
    config: EnvironmentConfig,
    delegate: Rc<D>,
    transaction: RefCell<Option<Transaction>>,
}

impl Environment<DefaultDelegate> {
    /// Environment with default hooks.
    #[must_use]
    pub fn new(config: EnvironmentConfig) -> Self {
        Self::with_delegate(config, DefaultDelegate)
    }
}

impl Default for Environment<DefaultDelegate> {
    fn default() -> Self {
        Self::new(EnvironmentConfig::default())
    }
}

impl<D: EnvironmentDelegate + 'static> Environment<D> {
    pub fn with_delegate(config: EnvironmentConfig, delegate: D) -> Self {
        Self {
            config,
            delegate: Rc::new(delegate),
            transaction: RefCell::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    #[must_use]
    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    /// Interactive when both the configuration and the host agree.
    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.config.interactive && self.delegate.is_interactive()
    }

    #[must_use]
    pub fn child_policy(&self) -> ChildPolicy {
        self.config.child_policy
    }

    /// Whether this environment has an open transaction.
    #[must_use]
    pub fn in_open_transaction(&self) -> bool {
        self.transaction.borrow().is_some()
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Open a transaction.
    ///
    /// Fails with [`RuntimeError::TransactionAlreadyOpen`] when this or any
    /// other environment on the thread has one open.
    pub fn begin(&self) -> Result<()> {
        if self.in_open_transaction() {
            return Err(RuntimeError::TransactionAlreadyOpen);
        }
        let transaction = Transaction::begin()?;
        *self.transaction.borrow_mut() = Some(transaction);
        Ok(())
    }

    /// Close the open transaction and flush its effects.
    pub fn commit(&self) -> Result<CommitSummary> {
        let transaction = self
            .transaction
            .borrow_mut()
            .take()
            .ok_or(RuntimeError::NoTransaction)?;
        transaction.commit()
    }

    /// Run `f` inside a transaction.
    ///
    /// Joins the open transaction if there is one. Otherwise opens one,
    /// runs `f`, and commits even when `f` fails; an error from `f` takes
    /// precedence over a commit error.
    pub fn in_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        if self.in_open_transaction() {
            return f(self);
        }
        self.begin()?;
        let result = f(self);
        let committed = self.commit();
        let value = result?;
        committed?;
        Ok(value)
    }

    fn with_transaction(&self, queue: impl FnOnce(&mut Transaction)) -> Result<()> {
        let mut slot = self.transaction.borrow_mut();
        let transaction = slot.as_mut().ok_or(RuntimeError::NoTransaction)?;
        queue(transaction);
        Ok(())
    }

    pub fn did_create(&self, component: Value, manager: Rc<dyn ComponentManager>) -> Result<()> {
        self.with_transaction(|tx| tx.did_create(component, manager))
    }

    pub fn did_update(&self, component: Value, manager: Rc<dyn ComponentManager>) -> Result<()> {
        self.with_transaction(|tx| tx.did_update(component, manager))
    }

    pub fn did_destroy(&self, destructor: Rc<dyn Destructor>) -> Result<()> {
        self.with_transaction(|tx| tx.did_destroy(destructor))
    }

    /// Queue a modifier install. Skipped when not interactive.
    pub fn schedule_install_modifier(
        &self,
        modifier: Value,
        manager: Rc<dyn ModifierManager>,
    ) -> Result<()> {
        if !self.is_interactive() {
            tracing::trace!(message = "environment.modifier_skipped", phase = "install");
            return Ok(());
        }
        self.with_transaction(|tx| tx.schedule_install_modifier(modifier, manager))
    }

    /// Queue a modifier update. Skipped when not interactive.
    pub fn schedule_update_modifier(
        &self,
        modifier: Value,
        manager: Rc<dyn ModifierManager>,
    ) -> Result<()> {
        if !self.is_interactive() {
            tracing::trace!(message = "environment.modifier_skipped", phase = "update");
            return Ok(());
        }
        self.with_transaction(|tx| tx.schedule_update_modifier(modifier, manager))
    }

    // -----------------------------------------------------------------------
    // References
    // -----------------------------------------------------------------------

    /// Root reference for a component's `this`.
    #[must_use]
    pub fn root_reference(&self, value: Value) -> PathRef {
        PathRef::root(value, self.config.child_policy)
    }

    /// Root reference backed by a helper.
    pub fn helper_reference(&self, name: &str, compute: impl Fn() -> Value + 'static) -> PathRef {
        PathRef::helper(name, self.config.child_policy, compute)
    }

    /// Boolean view of `reference` through the host's truthiness.
    #[must_use]
    pub fn to_conditional_reference(&self, reference: &PathRef) -> PathRef {
        let delegate = Rc::clone(&self.delegate);
        PathRef::conditional(reference, Rc::new(move |value: &Value| delegate.to_bool(value)))
    }

    /// Keyed list over `reference` using the host's path and iteration hooks.
    #[must_use]
    pub fn iterable_for(&self, reference: &PathRef, key: &str) -> ListManager {
        let get_path = Rc::clone(&self.delegate);
        let to_iterator = Rc::clone(&self.delegate);
        ListManager::new(reference.clone(), key)
            .with_get_path(Rc::new(move |item: &Value, path: &str| {
                get_path.get_path(item, path)
            }))
            .with_to_iterator(Rc::new(move |value: &Value| to_iterator.to_iterator(value)))
    }
}

impl<D> fmt::Debug for Environment<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("config", &self.config)
            .field("transaction", &self.transaction.borrow())
            .finish()
    }
}
