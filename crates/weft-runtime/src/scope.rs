#![forbid(unsafe_code)]

//! Lexical scopes of a render pass.
//!
//! A scope is a fixed array of symbol slots. Slot 0 is `self`; the compiler
//! numbers every other local and block parameter. Reading or binding a slot
//! past the end is a compiler bug and reported as
//! [`RuntimeError::SlotOutOfRange`].

use std::rc::Rc;

use ahash::AHashMap;
use weft_reference::PathRef;

use crate::error::{Result, RuntimeError};

/// A block passed into a scope: compiled handle plus its parameter names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub handle: u32,
    pub parameters: Rc<[Rc<str>]>,
}

impl Block {
    #[must_use]
    pub fn new(handle: u32, parameters: &[&str]) -> Self {
        Self {
            handle,
            parameters: parameters.iter().map(|p| Rc::from(*p)).collect(),
        }
    }
}

/// Content of one slot.
#[derive(Debug, Clone)]
pub enum ScopeSlot {
    Reference(PathRef),
    Block(Block),
    Empty,
}

pub type EvalScope = Rc<AHashMap<Rc<str>, ScopeSlot>>;
pub type PartialMap = Rc<AHashMap<Rc<str>, PathRef>>;

#[derive(Debug, Clone)]
pub struct Scope {
    slots: Vec<ScopeSlot>,
    caller: Option<Rc<Scope>>,
    eval_scope: Option<EvalScope>,
    partial_map: Option<PartialMap>,
}

impl Scope {
    /// Scope with `self_ref` in slot 0 and `size` more slots bound to
    /// `undefined`.
    #[must_use]
    pub fn root(self_ref: PathRef, size: usize) -> Self {
        let mut scope = Self::sized(size);
        scope.slots[0] = ScopeSlot::Reference(self_ref);
        scope
    }

    /// Scope of `size + 1` slots, all bound to `undefined`.
    #[must_use]
    pub fn sized(size: usize) -> Self {
        Self {
            slots: vec![ScopeSlot::Reference(PathRef::undefined()); size + 1],
            caller: None,
            eval_scope: None,
            partial_map: None,
        }
    }

    /// Number of slots, `self` included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, index: usize) -> Result<&ScopeSlot> {
        self.slots.get(index).ok_or(RuntimeError::SlotOutOfRange {
            index,
            len: self.slots.len(),
        })
    }

    fn set(&mut self, index: usize, slot: ScopeSlot) -> Result<()> {
        let len = self.slots.len();
        let target = self
            .slots
            .get_mut(index)
            .ok_or(RuntimeError::SlotOutOfRange { index, len })?;
        *target = slot;
        Ok(())
    }

    pub fn get_self(&self) -> Result<PathRef> {
        self.get_symbol(0)
    }

    /// Reference bound at `symbol`. Slots holding a block or nothing read
    /// as `undefined`.
    pub fn get_symbol(&self, symbol: usize) -> Result<PathRef> {
        Ok(match self.slot(symbol)? {
            ScopeSlot::Reference(reference) => reference.clone(),
            ScopeSlot::Block(_) | ScopeSlot::Empty => PathRef::undefined(),
        })
    }

    pub fn get_block(&self, symbol: usize) -> Result<Option<&Block>> {
        Ok(match self.slot(symbol)? {
            ScopeSlot::Block(block) => Some(block),
            ScopeSlot::Reference(_) | ScopeSlot::Empty => None,
        })
    }

    pub fn bind(&mut self, symbol: usize, slot: ScopeSlot) -> Result<()> {
        self.set(symbol, slot)
    }

    pub fn bind_self(&mut self, self_ref: PathRef) -> Result<()> {
        self.set(0, ScopeSlot::Reference(self_ref))
    }

    pub fn bind_symbol(&mut self, symbol: usize, reference: PathRef) -> Result<()> {
        self.set(symbol, ScopeSlot::Reference(reference))
    }

    pub fn bind_block(&mut self, symbol: usize, block: Option<Block>) -> Result<()> {
        self.set(symbol, block.map_or(ScopeSlot::Empty, ScopeSlot::Block))
    }

    pub fn bind_caller_scope(&mut self, caller: Option<Rc<Scope>>) {
        self.caller = caller;
    }

    #[must_use]
    pub fn caller_scope(&self) -> Option<&Rc<Scope>> {
        self.caller.as_ref()
    }

    /// Named arguments and blocks passed to a layout that evaluates
    /// dynamically.
    pub fn bind_eval_scope(&mut self, eval_scope: Option<EvalScope>) {
        self.eval_scope = eval_scope;
    }

    #[must_use]
    pub fn eval_scope(&self) -> Option<&EvalScope> {
        self.eval_scope.as_ref()
    }

    /// Locals in scope where a partial was invoked.
    pub fn bind_partial_map(&mut self, partial_map: PartialMap) {
        self.partial_map = Some(partial_map);
    }

    #[must_use]
    pub fn partial_map(&self) -> Option<&PartialMap> {
        self.partial_map.as_ref()
    }

    /// Copy of this scope whose bindings can diverge from it.
    #[must_use]
    pub fn child(&self) -> Self {
        self.clone()
    }
}
