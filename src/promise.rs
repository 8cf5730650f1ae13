//! Promise cells.
//!
//! A promise owns an expression and a non-owning reference to the
//! environment it must be evaluated in; the cells live in an arena and are
//! addressed by index, which sidesteps the reference cycles a promise
//! graph would otherwise create (a promise can reference an environment
//! whose bindings reference the promise). Forcing itself needs the
//! evaluator and lives on the engine; this module is the storage and the
//! state machine's bookkeeping.

use crate::ast::Expr;
use crate::env::EnvId;
use crate::value::Value;
use std::rc::Rc;

/// Non-owning handle to a promise cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PromiseId(pub(crate) u32);

/// Promise lifecycle. Forced is terminal; UnderEvaluation re-entry is the
/// cycle signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    Unforced,
    UnderEvaluation,
    Forced,
}

/// Speculative precomputed value for eager promises, plus the assumption
/// that has to hold at force time. `origin` is `None` for literal
/// constants, whose assumption can never be invalidated; for bare symbols
/// it names the binding and the version stamp observed at creation.
#[derive(Debug, Clone)]
pub struct EagerValue {
    pub value: Value,
    pub origin: Option<(EnvId, String, u64)>,
}

/// One promise cell.
#[derive(Debug)]
pub struct PromiseCell {
    pub expr: Rc<Expr>,
    pub env: EnvId,
    pub state: PromiseState,
    pub value: Option<Value>,
    pub eager: Option<EagerValue>,
}

/// Arena of promise cells.
#[derive(Debug, Default)]
pub struct PromiseArena {
    cells: Vec<PromiseCell>,
}

impl PromiseArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a plain promise over `expr` in `env`.
    pub fn alloc(&mut self, expr: Rc<Expr>, env: EnvId) -> PromiseId {
        self.push(PromiseCell {
            expr,
            env,
            state: PromiseState::Unforced,
            value: None,
            eager: None,
        })
    }

    /// Allocate an eager promise carrying a speculative value.
    pub fn alloc_eager(&mut self, expr: Rc<Expr>, env: EnvId, eager: EagerValue) -> PromiseId {
        self.push(PromiseCell {
            expr,
            env,
            state: PromiseState::Unforced,
            value: None,
            eager: Some(eager),
        })
    }

    fn push(&mut self, cell: PromiseCell) -> PromiseId {
        let id = PromiseId(self.cells.len() as u32);
        self.cells.push(cell);
        id
    }

    pub fn get(&self, id: PromiseId) -> &PromiseCell {
        &self.cells[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: PromiseId) -> &mut PromiseCell {
        &mut self.cells[id.0 as usize]
    }

    pub fn is_forced(&self, id: PromiseId) -> bool {
        self.get(id).state == PromiseState::Forced
    }

    pub fn is_under_evaluation(&self, id: PromiseId) -> bool {
        self.get(id).state == PromiseState::UnderEvaluation
    }

    /// Upgrade an eager promise to a fully general one: the speculative
    /// value is discarded and the next force evaluates the expression.
    pub fn materialize(&mut self, id: PromiseId) {
        self.get_mut(id).eager = None;
    }
}
