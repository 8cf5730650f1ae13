//! The call engine.
//!
//! One `Engine` is one independent evaluation context: it owns its
//! environment arena, promise arena, call-frame stack, and inline caches
//! exclusively, so separate engines may live on separate threads without
//! any locking discipline. Submodules split the machinery the same way the
//! call path flows:
//!
//! - `eval`: expression evaluation
//! - `call`: call execution, activations, promise creation
//! - `force`: the promise state machine
//! - `cache`: per-site inline caches
//! - `generic`: `UseMethod`/`NextMethod` and internal group dispatch
//! - `compat`: sanctioned mixed-class pairs for binary dispatch
//! - `primitive`: builtin implementations and casts
//!
//! ## Debug logging
//!
//! Set `SUBSET_R_DISPATCH_DEBUG=1` to enable dispatch tracing. Only
//! available in debug builds to avoid performance impact in release.

mod cache;
mod call;
mod compat;
mod eval;
mod force;
mod generic;
mod primitive;

pub use compat::{CompatRule, CompatTable, PreferredSide};
pub use generic::MethodResolution;

pub(crate) use cache::SiteCache;

use crate::ast::{CallSiteId, Expr};
use crate::config::EngineConfig;
use crate::env::{EnvArena, EnvId};
use crate::error::{EvalResult, SpannedEvalError};
use crate::promise::{PromiseArena, PromiseId};
use crate::span::Span;
use crate::value::{ShareTracker, Value};
use std::collections::HashMap;

/// Check if dispatch debug logging is enabled via `SUBSET_R_DISPATCH_DEBUG`.
/// Only available in debug builds to avoid performance impact in release.
#[cfg(debug_assertions)]
pub(crate) fn dispatch_debug_enabled() -> bool {
    use std::sync::OnceLock;
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var("SUBSET_R_DISPATCH_DEBUG").is_ok())
}

/// Emit dispatch debug logs in debug builds without relying on `eprintln!`.
#[cfg(debug_assertions)]
pub(crate) fn dispatch_debug_log(args: std::fmt::Arguments<'_>) {
    use std::io::Write;
    let _ = writeln!(std::io::stderr(), "{args}");
}

/// One supplied argument after variadic expansion, as stored on a call
/// frame: the name it was supplied under and its payload, typically an
/// unforced promise. Generic dispatch re-matches these against the method's
/// own formals, reusing the promises.
#[derive(Debug, Clone)]
pub(crate) struct PromArg {
    pub name: Option<String>,
    pub value: Value,
}

/// Where in a class-vector walk the currently executing method was found;
/// `NextMethod` resumes one position later.
#[derive(Debug, Clone)]
pub(crate) struct DispatchContext {
    pub generic: String,
    pub group: Option<String>,
    pub classes: Vec<String>,
    pub position: usize,
}

/// One activation on the call stack.
#[derive(Debug)]
pub(crate) struct Frame {
    /// The activation environment.
    pub env: EnvId,
    /// Environment the call was made from; method lookup starts here.
    pub caller_env: EnvId,
    pub promargs: std::rc::Rc<Vec<PromArg>>,
    pub dispatch: Option<DispatchContext>,
}

/// Inline-cache observability for one call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub evictions: u32,
    pub megamorphic: bool,
}

/// The call/dispatch engine: one independent evaluation context.
#[derive(Debug)]
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) envs: EnvArena,
    pub(crate) promises: PromiseArena,
    pub(crate) tracker: ShareTracker,
    pub(crate) compat: CompatTable,
    pub(crate) sites: HashMap<CallSiteId, SiteCache>,
    pub(crate) frames: Vec<Frame>,
    pub(crate) warnings: Vec<String>,
    pub(crate) depth: usize,
    pub(crate) next_closure_id: u64,
    pub(crate) last_error_span: Option<Span>,
    base: EnvId,
    global: EnvId,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut envs = EnvArena::new();
        let base = envs.alloc(None);
        let global = envs.alloc(Some(base));
        let tracker = ShareTracker::new(&config);
        let mut engine = Self {
            config,
            envs,
            promises: PromiseArena::new(),
            tracker,
            compat: CompatTable::standard(),
            sites: HashMap::new(),
            frames: Vec::new(),
            warnings: Vec::new(),
            depth: 0,
            next_closure_id: 0,
            last_error_span: None,
            base,
            global,
        };
        engine.install_builtins();
        engine
    }

    /// Bind every builtin under its surface name in the base environment,
    /// the parent of the global one, so user definitions shadow builtins
    /// naturally.
    fn install_builtins(&mut self) {
        for b in crate::builtins::BuiltinId::ALL {
            self.envs.define(self.base, b.name(), Value::Builtin(*b));
        }
    }

    /// The global (user) environment.
    pub fn global_env(&self) -> EnvId {
        self.global
    }

    /// The base environment holding the builtins.
    pub fn base_env(&self) -> EnvId {
        self.base
    }

    /// Allocate a child environment (for embedders and tests).
    pub fn new_child_env(&mut self, parent: EnvId) -> EnvId {
        self.envs.alloc(Some(parent))
    }

    /// Bind `name` in the global environment.
    pub fn define(&mut self, name: &str, value: Value) {
        self.envs.define(self.global, name, value);
    }

    /// Bind `name` in a specific environment.
    pub fn define_in(&mut self, env: EnvId, name: &str, value: Value) {
        self.envs.define(env, name, value);
    }

    /// Evaluate a top-level expression in the global environment.
    pub fn eval(&mut self, expr: &Expr) -> EvalResult<Value> {
        self.last_error_span = None;
        self.depth = 0;
        self.eval_in(expr, self.global)
    }

    /// Like [`Engine::eval`], attaching the innermost call span to errors.
    pub fn eval_spanned(&mut self, expr: &Expr) -> Result<Value, SpannedEvalError> {
        self.eval(expr).map_err(|error| match self.last_error_span {
            Some(span) => SpannedEvalError::with_span(error, span),
            None => SpannedEvalError::from_error(error),
        })
    }

    /// Source location of the innermost call active when the last
    /// top-level evaluation failed.
    pub fn last_error_span(&self) -> Option<Span> {
        self.last_error_span
    }

    // Promise engine surface.

    /// Force a promise to its value (memoized, at most one evaluation).
    pub fn force(&mut self, id: PromiseId) -> EvalResult<Value> {
        self.force_promise(id)
    }

    pub fn promise_is_forced(&self, id: PromiseId) -> bool {
        self.promises.is_forced(id)
    }

    pub fn promise_is_under_evaluation(&self, id: PromiseId) -> bool {
        self.promises.is_under_evaluation(id)
    }

    /// Upgrade an eager promise to a fully general one.
    pub fn materialize_promise(&mut self, id: PromiseId) {
        self.promises.materialize(id);
    }

    /// Create a promise over `expr` in `env` (for embedders and tests).
    pub fn make_promise(&mut self, expr: Expr, env: EnvId) -> PromiseId {
        self.promises.alloc(std::rc::Rc::new(expr), env)
    }

    // Diagnostics.

    /// Warnings accumulated since the last [`Engine::take_warnings`].
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    pub(crate) fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }

    /// Inline-cache state of one call site, if it has been executed.
    pub fn cache_stats(&self, site: CallSiteId) -> Option<CacheStats> {
        self.sites.get(&site).map(|c| CacheStats {
            entries: c.len(),
            evictions: c.evictions(),
            megamorphic: c.is_megamorphic(),
        })
    }

    /// Replace the binary-dispatch compatibility table.
    pub fn set_compat_table(&mut self, table: CompatTable) {
        self.compat = table;
    }

    pub fn compat_table_mut(&mut self) -> &mut CompatTable {
        &mut self.compat
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
