// Prevent accidental debug output in library code; dispatch tracing goes
// through the gated writer in engine/mod.rs.
#![deny(clippy::print_stderr)]

//! Call, promise, and dispatch engine for SubsetRVM.
//!
//! The subsystem every function call passes through: matching supplied
//! arguments onto formal parameter lists, representing unevaluated
//! arguments as memoized promises, resolving generic calls against the
//! operand's class vector, and tracking value-sharing state so argument
//! passing can skip defensive copies. Parsing, vector storage, and the
//! numeric builtins' own semantics are collaborator concerns.

// Core modules
pub mod ast;
pub mod builtins;
pub mod cancel;
pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod matcher;
pub mod promise;
pub mod signature;
pub mod span;
pub mod value;

// Re-exports
pub use ast::{deparse, CallSiteId, Expr, SuppliedArg};
pub use builtins::{Arity, BuiltinId, Cast, DispatchKind, GenericGroup, ParamContract};
pub use config::EngineConfig;
pub use engine::{
    CacheStats, CompatRule, CompatTable, Engine, MethodResolution, PreferredSide,
};
pub use env::EnvId;
pub use error::{EvalError, EvalResult, SpannedEvalError};
pub use matcher::{match_positions, ArgMatchError, MatchedPositions, SlotSource};
pub use promise::{PromiseId, PromiseState};
pub use signature::{FormalParameter, Signature, DOTS};
pub use span::Span;
pub use value::{ShareState, Value};
