//! Error types for call matching, promise evaluation, and dispatch.
//!
//! Matching and dispatch errors surface immediately at the call site with
//! the deparsed source text of the offending argument when available. The
//! incompatible-methods condition is a warning, not an error; it lands in
//! the engine's warning buffer instead.

use crate::span::Span;
use thiserror::Error;

/// Errors raised by argument matching, promise forcing, and dispatch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    // Matching errors
    /// A single supplied argument matched no formal and there is no
    /// variadic sink.
    #[error("unused argument ({0})")]
    UnusedArgument(String),

    /// Several supplied arguments matched no formal.
    #[error("unused arguments ({0})")]
    UnusedArguments(String),

    /// A supplied argument carried an empty-string name.
    #[error("zero-length variable name")]
    ZeroLengthName,

    /// One formal was matched by more than one supplied argument.
    #[error("formal argument \"{0}\" matched by multiple actual arguments")]
    FormalMatchedMultiple(String),

    /// A supplied name prefix-matched more than one formal.
    #[error("argument {0} matches multiple formal arguments")]
    AmbiguousArgumentMatch(String),

    // Evaluation errors
    /// A promise re-entered its own evaluation (self-referential default
    /// or a genuinely circular lazy definition).
    #[error("promise already under evaluation: recursive default argument reference or earlier problems?")]
    PromiseCycle,

    /// A formal with no default was read before being supplied.
    #[error("argument \"{0}\" is missing, with no default")]
    MissingArgument(String),

    /// Symbol lookup failed.
    #[error("object '{0}' not found")]
    UndefVar(String),

    /// A function-position lookup found no function binding.
    #[error("could not find function \"{0}\"")]
    UndefFunction(String),

    /// The callee expression evaluated to a non-function.
    #[error("attempt to apply non-function")]
    NotAFunction,

    // Signature construction errors
    /// A formal name appeared twice in one signature.
    #[error("repeated formal argument '{0}'")]
    DuplicateFormal(String),

    /// More than one variadic marker in one signature.
    #[error("only one '...' is allowed in a formal argument list")]
    MultipleVariadic,

    // Dispatch errors
    /// Strict dispatch found neither a class method nor a default.
    #[error("no applicable method for '{generic}' applied to an object of class \"{class}\"")]
    NoApplicableMethod {
        /// Generic name being dispatched.
        generic: String,
        /// Most specific class of the dispatch operand.
        class: String,
    },

    /// A dispatch builtin was used outside any method context.
    #[error("{0} called from outside a method dispatch")]
    DispatchOutsideMethod(&'static str),

    // Builtin contract errors
    /// A builtin received the wrong number of arguments.
    #[error("{builtin}: expected {expected} argument(s), got {got}")]
    ArityMismatch {
        /// Surface name of the builtin.
        builtin: String,
        /// Human-readable expected arity.
        expected: String,
        /// Supplied argument count.
        got: usize,
    },

    /// An argument failed a builtin's declared coercion.
    #[error("invalid argument type: {0}")]
    TypeError(String),

    // Control / internal
    /// Execution was cancelled from outside.
    #[error("execution cancelled")]
    Cancelled,

    /// Evaluation nesting exceeded the configured limit.
    #[error("evaluation nested too deeply: infinite recursion?")]
    StackOverflow,

    /// Invariant violation inside the engine. Never a user-facing
    /// language error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EvalError {
    /// Build the unused-argument error from the deparsed leftover texts.
    pub(crate) fn unused(mut details: Vec<String>) -> Self {
        if details.len() == 1 {
            EvalError::UnusedArgument(details.remove(0))
        } else {
            EvalError::UnusedArguments(details.join(", "))
        }
    }

    /// Create a type error.
    pub fn type_error<S: Into<String>>(msg: S) -> Self {
        EvalError::TypeError(msg.into())
    }

    /// Create an internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        EvalError::Internal(msg.into())
    }
}

/// Result type alias for engine operations.
pub type EvalResult<T> = Result<T, EvalError>;

/// An [`EvalError`] paired with the innermost call span active when it was
/// raised, produced at the engine boundary for better diagnostics while
/// preserving the original error for pattern matching.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedEvalError {
    /// The underlying error.
    pub error: EvalError,
    /// Source location of the innermost call (if available).
    pub span: Option<Span>,
}

impl SpannedEvalError {
    /// Create a SpannedEvalError with no span information.
    pub fn from_error(error: EvalError) -> Self {
        Self { error, span: None }
    }

    /// Create a SpannedEvalError with a source span.
    pub fn with_span(error: EvalError, span: Span) -> Self {
        Self {
            error,
            span: Some(span),
        }
    }
}

impl From<EvalError> for SpannedEvalError {
    fn from(error: EvalError) -> Self {
        Self::from_error(error)
    }
}

impl std::fmt::Display for SpannedEvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(span) = &self.span {
            write!(
                f,
                "{} at line {}:{}",
                self.error, span.start_line, span.start_column
            )
        } else {
            write!(f, "{}", self.error)
        }
    }
}

impl std::error::Error for SpannedEvalError {}
