//! Builtin function identifiers and their parameter contracts.
//!
//! Builtins skip activation-record creation: the dispatcher forces their
//! arguments directly (honoring the per-position laziness mask) and applies
//! the declared coercions before invoking the Rust implementation. The
//! implementations themselves live in `engine/primitive.rs`; this module is
//! the static table the dispatcher consults.

/// Built-in function identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinId {
    // =========================================================================
    // Operators (group generic "Ops", binary dispatch)
    // =========================================================================
    Add,
    Sub,
    Mul,
    Div,
    Pow,

    // =========================================================================
    // Math (group generic "Math", unary dispatch)
    // =========================================================================
    Abs,
    Sqrt,

    // =========================================================================
    // Summaries (group generic "Summary", dispatch on the first operand)
    // =========================================================================
    Sum,
    Max,
    Min,

    // =========================================================================
    // Inspection
    // =========================================================================
    Length,
    ClassOf,
    IsNull,

    // =========================================================================
    // Construction
    // =========================================================================
    MakeList,

    // =========================================================================
    // Short-circuit logic (second operand stays lazy)
    // =========================================================================
    And,
    Or,

    // =========================================================================
    // Dispatch protocol (handled by the engine, not `apply_builtin`)
    // =========================================================================
    UseMethod,
    NextMethod,
}

/// Declared arity of a builtin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Between(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => n == *k,
            Arity::Between(lo, hi) => n >= *lo && n <= *hi,
            Arity::AtLeast(lo) => n >= *lo,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Arity::Exact(k) => k.to_string(),
            Arity::Between(lo, hi) => format!("{} to {}", lo, hi),
            Arity::AtLeast(lo) => format!("at least {}", lo),
        }
    }
}

/// Per-position coercion a builtin declares for its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cast {
    /// Accept anything.
    Any,
    /// Require integer or real.
    Number,
    /// Require something with a condition interpretation.
    Logical,
}

/// A builtin's full parameter contract: arity, which positions are forced
/// (bit clear) versus left lazy (bit set), and the per-position casts. For
/// variadic builtins the last cast repeats.
#[derive(Debug, Clone, Copy)]
pub struct ParamContract {
    pub arity: Arity,
    pub lazy_mask: u32,
    pub casts: &'static [Cast],
}

impl ParamContract {
    pub fn is_lazy(&self, position: usize) -> bool {
        position < 32 && self.lazy_mask & (1 << position) != 0
    }

    pub fn cast_at(&self, position: usize) -> Cast {
        self.casts
            .get(position)
            .or_else(|| self.casts.last())
            .copied()
            .unwrap_or(Cast::Any)
    }
}

/// Generic groups for operator/family dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericGroup {
    Ops,
    Math,
    Summary,
}

impl GenericGroup {
    pub fn name(&self) -> &'static str {
        match self {
            GenericGroup::Ops => "Ops",
            GenericGroup::Math => "Math",
            GenericGroup::Summary => "Summary",
        }
    }
}

/// How many operands participate in a builtin's internal dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    /// Not internally generic.
    None,
    /// Dispatch on the first operand.
    Unary,
    /// Dispatch on both operands independently.
    Binary,
}

const NUMBER2: &[Cast] = &[Cast::Number, Cast::Number];
const NUMBER1: &[Cast] = &[Cast::Number];
const NUMBERS: &[Cast] = &[Cast::Number];
const LOGICAL2: &[Cast] = &[Cast::Logical, Cast::Logical];
const ANY1: &[Cast] = &[Cast::Any];
const ANYS: &[Cast] = &[Cast::Any];

impl BuiltinId {
    /// All builtins, for table construction.
    pub const ALL: &'static [BuiltinId] = &[
        BuiltinId::Add,
        BuiltinId::Sub,
        BuiltinId::Mul,
        BuiltinId::Div,
        BuiltinId::Pow,
        BuiltinId::Abs,
        BuiltinId::Sqrt,
        BuiltinId::Sum,
        BuiltinId::Max,
        BuiltinId::Min,
        BuiltinId::Length,
        BuiltinId::ClassOf,
        BuiltinId::IsNull,
        BuiltinId::MakeList,
        BuiltinId::And,
        BuiltinId::Or,
        BuiltinId::UseMethod,
        BuiltinId::NextMethod,
    ];

    /// Surface name, which is also the generic name used for method
    /// lookups (`+.difftime`, `sum.data.frame`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinId::Add => "+",
            BuiltinId::Sub => "-",
            BuiltinId::Mul => "*",
            BuiltinId::Div => "/",
            BuiltinId::Pow => "^",
            BuiltinId::Abs => "abs",
            BuiltinId::Sqrt => "sqrt",
            BuiltinId::Sum => "sum",
            BuiltinId::Max => "max",
            BuiltinId::Min => "min",
            BuiltinId::Length => "length",
            BuiltinId::ClassOf => "class",
            BuiltinId::IsNull => "is.null",
            BuiltinId::MakeList => "list",
            BuiltinId::And => "&&",
            BuiltinId::Or => "||",
            BuiltinId::UseMethod => "UseMethod",
            BuiltinId::NextMethod => "NextMethod",
        }
    }

    pub fn from_name(name: &str) -> Option<BuiltinId> {
        BuiltinId::ALL.iter().copied().find(|b| b.name() == name)
    }

    /// The declared parameter contract.
    pub fn contract(&self) -> ParamContract {
        match self {
            BuiltinId::Add | BuiltinId::Sub | BuiltinId::Mul | BuiltinId::Div | BuiltinId::Pow => {
                ParamContract {
                    arity: Arity::Exact(2),
                    lazy_mask: 0,
                    casts: NUMBER2,
                }
            }
            BuiltinId::Abs | BuiltinId::Sqrt => ParamContract {
                arity: Arity::Exact(1),
                lazy_mask: 0,
                casts: NUMBER1,
            },
            BuiltinId::Sum | BuiltinId::Max | BuiltinId::Min => ParamContract {
                arity: Arity::AtLeast(1),
                lazy_mask: 0,
                casts: NUMBERS,
            },
            BuiltinId::Length | BuiltinId::ClassOf | BuiltinId::IsNull => ParamContract {
                arity: Arity::Exact(1),
                lazy_mask: 0,
                casts: ANY1,
            },
            BuiltinId::MakeList => ParamContract {
                arity: Arity::AtLeast(0),
                lazy_mask: 0,
                casts: ANYS,
            },
            // Second operand stays lazy for short-circuiting.
            BuiltinId::And | BuiltinId::Or => ParamContract {
                arity: Arity::Exact(2),
                lazy_mask: 0b10,
                casts: LOGICAL2,
            },
            BuiltinId::UseMethod => ParamContract {
                arity: Arity::Between(1, 2),
                lazy_mask: 0,
                casts: ANYS,
            },
            BuiltinId::NextMethod => ParamContract {
                arity: Arity::Between(0, 1),
                lazy_mask: 0,
                casts: ANYS,
            },
        }
    }

    /// The group generic this builtin belongs to, if any.
    pub fn group(&self) -> Option<GenericGroup> {
        match self {
            BuiltinId::Add | BuiltinId::Sub | BuiltinId::Mul | BuiltinId::Div | BuiltinId::Pow => {
                Some(GenericGroup::Ops)
            }
            BuiltinId::Abs | BuiltinId::Sqrt => Some(GenericGroup::Math),
            BuiltinId::Sum | BuiltinId::Max | BuiltinId::Min => Some(GenericGroup::Summary),
            _ => None,
        }
    }

    /// How this builtin dispatches internally when an operand is an object.
    pub fn dispatch_kind(&self) -> DispatchKind {
        match self.group() {
            Some(GenericGroup::Ops) => DispatchKind::Binary,
            Some(GenericGroup::Math) | Some(GenericGroup::Summary) => DispatchKind::Unary,
            None => DispatchKind::None,
        }
    }

    /// Builtins the engine intercepts before the primitive path.
    pub fn is_dispatch_protocol(&self) -> bool {
        matches!(self, BuiltinId::UseMethod | BuiltinId::NextMethod)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_names() {
        for b in BuiltinId::ALL {
            assert_eq!(BuiltinId::from_name(b.name()), Some(*b));
        }
    }

    #[test]
    fn test_lazy_mask_short_circuit() {
        let c = BuiltinId::And.contract();
        assert!(!c.is_lazy(0));
        assert!(c.is_lazy(1));
        let c = BuiltinId::Add.contract();
        assert!(!c.is_lazy(0));
        assert!(!c.is_lazy(1));
    }

    #[test]
    fn test_variadic_cast_repeats() {
        let c = BuiltinId::Sum.contract();
        assert_eq!(c.cast_at(0), Cast::Number);
        assert_eq!(c.cast_at(7), Cast::Number);
    }

    #[test]
    fn test_groups() {
        assert_eq!(BuiltinId::Add.group(), Some(GenericGroup::Ops));
        assert_eq!(BuiltinId::Add.dispatch_kind(), DispatchKind::Binary);
        assert_eq!(BuiltinId::Sqrt.dispatch_kind(), DispatchKind::Unary);
        assert_eq!(BuiltinId::Length.dispatch_kind(), DispatchKind::None);
    }

    #[test]
    fn test_arity_accepts() {
        assert!(Arity::Exact(2).accepts(2));
        assert!(!Arity::Exact(2).accepts(3));
        assert!(Arity::Between(1, 2).accepts(1));
        assert!(!Arity::Between(1, 2).accepts(0));
        assert!(Arity::AtLeast(1).accepts(9));
    }
}
