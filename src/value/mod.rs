//! Runtime values.
//!
//! Only the shapes the call machinery itself needs live here: scalars,
//! generic lists (the one container type, carrying the class attribute and
//! the sharing state), variadic bundles, callables, and first-class promise
//! references. Vector storage layout is a collaborator concern and out of
//! scope.

mod share;

pub use share::{ActivationShare, ShareState, ShareTracker};

use crate::ast::Expr;
use crate::builtins::BuiltinId;
use crate::env::EnvId;
use crate::promise::PromiseId;
use crate::signature::Signature;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a list value.
pub type ListRef = Rc<RefCell<ListValue>>;

/// Shared handle to a variadic bundle.
pub type DotsRef = Rc<DotsValue>;

/// A generic list: elements, optional per-element names, an optional class
/// attribute, and the mutation-safety state used to elide copies.
#[derive(Debug, Clone)]
pub struct ListValue {
    pub elements: Vec<Value>,
    pub names: Option<Vec<String>>,
    /// Explicit class attribute; empty means unclassed.
    pub class: Vec<String>,
    pub share: ShareState,
}

/// One element of a variadic bundle: the supplied name (empty string if
/// none) and the value, typically an unforced promise.
#[derive(Debug, Clone)]
pub struct DotsItem {
    pub name: String,
    pub value: Value,
}

/// A variadic bundle: all supplied arguments not matched to a named formal,
/// in original relative order.
#[derive(Debug, Clone)]
pub struct DotsValue {
    pub items: Vec<DotsItem>,
}

impl DotsValue {
    pub fn empty() -> Self {
        Self { items: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A user-defined function: formals, body, and the defining environment.
/// The `id` is the callee identity the inline cache keys on.
#[derive(Debug)]
pub struct ClosureValue {
    pub id: u64,
    pub formals: Signature,
    pub body: Rc<Expr>,
    pub env: EnvId,
}

/// Runtime values.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    /// The absent-argument sentinel bound to formals that were neither
    /// supplied nor defaulted.
    Missing,
    Logical(bool),
    Int(i64),
    Real(f64),
    Str(String),
    List(ListRef),
    Dots(DotsRef),
    Closure(Rc<ClosureValue>),
    Builtin(BuiltinId),
    /// A first-class promise reference; forcing a promise whose result is
    /// another promise chains through these.
    Promise(PromiseId),
}

impl Value {
    /// Build an unclassed list in the Temporary state.
    pub fn list(elements: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(ListValue {
            elements,
            names: None,
            class: Vec::new(),
            share: ShareState::Temporary,
        })))
    }

    /// Build a list carrying an explicit class attribute.
    pub fn classed_list(elements: Vec<Value>, class: &[&str]) -> Value {
        Value::List(Rc::new(RefCell::new(ListValue {
            elements,
            names: None,
            class: class.iter().map(|c| c.to_string()).collect(),
            share: ShareState::Temporary,
        })))
    }

    /// Short type name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Missing => "missing",
            Value::Logical(_) => "logical",
            Value::Int(_) => "integer",
            Value::Real(_) => "double",
            Value::Str(_) => "character",
            Value::List(_) => "list",
            Value::Dots(_) => "...",
            Value::Closure(_) => "closure",
            Value::Builtin(_) => "builtin",
            Value::Promise(_) => "promise",
        }
    }

    /// The ordered class vector used for dispatch, most specific first.
    /// Classed lists report their class attribute; everything else gets
    /// its implicit class.
    pub fn class_vector(&self) -> Vec<String> {
        if let Value::List(list) = self {
            let list = list.borrow();
            if !list.class.is_empty() {
                return list.class.clone();
            }
        }
        let implicit: &[&str] = match self {
            Value::Null => &["NULL"],
            Value::Missing => &["missing"],
            Value::Logical(_) => &["logical"],
            Value::Int(_) => &["integer", "numeric"],
            Value::Real(_) => &["numeric"],
            Value::Str(_) => &["character"],
            Value::List(_) => &["list"],
            Value::Dots(_) => &["..."],
            Value::Closure(_) | Value::Builtin(_) => &["function"],
            Value::Promise(_) => &["promise"],
        };
        implicit.iter().map(|c| c.to_string()).collect()
    }

    /// Whether the value carries an explicit class attribute. Only objects
    /// trigger internal group dispatch.
    pub fn is_object(&self) -> bool {
        match self {
            Value::List(list) => !list.borrow().class.is_empty(),
            _ => false,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Closure(_) | Value::Builtin(_))
    }

    /// Condition coercion for `if`.
    pub fn as_condition(&self) -> Option<bool> {
        match self {
            Value::Logical(b) => Some(*b),
            Value::Int(v) => Some(*v != 0),
            Value::Real(v) => Some(*v != 0.0),
            _ => None,
        }
    }

    /// The sharing state, for values that have one.
    pub fn share_state(&self) -> Option<ShareState> {
        match self {
            Value::List(list) => Some(list.borrow().share),
            _ => None,
        }
    }

    /// Mark a value (and, for lists, its elements) permanently shared.
    /// Applied to literal constants: they are never recycled.
    pub fn mark_permanent(&self) {
        if let Value::List(list) = self {
            let mut list = list.borrow_mut();
            list.share = ShareState::PermanentShared;
            for element in &list.elements {
                element.mark_permanent();
            }
        }
    }

    /// Render the value as source-like text for error messages.
    pub fn deparse(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Missing => String::new(),
            Value::Logical(true) => "TRUE".to_string(),
            Value::Logical(false) => "FALSE".to_string(),
            Value::Int(v) => format!("{}L", v),
            Value::Real(v) => {
                if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
                    format!("{}", *v as i64)
                } else {
                    format!("{}", v)
                }
            }
            Value::Str(s) => format!("\"{}\"", s),
            Value::List(list) => {
                let list = list.borrow();
                let parts: Vec<String> = list
                    .elements
                    .iter()
                    .enumerate()
                    .map(|(i, e)| match list.names.as_ref().and_then(|n| n.get(i)) {
                        Some(n) if !n.is_empty() => format!("{} = {}", n, e.deparse()),
                        _ => e.deparse(),
                    })
                    .collect();
                format!("list({})", parts.join(", "))
            }
            Value::Dots(_) => "...".to_string(),
            Value::Closure(_) => "function(...)".to_string(),
            Value::Builtin(id) => id.name().to_string(),
            Value::Promise(_) => "<promise>".to_string(),
        }
    }
}

impl PartialEq for Value {
    /// Structural equality; lists compare by contents (not sharing state),
    /// closures by identity, bundles by pointer.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Missing, Value::Missing) => true,
            (Value::Logical(a), Value::Logical(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.elements == b.elements && a.names == b.names && a.class == b.class
            }
            (Value::Dots(a), Value::Dots(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => a.id == b.id,
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Promise(a), Value::Promise(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implicit_class_vectors() {
        assert_eq!(Value::Int(1).class_vector(), vec!["integer", "numeric"]);
        assert_eq!(Value::Real(1.5).class_vector(), vec!["numeric"]);
        assert_eq!(Value::Null.class_vector(), vec!["NULL"]);
        assert_eq!(Value::list(vec![]).class_vector(), vec!["list"]);
    }

    #[test]
    fn test_explicit_class_wins() {
        let v = Value::classed_list(vec![], &["data.frame", "list"]);
        assert_eq!(v.class_vector(), vec!["data.frame", "list"]);
        assert!(v.is_object());
        assert!(!Value::list(vec![]).is_object());
    }

    #[test]
    fn test_mark_permanent_is_recursive() {
        let inner = Value::list(vec![Value::Int(1)]);
        let outer = Value::list(vec![inner.clone(), Value::Int(2)]);
        outer.mark_permanent();
        assert_eq!(outer.share_state(), Some(ShareState::PermanentShared));
        assert_eq!(inner.share_state(), Some(ShareState::PermanentShared));
    }

    #[test]
    fn test_deparse_scalars() {
        assert_eq!(Value::Real(3.0).deparse(), "3");
        assert_eq!(Value::Real(2.5).deparse(), "2.5");
        assert_eq!(Value::Int(3).deparse(), "3L");
        assert_eq!(Value::Str("a".into()).deparse(), "\"a\"");
        assert_eq!(Value::Logical(true).deparse(), "TRUE");
    }
}
