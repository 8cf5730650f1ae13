//! Formal parameter lists.

use crate::ast::{Expr, FunctionExpr};
use crate::error::{EvalError, EvalResult};
use std::rc::Rc;

/// The variadic collector's name in a formal list.
pub const DOTS: &str = "...";

/// One formal parameter: name, optional default expression, and position
/// in the declaration order.
#[derive(Debug, Clone)]
pub struct FormalParameter {
    pub name: String,
    pub default: Option<Rc<Expr>>,
    pub position: usize,
}

impl FormalParameter {
    /// Whether this formal is the variadic collector.
    pub fn is_dots(&self) -> bool {
        self.name == DOTS
    }
}

/// An ordered formal parameter list. Immutable after construction; owned
/// by its defining callable.
///
/// Invariants: at most one variadic marker; all other names unique.
#[derive(Debug, Clone)]
pub struct Signature {
    params: Vec<FormalParameter>,
    dots_position: Option<usize>,
}

impl Signature {
    /// Validate and build a signature from `(name, default)` pairs.
    pub fn new(params: Vec<(String, Option<Rc<Expr>>)>) -> EvalResult<Self> {
        let mut dots_position = None;
        for (i, (name, _)) in params.iter().enumerate() {
            if name == DOTS {
                if dots_position.is_some() {
                    return Err(EvalError::MultipleVariadic);
                }
                dots_position = Some(i);
            } else if params[..i].iter().any(|(n, _)| n == name) {
                return Err(EvalError::DuplicateFormal(name.clone()));
            }
        }
        let params = params
            .into_iter()
            .enumerate()
            .map(|(position, (name, default))| FormalParameter {
                name,
                default,
                position,
            })
            .collect();
        Ok(Self {
            params,
            dots_position,
        })
    }

    /// Build from a function literal's declarations.
    pub fn from_function(f: &FunctionExpr) -> EvalResult<Self> {
        Self::new(f.params.clone())
    }

    pub fn params(&self) -> &[FormalParameter] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Position of the variadic collector, if any.
    pub fn dots_position(&self) -> Option<usize> {
        self.dots_position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(names: &[&str]) -> EvalResult<Signature> {
        Signature::new(names.iter().map(|n| (n.to_string(), None)).collect())
    }

    #[test]
    fn test_valid_signature() {
        let s = sig(&["x", "y", "..."]).unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(s.dots_position(), Some(2));
        assert!(s.params()[2].is_dots());
    }

    #[test]
    fn test_duplicate_formal_rejected() {
        assert_eq!(
            sig(&["x", "x"]).unwrap_err(),
            EvalError::DuplicateFormal("x".to_string())
        );
    }

    #[test]
    fn test_two_dots_rejected() {
        assert_eq!(sig(&["...", "..."]).unwrap_err(), EvalError::MultipleVariadic);
    }

    #[test]
    fn test_no_dots() {
        let s = sig(&["x", "y"]).unwrap();
        assert_eq!(s.dots_position(), None);
    }
}
