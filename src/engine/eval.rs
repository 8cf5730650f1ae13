//! Expression evaluation.
//!
//! A small tree walk over the expression forms the call machinery needs.
//! The interesting parts of evaluation live elsewhere: calls in `call.rs`,
//! promise forcing in `force.rs`. Every entry checks the cancellation flag
//! and the nesting limit, so runaway recursion unwinds as an error instead
//! of blowing the host stack.

use super::Engine;
use crate::ast::{Expr, FunctionExpr};
use crate::env::EnvId;
use crate::error::{EvalError, EvalResult};
use crate::signature::Signature;
use crate::value::{ClosureValue, Value};
use std::rc::Rc;

impl Engine {
    pub(crate) fn eval_in(&mut self, expr: &Expr, env: EnvId) -> EvalResult<Value> {
        if crate::cancel::is_requested() {
            return Err(EvalError::Cancelled);
        }
        self.depth += 1;
        if self.depth > self.config.max_eval_depth {
            self.depth -= 1;
            return Err(EvalError::StackOverflow);
        }
        let result = self.eval_inner(expr, env);
        self.depth -= 1;
        result
    }

    fn eval_inner(&mut self, expr: &Expr, env: EnvId) -> EvalResult<Value> {
        match expr {
            Expr::Const(v) => Ok(v.clone()),
            Expr::Symbol(name) => self.eval_symbol(name, env),
            Expr::Call(call) => self.execute_call(call, env),
            Expr::Function(f) => self.make_closure(f, env),
            Expr::Block(exprs) => {
                let mut last = Value::Null;
                for e in exprs {
                    last = self.eval_in(e, env)?;
                }
                Ok(last)
            }
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.eval_in(cond, env)?;
                let cond = self.force_if_promise(cond)?;
                let truth = cond.as_condition().ok_or_else(|| {
                    EvalError::type_error("argument is not interpretable as logical")
                })?;
                if truth {
                    self.eval_in(then_branch, env)
                } else {
                    match else_branch {
                        Some(e) => self.eval_in(e, env),
                        None => Ok(Value::Null),
                    }
                }
            }
            Expr::Assign { name, value } => {
                let v = self.eval_in(value, env)?;
                let v = self.force_if_promise(v)?;
                // Assigning a looked-up value creates a second named
                // reference to it.
                if matches!(&**value, Expr::Symbol(_)) {
                    self.tracker.note_alias(&v);
                }
                self.envs.define(env, name, v.clone());
                Ok(v)
            }
            Expr::SuperAssign { name, value } => {
                let v = self.eval_in(value, env)?;
                let v = self.force_if_promise(v)?;
                if matches!(&**value, Expr::Symbol(_)) {
                    self.tracker.note_alias(&v);
                }
                // Search starts in the enclosing environment; with no
                // existing binding anywhere, bind globally.
                let start = self.envs.parent(env).unwrap_or(env);
                let target = self
                    .envs
                    .lookup_with_env(start, name)
                    .map(|(found, _)| found)
                    .unwrap_or_else(|| self.global_env());
                self.envs.define(target, name, v.clone());
                Ok(v)
            }
            Expr::Dots => match self.envs.lookup(env, crate::signature::DOTS) {
                Some(binding) => Ok(binding.value.clone()),
                None => Err(EvalError::type_error("'...' used in an incorrect context")),
            },
        }
    }

    fn eval_symbol(&mut self, name: &str, env: EnvId) -> EvalResult<Value> {
        let value = match self.envs.lookup(env, name) {
            Some(binding) => binding.value.clone(),
            None => return Err(EvalError::UndefVar(name.to_string())),
        };
        match value {
            Value::Promise(id) => self.force_promise(id),
            Value::Missing => Err(EvalError::MissingArgument(name.to_string())),
            other => Ok(other),
        }
    }

    fn make_closure(&mut self, f: &FunctionExpr, env: EnvId) -> EvalResult<Value> {
        let formals = Signature::from_function(f)?;
        self.next_closure_id += 1;
        Ok(Value::Closure(Rc::new(ClosureValue {
            id: self.next_closure_id,
            formals,
            body: Rc::clone(&f.body),
            env,
        })))
    }

    /// Chase a first-class promise down to its value.
    pub(crate) fn force_if_promise(&mut self, value: Value) -> EvalResult<Value> {
        match value {
            Value::Promise(id) => self.force_promise(id),
            other => Ok(other),
        }
    }

    /// Function-position lookup: walk the chain, skipping bindings whose
    /// value is not a function (a local data binding must not shadow an
    /// outer function of the same name at a call site).
    pub(crate) fn lookup_function(&mut self, name: &str, env: EnvId) -> EvalResult<Value> {
        let mut current = Some(env);
        while let Some(id) = current {
            let local = self.envs.lookup_local(id, name).map(|b| b.value.clone());
            if let Some(value) = local {
                let value = self.force_if_promise(value)?;
                if value.is_function() {
                    return Ok(value);
                }
            }
            current = self.envs.parent(id);
        }
        Err(EvalError::UndefFunction(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_const_and_block() {
        let mut engine = Engine::new();
        let v = engine
            .eval(&Expr::block(vec![Expr::num(1.0), Expr::num(2.0)]))
            .unwrap();
        assert_eq!(v, Value::Real(2.0));
        assert_eq!(engine.eval(&Expr::block(vec![])).unwrap(), Value::Null);
    }

    #[test]
    fn test_assign_and_symbol() {
        let mut engine = Engine::new();
        engine.eval(&Expr::assign("x", Expr::int(7))).unwrap();
        assert_eq!(engine.eval(&Expr::sym("x")).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_undefined_symbol() {
        let mut engine = Engine::new();
        assert_eq!(
            engine.eval(&Expr::sym("nope")).unwrap_err(),
            EvalError::UndefVar("nope".to_string())
        );
    }

    #[test]
    fn test_if_branches() {
        let mut engine = Engine::new();
        let v = engine
            .eval(&Expr::if_else(Expr::logical(true), Expr::int(1), Expr::int(2)))
            .unwrap();
        assert_eq!(v, Value::Int(1));
        let v = engine
            .eval(&Expr::if_else(Expr::logical(false), Expr::int(1), Expr::int(2)))
            .unwrap();
        assert_eq!(v, Value::Int(2));
    }

    #[test]
    fn test_if_rejects_non_condition() {
        let mut engine = Engine::new();
        let err = engine
            .eval(&Expr::if_else(Expr::string("x"), Expr::int(1), Expr::int(2)))
            .unwrap_err();
        assert!(matches!(err, EvalError::TypeError(_)));
    }

    #[test]
    fn test_function_lookup_skips_data_bindings() {
        let mut engine = Engine::new();
        // `sum` bound to data in the global env must not shadow the
        // builtin at a call site.
        engine.define("sum", Value::Int(42));
        let v = engine
            .eval(&Expr::call_named(
                "sum",
                vec![crate::ast::SuppliedArg::positional(Expr::num(1.0))],
            ))
            .unwrap();
        assert_eq!(v, Value::Real(1.0));
    }

    #[test]
    fn test_dots_outside_function() {
        let mut engine = Engine::new();
        assert!(matches!(
            engine.eval(&Expr::Dots).unwrap_err(),
            EvalError::TypeError(_)
        ));
    }
}
