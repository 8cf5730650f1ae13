//! Promise forcing.
//!
//! The state machine is Unforced -> UnderEvaluation -> Forced, with Forced
//! terminal. Re-entering an UnderEvaluation promise is the cycle signal:
//! a self-referential default argument, a circular lazy definition, or a
//! promise that a previous error (or cancellation) unwound mid-force. Such
//! a promise is never silently retried.
//!
//! Chains of nested promises (a promise whose own result is a promise) are
//! followed recursively up to a configured bound and iteratively past it,
//! so pathological chains cannot grow the host stack without limit.

use super::Engine;
use crate::error::{EvalError, EvalResult};
use crate::promise::{EagerValue, PromiseId, PromiseState};
use crate::value::Value;
use std::rc::Rc;

impl Engine {
    pub(crate) fn force_promise(&mut self, id: PromiseId) -> EvalResult<Value> {
        self.force_with_depth(id, 0)
    }

    fn force_with_depth(&mut self, id: PromiseId, depth: usize) -> EvalResult<Value> {
        match self.promises.get(id).state {
            PromiseState::Forced => return self.forced_value(id),
            PromiseState::UnderEvaluation => return Err(EvalError::PromiseCycle),
            PromiseState::Unforced => {}
        }

        if let Some(value) = self.try_eager(id)? {
            return Ok(value);
        }

        let (expr, env) = {
            let cell = self.promises.get(id);
            (Rc::clone(&cell.expr), cell.env)
        };
        self.promises.get_mut(id).state = PromiseState::UnderEvaluation;
        // On error the promise stays UnderEvaluation: a later force must
        // report the cycle, not retry.
        let value = self.eval_in(&expr, env)?;
        let value = match value {
            Value::Promise(nested) => {
                if depth < self.config.promise_recursion_limit {
                    self.force_with_depth(nested, depth + 1)?
                } else {
                    self.force_iterative(nested)?
                }
            }
            other => other,
        };
        let cell = self.promises.get_mut(id);
        cell.state = PromiseState::Forced;
        cell.value = Some(value.clone());
        Ok(value)
    }

    /// Non-recursive continuation for deep nested-promise chains. Every
    /// promise along the chain is left UnderEvaluation until the chain
    /// bottoms out, then all of them are stamped Forced with the final
    /// value; a chain that loops back onto itself is therefore caught as a
    /// cycle.
    fn force_iterative(&mut self, first: PromiseId) -> EvalResult<Value> {
        let mut chain: Vec<PromiseId> = Vec::new();
        let mut current = first;
        let final_value = loop {
            match self.promises.get(current).state {
                PromiseState::Forced => break self.forced_value(current)?,
                PromiseState::UnderEvaluation => return Err(EvalError::PromiseCycle),
                PromiseState::Unforced => {}
            }
            if let Some(value) = self.try_eager(current)? {
                break value;
            }
            let (expr, env) = {
                let cell = self.promises.get(current);
                (Rc::clone(&cell.expr), cell.env)
            };
            self.promises.get_mut(current).state = PromiseState::UnderEvaluation;
            match self.eval_in(&expr, env)? {
                Value::Promise(next) => {
                    chain.push(current);
                    current = next;
                }
                value => {
                    let cell = self.promises.get_mut(current);
                    cell.state = PromiseState::Forced;
                    cell.value = Some(value.clone());
                    break value;
                }
            }
        };
        for id in chain {
            let cell = self.promises.get_mut(id);
            cell.state = PromiseState::Forced;
            cell.value = Some(final_value.clone());
        }
        Ok(final_value)
    }

    /// The optimistic fast path: if the eager assumption still holds, the
    /// precomputed value is handed out without evaluating the expression,
    /// raised to Shared exactly once on the way out. A dead assumption
    /// degrades the promise to a fully general one.
    fn try_eager(&mut self, id: PromiseId) -> EvalResult<Option<Value>> {
        let Some(eager) = self.promises.get(id).eager.clone() else {
            return Ok(None);
        };
        if self.eager_valid(&eager) {
            let cell = self.promises.get_mut(id);
            cell.state = PromiseState::Forced;
            cell.value = Some(eager.value.clone());
            self.tracker.claim_shared(&eager.value);
            Ok(Some(eager.value))
        } else {
            self.promises.materialize(id);
            Ok(None)
        }
    }

    fn eager_valid(&self, eager: &EagerValue) -> bool {
        match &eager.origin {
            // Literal constants cannot be invalidated.
            None => true,
            Some((env, name, version)) => {
                self.envs.binding_version(*env, name) == Some(*version)
            }
        }
    }

    fn forced_value(&self, id: PromiseId) -> EvalResult<Value> {
        self.promises
            .get(id)
            .value
            .clone()
            .ok_or_else(|| EvalError::internal("forced promise holds no value"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;

    #[test]
    fn test_force_memoizes() {
        let mut engine = Engine::new();
        engine.eval(&Expr::assign("n", Expr::int(0))).unwrap();
        // n <- n + 1; n  -- observable side effect per evaluation.
        let body = Expr::block(vec![
            Expr::assign(
                "n",
                Expr::call_named(
                    "+",
                    vec![
                        crate::ast::SuppliedArg::positional(Expr::sym("n")),
                        crate::ast::SuppliedArg::positional(Expr::int(1)),
                    ],
                ),
            ),
            Expr::sym("n"),
        ]);
        let global = engine.global_env();
        let p = engine.make_promise(body, global);
        assert_eq!(engine.force(p).unwrap(), Value::Int(1));
        assert_eq!(engine.force(p).unwrap(), Value::Int(1));
        assert!(engine.promise_is_forced(p));
        // Evaluated exactly once.
        assert_eq!(engine.eval(&Expr::sym("n")).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_nested_promise_chain_forces_through() {
        let mut engine = Engine::new();
        let global = engine.global_env();
        // Build a chain far beyond the recursion bound.
        let limit = engine.config.promise_recursion_limit;
        let mut inner = engine.make_promise(Expr::int(42), global);
        for _ in 0..(limit * 4) {
            let wrapped = engine.make_promise(Expr::constant(Value::Promise(inner)), global);
            inner = wrapped;
        }
        assert_eq!(engine.force(inner).unwrap(), Value::Int(42));
        assert!(engine.promise_is_forced(inner));
    }

    #[test]
    fn test_error_leaves_under_evaluation() {
        let mut engine = Engine::new();
        let global = engine.global_env();
        let p = engine.make_promise(Expr::sym("nope"), global);
        assert!(engine.force(p).is_err());
        assert!(engine.promise_is_under_evaluation(p));
        // A retry reports the cycle, it does not re-evaluate.
        assert_eq!(engine.force(p).unwrap_err(), EvalError::PromiseCycle);
    }
}
