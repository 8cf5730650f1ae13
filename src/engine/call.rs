//! Call execution.
//!
//! The path every call takes: resolve the callee, expand forwarded
//! variadic bundles, obtain the matching permutation (from the site's
//! inline cache when possible), wrap supplied arguments in promises, and
//! either build a full activation (closures) or force-and-apply directly
//! (builtins). Sharing counters are adjusted on activation entry and exit.

use super::cache::{CacheEntry, CalleeKey};
use super::{DispatchContext, Engine, Frame, PromArg};
use crate::ast::{deparse, CallExpr, Expr, SuppliedArg};
use crate::builtins::BuiltinId;
use crate::env::EnvId;
use crate::error::{EvalError, EvalResult};
use crate::matcher::{match_positions, ArgMatchError, MatchedPositions, SlotSource};
use crate::promise::{EagerValue, PromiseId};
use crate::signature::{Signature, DOTS};
use crate::value::{ActivationShare, ClosureValue, DotsItem, DotsValue, Value};
use std::rc::Rc;

/// A supplied argument's payload after variadic expansion: a fresh
/// expression from the call site, or a value (typically a promise)
/// forwarded out of the caller's bundle.
#[derive(Debug)]
pub(crate) enum Payload {
    Expr(Rc<Expr>),
    Forwarded(Value),
}

/// One supplied argument after variadic expansion.
#[derive(Debug)]
pub(crate) struct SuppliedItem {
    pub name: Option<String>,
    pub payload: Payload,
}

enum EagerPlan {
    Const(Value),
    Sym(String),
    No,
}

impl Engine {
    pub(crate) fn execute_call(&mut self, call: &CallExpr, env: EnvId) -> EvalResult<Value> {
        let result = self.execute_call_inner(call, env);
        if result.is_err() && self.last_error_span.is_none() {
            self.last_error_span = call.span;
        }
        result
    }

    fn execute_call_inner(&mut self, call: &CallExpr, env: EnvId) -> EvalResult<Value> {
        let callee = match &*call.callee {
            Expr::Symbol(name) => self.lookup_function(name, env)?,
            other => {
                let v = self.eval_in(other, env)?;
                self.force_if_promise(v)?
            }
        };
        let supplied = self.expand_supplied(&call.args, env)?;
        match callee {
            Value::Builtin(id) => self.call_builtin(call, id, supplied, env),
            Value::Closure(clo) => self.call_closure(call, &clo, supplied, env),
            _ => Err(EvalError::NotAFunction),
        }
    }

    /// Splice forwarded `...` bundles into the supplied list, preserving
    /// per-element names.
    fn expand_supplied(
        &mut self,
        args: &[SuppliedArg],
        env: EnvId,
    ) -> EvalResult<Vec<SuppliedItem>> {
        let mut items = Vec::with_capacity(args.len());
        for arg in args {
            if arg.is_dots() {
                let bundle = match self.envs.lookup(env, DOTS) {
                    Some(binding) => binding.value.clone(),
                    None => {
                        return Err(EvalError::type_error("'...' used in an incorrect context"))
                    }
                };
                match bundle {
                    Value::Dots(dots) => {
                        for item in &dots.items {
                            items.push(SuppliedItem {
                                name: (!item.name.is_empty()).then(|| item.name.clone()),
                                payload: Payload::Forwarded(item.value.clone()),
                            });
                        }
                    }
                    other => {
                        return Err(EvalError::internal(format!(
                            "'...' bound to a {}",
                            other.type_name()
                        )))
                    }
                }
            } else {
                items.push(SuppliedItem {
                    name: arg.name.clone(),
                    payload: Payload::Expr(Rc::clone(&arg.expr)),
                });
            }
        }
        Ok(items)
    }

    fn call_closure(
        &mut self,
        call: &CallExpr,
        clo: &Rc<ClosureValue>,
        supplied: Vec<SuppliedItem>,
        caller_env: EnvId,
    ) -> EvalResult<Value> {
        let shape: Vec<Option<String>> = supplied.iter().map(|s| s.name.clone()).collect();
        let key = CalleeKey::Closure(clo.id);
        let matched = self.matched_for(call, key, &clo.formals, &shape, &supplied)?;
        let promargs = Rc::new(self.make_promargs(supplied, caller_env));
        self.activate_and_run(clo, &matched, promargs, None, caller_env)
    }

    /// The permutation for (site, callee, shape): reused from the inline
    /// cache on a hit, recomputed and cached on a miss. Megamorphic sites
    /// recompute every time.
    fn matched_for(
        &mut self,
        call: &CallExpr,
        key: CalleeKey,
        formals: &Signature,
        shape: &[Option<String>],
        supplied: &[SuppliedItem],
    ) -> EvalResult<Rc<MatchedPositions>> {
        let depth = self.config.inline_cache_depth;
        let megamorphic_after = self.config.megamorphic_after;
        let megamorphic;
        {
            let cache = self.sites.entry(call.site).or_default();
            megamorphic = cache.is_megamorphic();
            if !megamorphic {
                if let Some(entry) = cache.find(key, shape) {
                    if let Some(m) = &entry.matched {
                        #[cfg(debug_assertions)]
                        if super::dispatch_debug_enabled() {
                            super::dispatch_debug_log(format_args!(
                                "[CALL] site {:?}: permutation hit for {:?}",
                                call.site, key
                            ));
                        }
                        return Ok(Rc::clone(m));
                    }
                }
            }
        }
        let names: Vec<Option<&str>> = shape.iter().map(|n| n.as_deref()).collect();
        let matched = match match_positions(formals, &names) {
            Ok(m) => Rc::new(m),
            Err(e) => return Err(self.convert_match_error(e, supplied)),
        };
        if !megamorphic {
            if let Some(cache) = self.sites.get_mut(&call.site) {
                cache.insert(
                    CacheEntry {
                        key,
                        shape: shape.to_vec(),
                        matched: Some(Rc::clone(&matched)),
                        generic: None,
                    },
                    depth,
                    megamorphic_after,
                );
            }
        }
        Ok(matched)
    }

    /// Turn a positional matching failure into the user-visible error,
    /// attaching the offending arguments' source text.
    fn convert_match_error(&self, e: ArgMatchError, supplied: &[SuppliedItem]) -> EvalError {
        match e {
            ArgMatchError::ZeroLengthName { .. } => EvalError::ZeroLengthName,
            ArgMatchError::AmbiguousMatch { index } => {
                EvalError::AmbiguousArgumentMatch((index + 1).to_string())
            }
            ArgMatchError::FormalMatchedMultiple { formal } => {
                EvalError::FormalMatchedMultiple(formal)
            }
            ArgMatchError::UnusedArguments { indices } => EvalError::unused(
                indices
                    .iter()
                    .map(|&i| self.supplied_text(&supplied[i]))
                    .collect(),
            ),
        }
    }

    fn supplied_text(&self, item: &SuppliedItem) -> String {
        let text = match &item.payload {
            Payload::Expr(expr) => deparse(expr),
            Payload::Forwarded(value) => self.forwarded_text(value),
        };
        match &item.name {
            Some(name) => format!("{} = {}", name, text),
            None => text,
        }
    }

    pub(crate) fn forwarded_text(&self, value: &Value) -> String {
        match value {
            Value::Promise(id) => deparse(&self.promises.get(*id).expr),
            other => other.deparse(),
        }
    }

    /// Wrap each supplied argument in a promise over the caller's
    /// environment. Bare symbols and literals get the optimistic eager
    /// variant when enabled; forwarded payloads already are promises.
    fn make_promargs(&mut self, supplied: Vec<SuppliedItem>, caller_env: EnvId) -> Vec<PromArg> {
        supplied
            .into_iter()
            .map(|item| {
                let value = match item.payload {
                    Payload::Forwarded(v) => v,
                    Payload::Expr(expr) => Value::Promise(self.promise_for_arg(expr, caller_env)),
                };
                PromArg {
                    name: item.name,
                    value,
                }
            })
            .collect()
    }

    fn promise_for_arg(&mut self, expr: Rc<Expr>, env: EnvId) -> PromiseId {
        if self.config.eager_promises {
            let plan = match &*expr {
                Expr::Const(v) => EagerPlan::Const(v.clone()),
                Expr::Symbol(name) => EagerPlan::Sym(name.clone()),
                _ => EagerPlan::No,
            };
            match plan {
                // A literal that is itself a promise must take the general
                // path so forcing chases the chain.
                EagerPlan::Const(value) if !matches!(value, Value::Promise(_)) => {
                    return self.promises.alloc_eager(
                        expr,
                        env,
                        EagerValue {
                            value,
                            origin: None,
                        },
                    );
                }
                EagerPlan::Const(_) => {}
                EagerPlan::Sym(name) => {
                    // Only speculate on plain-value bindings: a promise or
                    // missing binding must go through the general path.
                    let snapshot = self.envs.lookup_with_env(env, &name).and_then(|(found, b)| {
                        match b.value {
                            Value::Promise(_) | Value::Missing => None,
                            _ => Some((found, b.value.clone(), b.version)),
                        }
                    });
                    if let Some((found, value, version)) = snapshot {
                        return self.promises.alloc_eager(
                            expr,
                            env,
                            EagerValue {
                                value,
                                origin: Some((found, name, version)),
                            },
                        );
                    }
                }
                EagerPlan::No => {}
            }
        }
        self.promises.alloc(expr, env)
    }

    /// Re-match already-promised arguments against a (possibly different)
    /// signature; generic dispatch reuses the original promises this way.
    pub(crate) fn match_promargs(
        &self,
        formals: &Signature,
        promargs: &[PromArg],
    ) -> EvalResult<MatchedPositions> {
        let names: Vec<Option<&str>> = promargs.iter().map(|a| a.name.as_deref()).collect();
        match_positions(formals, &names).map_err(|e| match e {
            ArgMatchError::ZeroLengthName { .. } => EvalError::ZeroLengthName,
            ArgMatchError::AmbiguousMatch { index } => {
                EvalError::AmbiguousArgumentMatch((index + 1).to_string())
            }
            ArgMatchError::FormalMatchedMultiple { formal } => {
                EvalError::FormalMatchedMultiple(formal)
            }
            ArgMatchError::UnusedArguments { indices } => EvalError::unused(
                indices
                    .iter()
                    .map(|&i| {
                        let arg = &promargs[i];
                        let text = self.forwarded_text(&arg.value);
                        match &arg.name {
                            Some(name) => format!("{} = {}", name, text),
                            None => text,
                        }
                    })
                    .collect(),
            ),
        })
    }

    /// Build the activation for a closure call: bind each matched slot
    /// (supplied promise, default promise in the activation itself,
    /// missing sentinel, or the variadic bundle), run the body, and settle
    /// the sharing counters on the way out.
    pub(crate) fn activate_and_run(
        &mut self,
        clo: &Rc<ClosureValue>,
        matched: &MatchedPositions,
        promargs: Rc<Vec<PromArg>>,
        dispatch: Option<DispatchContext>,
        caller_env: EnvId,
    ) -> EvalResult<Value> {
        let activation = self.envs.alloc(Some(clo.env));
        let mut share = ActivationShare::new();
        for (j, slot) in matched.slots.iter().enumerate() {
            let formal = &clo.formals.params()[j];
            match slot {
                SlotSource::Supplied(i) => {
                    let value = promargs[*i].value.clone();
                    if !matches!(value, Value::Promise(_) | Value::Dots(_)) {
                        self.tracker.on_argument_bind(j, &value, &mut share);
                    }
                    self.envs.define(activation, &formal.name, value);
                }
                SlotSource::Default => {
                    let default = formal.default.clone().ok_or_else(|| {
                        EvalError::internal("default slot for a formal without a default")
                    })?;
                    // Defaults evaluate in the callee's own activation so
                    // they may reference sibling parameters.
                    let p = self.promises.alloc(default, activation);
                    self.envs.define(activation, &formal.name, Value::Promise(p));
                }
                SlotSource::Missing => {
                    self.envs.define(activation, &formal.name, Value::Missing);
                }
                SlotSource::DotsBundle(indices) => {
                    let items = indices
                        .iter()
                        .map(|&i| DotsItem {
                            name: promargs[i].name.clone().unwrap_or_default(),
                            value: promargs[i].value.clone(),
                        })
                        .collect();
                    self.envs.define(
                        activation,
                        DOTS,
                        Value::Dots(Rc::new(DotsValue { items })),
                    );
                }
            }
        }
        self.frames.push(Frame {
            env: activation,
            caller_env,
            promargs,
            dispatch,
        });
        let result = self.eval_in(&clo.body, activation);
        self.frames.pop();
        self.tracker.on_activation_exit(&share);
        result
    }

    /// Builtins skip activation-record creation: force the arguments
    /// (honoring the laziness mask), try internal group dispatch, apply
    /// the declared casts, and invoke the primitive.
    fn call_builtin(
        &mut self,
        call: &CallExpr,
        id: BuiltinId,
        supplied: Vec<SuppliedItem>,
        caller_env: EnvId,
    ) -> EvalResult<Value> {
        if id.is_dispatch_protocol() {
            return match id {
                BuiltinId::UseMethod => self.do_use_method(supplied, caller_env),
                BuiltinId::NextMethod => self.do_next_method(supplied, caller_env),
                _ => Err(EvalError::internal("unhandled dispatch builtin")),
            };
        }
        let contract = id.contract();
        if !contract.arity.accepts(supplied.len()) {
            return Err(EvalError::ArityMismatch {
                builtin: id.name().to_string(),
                expected: contract.arity.describe(),
                got: supplied.len(),
            });
        }
        let mut names: Vec<Option<String>> = Vec::with_capacity(supplied.len());
        let mut values: Vec<Value> = Vec::with_capacity(supplied.len());
        for (pos, item) in supplied.into_iter().enumerate() {
            let value = match item.payload {
                Payload::Expr(expr) => {
                    if contract.is_lazy(pos) {
                        Value::Promise(self.promises.alloc(expr, caller_env))
                    } else {
                        let v = self.eval_in(&expr, caller_env)?;
                        self.force_if_promise(v)?
                    }
                }
                Payload::Forwarded(v) => {
                    if contract.is_lazy(pos) {
                        v
                    } else {
                        self.force_if_promise(v)?
                    }
                }
            };
            names.push(item.name);
            values.push(value);
        }
        // Dispatch before casts: an object operand may be no number at
        // all and still have a method.
        if let Some(result) = self.try_internal_dispatch(call, id, &values, &names, caller_env)? {
            return Ok(result);
        }
        for (pos, value) in values.iter().enumerate() {
            if !contract.is_lazy(pos) {
                self.check_cast(id, contract.cast_at(pos), value)?;
            }
        }
        self.apply_builtin(id, values, &names)
    }
}
