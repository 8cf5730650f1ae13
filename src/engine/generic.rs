//! Generic method resolution.
//!
//! Single dispatch walks the operand's class vector most-specific first,
//! trying `generic.class` then `group.class` per entry and `generic.default`
//! after the walk. Binary operator dispatch resolves both operands
//! independently and only proceeds when they agree (or a compatibility rule
//! sanctions the pair); disagreement is a warning and a fall back to the
//! primitive. `NextMethod` resumes the walk one position past the class the
//! running method matched.
//!
//! Method lookup is a function of (name, environment-chain snapshot): it
//! walks the chain from the generic's call environment, forcing bindings
//! that are themselves promises and skipping non-function bindings.

use super::cache::{CacheEntry, CalleeKey, GenericSnapshot};
use super::call::{Payload, SuppliedItem};
use super::compat::PreferredSide;
use super::{DispatchContext, Engine, PromArg};
use crate::ast::CallExpr;
use crate::builtins::{BuiltinId, DispatchKind};
use crate::env::EnvId;
use crate::error::{EvalError, EvalResult};
use crate::value::Value;
use std::rc::Rc;

/// Outcome of a successful method resolution.
#[derive(Debug, Clone)]
pub struct MethodResolution {
    /// The generic being dispatched.
    pub generic: String,
    /// Textual name of the binding that matched (`"print.data.frame"`,
    /// `"Ops.difftime"`, `"summary.default"`).
    pub method_name: String,
    /// The class entry that matched; `"default"` for the default method.
    pub class: String,
    /// Whether the match came through the group generic fallback.
    pub via_group: bool,
    /// The resolved implementation.
    pub target: Value,
    /// Index into the class vector that matched; the vector's length for
    /// the default method. `NextMethod` resumes at `position + 1`.
    pub position: usize,
}

impl Engine {
    /// Look up `name` as a callable: walk the chain, force promise-valued
    /// bindings (method tables may hold promises), skip non-functions.
    fn lookup_method_value(&mut self, name: &str, env: EnvId) -> EvalResult<Option<Value>> {
        let mut current = Some(env);
        while let Some(id) = current {
            let local = self.envs.lookup_local(id, name).map(|b| b.value.clone());
            if let Some(value) = local {
                if !matches!(value, Value::Missing) {
                    let value = self.force_if_promise(value)?;
                    if value.is_function() {
                        return Ok(Some(value));
                    }
                }
            }
            current = self.envs.parent(id);
        }
        Ok(None)
    }

    /// Walk `classes[start..]` for a method of `generic` (with the group
    /// fallback per class entry), then try `generic.default`. `Ok(None)`
    /// lets tolerant callers fall back to builtin behavior; strict callers
    /// turn it into `NoApplicableMethod`.
    /// Resolve `generic` against a class vector, consulting the global
    /// environment's method-table snapshot. `Ok(None)` is the tolerable
    /// not-found sentinel; strict callers raise `NoApplicableMethod`.
    pub fn resolve_method(
        &mut self,
        generic: &str,
        classes: &[String],
        group: Option<&str>,
    ) -> EvalResult<Option<MethodResolution>> {
        let env = self.global_env();
        self.resolve_in_env(generic, group, classes, 0, env)
    }

    pub(crate) fn resolve_in_env(
        &mut self,
        generic: &str,
        group: Option<&str>,
        classes: &[String],
        start: usize,
        env: EnvId,
    ) -> EvalResult<Option<MethodResolution>> {
        for (position, class) in classes.iter().enumerate().skip(start) {
            let method_name = format!("{}.{}", generic, class);
            if let Some(target) = self.lookup_method_value(&method_name, env)? {
                return Ok(Some(MethodResolution {
                    generic: generic.to_string(),
                    method_name,
                    class: class.clone(),
                    via_group: false,
                    target,
                    position,
                }));
            }
            if let Some(group) = group {
                let method_name = format!("{}.{}", group, class);
                if let Some(target) = self.lookup_method_value(&method_name, env)? {
                    return Ok(Some(MethodResolution {
                        generic: generic.to_string(),
                        method_name,
                        class: class.clone(),
                        via_group: true,
                        target,
                        position,
                    }));
                }
            }
        }
        let method_name = format!("{}.default", generic);
        if let Some(target) = self.lookup_method_value(&method_name, env)? {
            return Ok(Some(MethodResolution {
                generic: generic.to_string(),
                method_name,
                class: "default".to_string(),
                via_group: false,
                target,
                position: classes.len(),
            }));
        }
        Ok(None)
    }

    /// `UseMethod(generic)` / `UseMethod(generic, object)` from inside a
    /// generic's body: dispatch on the (forced) first argument of the
    /// running closure, re-using its promises for the method call.
    pub(crate) fn do_use_method(
        &mut self,
        supplied: Vec<SuppliedItem>,
        caller_env: EnvId,
    ) -> EvalResult<Value> {
        if supplied.is_empty() || supplied.len() > 2 {
            return Err(EvalError::ArityMismatch {
                builtin: "UseMethod".to_string(),
                expected: "1 to 2".to_string(),
                got: supplied.len(),
            });
        }
        let mut supplied = supplied.into_iter();
        let generic = match self.eval_supplied_item(supplied.next(), caller_env)? {
            Some(Value::Str(s)) => s,
            _ => {
                return Err(EvalError::type_error(
                    "'generic' argument must be a character string",
                ))
            }
        };
        let Some((dispatch_env, frame_env, promargs)) = self
            .frames
            .last()
            .map(|f| (f.caller_env, f.env, Rc::clone(&f.promargs)))
        else {
            return Err(EvalError::DispatchOutsideMethod("UseMethod"));
        };
        // An explicit object argument evaluates in the generic's own
        // activation, like the rest of its body.
        let object = match self.eval_supplied_item(supplied.next(), frame_env)? {
            Some(v) => v,
            None => match promargs.first().map(|a| a.value.clone()) {
                Some(v) => self.force_if_promise(v)?,
                None => {
                    return Err(EvalError::type_error(
                        "UseMethod called from a function with no arguments",
                    ))
                }
            },
        };
        let classes = object.class_vector();
        #[cfg(debug_assertions)]
        if super::dispatch_debug_enabled() {
            super::dispatch_debug_log(format_args!(
                "[DISPATCH] UseMethod({}): classes={:?}",
                generic, classes
            ));
        }
        match self.resolve_in_env(&generic, None, &classes, 0, dispatch_env)? {
            Some(res) => {
                let ctx = DispatchContext {
                    generic: res.generic.clone(),
                    group: None,
                    classes,
                    position: res.position,
                };
                self.invoke_target(res.target, ctx, promargs, dispatch_env)
            }
            None => Err(EvalError::NoApplicableMethod {
                generic,
                class: classes.first().cloned().unwrap_or_default(),
            }),
        }
    }

    /// `NextMethod()` from inside a method body: continue the recorded
    /// class-vector walk one position later, with the same arguments. When
    /// the walk is exhausted for a group-dispatched builtin generic, the
    /// primitive is the final fallback.
    pub(crate) fn do_next_method(
        &mut self,
        supplied: Vec<SuppliedItem>,
        _caller_env: EnvId,
    ) -> EvalResult<Value> {
        if supplied.len() > 1 {
            return Err(EvalError::ArityMismatch {
                builtin: "NextMethod".to_string(),
                expected: "0 to 1".to_string(),
                got: supplied.len(),
            });
        }
        let frame_info = self.frames.last().and_then(|f| {
            f.dispatch
                .clone()
                .map(|ctx| (ctx, f.caller_env, Rc::clone(&f.promargs)))
        });
        let Some((ctx, dispatch_env, promargs)) = frame_info else {
            return Err(EvalError::DispatchOutsideMethod("NextMethod"));
        };
        match self.resolve_in_env(
            &ctx.generic,
            ctx.group.as_deref(),
            &ctx.classes,
            ctx.position + 1,
            dispatch_env,
        )? {
            Some(res) => {
                let next_ctx = DispatchContext {
                    generic: res.generic.clone(),
                    group: ctx.group,
                    classes: ctx.classes,
                    position: res.position,
                };
                self.invoke_target(res.target, next_ctx, promargs, dispatch_env)
            }
            None => {
                if let Some(id) = BuiltinId::from_name(&ctx.generic) {
                    self.apply_primitive_to_promargs(id, &promargs)
                } else {
                    Err(EvalError::NoApplicableMethod {
                        generic: ctx.generic,
                        class: ctx.classes.first().cloned().unwrap_or_default(),
                    })
                }
            }
        }
    }

    /// Internal dispatch for group-generic builtins: only object operands
    /// (explicit class attribute) trigger it. `Ok(None)` means "use the
    /// primitive".
    pub(crate) fn try_internal_dispatch(
        &mut self,
        call: &CallExpr,
        id: BuiltinId,
        values: &[Value],
        names: &[Option<String>],
        caller_env: EnvId,
    ) -> EvalResult<Option<Value>> {
        match id.dispatch_kind() {
            DispatchKind::None => Ok(None),
            DispatchKind::Unary => {
                let Some(obj) = values.first() else {
                    return Ok(None);
                };
                if !obj.is_object() {
                    return Ok(None);
                }
                let classes = obj.class_vector();
                if let Some(result) =
                    self.dispatch_snapshot_hit(call, id, names, &classes, None, values, caller_env)?
                {
                    return Ok(Some(result));
                }
                let group = id.group().map(|g| g.name());
                let Some(res) = self.resolve_in_env(id.name(), group, &classes, 0, caller_env)?
                else {
                    return Ok(None);
                };
                let ctx = DispatchContext {
                    generic: res.generic.clone(),
                    group: group.map(str::to_string),
                    classes: classes.clone(),
                    position: res.position,
                };
                self.store_snapshot(call, id, names, classes, None, res.target.clone(), &ctx);
                let promargs = Self::promargs_from_values(values, names);
                self.invoke_target(res.target, ctx, promargs, caller_env)
                    .map(Some)
            }
            DispatchKind::Binary => {
                let (left, right) = match values {
                    [l, r] => (l, r),
                    _ => return Ok(None),
                };
                if !left.is_object() && !right.is_object() {
                    return Ok(None);
                }
                let left_classes = left.class_vector();
                let right_classes = right.class_vector();
                if let Some(result) = self.dispatch_snapshot_hit(
                    call,
                    id,
                    names,
                    &left_classes,
                    Some(&right_classes),
                    values,
                    caller_env,
                )? {
                    return Ok(Some(result));
                }
                let group = id.group().map(|g| g.name());
                let lres = if left.is_object() {
                    self.resolve_in_env(id.name(), group, &left_classes, 0, caller_env)?
                } else {
                    None
                };
                let rres = if right.is_object() {
                    self.resolve_in_env(id.name(), group, &right_classes, 0, caller_env)?
                } else {
                    None
                };
                let chosen = match (lres, rres) {
                    (None, None) => None,
                    (Some(l), None) => Some((l, left_classes.clone())),
                    (None, Some(r)) => Some((r, right_classes.clone())),
                    (Some(l), Some(r)) => {
                        if Self::same_target(&l.target, &r.target) {
                            Some((l, left_classes.clone()))
                        } else if let Some(side) = self.compat.sanctioned(&l.class, &r.class) {
                            match side {
                                PreferredSide::Left => Some((l, left_classes.clone())),
                                PreferredSide::Right => Some((r, right_classes.clone())),
                            }
                        } else {
                            self.warn(format!(
                                "Incompatible methods (\"{}\", \"{}\") for \"{}\"",
                                l.method_name,
                                r.method_name,
                                id.name()
                            ));
                            None
                        }
                    }
                };
                let Some((res, dispatch_classes)) = chosen else {
                    return Ok(None);
                };
                let ctx = DispatchContext {
                    generic: res.generic.clone(),
                    group: group.map(str::to_string),
                    classes: dispatch_classes,
                    position: res.position,
                };
                self.store_snapshot(
                    call,
                    id,
                    names,
                    left_classes,
                    Some(right_classes),
                    res.target.clone(),
                    &ctx,
                );
                let promargs = Self::promargs_from_values(values, names);
                self.invoke_target(res.target, ctx, promargs, caller_env)
                    .map(Some)
            }
        }
    }

    /// Re-use a cached dispatch resolution when the operand class vectors
    /// still match the snapshot.
    fn dispatch_snapshot_hit(
        &mut self,
        call: &CallExpr,
        id: BuiltinId,
        names: &[Option<String>],
        classes: &[String],
        right_classes: Option<&[String]>,
        values: &[Value],
        caller_env: EnvId,
    ) -> EvalResult<Option<Value>> {
        let snapshot = {
            let Some(cache) = self.sites.get(&call.site) else {
                return Ok(None);
            };
            if cache.is_megamorphic() {
                return Ok(None);
            }
            let Some(entry) = cache.find(CalleeKey::Builtin(id), names) else {
                return Ok(None);
            };
            let Some(snap) = &entry.generic else {
                return Ok(None);
            };
            if snap.classes != classes {
                return Ok(None);
            }
            let right_ok = match (&snap.right_classes, right_classes) {
                (None, None) => true,
                (Some(a), Some(b)) => a == b,
                _ => false,
            };
            if !right_ok {
                return Ok(None);
            }
            snap.clone()
        };
        #[cfg(debug_assertions)]
        if super::dispatch_debug_enabled() {
            super::dispatch_debug_log(format_args!(
                "[DISPATCH] site {:?}: snapshot hit for {}",
                call.site,
                id.name()
            ));
        }
        let promargs = Self::promargs_from_values(values, names);
        self.invoke_target(snapshot.target, snapshot.ctx, promargs, caller_env)
            .map(Some)
    }

    fn store_snapshot(
        &mut self,
        call: &CallExpr,
        id: BuiltinId,
        names: &[Option<String>],
        classes: Vec<String>,
        right_classes: Option<Vec<String>>,
        target: Value,
        ctx: &DispatchContext,
    ) {
        let depth = self.config.inline_cache_depth;
        let megamorphic_after = self.config.megamorphic_after;
        let cache = self.sites.entry(call.site).or_default();
        if cache.is_megamorphic() {
            return;
        }
        let snapshot = GenericSnapshot {
            classes,
            right_classes,
            target,
            ctx: ctx.clone(),
        };
        if let Some(entry) = cache.find_mut(CalleeKey::Builtin(id), names) {
            entry.generic = Some(snapshot);
        } else {
            cache.insert(
                CacheEntry {
                    key: CalleeKey::Builtin(id),
                    shape: names.to_vec(),
                    matched: None,
                    generic: Some(snapshot),
                },
                depth,
                megamorphic_after,
            );
        }
    }

    /// Run a resolved method: closures re-match the promise arguments
    /// against their own formals and get a full activation with the
    /// dispatch context recorded; builtin targets take the primitive path.
    fn invoke_target(
        &mut self,
        target: Value,
        ctx: DispatchContext,
        promargs: Rc<Vec<PromArg>>,
        caller_env: EnvId,
    ) -> EvalResult<Value> {
        match target {
            Value::Closure(clo) => {
                let matched = self.match_promargs(&clo.formals, &promargs)?;
                self.activate_and_run(&clo, &matched, promargs, Some(ctx), caller_env)
            }
            Value::Builtin(id) => self.apply_primitive_to_promargs(id, &promargs),
            _ => Err(EvalError::internal("resolved method is not a function")),
        }
    }

    /// Force promise arguments and run a primitive over them, applying its
    /// declared casts.
    fn apply_primitive_to_promargs(
        &mut self,
        id: BuiltinId,
        promargs: &[PromArg],
    ) -> EvalResult<Value> {
        let contract = id.contract();
        if !contract.arity.accepts(promargs.len()) {
            return Err(EvalError::ArityMismatch {
                builtin: id.name().to_string(),
                expected: contract.arity.describe(),
                got: promargs.len(),
            });
        }
        let mut names = Vec::with_capacity(promargs.len());
        let mut values = Vec::with_capacity(promargs.len());
        for arg in promargs {
            names.push(arg.name.clone());
            values.push(self.force_if_promise(arg.value.clone())?);
        }
        for (pos, value) in values.iter().enumerate() {
            if !contract.is_lazy(pos) {
                self.check_cast(id, contract.cast_at(pos), value)?;
            }
        }
        self.apply_builtin(id, values, &names)
    }

    fn eval_supplied_item(
        &mut self,
        item: Option<SuppliedItem>,
        env: EnvId,
    ) -> EvalResult<Option<Value>> {
        match item {
            None => Ok(None),
            Some(item) => {
                let value = match item.payload {
                    Payload::Expr(expr) => self.eval_in(&expr, env)?,
                    Payload::Forwarded(v) => v,
                };
                Ok(Some(self.force_if_promise(value)?))
            }
        }
    }

    fn promargs_from_values(values: &[Value], names: &[Option<String>]) -> Rc<Vec<PromArg>> {
        Rc::new(
            values
                .iter()
                .zip(names.iter())
                .map(|(value, name)| PromArg {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
        )
    }

    fn same_target(a: &Value, b: &Value) -> bool {
        match (Self::callee_key(a), Self::callee_key(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn callee_key(value: &Value) -> Option<CalleeKey> {
        match value {
            Value::Builtin(id) => Some(CalleeKey::Builtin(*id)),
            Value::Closure(clo) => Some(CalleeKey::Closure(clo.id)),
            _ => None,
        }
    }
}
