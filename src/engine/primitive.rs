//! Builtin implementations.
//!
//! These run after arity checking, internal dispatch, and the declared
//! casts, so they can assume well-typed operands. Integer arithmetic that
//! overflows promotes to real rather than wrapping.

use super::Engine;
use crate::builtins::{BuiltinId, Cast, GenericGroup};
use crate::error::{EvalError, EvalResult};
use crate::value::Value;

enum Num {
    Int(i64),
    Real(f64),
}

fn as_num(value: &Value) -> Option<Num> {
    match value {
        Value::Int(v) => Some(Num::Int(*v)),
        Value::Real(v) => Some(Num::Real(*v)),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(v) => Some(*v as f64),
        Value::Real(v) => Some(*v),
        _ => None,
    }
}

impl Engine {
    /// Enforce one declared coercion. The message depends on the builtin's
    /// family, matching the surface language's own diagnostics.
    pub(crate) fn check_cast(&self, id: BuiltinId, cast: Cast, value: &Value) -> EvalResult<()> {
        match cast {
            Cast::Any => Ok(()),
            Cast::Number => {
                if as_num(value).is_some() {
                    Ok(())
                } else {
                    Err(EvalError::type_error(match id.group() {
                        Some(GenericGroup::Ops) => {
                            "non-numeric argument to binary operator".to_string()
                        }
                        Some(GenericGroup::Math) => {
                            "non-numeric argument to mathematical function".to_string()
                        }
                        _ => format!("invalid 'type' ({}) of argument", value.type_name()),
                    }))
                }
            }
            Cast::Logical => {
                if value.as_condition().is_some() {
                    Ok(())
                } else {
                    Err(EvalError::type_error(format!(
                        "invalid 'x' type in 'x {} y'",
                        id.name()
                    )))
                }
            }
        }
    }

    pub(crate) fn apply_builtin(
        &mut self,
        id: BuiltinId,
        values: Vec<Value>,
        names: &[Option<String>],
    ) -> EvalResult<Value> {
        match id {
            BuiltinId::Add | BuiltinId::Sub | BuiltinId::Mul | BuiltinId::Div | BuiltinId::Pow => {
                self.arith(id, &values[0], &values[1])
            }
            BuiltinId::Abs => Ok(match as_num(&values[0]) {
                Some(Num::Int(v)) => match v.checked_abs() {
                    Some(a) => Value::Int(a),
                    None => Value::Real((v as f64).abs()),
                },
                Some(Num::Real(v)) => Value::Real(v.abs()),
                None => return Err(EvalError::internal("abs after cast")),
            }),
            BuiltinId::Sqrt => {
                let v = as_f64(&values[0])
                    .ok_or_else(|| EvalError::internal("sqrt after cast"))?;
                if v < 0.0 {
                    self.warn("NaNs produced".to_string());
                }
                Ok(Value::Real(v.sqrt()))
            }
            BuiltinId::Sum => {
                let mut int_acc: Option<i64> = Some(0);
                let mut real_acc = 0.0;
                for value in &values {
                    match as_num(value) {
                        Some(Num::Int(v)) => {
                            real_acc += v as f64;
                            int_acc = int_acc.and_then(|acc| acc.checked_add(v));
                        }
                        Some(Num::Real(v)) => {
                            real_acc += v;
                            int_acc = None;
                        }
                        None => return Err(EvalError::internal("sum after cast")),
                    }
                }
                Ok(match int_acc {
                    Some(v) => Value::Int(v),
                    None => Value::Real(real_acc),
                })
            }
            BuiltinId::Max | BuiltinId::Min => {
                let mut best: Option<(f64, Value)> = None;
                for value in &values {
                    let key = as_f64(value)
                        .ok_or_else(|| EvalError::internal("extremum after cast"))?;
                    let better = match &best {
                        None => true,
                        Some((cur, _)) => {
                            if id == BuiltinId::Max {
                                key > *cur
                            } else {
                                key < *cur
                            }
                        }
                    };
                    if better {
                        best = Some((key, value.clone()));
                    }
                }
                best.map(|(_, v)| v)
                    .ok_or_else(|| EvalError::internal("extremum of no arguments"))
            }
            BuiltinId::Length => Ok(Value::Int(match &values[0] {
                Value::Null => 0,
                Value::List(list) => list.borrow().elements.len() as i64,
                Value::Dots(dots) => dots.len() as i64,
                _ => 1,
            })),
            BuiltinId::ClassOf => Ok(Value::list(
                values[0]
                    .class_vector()
                    .into_iter()
                    .map(Value::Str)
                    .collect(),
            )),
            BuiltinId::IsNull => Ok(Value::Logical(matches!(values[0], Value::Null))),
            BuiltinId::MakeList => {
                let element_names: Option<Vec<String>> = if names.iter().any(Option::is_some) {
                    Some(
                        names
                            .iter()
                            .map(|n| n.clone().unwrap_or_default())
                            .collect(),
                    )
                } else {
                    None
                };
                let list = Value::list(values);
                if let (Value::List(l), Some(n)) = (&list, element_names) {
                    l.borrow_mut().names = Some(n);
                }
                Ok(list)
            }
            BuiltinId::And | BuiltinId::Or => self.short_circuit(id, values),
            BuiltinId::UseMethod | BuiltinId::NextMethod => Err(EvalError::internal(
                "dispatch builtin reached the primitive path",
            )),
        }
    }

    /// `&&` / `||`: the first operand is already forced and checked; the
    /// second arrives lazy and is only touched when it decides the result.
    fn short_circuit(&mut self, id: BuiltinId, values: Vec<Value>) -> EvalResult<Value> {
        let mut values = values.into_iter();
        let first = values
            .next()
            .and_then(|v| v.as_condition())
            .ok_or_else(|| EvalError::internal("short-circuit after cast"))?;
        let decided = match id {
            BuiltinId::And => !first,
            _ => first,
        };
        if decided {
            return Ok(Value::Logical(first));
        }
        let second = values
            .next()
            .ok_or_else(|| EvalError::internal("short-circuit missing operand"))?;
        let second = self.force_if_promise(second)?;
        let second = second.as_condition().ok_or_else(|| {
            EvalError::type_error(format!("invalid 'y' type in 'x {} y'", id.name()))
        })?;
        Ok(Value::Logical(second))
    }

    fn arith(&mut self, id: BuiltinId, left: &Value, right: &Value) -> EvalResult<Value> {
        let (l, r) = match (as_num(left), as_num(right)) {
            (Some(l), Some(r)) => (l, r),
            _ => return Err(EvalError::internal("arith after cast")),
        };
        // Division and exponentiation always produce reals; the rest stay
        // integral for integer operands unless they overflow.
        if let (Num::Int(a), Num::Int(b)) = (&l, &r) {
            let checked = match id {
                BuiltinId::Add => a.checked_add(*b),
                BuiltinId::Sub => a.checked_sub(*b),
                BuiltinId::Mul => a.checked_mul(*b),
                _ => None,
            };
            if let Some(v) = checked {
                return Ok(Value::Int(v));
            }
            if matches!(id, BuiltinId::Add | BuiltinId::Sub | BuiltinId::Mul) {
                self.warn("integer overflow: result promoted to double".to_string());
            }
        }
        let a = match l {
            Num::Int(v) => v as f64,
            Num::Real(v) => v,
        };
        let b = match r {
            Num::Int(v) => v as f64,
            Num::Real(v) => v,
        };
        let result = match id {
            BuiltinId::Add => a + b,
            BuiltinId::Sub => a - b,
            BuiltinId::Mul => a * b,
            BuiltinId::Div => a / b,
            BuiltinId::Pow => a.powf(b),
            _ => return Err(EvalError::internal("non-arithmetic op in arith")),
        };
        Ok(Value::Real(result))
    }
}
