//! Minimal expression model.
//!
//! The syntax layer proper is an external collaborator; the engine only
//! needs call-site shape (ordered argument expressions plus optional names)
//! and formal-parameter declarations, and otherwise treats expressions as
//! opaque evaluable units. This module models exactly that surface, plus a
//! small `deparse` used to put argument source text into error messages.

use crate::span::Span;
use crate::value::Value;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Identity of a call expression, used to key the per-site inline cache.
/// Two evaluations of the same call node share one id; distinct call nodes
/// never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSiteId(pub(crate) u32);

static NEXT_SITE: AtomicU32 = AtomicU32::new(0);

impl CallSiteId {
    /// Allocate a fresh call-site identity.
    pub fn fresh() -> Self {
        CallSiteId(NEXT_SITE.fetch_add(1, Ordering::Relaxed))
    }
}

/// One supplied argument at a call site: an optional name, the expression,
/// and nothing else. An argument whose expression is [`Expr::Dots`] is an
/// expanded variadic bundle forwarded from the caller.
#[derive(Debug, Clone)]
pub struct SuppliedArg {
    pub name: Option<String>,
    pub expr: Rc<Expr>,
}

impl SuppliedArg {
    /// A positional argument.
    pub fn positional(expr: Expr) -> Self {
        Self {
            name: None,
            expr: Rc::new(expr),
        }
    }

    /// A named argument.
    pub fn named(name: &str, expr: Expr) -> Self {
        Self {
            name: Some(name.to_string()),
            expr: Rc::new(expr),
        }
    }

    /// Forward the caller's variadic bundle.
    pub fn dots() -> Self {
        Self {
            name: None,
            expr: Rc::new(Expr::Dots),
        }
    }

    /// Whether this argument forwards a variadic bundle.
    pub fn is_dots(&self) -> bool {
        matches!(&*self.expr, Expr::Dots)
    }
}

/// A call expression.
#[derive(Debug, Clone)]
pub struct CallExpr {
    pub site: CallSiteId,
    pub callee: Box<Expr>,
    pub args: Vec<SuppliedArg>,
    pub span: Option<Span>,
}

/// A function literal: formal declarations plus a body.
#[derive(Debug, Clone)]
pub struct FunctionExpr {
    /// Formal name plus optional default expression, in declaration order.
    pub params: Vec<(String, Option<Rc<Expr>>)>,
    pub body: Rc<Expr>,
}

/// Expressions the engine can evaluate.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal value.
    Const(Value),
    /// A variable reference.
    Symbol(String),
    /// A function call.
    Call(CallExpr),
    /// A function literal.
    Function(FunctionExpr),
    /// A sequence; evaluates to its last expression.
    Block(Vec<Expr>),
    /// Two- or three-armed conditional.
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },
    /// Bind `name` in the current environment.
    Assign { name: String, value: Box<Expr> },
    /// Assign to the nearest enclosing binding of `name`, or bind in the
    /// global environment when none exists.
    SuperAssign { name: String, value: Box<Expr> },
    /// The variadic bundle of the enclosing activation. Only meaningful
    /// in argument position or as a direct reference inside a body.
    Dots,
}

impl Expr {
    /// Literal from any value. List constants are marked permanently
    /// shared: they outlive every activation and must never be recycled.
    pub fn constant(value: Value) -> Self {
        value.mark_permanent();
        Expr::Const(value)
    }

    /// Real literal.
    pub fn num(v: f64) -> Self {
        Expr::Const(Value::Real(v))
    }

    /// Integer literal.
    pub fn int(v: i64) -> Self {
        Expr::Const(Value::Int(v))
    }

    /// String literal.
    pub fn string(v: &str) -> Self {
        Expr::Const(Value::Str(v.to_string()))
    }

    /// Logical literal.
    pub fn logical(v: bool) -> Self {
        Expr::Const(Value::Logical(v))
    }

    /// Variable reference.
    pub fn sym(name: &str) -> Self {
        Expr::Symbol(name.to_string())
    }

    /// Call with a fresh site id.
    pub fn call(callee: Expr, args: Vec<SuppliedArg>) -> Self {
        Expr::Call(CallExpr {
            site: CallSiteId::fresh(),
            callee: Box::new(callee),
            args,
            span: None,
        })
    }

    /// Call of a named function with a fresh site id.
    pub fn call_named(name: &str, args: Vec<SuppliedArg>) -> Self {
        Expr::call(Expr::sym(name), args)
    }

    /// Attach a source span (call expressions only; no-op otherwise).
    pub fn with_span(mut self, span: Span) -> Self {
        if let Expr::Call(call) = &mut self {
            call.span = Some(span);
        }
        self
    }

    /// Function literal. Params are `(name, default)` pairs; use `"..."`
    /// as a name for the variadic collector.
    pub fn function(params: Vec<(&str, Option<Expr>)>, body: Expr) -> Self {
        Expr::Function(FunctionExpr {
            params: params
                .into_iter()
                .map(|(n, d)| (n.to_string(), d.map(Rc::new)))
                .collect(),
            body: Rc::new(body),
        })
    }

    /// Block of expressions.
    pub fn block(exprs: Vec<Expr>) -> Self {
        Expr::Block(exprs)
    }

    /// Assignment.
    pub fn assign(name: &str, value: Expr) -> Self {
        Expr::Assign {
            name: name.to_string(),
            value: Box::new(value),
        }
    }

    /// Super-assignment (`<<-`).
    pub fn super_assign(name: &str, value: Expr) -> Self {
        Expr::SuperAssign {
            name: name.to_string(),
            value: Box::new(value),
        }
    }

    /// Conditional.
    pub fn if_else(cond: Expr, then_branch: Expr, else_branch: Expr) -> Self {
        Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Some(Box::new(else_branch)),
        }
    }
}

/// Render an expression back to source-like text for error messages.
pub fn deparse(expr: &Expr) -> String {
    match expr {
        Expr::Const(v) => v.deparse(),
        Expr::Symbol(name) => name.clone(),
        Expr::Call(call) => {
            let args: Vec<String> = call
                .args
                .iter()
                .map(|a| match &a.name {
                    Some(n) => format!("{} = {}", n, deparse(&a.expr)),
                    None => deparse(&a.expr),
                })
                .collect();
            format!("{}({})", deparse(&call.callee), args.join(", "))
        }
        Expr::Function(f) => {
            let params: Vec<String> = f
                .params
                .iter()
                .map(|(n, d)| match d {
                    Some(d) => format!("{} = {}", n, deparse(d)),
                    None => n.clone(),
                })
                .collect();
            format!("function({}) {}", params.join(", "), deparse(&f.body))
        }
        Expr::Block(exprs) => {
            let inner: Vec<String> = exprs.iter().map(deparse).collect();
            format!("{{ {} }}", inner.join("; "))
        }
        Expr::If {
            cond,
            then_branch,
            else_branch,
        } => match else_branch {
            Some(e) => format!(
                "if ({}) {} else {}",
                deparse(cond),
                deparse(then_branch),
                deparse(e)
            ),
            None => format!("if ({}) {}", deparse(cond), deparse(then_branch)),
        },
        Expr::Assign { name, value } => format!("{} <- {}", name, deparse(value)),
        Expr::SuperAssign { name, value } => format!("{} <<- {}", name, deparse(value)),
        Expr::Dots => "...".to_string(),
    }
}

/// Deparse one supplied argument the way it appeared at the call site.
pub fn deparse_arg(arg: &SuppliedArg) -> String {
    match &arg.name {
        Some(n) => format!("{} = {}", n, deparse(&arg.expr)),
        None => deparse(&arg.expr),
    }
}
