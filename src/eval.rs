//! The core evaluator (component D): a tree-walk over the IR.
//!
//! Also the hub the other components hang off of — temporal forms (component E) and
//! `_queryAll` (component F) are ordinary `ExprKind` variants that this module
//! recognizes and routes elsewhere rather than evaluating itself; foreign calls
//! (component G) are reached through a `Variable` node's `foreign_apply` annotation.

use indexmap::IndexMap;

use crate::{
    env::{Binding, Environment},
    error::{EvalError, Span},
    foreign::{self, ForeignRegistry},
    ir::{AltResult, Expr, ExprKind, LetGroup, Literal},
    pattern,
    query,
    resource::DepthTracker,
    state::Trace,
    temporal,
    tracer::VerifyTracer,
    value::{Closure, Defer, Value},
};

/// Everything evaluation needs to carry along besides the environment and the current
/// trace tail: the foreign registry, the recursion guard, the tracer, and the original
/// trace length (so diagnostics can report a 1-indexed position within the *whole*
/// trace rather than the shrinking tail).
pub struct Ctx<'a, Tr: VerifyTracer> {
    pub foreign: &'a ForeignRegistry,
    pub depth: &'a DepthTracker,
    pub tracer: &'a mut Tr,
    pub total_len: usize,
}

/// `eval_expr`'s own monomorphized signature, passed to `temporal`/`query` as a plain
/// function pointer so those modules can recurse back into the evaluator without
/// depending on its implementation.
pub type EvalFn<Tr> = fn(&Expr, &Environment, &Trace, &mut Ctx<'_, Tr>) -> Result<Value, EvalError>;

pub fn eval_expr<Tr: VerifyTracer>(
    expr: &Expr,
    env: &Environment,
    trace: &Trace,
    ctx: &mut Ctx<'_, Tr>,
) -> Result<Value, EvalError> {
    // §4.E: on an empty trace, only a top-level `always` survives; everything else
    // (temporal or not) is undetermined. See the design document's note on this
    // asymmetry — it is intentional, not a bug.
    if trace.is_empty() && !matches!(expr.kind, ExprKind::Always(_)) {
        return Err(EvalError::Undetermined);
    }

    let _depth_guard = ctx.depth.enter().map_err(|_| EvalError::UnexpectedError {
        span: Some(expr.span()),
        message: "recursion limit exceeded".to_string(),
    })?;

    match &expr.kind {
        ExprKind::Literal(lit) => eval_literal(lit, &expr.span(), env, trace, ctx),
        ExprKind::Variable(name) => eval_variable(expr, name, env, trace, ctx),
        ExprKind::Lambda { param, body } => {
            Ok(Value::Function(Closure { env: env.clone(), param: param.clone(), body: body.clone() }))
        }
        ExprKind::Apply { func, arg } => {
            let callee = eval_expr(func, env, trace, ctx)?;
            let argument = eval_expr(arg, env, trace, ctx)?;
            apply_value(&callee, argument, &expr.span(), trace, ctx)
        }
        ExprKind::Case { scrutinees, alternatives } => eval_case(scrutinees, alternatives, &expr.span(), env, trace, ctx),
        ExprKind::Let { groups, body } => {
            let extended = eval_let_groups(groups, env);
            eval_expr(body, &extended, trace, ctx)
        }
        ExprKind::Constructor { ctor_name, field_names, is_newtype, .. } => {
            let synthetic = constructor_body(ctor_name, field_names, *is_newtype, &expr.ann);
            eval_expr(&synthetic, env, trace, ctx)
        }
        ExprKind::Accessor { field, target } => {
            let value = eval_expr(target, env, trace, ctx)?;
            let obj = require_object(&value, &expr.span())?;
            obj.get(field).cloned().ok_or_else(|| EvalError::UnexpectedError {
                span: Some(expr.span()),
                message: format!("key `{field}` not present"),
            })
        }
        ExprKind::ObjectUpdate { target, updates } => {
            let value = eval_expr(target, env, trace, ctx)?;
            let mut obj = require_object(&value, &expr.span())?.clone();
            for (field, rhs) in updates {
                let updated = eval_expr(rhs, env, trace, ctx)?;
                obj.insert(field.clone(), updated);
            }
            Ok(Value::Object(obj))
        }
        ExprKind::Always(inner) => temporal::eval_always(inner, &expr.span(), env, trace, ctx, eval_expr),
        ExprKind::Next(inner) => temporal::eval_next(inner, &expr.span(), env, trace, ctx, eval_expr),
        ExprKind::Trace { label, body } => temporal::eval_trace(label, body, &expr.span(), env, trace, ctx, eval_expr),
        ExprKind::Property(name) => temporal::eval_element_state(name, env, trace, ctx, eval_expr, crate::state::ElementState::Property),
        ExprKind::Attribute(name) => temporal::eval_element_state(name, env, trace, ctx, eval_expr, crate::state::ElementState::Attribute),
        ExprKind::QueryAll { selector, wanted_states } => {
            query::eval_query_all(selector, wanted_states, &expr.span(), env, trace, ctx, eval_expr)
        }
    }
}

fn eval_literal<Tr: VerifyTracer>(
    lit: &Literal,
    span: &Span,
    env: &Environment,
    trace: &Trace,
    ctx: &mut Ctx<'_, Tr>,
) -> Result<Value, EvalError> {
    Ok(match lit {
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Number(n) => Value::Number(*n),
        Literal::Char(c) => Value::Char(*c),
        Literal::StringBytes(bytes) => {
            let text = String::from_utf8(bytes.clone())
                .map_err(|_| EvalError::InvalidString { span: span.clone() })?;
            Value::String(text)
        }
        Literal::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval_expr(item, env, trace, ctx)?);
            }
            Value::Array(values)
        }
        Literal::Object(fields) => {
            let mut obj = IndexMap::with_capacity(fields.len());
            for (key, value_expr) in fields {
                let value = eval_expr(value_expr, env, trace, ctx)?;
                obj.insert(key.clone(), value);
            }
            Value::Object(obj)
        }
    })
}

fn eval_variable<Tr: VerifyTracer>(
    expr: &Expr,
    name: &str,
    env: &Environment,
    trace: &Trace,
    ctx: &mut Ctx<'_, Tr>,
) -> Result<Value, EvalError> {
    if let Some(foreign_apply) = &expr.ann.foreign_apply {
        let mut args = Vec::with_capacity(foreign_apply.param_names.len());
        for param in &foreign_apply.param_names {
            let binding = env.lookup(param).ok_or_else(|| EvalError::NotInScope {
                span: expr.span(),
                name: param.clone(),
            })?;
            args.push(force_binding(binding, env, trace, ctx)?);
        }
        let span = expr.span();
        let registry = ctx.foreign;
        let mut apply_cb = |f: &Value, arg: Value| apply_value(f, arg, &span, trace, ctx);
        return foreign::dispatch(registry, &expr.span(), &foreign_apply.qname, &args, &mut apply_cb);
    }

    let binding = env.lookup(name).ok_or_else(|| EvalError::NotInScope { span: expr.span(), name: name.to_string() })?;
    force_binding(binding, env, trace, ctx)
}

/// Resolves a binding to a concrete `Value`, re-evaluating unforced expressions and
/// thunks. Module-level expressions are re-entered under `without_locals()` so they
/// cannot see whatever call site happened to force them.
fn force_binding<Tr: VerifyTracer>(
    binding: Binding,
    env: &Environment,
    trace: &Trace,
    ctx: &mut Ctx<'_, Tr>,
) -> Result<Value, EvalError> {
    match binding {
        Binding::Unevaluated(def_expr) => eval_expr(&def_expr, &env.without_locals(), trace, ctx),
        Binding::Value(Value::Defer(defer)) => eval_expr(&defer.expr, &defer.env, trace, ctx),
        Binding::Value(v) => Ok(v),
    }
}

fn apply_value<Tr: VerifyTracer>(
    callee: &Value,
    argument: Value,
    span: &Span,
    trace: &Trace,
    ctx: &mut Ctx<'_, Tr>,
) -> Result<Value, EvalError> {
    match callee {
        Value::Function(closure) => {
            let extended = closure.env.extend(closure.param.clone(), argument);
            eval_expr(&closure.body, &extended, trace, ctx)
        }
        other => Err(EvalError::UnexpectedType {
            span: Some(span.clone()),
            expected: crate::value::ValueTag::Function,
            actual: other.to_string(),
        }),
    }
}

fn eval_case<Tr: VerifyTracer>(
    scrutinees: &[Expr],
    alternatives: &[crate::ir::Alternative],
    span: &Span,
    env: &Environment,
    trace: &Trace,
    ctx: &mut Ctx<'_, Tr>,
) -> Result<Value, EvalError> {
    let mut values = Vec::with_capacity(scrutinees.len());
    for scrutinee in scrutinees {
        values.push(eval_expr(scrutinee, env, trace, ctx)?);
    }

    'alt: for alt in alternatives {
        if alt.binders.len() != values.len() {
            continue;
        }
        let pairs: Vec<(&crate::ir::Binder, &Value)> = alt.binders.iter().zip(values.iter()).collect();
        let Some(bindings) = pattern::matches_all(&pairs) else {
            continue;
        };
        let extended = env.union(bindings.into_iter().map(|(k, v)| (k, Binding::Value(v))).collect());
        match &alt.result {
            AltResult::Unguarded(result) => return eval_expr(result, &extended, trace, ctx),
            AltResult::Guarded(guards) => {
                for (guard, result) in guards {
                    let guard_value = eval_expr(guard, &extended, trace, ctx)?;
                    if guard_value.as_bool() == Some(true) {
                        return eval_expr(result, &extended, trace, ctx);
                    }
                }
                continue 'alt;
            }
        }
    }

    Err(EvalError::UnexpectedError { span: Some(span.clone()), message: "Non-exhaustive case".to_string() })
}

/// Installs a `let`'s binding groups as `Defer` thunks, in textual order, so mutually
/// recursive groups can see the shared frame before any binding is forced. Never
/// evaluates eagerly — that is left entirely to whatever later forces each name.
fn eval_let_groups(groups: &[LetGroup], env: &Environment) -> Environment {
    let mut current = env.clone();
    for group in groups {
        match group {
            LetGroup::Single { name, rhs } => {
                let defer = Value::Defer(Defer { env: current.clone(), expr: rhs.clone() });
                current = current.extend(name.clone(), defer);
            }
            LetGroup::Recursive { bindings } => {
                let group_env = Environment::new_recursive_group(&current);
                let mut installed = IndexMap::new();
                for (name, rhs) in bindings {
                    let defer = Value::Defer(Defer { env: group_env.clone(), expr: Box::new(rhs.clone()) });
                    installed.insert(name.clone(), Binding::Value(defer));
                }
                group_env.fill_recursive_group(installed);
                current = group_env;
            }
        }
    }
    current
}

fn require_object<'a>(value: &'a Value, span: &Span) -> Result<&'a IndexMap<String, Value>, EvalError> {
    value.as_object().ok_or_else(|| EvalError::UnexpectedType {
        span: Some(span.clone()),
        expected: crate::value::ValueTag::Object,
        actual: value.to_string(),
    })
}

/// Synthesizes the curried-lambda-chain IR for a data constructor (§4.D). A non-newtype
/// constructor of arity `n` becomes `n` nested lambdas ending in the canonical
/// `{constructor, fields}` object literal; a newtype constructor becomes the identity
/// lambda. Building this as ordinary IR (rather than a special-cased native value)
/// means the rest of the evaluator needs no awareness that constructors exist.
fn constructor_body(ctor_name: &str, field_names: &[String], is_newtype: bool, ann: &crate::ir::Annotation) -> Expr {
    if is_newtype {
        let param = field_names.first().cloned().unwrap_or_else(|| "x".to_string());
        return Expr::new(
            ExprKind::Lambda {
                param: param.clone(),
                body: Box::new(Expr::new(ExprKind::Variable(param), ann.clone())),
            },
            ann.clone(),
        );
    }

    let field_vars: Vec<Expr> =
        field_names.iter().map(|name| Expr::new(ExprKind::Variable(name.clone()), ann.clone())).collect();
    let ctor_literal = Expr::new(
        ExprKind::Literal(Literal::StringBytes(ctor_name.as_bytes().to_vec())),
        ann.clone(),
    );
    let fields_literal = Expr::new(ExprKind::Literal(Literal::Array(field_vars)), ann.clone());
    let object_literal = Expr::new(
        ExprKind::Literal(Literal::Object(vec![("constructor".to_string(), ctor_literal), ("fields".to_string(), fields_literal)])),
        ann.clone(),
    );

    field_names.iter().rev().fold(object_literal, |body, param| {
        Expr::new(ExprKind::Lambda { param: param.clone(), body: Box::new(body) }, ann.clone())
    })
}
