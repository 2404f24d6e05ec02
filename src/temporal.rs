//! The temporal driver (component E): `always`, `next`, `trace`, `_property`, and
//! `_attribute`. Each function here is reached from `eval::eval_expr`'s dispatch on
//! `ExprKind` and recurses back into the evaluator through the `eval` function pointer
//! rather than calling `eval::eval_expr` directly, so this module stays ignorant of
//! which tracer type parameterizes the caller.

use crate::{
    env::Environment,
    error::{EvalError, Span},
    eval::{Ctx, EvalFn},
    ir::Expr,
    state::{ElementState, Trace},
    tracer::VerifyTracer,
    value::{Value, ValueTag},
};

/// `always p`: catches `Undetermined` at each step as a vacuous `true` so an unresolved
/// tail doesn't falsify the whole conjunction, then conjoins across the rest of the
/// trace. Vacuously `true` on an empty trace.
///
/// Walks the trace with an explicit loop rather than recursing once per remaining
/// state: a long observed-state trace — many DOM snapshots over a full test run, the
/// exact workload this driver exists for — would otherwise grow the native call stack
/// by one frame per state and could overflow it long before `ResourceLimits::max_depth`
/// (which bounds ordinary expression nesting, not trace length) ever had a say.
pub fn eval_always<Tr: VerifyTracer>(
    inner: &Expr,
    span: &Span,
    env: &Environment,
    trace: &Trace,
    ctx: &mut Ctx<'_, Tr>,
    eval: EvalFn<Tr>,
) -> Result<Value, EvalError> {
    let mut remaining = trace.clone();
    let mut holds = true;
    while !remaining.is_empty() {
        let index = remaining.index_of(ctx.total_len);
        let step_result = match eval(inner, env, &remaining, ctx) {
            Ok(v) => v,
            Err(EvalError::Undetermined) => Value::Bool(true),
            Err(e) => return Err(e),
        };
        let step_bool = step_result.as_bool().ok_or_else(|| EvalError::UnexpectedType {
            span: Some(span.clone()),
            expected: ValueTag::Bool,
            actual: step_result.to_string(),
        })?;
        ctx.tracer.on_always_step(index, span);
        holds = holds && step_bool;
        remaining = remaining.tail();
    }
    Ok(Value::Bool(holds))
}

/// `next p`: drops the current head and evaluates `p` under the shortened trace.
/// Leaves undetermined-on-empty-trace handling entirely to `eval_expr`'s own
/// empty-trace check — this function never special-cases it.
pub fn eval_next<Tr: VerifyTracer>(
    inner: &Expr,
    span: &Span,
    env: &Environment,
    trace: &Trace,
    ctx: &mut Ctx<'_, Tr>,
    eval: EvalFn<Tr>,
) -> Result<Value, EvalError> {
    let index = trace.index_of(ctx.total_len);
    ctx.tracer.on_next(index, span);
    eval(inner, env, &trace.tail(), ctx)
}

/// `trace(label, p)`: evaluates `label`, emits a diagnostic through the active tracer,
/// then evaluates and returns `p` unchanged. Purely observational.
pub fn eval_trace<Tr: VerifyTracer>(
    label_expr: &Expr,
    body: &Expr,
    span: &Span,
    env: &Environment,
    trace: &Trace,
    ctx: &mut Ctx<'_, Tr>,
    eval: EvalFn<Tr>,
) -> Result<Value, EvalError> {
    let label_value = eval(label_expr, env, trace, ctx)?;
    let label = label_value.as_str().ok_or_else(|| EvalError::InvalidBuiltInFunctionApplication {
        span: span.clone(),
        function: "trace".to_string(),
        argument: label_value.to_string(),
    })?;
    let index = trace.index_of(ctx.total_len);
    ctx.tracer.on_trace(index, span, label);
    eval(body, env, trace, ctx)
}

/// Shared implementation for `_property(name)` and `_attribute(name)`: evaluate `name`
/// to a string and wrap it in the matching `ElementState` constructor.
pub fn eval_element_state<Tr: VerifyTracer>(
    name_expr: &Expr,
    env: &Environment,
    trace: &Trace,
    ctx: &mut Ctx<'_, Tr>,
    eval: EvalFn<Tr>,
    make: fn(String) -> ElementState,
) -> Result<Value, EvalError> {
    let name_value = eval(name_expr, env, trace, ctx)?;
    let name = name_value.as_str().ok_or_else(|| EvalError::InvalidBuiltInFunctionApplication {
        span: name_expr.span(),
        function: "_property/_attribute".to_string(),
        argument: name_value.to_string(),
    })?;
    Ok(Value::ElementState(make(name.to_string())))
}
