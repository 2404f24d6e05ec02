//! The query resolver (component F): binds `_queryAll` results from the current
//! observed state into the value universe.

use indexmap::IndexMap;

use crate::{
    env::Environment,
    error::{EvalError, Span},
    eval::{Ctx, EvalFn},
    ir::Expr,
    state::{ElementState, MatchedElement, RecordedValue, Trace},
    tracer::VerifyTracer,
    value::{Value, ValueTag},
};

pub fn eval_query_all<Tr: VerifyTracer>(
    selector_expr: &Expr,
    wanted_expr: &Expr,
    span: &Span,
    env: &Environment,
    trace: &Trace,
    ctx: &mut Ctx<'_, Tr>,
    eval: EvalFn<Tr>,
) -> Result<Value, EvalError> {
    let selector_value = eval(selector_expr, env, trace, ctx)?;
    let selector = selector_value.as_str().ok_or_else(|| EvalError::InvalidBuiltInFunctionApplication {
        span: span.clone(),
        function: "_queryAll".to_string(),
        argument: selector_value.to_string(),
    })?;

    let wanted_value = eval(wanted_expr, env, trace, ctx)?;
    let wanted = wanted_value.as_object().ok_or_else(|| EvalError::InvalidBuiltInFunctionApplication {
        span: span.clone(),
        function: "_queryAll".to_string(),
        argument: wanted_value.to_string(),
    })?;

    // `eval_expr`'s own empty-trace check means we should never actually reach this
    // with no current head, but a deferred element-state lookup elsewhere could still
    // race it in principle, so this stays a real error rather than an `unreachable!`.
    let state = trace.head().ok_or(EvalError::Undetermined)?;

    let matched_elements = state.matches(selector).ok_or_else(|| EvalError::ForeignFunctionError {
        span: Some(span.clone()),
        message: format!("Selector not in observed state: {selector}"),
    })?;

    let mut results = Vec::with_capacity(matched_elements.len());
    for matched in matched_elements {
        results.push(Value::Object(resolve_wanted_states(wanted, matched, selector, span)?));
    }
    Ok(Value::Array(results))
}

fn resolve_wanted_states(
    wanted: &IndexMap<String, Value>,
    matched: &MatchedElement,
    selector: &str,
    span: &Span,
) -> Result<IndexMap<String, Value>, EvalError> {
    let mut obj = IndexMap::with_capacity(wanted.len());
    for (key, state_value) in wanted {
        let element_state = as_element_state(state_value).ok_or_else(|| EvalError::UnexpectedType {
            span: Some(span.clone()),
            expected: ValueTag::ElementState,
            actual: state_value.to_string(),
        })?;
        let recorded = matched.get(element_state).ok_or_else(|| EvalError::ForeignFunctionError {
            span: Some(span.clone()),
            message: format!("no {element_state} recorded for `{key}` on selector {selector:?}"),
        })?;
        obj.insert(key.clone(), lift_json(recorded));
    }
    Ok(obj)
}

fn as_element_state(value: &Value) -> Option<&ElementState> {
    match value {
        Value::ElementState(es) => Some(es),
        _ => None,
    }
}

/// §4.F's JSON lift: `null→Object{}`, `bool→Bool`, `string→String`, `number→Int` when
/// integral else `Number`, `array→Array`, `object→Object` (recursive).
fn lift_json(value: &RecordedValue) -> Value {
    match value {
        RecordedValue::Null => Value::Object(IndexMap::new()),
        RecordedValue::Bool(b) => Value::Bool(*b),
        RecordedValue::String(s) => Value::String(s.clone()),
        RecordedValue::Number(n) => {
            n.as_i64().map_or_else(|| Value::Number(n.as_f64().unwrap_or_default()), Value::Int)
        }
        RecordedValue::Array(items) => Value::Array(items.iter().map(lift_json).collect()),
        RecordedValue::Object(fields) => {
            let mut obj = IndexMap::with_capacity(fields.len());
            for (k, v) in fields {
                obj.insert(k.clone(), lift_json(v));
            }
            Value::Object(obj)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{foreign::ForeignRegistry, ir::Annotation, resource::{DepthTracker, ResourceLimits}, tracer::NoopTracer};

    fn span() -> Span {
        Span { file: None, start: crate::error::CodeLoc::new(1, 1), end: crate::error::CodeLoc::new(1, 1) }
    }

    fn string_expr(s: &str) -> Expr {
        Expr::new(crate::ir::ExprKind::Literal(crate::ir::Literal::StringBytes(s.as_bytes().to_vec())), Annotation::new(span()))
    }

    #[test]
    fn lift_json_distinguishes_integral_and_fractional_numbers() {
        let int_val = serde_json::json!(3);
        let frac_val = serde_json::json!(3.5);
        assert!(matches!(lift_json(&int_val), Value::Int(3)));
        assert!(matches!(lift_json(&frac_val), Value::Number(n) if n == 3.5));
    }

    #[test]
    fn missing_selector_is_a_foreign_function_error() {
        let foreign = ForeignRegistry::standard();
        let depth = DepthTracker::new(ResourceLimits::default());
        let mut tracer = NoopTracer;
        let mut ctx = Ctx { foreign: &foreign, depth: &depth, tracer: &mut tracer, total_len: 1 };
        let env = Environment::empty();
        let state = crate::state::ObservedState::new();
        let trace = Trace::new(vec![state]);
        let wanted = crate::ir::Literal::Object(vec![]);
        let wanted_expr = Expr::new(crate::ir::ExprKind::Literal(wanted), Annotation::new(span()));
        let err = eval_query_all(&string_expr("#missing"), &wanted_expr, &span(), &env, &trace, &mut ctx, crate::eval::eval_expr)
            .unwrap_err();
        assert!(matches!(err, EvalError::ForeignFunctionError { .. }));
    }
}
