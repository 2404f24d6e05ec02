//! Foreign dispatch (component G): arity-checked marshalling between the value universe
//! and native primitive implementations, plus the standard primitive library (§4.G.1).
//!
//! Each primitive is a record of `{arity, invoke}` — arity is stored explicitly, never
//! derived from a type (see the design document's note on foreign arity machinery).
//! Primitives that need to call back into a user-supplied `Function` value (`map`,
//! `filter`, `arrayBind`, `foldl`) receive an `Apply` callback from the evaluator rather
//! than reaching into evaluator internals themselves, keeping this module ignorant of
//! `Environment`/`Expr`.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::{
    error::{EvalError, Span},
    value::{Value, ValueTag},
};

/// Calls a `Value::Function` with one argument. Supplied by the evaluator at the
/// dispatch call site, since only it has the environment/trace context needed to
/// actually run a closure's body.
pub type Apply<'a> = dyn FnMut(&Value, Value) -> Result<Value, EvalError> + 'a;

pub type Invoke = fn(&Span, &[Value], &mut Apply) -> Result<Value, EvalError>;

#[derive(Clone, Copy)]
pub struct ForeignFn {
    pub arity: usize,
    pub invoke: Invoke,
}

/// The set of foreign primitives visible to a program, keyed by qualified name.
/// Built once during environment initialization (`StdLib::build` or a host's own
/// additions layered via `register`) and read-only thereafter — see §3's Lifecycles.
#[derive(Clone, Default)]
pub struct ForeignRegistry {
    fns: HashMap<String, ForeignFn>,
}

impl ForeignRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, qname: impl Into<String>, arity: usize, invoke: Invoke) {
        self.fns.insert(qname.into(), ForeignFn { arity, invoke });
    }

    #[must_use]
    pub fn get(&self, qname: &str) -> Option<&ForeignFn> {
        self.fns.get(qname)
    }

    /// The standard primitive library described in §4.G.1: arithmetic, ordering,
    /// string, array, and record-access operations. Hosts may layer additional or
    /// overriding primitives on top with `register` before the initial environment is
    /// built.
    #[must_use]
    pub fn standard() -> Self {
        let mut reg = Self::new();
        register_arithmetic(&mut reg);
        register_ordering(&mut reg);
        register_string(&mut reg);
        register_array(&mut reg);
        register_record(&mut reg);
        reg
    }
}

/// Resolves and invokes a foreign call: looks up `qname` in the registry, resolves each
/// of `param_names` in the current environment (all already bound as values by the
/// preceding curried applications), checks arity, and invokes the native
/// implementation.
pub fn dispatch(
    registry: &ForeignRegistry,
    span: &Span,
    qname: &str,
    args: &[Value],
    apply: &mut Apply,
) -> Result<Value, EvalError> {
    let Some(foreign_fn) = registry.get(qname) else {
        return Err(EvalError::ForeignFunctionNotSupported { span: span.clone(), name: qname.to_string() });
    };
    if args.len() != foreign_fn.arity {
        return Err(EvalError::ForeignFunctionError {
            span: Some(span.clone()),
            message: format!(
                "foreign function `{qname}` expects {} argument(s), got {}",
                foreign_fn.arity,
                args.len()
            ),
        });
    }
    (foreign_fn.invoke)(span, args, apply)
}

// ---------------------------------------------------------------------------
// Marshalling helpers
// ---------------------------------------------------------------------------

fn type_err(span: &Span, expected: ValueTag, actual: &Value) -> EvalError {
    EvalError::UnexpectedType { span: Some(span.clone()), expected, actual: actual.to_string() }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Number(n) => Some(*n),
        _ => None,
    }
}

fn is_integral(v: &Value) -> bool {
    matches!(v, Value::Int(_))
}

fn expect_array<'a>(span: &Span, v: &'a Value) -> Result<&'a [Value], EvalError> {
    v.as_array().ok_or_else(|| type_err(span, ValueTag::Array, v))
}

fn expect_string<'a>(span: &Span, v: &'a Value) -> Result<&'a str, EvalError> {
    v.as_str().ok_or_else(|| type_err(span, ValueTag::String, v))
}

fn expect_object<'a>(span: &Span, v: &'a Value) -> Result<&'a IndexMap<String, Value>, EvalError> {
    v.as_object().ok_or_else(|| type_err(span, ValueTag::Object, v))
}

fn expect_function<'a>(span: &Span, v: &'a Value) -> Result<&'a Value, EvalError> {
    match v {
        Value::Function(_) => Ok(v),
        _ => Err(type_err(span, ValueTag::Function, v)),
    }
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

fn register_arithmetic(reg: &mut ForeignRegistry) {
    reg.register("Arithmetic.+", 2, |span, args, _apply| numeric_binop(span, args, |a, b| a + b));
    reg.register("Arithmetic.-", 2, |span, args, _apply| numeric_binop(span, args, |a, b| a - b));
    reg.register("Arithmetic.*", 2, |span, args, _apply| numeric_binop(span, args, |a, b| a * b));
    reg.register("Arithmetic./", 2, |span, args, _apply| {
        let a = as_number(&args[0]).ok_or_else(|| type_err(span, ValueTag::Number, &args[0]))?;
        let b = as_number(&args[1]).ok_or_else(|| type_err(span, ValueTag::Number, &args[1]))?;
        Ok(Value::Number(a / b))
    });
    reg.register("Arithmetic.negate", 1, |span, args, _apply| match &args[0] {
        Value::Int(i) => Ok(Value::Int(-i)),
        Value::Number(n) => Ok(Value::Number(-n)),
        other => Err(type_err(span, ValueTag::Number, other)),
    });
}

fn numeric_binop(span: &Span, args: &[Value], op: impl Fn(f64, f64) -> f64) -> Result<Value, EvalError> {
    let a = as_number(&args[0]).ok_or_else(|| type_err(span, ValueTag::Number, &args[0]))?;
    let b = as_number(&args[1]).ok_or_else(|| type_err(span, ValueTag::Number, &args[1]))?;
    let result = op(a, b);
    if is_integral(&args[0]) && is_integral(&args[1]) {
        Ok(Value::Int(result as i64))
    } else {
        Ok(Value::Number(result))
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

fn register_ordering(reg: &mut ForeignRegistry) {
    reg.register("Ordering.==", 2, |_span, args, _apply| Ok(Value::Bool(args[0].structural_eq(&args[1]))));
    reg.register("Ordering./=", 2, |_span, args, _apply| Ok(Value::Bool(!args[0].structural_eq(&args[1]))));
    reg.register("Ordering.<", 2, |span, args, _apply| compare(span, args, |o| o == std::cmp::Ordering::Less));
    reg.register("Ordering.<=", 2, |span, args, _apply| {
        compare(span, args, |o| o != std::cmp::Ordering::Greater)
    });
    reg.register("Ordering.>", 2, |span, args, _apply| {
        compare(span, args, |o| o == std::cmp::Ordering::Greater)
    });
    reg.register("Ordering.>=", 2, |span, args, _apply| {
        compare(span, args, |o| o != std::cmp::Ordering::Less)
    });
}

/// Structural comparison over the same domain `Ordering.==`/`./=` accept
/// (Bool/Int/Number/Char/String/Array/Object, per §4.G.1): falls back to
/// `Value::structural_cmp`, which fails only on a NaN operand or a pair with no shared
/// shape (functions, thunks, element states — never produced by this language's own
/// expressions, so reaching this in practice means a host foreign-function addition
/// passed one in).
fn compare(span: &Span, args: &[Value], accept: impl Fn(std::cmp::Ordering) -> bool) -> Result<Value, EvalError> {
    let ordering = args[0].structural_cmp(&args[1]).ok_or_else(|| EvalError::ForeignFunctionError {
        span: Some(span.clone()),
        message: format!("values of kind {} and {} are not orderable", args[0].tag(), args[1].tag()),
    })?;
    Ok(Value::Bool(accept(ordering)))
}

// ---------------------------------------------------------------------------
// String
// ---------------------------------------------------------------------------

fn register_string(reg: &mut ForeignRegistry) {
    reg.register("String.toUpper", 1, |span, args, _apply| {
        Ok(Value::String(expect_string(span, &args[0])?.to_uppercase()))
    });
    reg.register("String.toLower", 1, |span, args, _apply| {
        Ok(Value::String(expect_string(span, &args[0])?.to_lowercase()))
    });
    reg.register("String.trim", 1, |span, args, _apply| {
        Ok(Value::String(expect_string(span, &args[0])?.trim().to_string()))
    });
    reg.register("String.strLength", 1, |span, args, _apply| {
        Ok(Value::Int(expect_string(span, &args[0])?.chars().count() as i64))
    });
    reg.register("String.strContains", 2, |span, args, _apply| {
        let haystack = expect_string(span, &args[0])?;
        let needle = expect_string(span, &args[1])?;
        Ok(Value::Bool(haystack.contains(needle)))
    });
    reg.register("String.splitOn", 2, |span, args, _apply| {
        let sep = expect_string(span, &args[0])?;
        let text = expect_string(span, &args[1])?;
        let parts = if sep.is_empty() {
            vec![Value::String(text.to_string())]
        } else {
            text.split(sep).map(|p| Value::String(p.to_string())).collect()
        };
        Ok(Value::Array(parts))
    });
}

// ---------------------------------------------------------------------------
// Array
// ---------------------------------------------------------------------------

fn register_array(reg: &mut ForeignRegistry) {
    reg.register("Array.length", 1, |span, args, _apply| {
        Ok(Value::Int(expect_array(span, &args[0])?.len() as i64))
    });
    reg.register("Array.reverse", 1, |span, args, _apply| {
        let mut items = expect_array(span, &args[0])?.to_vec();
        items.reverse();
        Ok(Value::Array(items))
    });
    reg.register("Array.head", 1, |span, args, _apply| {
        expect_array(span, &args[0])?.first().cloned().ok_or_else(|| EvalError::ForeignFunctionError {
            span: Some(span.clone()),
            message: "head of an empty array".to_string(),
        })
    });
    reg.register("Array.tail", 1, |span, args, _apply| {
        let items = expect_array(span, &args[0])?;
        if items.is_empty() {
            Err(EvalError::ForeignFunctionError {
                span: Some(span.clone()),
                message: "tail of an empty array".to_string(),
            })
        } else {
            Ok(Value::Array(items[1..].to_vec()))
        }
    });
    reg.register("Array.elem", 2, |span, args, _apply| {
        let needle = &args[0];
        let items = expect_array(span, &args[1])?;
        Ok(Value::Bool(items.iter().any(|v| v.structural_eq(needle))))
    });
    reg.register("Array.map", 2, |span, args, apply| {
        let f = expect_function(span, &args[0])?;
        let items = expect_array(span, &args[1])?;
        let mapped: Result<Vec<Value>, EvalError> = items.iter().map(|v| apply(f, v.clone())).collect();
        Ok(Value::Array(mapped?))
    });
    reg.register("Array.filter", 2, |span, args, apply| {
        let f = expect_function(span, &args[0])?;
        let items = expect_array(span, &args[1])?;
        let mut kept = Vec::new();
        for item in items {
            if apply(f, item.clone())?.as_bool().ok_or_else(|| {
                EvalError::ForeignFunctionError {
                    span: Some(span.clone()),
                    message: "filter predicate did not return a Bool".to_string(),
                }
            })? {
                kept.push(item.clone());
            }
        }
        Ok(Value::Array(kept))
    });
    reg.register("Array.foldl", 3, |span, args, apply| {
        let f = expect_function(span, &args[0])?;
        let mut acc = args[1].clone();
        for item in expect_array(span, &args[2])? {
            // `f` is curried: apply the accumulator, then apply the result to the item.
            let partial = apply(f, acc)?;
            acc = apply(&partial, item.clone())?;
        }
        Ok(acc)
    });
    reg.register("Array.arrayBind", 2, |span, args, apply| {
        let items = expect_array(span, &args[0])?;
        let f = expect_function(span, &args[1])?;
        let mut out = Vec::new();
        for item in items {
            let result = apply(f, item.clone())?;
            out.extend(expect_array(span, &result)?.iter().cloned());
        }
        Ok(Value::Array(out))
    });
}

// ---------------------------------------------------------------------------
// Record access
// ---------------------------------------------------------------------------

fn register_record(reg: &mut ForeignRegistry) {
    reg.register("Record.keys", 1, |span, args, _apply| {
        let obj = expect_object(span, &args[0])?;
        Ok(Value::Array(obj.keys().map(|k| Value::String(k.clone())).collect()))
    });
    reg.register("Record.merge", 2, |span, args, _apply| {
        let base = expect_object(span, &args[0])?;
        let overlay = expect_object(span, &args[1])?;
        let mut merged = base.clone();
        for (k, v) in overlay {
            merged.insert(k.clone(), v.clone());
        }
        Ok(Value::Object(merged))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span { file: None, start: crate::error::CodeLoc::new(1, 1), end: crate::error::CodeLoc::new(1, 1) }
    }

    fn no_apply(_f: &Value, _arg: Value) -> Result<Value, EvalError> {
        unreachable!("this test's primitives never call back into a function value")
    }

    #[test]
    fn arithmetic_preserves_int_when_both_operands_are_int() {
        let reg = ForeignRegistry::standard();
        let result = dispatch(&reg, &span(), "Arithmetic.+", &[Value::Int(2), Value::Int(3)], &mut no_apply).unwrap();
        assert!(matches!(result, Value::Int(5)));
    }

    #[test]
    fn division_always_yields_number() {
        let reg = ForeignRegistry::standard();
        let result = dispatch(&reg, &span(), "Arithmetic./", &[Value::Int(4), Value::Int(2)], &mut no_apply).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 2.0));
    }

    #[test]
    fn array_bind_non_array_first_arg_is_unexpected_type() {
        let reg = ForeignRegistry::standard();
        let err = dispatch(&reg, &span(), "Array.arrayBind", &[Value::Int(1), Value::Bool(true)], &mut no_apply)
            .unwrap_err();
        match err {
            EvalError::UnexpectedType { expected, .. } => assert_eq!(expected, ValueTag::Array),
            other => panic!("expected UnexpectedType, got {other:?}"),
        }
    }

    #[test]
    fn unregistered_name_is_not_supported() {
        let reg = ForeignRegistry::standard();
        let err = dispatch(&reg, &span(), "Nonexistent.fn", &[], &mut no_apply).unwrap_err();
        assert!(matches!(err, EvalError::ForeignFunctionNotSupported { .. }));
    }

    #[test]
    fn record_merge_overlays_new_keys() {
        let reg = ForeignRegistry::standard();
        let mut base = IndexMap::new();
        base.insert("a".to_string(), Value::Int(1));
        base.insert("b".to_string(), Value::Int(2));
        let mut overlay = IndexMap::new();
        overlay.insert("b".to_string(), Value::Int(3));
        overlay.insert("c".to_string(), Value::Int(4));
        let result =
            dispatch(&reg, &span(), "Record.merge", &[Value::Object(base), Value::Object(overlay)], &mut no_apply)
                .unwrap();
        let obj = result.as_object().unwrap();
        assert_eq!(obj.get("a").unwrap().structural_eq(&Value::Int(1)), true);
        assert_eq!(obj.get("b").unwrap().structural_eq(&Value::Int(3)), true);
        assert_eq!(obj.get("c").unwrap().structural_eq(&Value::Int(4)), true);
    }
}
