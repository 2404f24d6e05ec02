//! The pattern matcher (component C).
//!
//! Pure and total: given a binder and a value, produces either a failed match or a set
//! of new bindings. Never raises — a non-exhaustive `case` is a concern for the
//! evaluator (it tries the next alternative, then eventually fails), not the matcher.

use indexmap::IndexMap;

use crate::{
    ir::{Binder, PatternLiteral},
    value::Value,
};

/// Tries `binder` against `value`, accumulating bindings into `out` on success.
/// Returns `false` (and leaves `out` partially populated — callers should discard it)
/// on failure.
#[must_use]
pub fn matches(binder: &Binder, value: &Value, out: &mut IndexMap<String, Value>) -> bool {
    match binder {
        Binder::Wildcard => true,
        Binder::Literal(lit) => literal_matches(lit, value),
        Binder::Variable(name) => {
            out.insert(name.clone(), value.clone());
            true
        }
        Binder::Named { name, inner } => {
            if matches(inner, value, out) {
                out.insert(name.clone(), value.clone());
                true
            } else {
                false
            }
        }
        Binder::Array(binders) => match value {
            Value::Array(items) => {
                if binders.len() > items.len() {
                    return false;
                }
                binders.iter().zip(items).all(|(b, v)| matches(b, v, out))
            }
            _ => false,
        },
        Binder::Object(fields) => match value {
            Value::Object(obj) => fields.iter().all(|(key, inner)| match obj.get(key) {
                Some(v) => matches(inner, v, out),
                None => false,
            }),
            _ => false,
        },
        Binder::Constructor { ctor_name, is_newtype, fields, .. } => {
            if *is_newtype {
                // A newtype constructor is transparent: its one field binds directly
                // against the unwrapped value.
                match fields.as_slice() {
                    [only] => matches(only, value, out),
                    _ => false,
                }
            } else {
                match value {
                    Value::Object(obj) => {
                        let Some(ctor) = obj.get("constructor").and_then(Value::as_str) else {
                            return false;
                        };
                        if ctor != ctor_name {
                            return false;
                        }
                        let Some(args) = obj.get("fields").and_then(Value::as_array) else {
                            return false;
                        };
                        if args.len() != fields.len() {
                            return false;
                        }
                        fields.iter().zip(args).all(|(b, v)| matches(b, v, out))
                    }
                    _ => false,
                }
            }
        }
    }
}

fn literal_matches(lit: &PatternLiteral, value: &Value) -> bool {
    match (lit, value) {
        (PatternLiteral::Bool(a), Value::Bool(b)) => a == b,
        (PatternLiteral::Int(a), Value::Int(b)) => a == b,
        (PatternLiteral::Int(a), Value::Number(b)) => (*a as f64) == *b,
        (PatternLiteral::Number(a), Value::Number(b)) => a == b,
        (PatternLiteral::Number(a), Value::Int(b)) => *a == (*b as f64),
        (PatternLiteral::Char(a), Value::Char(b)) => a == b,
        (PatternLiteral::StringBytes(bytes), Value::String(s)) => {
            std::str::from_utf8(bytes).is_ok_and(|decoded| decoded == s)
        }
        _ => false,
    }
}

/// Tries a full list of `(binder, value)` pairs left-to-right, short-circuiting on the
/// first failure. Used for `case` scrutinee lists, where every binder must match.
#[must_use]
pub fn matches_all(pairs: &[(&Binder, &Value)]) -> Option<IndexMap<String, Value>> {
    let mut out = IndexMap::new();
    for (binder, value) in pairs {
        if !matches(binder, value, &mut out) {
            return None;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_anything() {
        let mut out = IndexMap::new();
        assert!(matches(&Binder::Wildcard, &Value::Int(42), &mut out));
        assert!(out.is_empty());
    }

    #[test]
    fn variable_binds_whole_value() {
        let mut out = IndexMap::new();
        assert!(matches(&Binder::Variable("x".into()), &Value::Int(7), &mut out));
        assert_eq!(out.get("x").unwrap().structural_eq(&Value::Int(7)), true);
    }

    #[test]
    fn named_binds_inner_and_whole() {
        let binder = Binder::Named { name: "whole".into(), inner: Box::new(Binder::Variable("x".into())) };
        let mut out = IndexMap::new();
        assert!(matches(&binder, &Value::Int(3), &mut out));
        assert!(out.contains_key("x"));
        assert!(out.contains_key("whole"));
    }

    #[test]
    fn array_binder_ignores_excess_elements() {
        let binder = Binder::Array(vec![Binder::Variable("head".into())]);
        let mut out = IndexMap::new();
        let value = Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert!(matches(&binder, &value, &mut out));
        assert_eq!(out.get("head").unwrap().structural_eq(&Value::Int(1)), true);
    }

    #[test]
    fn array_binder_fails_when_too_long() {
        let binder = Binder::Array(vec![
            Binder::Wildcard,
            Binder::Wildcard,
            Binder::Wildcard,
        ]);
        let mut out = IndexMap::new();
        let value = Value::Array(vec![Value::Int(1)]);
        assert!(!matches(&binder, &value, &mut out));
    }

    #[test]
    fn object_binder_fails_on_missing_key() {
        let binder = Binder::Object(vec![("missing".into(), Binder::Wildcard)]);
        let mut out = IndexMap::new();
        let value = Value::Object(IndexMap::new());
        assert!(!matches(&binder, &value, &mut out));
    }

    #[test]
    fn newtype_constructor_is_transparent() {
        let binder = Binder::Constructor {
            type_name: "Wrapper".into(),
            ctor_name: "Wrapper".into(),
            is_newtype: true,
            fields: vec![Binder::Variable("inner".into())],
        };
        let mut out = IndexMap::new();
        assert!(matches(&binder, &Value::Int(9), &mut out));
        assert_eq!(out.get("inner").unwrap().structural_eq(&Value::Int(9)), true);
    }

    #[test]
    fn non_newtype_constructor_matches_tagged_object() {
        let binder = Binder::Constructor {
            type_name: "Maybe".into(),
            ctor_name: "Just".into(),
            is_newtype: false,
            fields: vec![Binder::Variable("x".into())],
        };
        let mut fields = IndexMap::new();
        fields.insert("constructor".to_string(), Value::String("Just".into()));
        fields.insert("fields".to_string(), Value::Array(vec![Value::Int(5)]));
        let mut out = IndexMap::new();
        assert!(matches(&binder, &Value::Object(fields), &mut out));
        assert_eq!(out.get("x").unwrap().structural_eq(&Value::Int(5)), true);
    }

    #[test]
    fn int_literal_widens_against_number() {
        let mut out = IndexMap::new();
        assert!(matches(&Binder::Literal(PatternLiteral::Int(3)), &Value::Number(3.0), &mut out));
    }
}
