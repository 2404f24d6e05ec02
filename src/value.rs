//! The tagged value universe (component A).

use std::{cmp::Ordering, fmt};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{env::Environment, ir::Expr, state::ElementState};

/// The tag half of `Value`, used in `EvalError::UnexpectedType` so error messages can
/// name the expected shape without constructing a dummy value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTag {
    Bool,
    Int,
    Number,
    Char,
    String,
    Array,
    Object,
    Function,
    ElementState,
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "Bool",
            Self::Int => "Int",
            Self::Number => "Number",
            Self::Char => "Char",
            Self::String => "String",
            Self::Array => "Array",
            Self::Object => "Object",
            Self::Function => "Function",
            Self::ElementState => "ElementState",
        };
        f.write_str(name)
    }
}

/// A function value: the environment visible at its definition site, its single
/// parameter name, and its unevaluated body. Never captures anything from a call site —
/// that is the entire point of a closure, see §3's invariants.
#[derive(Clone)]
pub struct Closure {
    pub env: Environment,
    pub param: String,
    pub body: Box<Expr>,
}

/// A not-yet-evaluated expression paired with the environment it must be evaluated in.
/// Used to implement `letrec` and cross-module bindings without evaluating eagerly.
#[derive(Clone)]
pub struct Defer {
    pub env: Environment,
    pub expr: Box<Expr>,
}

/// The runtime value universe. Structural values (`Bool` through `Object`) have
/// structural equality; `Function`, `Defer`, and `ElementState` do not — they appear
/// only transiently in the source language and are never compared.
///
/// `Function` and `Defer` hold a captured `Environment`, which is not serializable (it
/// is an `Rc`-chained web of bindings, not a data shape a host would ever want to carry
/// across a process boundary), so both are `#[serde(skip)]`: a host that tries to
/// serialize a call-site-only value gets a serde error rather than a silently wrong
/// encoding, and neither variant can be produced by deserializing untrusted input.
#[derive(Clone, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Number(f64),
    Char(char),
    String(String),
    Array(Vec<Value>),
    /// Keys unique; insertion order preserved so record update can append new keys
    /// after existing ones deterministically.
    Object(IndexMap<String, Value>),
    #[serde(skip)]
    Function(Closure),
    #[serde(skip)]
    Defer(Defer),
    ElementState(ElementState),
}

impl Value {
    #[must_use]
    pub fn tag(&self) -> ValueTag {
        match self {
            Self::Bool(_) => ValueTag::Bool,
            Self::Int(_) => ValueTag::Int,
            Self::Number(_) => ValueTag::Number,
            Self::Char(_) => ValueTag::Char,
            Self::String(_) => ValueTag::String,
            Self::Array(_) => ValueTag::Array,
            Self::Object(_) => ValueTag::Object,
            Self::Function(_) => ValueTag::Function,
            Self::Defer(_) => ValueTag::Function,
            Self::ElementState(_) => ValueTag::ElementState,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// Structural equality. Functions, thunks, and element states have no user-visible
    /// equality in the source language; comparing them always returns `false` rather
    /// than panicking, matching how the foreign `==`/`/=` primitives are expected to
    /// degrade for non-comparable operands without the evaluator crashing.
    #[must_use]
    pub fn structural_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Int(a), Self::Number(b)) | (Self::Number(b), Self::Int(a)) => (*a as f64) == *b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.structural_eq(y))
            }
            (Self::Object(a), Self::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.structural_eq(w)))
            }
            _ => false,
        }
    }

    /// Structural ordering for `<`/`<=`/`>`/`>=`, covering the same domain as
    /// `structural_eq` (Bool through Object): `Bool` orders `false < true`, `Array`
    /// compares elementwise then by length (lexicographic), `Object` compares its
    /// fields key-then-value after sorting both sides by key. `None` for a NaN
    /// comparison or a pair with no shared shape (functions, thunks, element states).
    #[must_use]
    pub fn structural_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b),
            (Self::Int(a), Self::Number(b)) => (*a as f64).partial_cmp(b),
            (Self::Number(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Char(a), Self::Char(b)) => Some(a.cmp(b)),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Array(a), Self::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.structural_cmp(y)? {
                        Ordering::Equal => continue,
                        unequal => return Some(unequal),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            (Self::Object(a), Self::Object(b)) => {
                let mut a_sorted: Vec<_> = a.iter().collect();
                a_sorted.sort_by(|x, y| x.0.cmp(y.0));
                let mut b_sorted: Vec<_> = b.iter().collect();
                b_sorted.sort_by(|x, y| x.0.cmp(y.0));
                for ((ka, va), (kb, vb)) in a_sorted.iter().zip(b_sorted.iter()) {
                    match ka.cmp(kb) {
                        Ordering::Equal => {}
                        unequal => return Some(unequal),
                    }
                    match va.structural_cmp(vb)? {
                        Ordering::Equal => continue,
                        unequal => return Some(unequal),
                    }
                }
                Some(a_sorted.len().cmp(&b_sorted.len()))
            }
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Char(c) => write!(f, "{c:?}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Object(fields) => {
                f.write_str("{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Self::Function(_) => f.write_str("<function>"),
            Self::Defer(_) => f.write_str("<thunk>"),
            Self::ElementState(es) => write!(f, "<element-state {es}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_orders_false_before_true() {
        assert_eq!(Value::Bool(false).structural_cmp(&Value::Bool(true)), Some(Ordering::Less));
    }

    #[test]
    fn arrays_compare_lexicographically_then_by_length() {
        let shorter = Value::Array(vec![Value::Int(1)]);
        let longer = Value::Array(vec![Value::Int(1), Value::Int(0)]);
        assert_eq!(shorter.structural_cmp(&longer), Some(Ordering::Less));

        let smaller = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        let bigger = Value::Array(vec![Value::Int(1), Value::Int(3)]);
        assert_eq!(smaller.structural_cmp(&bigger), Some(Ordering::Less));
    }

    #[test]
    fn objects_compare_by_key_then_value_regardless_of_insertion_order() {
        let mut a = IndexMap::new();
        a.insert("b".to_string(), Value::Int(1));
        a.insert("a".to_string(), Value::Int(2));
        let mut b = IndexMap::new();
        b.insert("a".to_string(), Value::Int(2));
        b.insert("b".to_string(), Value::Int(5));
        assert_eq!(Value::Object(a).structural_cmp(&Value::Object(b)), Some(Ordering::Less));
    }

    #[test]
    fn nan_is_not_orderable() {
        assert_eq!(Value::Number(f64::NAN).structural_cmp(&Value::Number(1.0)), None);
    }

    #[test]
    fn mismatched_kinds_are_not_orderable() {
        assert_eq!(Value::Bool(true).structural_cmp(&Value::Int(1)), None);
    }
}
