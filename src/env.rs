//! The layered binding environment (component B).
//!
//! Represented as a chain of frames linked by `Rc` so that closures can capture "the
//! environment visible at their definition site" by cloning a single pointer. Each
//! frame's bindings live behind a `RefCell`: almost every frame is written once and
//! never touched again, but a mutually recursive `let` group needs its frame to exist
//! (so `Defer`s can capture a handle to it) *before* its final contents are known — see
//! `Environment::new_recursive_group`. Lookup walks the chain from the most recently
//! added frame outward; that walk order is exactly right-biased shadowing.

use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{ir::Expr, value::Value};

/// Either an unevaluated module-level definition or an already-computed value.
///
/// Module-level bindings start as `Unevaluated` and are re-evaluated on each lookup
/// (under an environment stripped of locals, see `Environment::without_locals`) rather
/// than memoized — the design explicitly does not require across-lookup memoization.
#[derive(Debug, Clone)]
pub enum Binding {
    Unevaluated(Expr),
    Value(Value),
}

impl From<Value> for Binding {
    fn from(v: Value) -> Self {
        Binding::Value(v)
    }
}

type Bindings = Rc<RefCell<IndexMap<String, Binding>>>;

enum Frame {
    Empty,
    Layer { bindings: Bindings, parent: Environment },
}

#[derive(Clone)]
pub struct Environment(Rc<Frame>);

impl Environment {
    #[must_use]
    pub fn empty() -> Self {
        Self(Rc::new(Frame::Empty))
    }

    fn layer(bindings: IndexMap<String, Binding>, parent: Environment) -> Self {
        Self(Rc::new(Frame::Layer { bindings: Rc::new(RefCell::new(bindings)), parent }))
    }

    /// Binds a single name on top of this environment. The returned environment shadows
    /// any existing binding of the same name; `self` is left untouched (closures that
    /// already captured it keep seeing the old bindings).
    #[must_use]
    pub fn extend(&self, name: impl Into<String>, binding: impl Into<Binding>) -> Self {
        let mut bindings = IndexMap::with_capacity(1);
        bindings.insert(name.into(), binding.into());
        Self::layer(bindings, self.clone())
    }

    /// Adds a whole batch of bindings as a single new frame, shadowing `self`.
    /// Used by non-recursive `let` groups and module initialization.
    #[must_use]
    pub fn union(&self, bindings: IndexMap<String, Binding>) -> Self {
        if bindings.is_empty() {
            self.clone()
        } else {
            Self::layer(bindings, self.clone())
        }
    }

    /// Creates an empty frame on top of `parent` whose contents don't exist yet. Used to
    /// build a mutually recursive `let` group: each binding's `Defer` captures *this*
    /// environment (a cheap `Rc` clone) before the group's bindings are known, and
    /// `fill_recursive_group` installs them afterward. Because evaluation is
    /// demand-driven, nothing forces a `Defer` before the group is fully installed, so
    /// the apparent chicken-and-egg problem never bites at runtime.
    #[must_use]
    pub fn new_recursive_group(parent: &Environment) -> Self {
        Self::layer(IndexMap::new(), parent.clone())
    }

    /// Installs `bindings` into a frame created by `new_recursive_group`. Must be called
    /// at most once, before any lookup can observe the frame.
    pub fn fill_recursive_group(&self, bindings: IndexMap<String, Binding>) {
        if let Frame::Layer { bindings: cell, .. } = self.0.as_ref() {
            *cell.borrow_mut() = bindings;
        }
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        match self.0.as_ref() {
            Frame::Empty => None,
            Frame::Layer { bindings, parent } => {
                if let Some(b) = bindings.borrow().get(name) {
                    Some(b.clone())
                } else {
                    parent.lookup(name)
                }
            }
        }
    }

    /// Keeps only qualified bindings (names containing a `.`), flattened into a single
    /// frame. Used when re-entering a module-level expression so it cannot see the
    /// locals of whatever call site forced it.
    #[must_use]
    pub fn without_locals(&self) -> Self {
        let mut flat = IndexMap::new();
        self.collect_qualified(&mut flat);
        Self::layer(flat, Environment::empty())
    }

    /// Collects qualified bindings from the whole chain into `out`, outermost first so
    /// that bindings nearer the head of the chain (later, shadowing) overwrite entries
    /// inserted by bindings further out.
    fn collect_qualified(&self, out: &mut IndexMap<String, Binding>) {
        if let Frame::Layer { bindings, parent } = self.0.as_ref() {
            parent.collect_qualified(out);
            for (name, binding) in bindings.borrow().iter() {
                if name.contains('.') {
                    out.insert(name.clone(), binding.clone());
                }
            }
        }
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Environment(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Annotation, Expr, ExprKind, Literal};

    fn int_expr(n: i64) -> Expr {
        Expr::new(ExprKind::Literal(Literal::Int(n)), Annotation::new(crate::error::Span {
            file: None,
            start: crate::error::CodeLoc::new(1, 1),
            end: crate::error::CodeLoc::new(1, 1),
        }))
    }

    #[test]
    fn extend_shadows_without_mutating_parent() {
        let base = Environment::empty().extend("x", Value::Int(1));
        let shadowed = base.extend("x", Value::Int(2));
        assert!(matches!(base.lookup("x"), Some(Binding::Value(Value::Int(1)))));
        assert!(matches!(shadowed.lookup("x"), Some(Binding::Value(Value::Int(2)))));
    }

    #[test]
    fn without_locals_keeps_only_qualified_names() {
        let env = Environment::empty()
            .extend("Mod.f", Binding::Unevaluated(int_expr(10)))
            .extend("local", Value::Int(99));
        let stripped = env.without_locals();
        assert!(stripped.lookup("local").is_none());
        assert!(matches!(stripped.lookup("Mod.f"), Some(Binding::Unevaluated(_))));
    }

    #[test]
    fn recursive_group_bindings_see_each_other() {
        let parent = Environment::empty();
        let group_env = Environment::new_recursive_group(&parent);
        let mut bindings = IndexMap::new();
        bindings.insert(
            "even".to_string(),
            Binding::Value(Value::Defer(crate::value::Defer { env: group_env.clone(), expr: Box::new(int_expr(0)) })),
        );
        bindings.insert("odd".to_string(), Binding::Value(Value::Int(1)));
        group_env.fill_recursive_group(bindings);
        assert!(group_env.lookup("even").is_some());
        assert!(group_env.lookup("odd").is_some());
    }
}
