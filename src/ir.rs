//! The compiled intermediate representation the evaluator walks.
//!
//! This is consumed, never produced, by the evaluator: parsing, type-checking, and
//! desugaring of the surface language live in an external compiler. Every node carries
//! an `Annotation` so errors can always point at a source location.

use serde::{Deserialize, Serialize};

use crate::error::Span;

/// A qualified name, e.g. `Module.member` or a bare local `x`.
pub type QName = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Number(f64),
    Char(char),
    /// Raw bytes as written in source; decoded to UTF-8 text at evaluation time so an
    /// encoding error can be reported as `InvalidString` rather than rejected at parse
    /// time (matches §4.D).
    StringBytes(Vec<u8>),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
}

/// Marks a pending foreign call on a `Variable` node: the qualified name of the foreign
/// primitive plus the (already-bound-by-application) parameter names to look up in the
/// current environment when the variable is forced. See `foreign::dispatch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignApply {
    pub qname: QName,
    pub param_names: Vec<String>,
}

/// Out-of-band metadata that changes how a node is evaluated without changing its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Meta {
    pub is_newtype: bool,
    pub is_foreign: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub span: Span,
    pub meta: Meta,
    pub foreign_apply: Option<ForeignApply>,
}

impl Annotation {
    #[must_use]
    pub fn new(span: Span) -> Self {
        Self { span, meta: Meta::default(), foreign_apply: None }
    }
}

/// A non-recursive binding or a mutually recursive group of bindings within a `let`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LetGroup {
    Single { name: String, rhs: Box<Expr> },
    Recursive { bindings: Vec<(String, Expr)> },
}

/// A single `case` alternative: binders matched against the scrutinees, followed by an
/// unguarded result or a sequence of guards tried in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub binders: Vec<Binder>,
    pub result: AltResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AltResult {
    Unguarded(Box<Expr>),
    Guarded(Vec<(Expr, Expr)>),
}

/// A scalar literal as it appears in a pattern. Distinct from `Literal` (the expression
/// form) because a pattern's literal must be directly comparable without evaluation —
/// it can never itself contain a sub-expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatternLiteral {
    Bool(bool),
    Int(i64),
    Number(f64),
    Char(char),
    StringBytes(Vec<u8>),
}

/// A pattern tried against a scrutinee value during `case` evaluation. See
/// `pattern::matches` for the semantics of each variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Binder {
    Wildcard,
    Literal(PatternLiteral),
    Variable(String),
    Named { name: String, inner: Box<Binder> },
    Array(Vec<Binder>),
    Object(Vec<(String, Binder)>),
    Constructor { type_name: String, ctor_name: String, is_newtype: bool, fields: Vec<Binder> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Literal(Literal),
    Variable(QName),
    Lambda { param: String, body: Box<Expr> },
    Apply { func: Box<Expr>, arg: Box<Expr> },
    Case { scrutinees: Vec<Expr>, alternatives: Vec<Alternative> },
    Let { groups: Vec<LetGroup>, body: Box<Expr> },
    /// `type-name`, `ctor-name`, field names — evaluates to a curried constructor
    /// function (or the identity function, for a newtype). See §4.D.
    Constructor { type_name: String, ctor_name: String, field_names: Vec<String>, is_newtype: bool },
    Accessor { field: String, target: Box<Expr> },
    ObjectUpdate { target: Box<Expr>, updates: Vec<(String, Expr)> },
    /// `always p`
    Always(Box<Expr>),
    /// `next p`
    Next(Box<Expr>),
    /// `trace(label, p)`
    Trace { label: Box<Expr>, body: Box<Expr> },
    /// `_property(name)`
    Property(Box<Expr>),
    /// `_attribute(name)`
    Attribute(Box<Expr>),
    /// `_queryAll(selector, wantedStates)`
    QueryAll { selector: Box<Expr>, wanted_states: Box<Expr> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ann: Annotation,
}

impl Expr {
    #[must_use]
    pub fn new(kind: ExprKind, ann: Annotation) -> Self {
        Self { kind, ann }
    }

    #[must_use]
    pub fn span(&self) -> Span {
        self.ann.span.clone()
    }
}

/// A single top-level binding group within a module: mirrors `LetGroup` but at module
/// scope, where names are qualified by the module name before being installed in the
/// environment (see `Program::initial_environment`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModuleBindingGroup {
    Single { name: String, rhs: Expr },
    Recursive { bindings: Vec<(String, Expr)> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub span: Span,
    pub bindings: Vec<ModuleBindingGroup>,
}
