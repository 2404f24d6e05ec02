//! A temporal-logic evaluator core for a declarative web-testing property language.
//!
//! Consumes a compiled IR module set and an observed-state trace, and decides whether a
//! `proposition` entry point holds: [`Verdict::Accepted`], [`Verdict::Rejected`], or
//! [`Verdict::Undetermined`] when the trace runs out before a definite answer. See
//! [`facade::Program`] for the public entry point.

mod env;
mod error;
mod eval;
mod facade;
mod foreign;
mod ir;
mod pattern;
mod query;
mod resource;
mod state;
mod temporal;
mod tracer;
mod value;

pub use error::{CodeLoc, EvalError, Span};
pub use facade::{Program, Verdict};
pub use foreign::{Apply, ForeignFn, ForeignRegistry, Invoke};
pub use ir::{
    Alternative, AltResult, Annotation, Binder, Expr, ExprKind, ForeignApply, LetGroup, Literal, Meta, Module,
    ModuleBindingGroup, PatternLiteral, QName,
};
pub use resource::{DepthExceeded, DepthGuard, DepthTracker, ResourceLimits};
pub use state::{ElementState, MatchedElement, ObservedState, RecordedValue, Trace};
pub use tracer::{NoopTracer, RecordingTracer, TraceEvent, VerifyTracer};
pub use value::{Closure, Defer, Value, ValueTag};
