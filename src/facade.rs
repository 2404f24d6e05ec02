//! The specification façade (component H): the public entry point a host calls after
//! loading a compiled module set. Resolves the well-known entry points (`origin`,
//! `readyWhen`, `actions`, `queries`, `proposition`) and runs `verify`.

use indexmap::IndexMap;

use crate::{
    env::{Binding, Environment},
    error::EvalError,
    eval::{self, Ctx},
    foreign::ForeignRegistry,
    ir::{Module, ModuleBindingGroup},
    resource::{DepthTracker, ResourceLimits},
    state::{ObservedState, Trace},
    tracer::{NoopTracer, VerifyTracer},
    value::Value,
};

/// The outcome of evaluating a `proposition` against a trace.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted,
    Rejected,
    Undetermined,
}

/// A loaded, ready-to-run specification: the qualified-name environment built from a
/// module set, plus the foreign registry and resource limits it was built with.
pub struct Program {
    env: Environment,
    /// The module whose unqualified bindings are the façade's entry points — by
    /// convention, the last module in the loaded set (a host compiling a single user
    /// specification file passes exactly one module).
    main_module: String,
    foreign: ForeignRegistry,
    limits: ResourceLimits,
}

impl Program {
    /// Builds the initial environment from a set of compiled modules: every top-level
    /// binding is installed under its module-qualified name (`Module.member`), and
    /// mutually recursive groups get a shared, self-referential frame (see
    /// `Environment::new_recursive_group`).
    #[must_use]
    pub fn load(modules: &[Module]) -> Self {
        Self::load_with(modules, ForeignRegistry::standard(), ResourceLimits::default())
    }

    #[must_use]
    pub fn load_with(modules: &[Module], foreign: ForeignRegistry, limits: ResourceLimits) -> Self {
        let main_module = modules.last().map(|m| m.name.clone()).unwrap_or_default();
        let mut env = Environment::empty();
        for module in modules {
            env = install_module(module, env);
        }
        Self { env, main_module, foreign, limits }
    }

    /// Evaluates `proposition` against `trace`, mapping the result onto a `Verdict`.
    /// Any error other than `Undetermined` is surfaced as-is so the caller can render
    /// it with `EvalError::pretty`.
    pub fn verify(&self, trace: Trace) -> Result<Verdict, EvalError> {
        let mut tracer = NoopTracer;
        self.verify_with_tracer(trace, &mut tracer)
    }

    /// Same as `verify`, but with a caller-supplied tracer so a host or a test can
    /// observe `trace()`/`always`/`next` diagnostics as they fire.
    pub fn verify_with_tracer<Tr: VerifyTracer>(&self, trace: Trace, tracer: &mut Tr) -> Result<Verdict, EvalError> {
        let total_len = trace.len();
        let result = self.eval_entry_point("proposition", trace, total_len, tracer);
        match result {
            Ok(Value::Bool(true)) => Ok(Verdict::Accepted),
            Ok(Value::Bool(false)) => Ok(Verdict::Rejected),
            Ok(other) => Err(EvalError::UnexpectedType {
                span: None,
                expected: crate::value::ValueTag::Bool,
                actual: other.to_string(),
            }),
            Err(EvalError::Undetermined) => Ok(Verdict::Undetermined),
            Err(e) => Err(e),
        }
    }

    /// `origin`: a String naming the page the host should navigate to.
    pub fn origin(&self) -> Result<String, EvalError> {
        self.pure_entry_point("origin").and_then(|v| expect_string(v, "origin"))
    }

    /// `readyWhen`: a selector String the host polls before driving actions.
    pub fn ready_when(&self) -> Result<String, EvalError> {
        self.pure_entry_point("readyWhen").and_then(|v| expect_string(v, "readyWhen"))
    }

    /// `actions`: an Array of tagged action objects.
    pub fn actions(&self) -> Result<Vec<Value>, EvalError> {
        self.pure_entry_point("actions").and_then(|v| expect_array(v, "actions"))
    }

    /// `queries`: an Array of selector Strings, resolved the same way as the other
    /// pure entry points.
    pub fn queries(&self) -> Result<Vec<Value>, EvalError> {
        self.pure_entry_point("queries").and_then(|v| expect_array(v, "queries"))
    }

    /// The static query-extraction hook. Per the unresolved open question this is
    /// grounded on, it returns an empty set unconditionally rather than guessing at a
    /// real IR walk.
    #[must_use]
    pub fn extract_queries(&self) -> Vec<String> {
        Vec::new()
    }

    /// Evaluates a pure (non-temporal) entry point under the single-element
    /// pseudo-trace described in §4.H.
    fn pure_entry_point(&self, name: &str) -> Result<Value, EvalError> {
        let pseudo_trace = Trace::new(vec![ObservedState::new()]);
        let mut tracer = NoopTracer;
        self.eval_entry_point(name, pseudo_trace, 1, &mut tracer)
    }

    fn eval_entry_point<Tr: VerifyTracer>(
        &self,
        name: &str,
        trace: Trace,
        total_len: usize,
        tracer: &mut Tr,
    ) -> Result<Value, EvalError> {
        let qname = format!("{}.{name}", self.main_module);
        let Some(binding) = self.env.lookup(&qname) else {
            return Err(EvalError::EntryPointNotDefined { name: qname });
        };
        let depth = DepthTracker::new(self.limits);
        let mut ctx = Ctx { foreign: &self.foreign, depth: &depth, tracer, total_len };
        match binding {
            Binding::Unevaluated(expr) => eval::eval_expr(&expr, &self.env.without_locals(), &trace, &mut ctx),
            Binding::Value(Value::Defer(defer)) => eval::eval_expr(&defer.expr, &defer.env, &trace, &mut ctx),
            Binding::Value(v) => Ok(v),
        }
    }
}

fn expect_string(value: Value, entry_point: &str) -> Result<String, EvalError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(EvalError::UnexpectedType {
            span: None,
            expected: crate::value::ValueTag::String,
            actual: format!("{entry_point} resolved to {other}"),
        }),
    }
}

fn expect_array(value: Value, entry_point: &str) -> Result<Vec<Value>, EvalError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(EvalError::UnexpectedType {
            span: None,
            expected: crate::value::ValueTag::Array,
            actual: format!("{entry_point} resolved to {other}"),
        }),
    }
}

/// Installs one module's bindings into `env` under `Module.member` qualified names.
fn install_module(module: &Module, env: Environment) -> Environment {
    let mut current = env;
    for group in &module.bindings {
        match group {
            ModuleBindingGroup::Single { name, rhs } => {
                let qname = format!("{}.{name}", module.name);
                current = current.extend(qname, Binding::Unevaluated(rhs.clone()));
            }
            ModuleBindingGroup::Recursive { bindings } => {
                let group_env = Environment::new_recursive_group(&current);
                let mut installed: IndexMap<String, Binding> = IndexMap::new();
                for (name, rhs) in bindings {
                    let qname = format!("{}.{name}", module.name);
                    installed.insert(qname, Binding::Unevaluated(rhs.clone()));
                }
                group_env.fill_recursive_group(installed);
                current = group_env;
            }
        }
    }
    current
}
