//! Observed-state model: what a DOM driver hands the evaluator for each step of a trace.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A queryable attribute of a matched DOM element.
///
/// Opaque to the evaluator beyond equality/hashing; the DOM driver decides what each
/// variant actually means for a real page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementState {
    Property(String),
    Attribute(String),
    CssValue(String),
    Text,
    Enabled,
}

impl std::fmt::Display for ElementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Property(name) => write!(f, "property({name})"),
            Self::Attribute(name) => write!(f, "attribute({name})"),
            Self::CssValue(name) => write!(f, "cssValue({name})"),
            Self::Text => write!(f, "text"),
            Self::Enabled => write!(f, "enabled"),
        }
    }
}

/// A JSON-shaped value as recorded by the DOM driver for one element state.
///
/// Kept distinct from `Value` (crate::value) because the driver speaks JSON, not the
/// evaluator's own tagged universe; `query::lift_json` converts between the two.
pub type RecordedValue = serde_json::Value;

/// One matched element: the recorded value for each element state the driver captured.
pub type MatchedElement = IndexMap<ElementState, RecordedValue>;

/// A single snapshot of a page's queryable state, indexed by CSS selector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservedState {
    selectors: IndexMap<String, Vec<MatchedElement>>,
}

impl ObservedState {
    #[must_use]
    pub fn new() -> Self {
        Self { selectors: IndexMap::new() }
    }

    pub fn insert(&mut self, selector: impl Into<String>, matches: Vec<MatchedElement>) {
        self.selectors.insert(selector.into(), matches);
    }

    #[must_use]
    pub fn matches(&self, selector: &str) -> Option<&[MatchedElement]> {
        self.selectors.get(selector).map(Vec::as_slice)
    }
}

/// A finite, ordered sequence of observed states, consumed front-to-back by the temporal
/// driver. 1-indexed for diagnostics (see `Trace::index_of`).
#[derive(Debug, Clone, Default)]
pub struct Trace {
    states: Vec<ObservedState>,
}

impl Trace {
    #[must_use]
    pub fn new(states: Vec<ObservedState>) -> Self {
        Self { states }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn head(&self) -> Option<&ObservedState> {
        self.states.first()
    }

    /// Drops the current head, returning the shortened trace. Traces are never lengthened;
    /// this is the only way the temporal driver advances.
    #[must_use]
    pub fn tail(&self) -> Trace {
        if self.states.is_empty() {
            Trace::new(Vec::new())
        } else {
            Trace::new(self.states[1..].to_vec())
        }
    }

    /// 1-indexed position of the current head within the original trace, for diagnostics.
    /// `total - remaining + 1`.
    #[must_use]
    pub fn index_of(&self, total_len: usize) -> usize {
        total_len - self.states.len() + 1
    }
}
