//! Pluggable observation of temporal-driver events.
//!
//! Purely diagnostic: nothing here ever affects a verdict. Mirrors the grounding
//! crate's own `VmTracer` trait — a `NoopTracer` default meant to compile away, and a
//! `RecordingTracer` an embedder (or a test) can swap in to assert what happened during
//! a run.

use crate::error::Span;

/// One observed temporal-driver event, as recorded by `RecordingTracer`.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    /// A `trace(label, p)` form was evaluated.
    Trace { index: usize, span: Span, label: String },
    /// `always p` stepped onto one more state of the trace.
    AlwaysStep { index: usize, span: Span },
    /// `next p` dropped the current head of the trace.
    Next { index: usize, span: Span },
}

/// Hook points the temporal driver calls into while advancing along a trace.
///
/// `index` is always the 1-indexed position (within the original trace) of the state
/// the driver was looking at when the event fired.
pub trait VerifyTracer {
    fn on_trace(&mut self, _index: usize, _span: &Span, _label: &str) {}
    fn on_always_step(&mut self, _index: usize, _span: &Span) {}
    fn on_next(&mut self, _index: usize, _span: &Span) {}
}

/// Zero-cost default: every method is an empty body, so a compiler is expected to
/// inline it away entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl VerifyTracer for NoopTracer {}

/// Records every event into a `Vec` for post-run inspection. Used by tests to assert
/// `trace()` fired the expected number of times at the expected indices.
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    pub events: Vec<TraceEvent>,
}

impl VerifyTracer for RecordingTracer {
    fn on_trace(&mut self, index: usize, span: &Span, label: &str) {
        self.events.push(TraceEvent::Trace { index, span: span.clone(), label: label.to_string() });
    }

    fn on_always_step(&mut self, index: usize, span: &Span) {
        self.events.push(TraceEvent::AlwaysStep { index, span: span.clone() });
    }

    fn on_next(&mut self, index: usize, span: &Span) {
        self.events.push(TraceEvent::Next { index, span: span.clone() });
    }
}
