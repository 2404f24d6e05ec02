//! A recursion-depth guard for the evaluator.
//!
//! A tree-walking interpreter over a user-supplied, possibly self-referential IR needs a
//! defined failure mode for runaway recursion instead of a host stack overflow. This
//! mirrors the grounding crate's resource-limit module, trimmed to the one limit this
//! evaluator actually needs: call depth. Scoped acquisition with guaranteed release is
//! implemented as an RAII guard, decremented on every exit path including `?`-propagated
//! errors and panics during unwinding.

use std::cell::Cell;

/// Caller-configurable ceilings for the evaluator. Kept small and explicit (not derived
/// from a type, see the design document's note on foreign arity machinery) so tests can
/// exercise the recursion limit deterministically with a tiny ceiling.
#[derive(Debug, Clone, Copy)]
pub struct ResourceLimits {
    pub max_depth: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self { max_depth: 4096 }
    }
}

/// Tracks the evaluator's current recursion depth against `ResourceLimits::max_depth`.
pub struct DepthTracker {
    limit: usize,
    depth: Cell<usize>,
}

impl DepthTracker {
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self { limit: limits.max_depth, depth: Cell::new(0) }
    }

    /// Enters one more level of recursion, returning a guard that must be held for the
    /// duration of that level. Fails once `max_depth` would be exceeded.
    pub fn enter(&self) -> Result<DepthGuard<'_>, DepthExceeded> {
        let depth = self.depth.get();
        if depth >= self.limit {
            return Err(DepthExceeded { limit: self.limit });
        }
        self.depth.set(depth + 1);
        Ok(DepthGuard { tracker: self })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DepthExceeded {
    pub limit: usize,
}

/// RAII token for one level of recursion depth; releases on every exit path via `Drop`.
pub struct DepthGuard<'a> {
    tracker: &'a DepthTracker,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.tracker.depth.set(self.tracker.depth.get() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_guard_releases_on_drop() {
        let tracker = DepthTracker::new(ResourceLimits { max_depth: 2 });
        {
            let _a = tracker.enter().unwrap();
            let _b = tracker.enter().unwrap();
            assert!(tracker.enter().is_err());
        }
        // both guards dropped; depth back to zero, so entering again succeeds.
        assert!(tracker.enter().is_ok());
    }
}
