//! Batching flag
//!
//! A thread-local toggle that makes singleton axes behave as parallel-for
//! axes instead of broadcast axes in the array core. The flag is scoped:
//! acquire it with [`BatchGuard::enter`], or iterate a [`ParallelRange`]
//! whose body runs with the flag held. The indexing engine accepts a
//! `ParallelRange` as a sequence slot with the batching bit set.

use std::cell::Cell;

thread_local! {
    static BATCH_MODE: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is inside a batched region.
pub fn batch_mode() -> bool {
    BATCH_MODE.with(|b| b.get())
}

/// RAII guard holding the batching flag for the current thread.
///
/// Nested guards are allowed; the flag drops back to its previous value when
/// each guard is released, so a scope never clears a flag an outer scope
/// still owns.
pub struct BatchGuard {
    previous: bool,
}

impl BatchGuard {
    pub fn enter() -> Self {
        let previous = BATCH_MODE.with(|b| b.replace(true));
        BatchGuard { previous }
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let previous = self.previous;
        BATCH_MODE.with(|b| b.set(previous));
    }
}

/// A half-open arithmetic sequence usable both as a loop iterable and as a
/// batched selector slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelRange {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl ParallelRange {
    /// Number of iterations the range produces.
    pub fn len(&self) -> usize {
        if self.step == 0 {
            return 0;
        }
        let span = if self.step > 0 {
            self.stop - self.start
        } else {
            self.start - self.stop
        };
        if span <= 0 {
            0
        } else {
            ((span + self.step.abs() - 1) / self.step.abs()) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build a batched range. `parallel_range(n)` spans `0..n`; use the struct
/// literal for an explicit `start:stop:step`.
pub fn parallel_range(n: i64) -> ParallelRange {
    ParallelRange { start: 0, stop: n, step: 1 }
}

/// Iterator over a [`ParallelRange`]; each yielded index is visited with the
/// batching flag held.
pub struct ParallelIter {
    range: ParallelRange,
    next: i64,
    remaining: usize,
    _guard: BatchGuard,
}

impl Iterator for ParallelIter {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.next;
        self.next += self.range.step;
        self.remaining -= 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl IntoIterator for ParallelRange {
    type Item = i64;
    type IntoIter = ParallelIter;

    fn into_iter(self) -> ParallelIter {
        ParallelIter {
            range: self,
            next: self.start,
            remaining: self.len(),
            _guard: BatchGuard::enter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_scopes_the_flag() {
        assert!(!batch_mode());
        {
            let _g = BatchGuard::enter();
            assert!(batch_mode());
            {
                let _inner = BatchGuard::enter();
                assert!(batch_mode());
            }
            assert!(batch_mode());
        }
        assert!(!batch_mode());
    }

    #[test]
    fn range_lengths() {
        assert_eq!(parallel_range(5).len(), 5);
        assert_eq!(ParallelRange { start: 1, stop: 8, step: 3 }.len(), 3);
        assert_eq!(ParallelRange { start: 5, stop: 0, step: -1 }.len(), 5);
        assert_eq!(ParallelRange { start: 0, stop: 0, step: 1 }.len(), 0);
    }

    #[test]
    fn iteration_holds_flag() {
        let mut seen = Vec::new();
        for i in parallel_range(4) {
            assert!(batch_mode());
            seen.push(i);
        }
        assert!(!batch_mode());
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn negative_step_iteration() {
        let idx: Vec<i64> = ParallelRange { start: 6, stop: 0, step: -2 }.into_iter().collect();
        assert_eq!(idx, vec![6, 4, 2]);
    }
}
