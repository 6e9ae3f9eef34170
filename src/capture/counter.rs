//! Join point for a dynamically discovered number of subtasks

/// Counts outstanding subtasks of one document capture.
///
/// The walker calls [`increment`](Self::increment) before dispatching each
/// subtask, [`settle`](Self::settle) when one completes and
/// [`finish_walk`](Self::finish_walk) once the traversal is over. Exactly one
/// of those calls returns `true`: the first one that observes zero
/// outstanding subtasks after the walk has finished.
#[derive(Debug, Default)]
pub struct TaskCounter {
    pending: usize,
    walk_finished: bool,
    finalized: bool,
}

impl TaskCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self) {
        self.pending += 1;
    }

    /// Record one completion. Returns `true` when finalization should run.
    pub fn settle(&mut self) -> bool {
        if self.pending == 0 {
            log::warn!("Task counter settled with no outstanding subtasks");
        } else {
            self.pending -= 1;
        }
        self.check_done()
    }

    /// Mark the synchronous traversal as complete. Returns `true` when
    /// finalization should run.
    pub fn finish_walk(&mut self) -> bool {
        self.walk_finished = true;
        self.check_done()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn check_done(&mut self) -> bool {
        if self.walk_finished && self.pending == 0 && !self.finalized {
            self.finalized = true;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_tasks_finalizes_on_walk_end() {
        let mut counter = TaskCounter::new();
        assert!(counter.finish_walk());
        assert!(!counter.finish_walk());
    }

    #[test]
    fn test_completions_before_walk_end_do_not_finalize() {
        let mut counter = TaskCounter::new();
        counter.increment();
        counter.increment();
        assert!(!counter.settle());
        assert!(!counter.settle());
        assert!(counter.finish_walk());
        assert!(counter.is_finalized());
    }

    proptest! {
        /// Any interleaving of dispatches and completions during the walk,
        /// then the remaining completions, finalizes exactly once.
        #[test]
        fn prop_finalize_exactly_once(
            n in 0usize..50,
            interleaving in proptest::collection::vec(any::<bool>(), 0..100),
        ) {
            let mut counter = TaskCounter::new();
            let mut dispatched = 0usize;
            let mut outstanding = 0usize;
            let mut fired = 0usize;

            // true dispatches the next task, false completes an outstanding one
            for dispatch in interleaving {
                if dispatch && dispatched < n {
                    counter.increment();
                    dispatched += 1;
                    outstanding += 1;
                } else if outstanding > 0 {
                    prop_assert!(!counter.settle());
                    outstanding -= 1;
                }
            }
            while dispatched < n {
                counter.increment();
                dispatched += 1;
                outstanding += 1;
            }

            let walk_fired = counter.finish_walk();
            prop_assert_eq!(walk_fired, outstanding == 0);
            if walk_fired { fired += 1; }

            while outstanding > 0 {
                outstanding -= 1;
                let now = counter.settle();
                prop_assert_eq!(now, outstanding == 0);
                if now { fired += 1; }
            }
            prop_assert_eq!(fired, 1);
            prop_assert!(counter.is_finalized());
            prop_assert_eq!(counter.pending(), 0);
        }
    }
}
