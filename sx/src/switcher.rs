//! Switcherator - flag-gated iterator adapter
//!
//! Wraps any iterator so that the shared [`CooperativeFlag`] is consulted
//! before every element: Off exhausts the iteration early, Suspended blocks
//! the consumer until resumed. No lookahead is buffered, so a pause always
//! takes effect before the next element is pulled from the source.

use std::sync::Arc;

use crate::flag::{CooperativeFlag, RunState};

/// Iterator adapter that observes a [`CooperativeFlag`] between elements.
///
/// The source is pulled one element at a time; cancellation and suspension
/// are checked before each pull, never after, so an element produced while a
/// pause was pending cannot exist.
pub struct Switcherator<I> {
    flag: Arc<CooperativeFlag>,
    inner: I,
    suspendable: bool,
}

impl<I: Iterator> Switcherator<I> {
    /// Wrap `inner` with the given flag. Suspension is honored by default.
    pub fn new(flag: Arc<CooperativeFlag>, inner: I) -> Self {
        Self {
            flag,
            inner,
            suspendable: true,
        }
    }

    /// Control whether the iterator blocks while the flag is Suspended.
    ///
    /// A non-suspendable Switcherator still terminates on Off; it only skips
    /// the blocking wait (used for iterations that must keep pace with an
    /// external clock even while the run is paused).
    pub fn suspendable(mut self, suspendable: bool) -> Self {
        self.suspendable = suspendable;
        self
    }
}

impl<I: Iterator> Iterator for Switcherator<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        if self.flag.is_off() {
            return None;
        }
        if self.suspendable && self.flag.is_suspended() {
            // Off can arrive while we are parked; treat it as exhaustion.
            if self.flag.wait() == RunState::Off {
                return None;
            }
        }
        if self.flag.is_off() {
            return None;
        }
        self.inner.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_passes_all_elements_while_running() {
        let flag = Arc::new(CooperativeFlag::new());
        let items: Vec<_> = Switcherator::new(flag, 1..=5).collect();
        assert_eq!(items, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_off_exhausts_immediately() {
        let flag = Arc::new(CooperativeFlag::new());
        let mut iter = Switcherator::new(flag.clone(), 1..=10);

        assert_eq!(iter.next(), Some(1));
        assert_eq!(iter.next(), Some(2));
        assert_eq!(iter.next(), Some(3));
        flag.off();
        assert_eq!(iter.next(), None);
        // Stays exhausted even though the source has elements left
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn test_suspend_blocks_then_resumes_without_loss() {
        let flag = Arc::new(CooperativeFlag::new());
        let mut iter = Switcherator::new(flag.clone(), 1..=4);

        assert_eq!(iter.next(), Some(1));
        assert_eq!(iter.next(), Some(2));

        flag.toggle_suspension();
        let consumer = thread::spawn(move || {
            let mut rest = Vec::new();
            while let Some(x) = iter.next() {
                rest.push(x);
            }
            rest
        });

        // Consumer must be parked on the flag, not producing elements
        thread::sleep(Duration::from_millis(50));
        assert!(!consumer.is_finished());

        flag.toggle_suspension();
        assert_eq!(consumer.join().unwrap(), vec![3, 4]);
    }

    #[test]
    fn test_off_while_suspended_exhausts() {
        let flag = Arc::new(CooperativeFlag::new());
        let mut iter = Switcherator::new(flag.clone(), 1..=10);

        assert_eq!(iter.next(), Some(1));
        flag.toggle_suspension();

        let consumer = thread::spawn(move || iter.next());
        thread::sleep(Duration::from_millis(50));
        flag.off();

        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn test_non_suspendable_ignores_suspension() {
        let flag = Arc::new(CooperativeFlag::new());
        let mut iter = Switcherator::new(flag.clone(), 1..=3).suspendable(false);

        assert_eq!(iter.next(), Some(1));
        flag.toggle_suspension();
        assert_eq!(iter.next(), Some(2));
        flag.off();
        assert_eq!(iter.next(), None);
    }
}
