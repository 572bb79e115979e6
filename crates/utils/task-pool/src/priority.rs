use crate::task::TaskCell;
use std::{cmp::Ordering, fmt, sync::Arc};

/// Scheduling priority; lower values run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub i32);

impl Priority {
    pub const MAX: Priority = Priority(1);
    pub const NORM: Priority = Priority(5);
    pub const MIN: Priority = Priority(10);

    pub const fn value(self) -> i32 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORM
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// A queued unit of work.
///
/// Ordered so that the task to run next is the greatest: lower priority value
/// first, then lower sequence (earlier submission) first. This makes it usable
/// directly in a max-heap.
pub struct PriorityTask {
    priority: Priority,
    sequence: u64,
    cell: Arc<TaskCell>,
    job: Job,
}

impl PriorityTask {
    pub(crate) fn new(priority: Priority, sequence: u64, cell: Arc<TaskCell>, job: Job) -> Self {
        Self {
            priority,
            sequence,
            cell,
            job,
        }
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn name(&self) -> &str {
        self.cell.name()
    }

    /// Ascending scheduling key; the smallest key runs first.
    pub fn schedule_key(&self) -> (Priority, u64) {
        (self.priority, self.sequence)
    }

    pub(crate) fn cell(&self) -> &Arc<TaskCell> {
        &self.cell
    }

    pub(crate) fn run(self) {
        (self.job)();
    }

    /// Drop without running and tell the handle why.
    pub(crate) fn discard(self) {
        self.cell.mark_discarded();
    }
}

impl fmt::Debug for PriorityTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityTask")
            .field("name", &self.name())
            .field("priority", &self.priority)
            .field("sequence", &self.sequence)
            .finish()
    }
}

impl PartialEq for PriorityTask {
    fn eq(&self, other: &Self) -> bool {
        self.schedule_key() == other.schedule_key()
    }
}

impl Eq for PriorityTask {}

impl PartialOrd for PriorityTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityTask {
    fn cmp(&self, other: &Self) -> Ordering {
        other.schedule_key().cmp(&self.schedule_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    fn task(priority: i32, sequence: u64) -> PriorityTask {
        PriorityTask::new(
            Priority(priority),
            sequence,
            Arc::new(TaskCell::new(format!("p{priority}-s{sequence}"), None)),
            Box::new(|| {}),
        )
    }

    #[test]
    fn test_default_priority_is_norm() {
        assert_eq!(Priority::default(), Priority(5));
        assert!(Priority::MAX < Priority::NORM);
        assert!(Priority::NORM < Priority::MIN);
    }

    #[test]
    fn test_lower_priority_value_runs_first() {
        assert!(task(1, 9) > task(5, 0));
        assert!(task(10, 0) < task(5, 1));
    }

    #[test]
    fn test_ties_break_by_sequence() {
        assert!(task(5, 1) > task(5, 2));
        assert_eq!(task(5, 3), task(5, 3));
    }

    #[test]
    fn test_heap_pops_in_schedule_order() {
        let mut heap = BinaryHeap::new();
        for (seq, priority) in [5, 10, 1, 5, -3, 1].into_iter().enumerate() {
            heap.push(task(priority, seq as u64));
        }

        let order: Vec<_> = std::iter::from_fn(|| heap.pop())
            .map(|t| t.schedule_key())
            .map(|(p, s)| (p.value(), s))
            .collect();

        assert_eq!(
            order,
            vec![(-3, 4), (1, 2), (1, 5), (5, 0), (5, 3), (10, 1)]
        );
    }
}
