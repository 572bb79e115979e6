use crate::{
    priority::{Job, Priority, PriorityTask},
    sizing::{OverflowPolicy, QueueCapacity},
    task::TaskCell,
};
use parking_lot::{Condvar, Mutex};
use std::{collections::BinaryHeap, sync::Arc};

#[derive(Debug, Default)]
struct QueueState {
    heap: BinaryHeap<PriorityTask>,
    next_sequence: u64,
    closed: bool,
}

/// Outcome of [`TaskQueue::push`].
#[derive(Debug)]
pub(crate) enum Admission {
    Queued,
    /// Accepted after evicting the longest-queued task.
    Evicted(PriorityTask),
    /// Bounded queue full under [`OverflowPolicy::Reject`].
    Rejected,
    Closed,
}

/// Blocking priority queue feeding one pool's workers.
#[derive(Debug)]
pub(crate) struct TaskQueue {
    capacity: QueueCapacity,
    overflow: OverflowPolicy,
    state: Mutex<QueueState>,
    not_empty: Condvar,
}

impl TaskQueue {
    pub(crate) fn new(capacity: QueueCapacity, overflow: OverflowPolicy) -> Self {
        Self {
            capacity,
            overflow,
            state: Mutex::new(QueueState::default()),
            not_empty: Condvar::new(),
        }
    }

    /// Wrap `job` with the next sequence number and enqueue it.
    ///
    /// Sequence numbers are taken under the queue lock, so they follow the
    /// order in which tasks actually entered the queue.
    pub(crate) fn push(&self, priority: Priority, cell: Arc<TaskCell>, job: Job) -> Admission {
        let mut state = self.state.lock();
        if state.closed {
            return Admission::Closed;
        }

        let evicted = match self.capacity.limit() {
            Some(limit) if state.heap.len() >= limit => match self.overflow {
                OverflowPolicy::Reject => return Admission::Rejected,
                OverflowPolicy::DiscardOldest => take_oldest(&mut state.heap),
            },
            _ => None,
        };

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.heap.push(PriorityTask::new(priority, sequence, cell, job));
        drop(state);

        self.not_empty.notify_one();

        match evicted {
            Some(task) => Admission::Evicted(task),
            None => Admission::Queued,
        }
    }

    /// Block until a task is available. `None` once the queue is closed.
    pub(crate) fn pop(&self) -> Option<PriorityTask> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(task) = state.heap.pop() {
                return Some(task);
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Close the queue and hand back everything still in it.
    pub(crate) fn close(&self) -> Vec<PriorityTask> {
        let mut state = self.state.lock();
        state.closed = true;
        let drained = std::mem::take(&mut state.heap).into_sorted_vec();
        drop(state);

        self.not_empty.notify_all();
        drained
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    pub(crate) fn capacity(&self) -> QueueCapacity {
        self.capacity
    }
}

/// Remove the task with the smallest sequence, regardless of priority.
fn take_oldest(heap: &mut BinaryHeap<PriorityTask>) -> Option<PriorityTask> {
    let mut tasks = std::mem::take(heap).into_vec();
    let oldest = tasks
        .iter()
        .enumerate()
        .min_by_key(|(_, task)| task.sequence())
        .map(|(index, _)| index)?;
    let task = tasks.swap_remove(oldest);
    *heap = BinaryHeap::from(tasks);
    Some(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{thread, time::Duration};

    fn push(queue: &TaskQueue, name: &str, priority: i32) -> Admission {
        queue.push(
            Priority(priority),
            Arc::new(TaskCell::new(name, None)),
            Box::new(|| {}),
        )
    }

    fn drain_names(queue: &TaskQueue) -> Vec<String> {
        let mut names = Vec::new();
        while queue.len() > 0 {
            if let Some(task) = queue.pop() {
                names.push(task.name().to_string());
            }
        }
        names
    }

    #[test]
    fn test_pops_by_priority_then_submission() {
        let queue = TaskQueue::new(QueueCapacity::Unbounded, OverflowPolicy::Reject);
        push(&queue, "a-norm", 5);
        push(&queue, "b-min", 10);
        push(&queue, "c-max", 1);
        push(&queue, "d-norm", 5);

        assert_eq!(drain_names(&queue), vec!["c-max", "a-norm", "d-norm", "b-min"]);
    }

    #[test]
    fn test_discard_oldest_drops_first_submitted() {
        let queue = TaskQueue::new(QueueCapacity::Bounded(10), OverflowPolicy::DiscardOldest);
        // the oldest task has the best priority, it is still the one evicted
        assert!(matches!(push(&queue, "t0", 1), Admission::Queued));
        for i in 1..10 {
            assert!(matches!(
                push(&queue, &format!("t{i}"), 5),
                Admission::Queued
            ));
        }

        match push(&queue, "t10", 5) {
            Admission::Evicted(task) => {
                assert_eq!(task.name(), "t0");
                assert_eq!(task.sequence(), 0);
            }
            other => panic!("expected eviction, got {other:?}"),
        }

        assert_eq!(queue.len(), 10);
        let names = drain_names(&queue);
        assert_eq!(names.first().map(String::as_str), Some("t1"));
        assert_eq!(names.last().map(String::as_str), Some("t10"));
    }

    #[test]
    fn test_reject_policy_keeps_queue() {
        let queue = TaskQueue::new(QueueCapacity::Bounded(1), OverflowPolicy::Reject);
        assert!(matches!(push(&queue, "first", 5), Admission::Queued));
        assert!(matches!(push(&queue, "second", 1), Admission::Rejected));
        assert_eq!(drain_names(&queue), vec!["first"]);
    }

    #[test]
    fn test_close_drains_and_wakes_consumers() {
        let queue = Arc::new(TaskQueue::new(
            QueueCapacity::Unbounded,
            OverflowPolicy::Reject,
        ));

        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.pop().map(|t| t.name().to_string()))
        };
        thread::sleep(Duration::from_millis(50));

        let drained = queue.close();
        assert!(drained.is_empty());
        assert_eq!(consumer.join().unwrap(), None);

        assert!(matches!(push(&queue, "late", 5), Admission::Closed));
    }

    #[test]
    fn test_close_returns_pending_tasks() {
        let queue = TaskQueue::new(QueueCapacity::Unbounded, OverflowPolicy::Reject);
        push(&queue, "a", 5);
        push(&queue, "b", 5);

        assert_eq!(queue.close().len(), 2);
        assert_eq!(queue.len(), 0);
        assert!(queue.pop().is_none());
    }
}
