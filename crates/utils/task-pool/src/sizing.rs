//! Turns a [`BusinessClass`] into thread and queue parameters.
//!
//! | class        | threads                          | queue                 | overflow       |
//! |--------------|----------------------------------|-----------------------|----------------|
//! | CPU          | `P + 1`                          | unbounded             | n/a            |
//! | HIGH_IO      | `min(ceil(P * 1.1), max_core)`   | unbounded             | n/a            |
//! | LOW_IO       | `min(ceil(P * 1.5), max_core)`   | bounded (10)          | discard oldest |
//! | UNCLASSIFIED | `5`                              | unbounded             | n/a            |

use crate::class::BusinessClass;
use config_loader::ConcurrencyConfig;
use std::{num::NonZeroUsize, time::Duration};

/// Thread count of the fixed-size fallback pool.
pub const UNCLASSIFIED_THREADS: usize = 5;

/// Capacity of a pool's task queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueCapacity {
    Unbounded,
    Bounded(usize),
}

impl QueueCapacity {
    pub fn limit(self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Bounded(n) => Some(n),
        }
    }
}

/// What a full bounded queue does with a new task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Refuse the incoming task.
    #[default]
    Reject,
    /// Drop the longest-queued task and accept the incoming one.
    DiscardOldest,
}

/// Sizing of one pool. Computed once, when the pool is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizingDecision {
    pub core_threads: usize,
    pub max_threads: usize,
    pub keep_alive: Duration,
    pub queue: QueueCapacity,
    pub overflow: OverflowPolicy,
}

impl SizingDecision {
    fn fixed(threads: usize, keep_alive: Duration, queue: QueueCapacity) -> Self {
        let threads = threads.max(1);
        let overflow = match queue {
            QueueCapacity::Unbounded => OverflowPolicy::Reject,
            QueueCapacity::Bounded(_) => OverflowPolicy::DiscardOldest,
        };
        Self {
            core_threads: threads,
            max_threads: threads,
            keep_alive,
            queue,
            overflow,
        }
    }
}

/// Deterministic sizing rules, parameterised by processor count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizingPolicy {
    processors: usize,
    max_core_size: usize,
    bounded_capacity: usize,
    keep_alive: Duration,
}

impl SizingPolicy {
    pub fn new(processors: usize) -> Self {
        Self {
            processors: processors.max(1),
            max_core_size: ConcurrencyConfig::MAX_CORE_SIZE,
            bounded_capacity: ConcurrencyConfig::BOUNDED_QUEUE_CAPACITY,
            keep_alive: Duration::ZERO,
        }
    }

    /// Policy for the processors of this machine.
    pub fn detect() -> Self {
        Self::new(detect_processors())
    }

    pub fn from_config(config: &ConcurrencyConfig) -> Self {
        let processors = config.available_processors.unwrap_or_else(detect_processors);
        Self::new(processors)
            .with_max_core_size(config.max_core_size)
            .with_bounded_capacity(config.bounded_queue_capacity)
            .with_keep_alive(Duration::from_millis(config.keep_alive_ms))
    }

    pub fn with_max_core_size(mut self, max_core_size: usize) -> Self {
        self.max_core_size = max_core_size.max(1);
        self
    }

    pub fn with_bounded_capacity(mut self, capacity: usize) -> Self {
        self.bounded_capacity = capacity.max(1);
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn processors(&self) -> usize {
        self.processors
    }

    pub fn max_core_size(&self) -> usize {
        self.max_core_size
    }

    pub fn decide(&self, class: BusinessClass) -> SizingDecision {
        let p = self.processors;
        match class {
            BusinessClass::Cpu => SizingDecision::fixed(
                p.saturating_add(1),
                self.keep_alive,
                QueueCapacity::Unbounded,
            ),
            BusinessClass::HighIo => SizingDecision::fixed(
                scaled(p, 11, 10).min(self.max_core_size),
                self.keep_alive,
                QueueCapacity::Unbounded,
            ),
            BusinessClass::LowIo => SizingDecision::fixed(
                scaled(p, 3, 2).min(self.max_core_size),
                self.keep_alive,
                QueueCapacity::Bounded(self.bounded_capacity),
            ),
            BusinessClass::Unclassified => SizingDecision::fixed(
                UNCLASSIFIED_THREADS,
                self.keep_alive,
                QueueCapacity::Unbounded,
            ),
        }
    }
}

impl Default for SizingPolicy {
    fn default() -> Self {
        Self::detect()
    }
}

/// `ceil(p * num / den)` in integers, saturating for huge `p`.
fn scaled(p: usize, num: usize, den: usize) -> usize {
    match p.checked_mul(num) {
        Some(product) => product.div_ceil(den),
        None => (p / den).saturating_mul(num),
    }
}

/// Processors visible to this process: pinnable core ids first, then the
/// std parallelism hint, then 1.
pub fn detect_processors() -> usize {
    core_affinity::get_core_ids()
        .map(|ids| ids.len())
        .filter(|n| *n > 0)
        .or_else(|| {
            std::thread::available_parallelism()
                .ok()
                .map(NonZeroUsize::get)
        })
        .unwrap_or(1)
}
