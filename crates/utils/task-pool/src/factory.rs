use crate::{
    class::{BusinessClass, PoolKey},
    error::PoolResult,
    pool::PausablePool,
    sizing::{SizingDecision, SizingPolicy},
};
use logger::info;

/// Builds pools from a [`SizingPolicy`]. Does not register them anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolFactory {
    policy: SizingPolicy,
}

impl PoolFactory {
    pub fn new(policy: SizingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SizingPolicy {
        &self.policy
    }

    pub fn build(&self, class: BusinessClass, tag: impl Into<String>) -> PoolResult<PausablePool> {
        let key = PoolKey::new(class, tag);
        let decision = self.policy.decide(class);
        self.build_with(key, decision)
    }

    /// Build with an explicit decision instead of the policy's.
    pub fn build_with(&self, key: PoolKey, decision: SizingDecision) -> PoolResult<PausablePool> {
        info!(
            pool = %key,
            processors = self.policy.processors(),
            threads = decision.core_threads,
            queue = ?decision.queue,
            overflow = ?decision.overflow,
            "creating pool"
        );
        PausablePool::start(key, decision)
    }
}

impl Default for PoolFactory {
    fn default() -> Self {
        Self::new(SizingPolicy::detect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sizing::{OverflowPolicy, QueueCapacity};
    use std::time::Duration;

    #[test]
    fn test_build_applies_policy() {
        let factory = PoolFactory::new(SizingPolicy::new(4));
        let pool = factory.build(BusinessClass::LowIo, "feed").unwrap();

        assert_eq!(pool.key(), &PoolKey::new(BusinessClass::LowIo, "feed"));
        assert_eq!(pool.decision().core_threads, 3);
        assert_eq!(pool.decision().queue, QueueCapacity::Bounded(10));
        assert_eq!(pool.decision().overflow, OverflowPolicy::DiscardOldest);
        assert_eq!(pool.status().live_workers, 3);

        pool.shutdown_now();
        assert!(pool.await_termination(Duration::from_secs(5)));
    }

    #[test]
    fn test_each_build_is_a_fresh_pool() {
        let factory = PoolFactory::new(SizingPolicy::new(1));
        let first = factory.build(BusinessClass::Cpu, "same").unwrap();
        let second = factory.build(BusinessClass::Cpu, "same").unwrap();

        first.pause();
        assert!(first.is_paused());
        assert!(!second.is_paused());
    }
}
