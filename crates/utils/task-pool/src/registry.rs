//! Keyed collection of pausable pools, one per (business class, tag).
//!
//! Lookups read a published snapshot of the key→pool map and never take a
//! lock. Every mutation (create, remove, shutdown) takes the single registry
//! lock, copies the map, and publishes the new one, so mutations are
//! linearizable with each other and readers never observe a map mid-update.

use crate::{
    class::{BusinessClass, PoolKey},
    error::{PoolError, PoolResult, TaskResult},
    factory::PoolFactory,
    pool::{PausablePool, PoolStatus},
    priority::Priority,
    sizing::SizingPolicy,
    task::{Task, TaskHandle},
};
use arc_swap::ArcSwap;
use config_loader::ConcurrencyConfig;
use logger::{debug, info};
use parking_lot::Mutex;
use std::{collections::HashMap, fmt, sync::Arc};
use tokio_util::sync::CancellationToken;

type PoolMap = HashMap<PoolKey, Arc<PausablePool>>;

#[derive(Debug, Default)]
struct WriteState {
    closed: bool,
}

pub struct PoolRegistry {
    factory: PoolFactory,
    default_tag: String,
    pools: ArcSwap<PoolMap>,
    write: Mutex<WriteState>,
}

impl PoolRegistry {
    pub fn new(policy: SizingPolicy) -> Self {
        Self {
            factory: PoolFactory::new(policy),
            default_tag: ConcurrencyConfig::DEFAULT_TAG.to_string(),
            pools: ArcSwap::from_pointee(PoolMap::new()),
            write: Mutex::new(WriteState::default()),
        }
    }

    /// Registry sized from configuration. Creates the default pool up front
    /// when `prewarm_default` is set.
    pub fn from_config(config: &ConcurrencyConfig) -> PoolResult<Self> {
        let registry =
            Self::new(SizingPolicy::from_config(config)).with_default_tag(&config.default_tag);

        if config.prewarm_default {
            registry.resolve(&PoolKey::new(BusinessClass::default(), ""))?;
        }

        Ok(registry)
    }

    /// Tag substituted for empty tags. An empty value keeps the current one.
    pub fn with_default_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !tag.is_empty() {
            self.default_tag = tag;
        }
        self
    }

    pub fn default_tag(&self) -> &str {
        &self.default_tag
    }

    pub fn policy(&self) -> &SizingPolicy {
        self.factory.policy()
    }

    /// The key operations run against: an empty tag becomes the default tag.
    pub fn normalize(&self, key: &PoolKey) -> PoolKey {
        key.normalized(&self.default_tag)
    }

    fn lookup(&self, key: &PoolKey) -> Option<Arc<PausablePool>> {
        self.pools.load().get(key).cloned()
    }

    /// Existing pool for `key`, or a new one built and registered now.
    ///
    /// Concurrent callers with the same key all get the same pool. Fails with
    /// [`PoolError::RegistryClosed`] after [`shutdown_all`](Self::shutdown_all)
    /// until [`reopen`](Self::reopen).
    pub fn resolve(&self, key: &PoolKey) -> PoolResult<Arc<PausablePool>> {
        let key = self.normalize(key);
        if let Some(pool) = self.lookup(&key) {
            return Ok(pool);
        }

        let state = self.write.lock();
        if state.closed {
            return Err(PoolError::RegistryClosed);
        }
        // another caller may have created it while we waited for the lock
        if let Some(pool) = self.lookup(&key) {
            return Ok(pool);
        }

        let pool = Arc::new(self.factory.build(key.class, key.tag.clone())?);
        let mut next = PoolMap::clone(&self.pools.load());
        next.insert(key, pool.clone());
        self.pools.store(Arc::new(next));
        drop(state);

        Ok(pool)
    }

    /// Queue a prepared task on the pool for `key`.
    pub fn execute<T: Send + 'static>(
        &self,
        key: &PoolKey,
        task: &Task<T>,
    ) -> PoolResult<TaskHandle<T>> {
        // fail before `resolve` so a spent task never creates a pool
        if task.is_consumed() {
            return Err(PoolError::invalid_state(task.name()));
        }
        self.resolve(key)?.execute(task)
    }

    /// Queue `work` at `priority` on the pool for `key`.
    pub fn submit<T, F>(
        &self,
        key: &PoolKey,
        priority: impl Into<Priority>,
        work: F,
    ) -> PoolResult<TaskHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(&CancellationToken) -> TaskResult<T> + Send + 'static,
    {
        self.resolve(key)?.submit(priority, work)
    }

    /// Queue `work` on the default pool at normal priority.
    pub fn spawn<T, F>(&self, work: F) -> PoolResult<TaskHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(&CancellationToken) -> TaskResult<T> + Send + 'static,
    {
        self.submit(
            &PoolKey::new(BusinessClass::default(), ""),
            Priority::default(),
            work,
        )
    }

    /// `false` when no pool is registered for `key`.
    pub fn pause(&self, key: &PoolKey) -> bool {
        match self.lookup(&self.normalize(key)) {
            Some(pool) => {
                pool.pause();
                true
            }
            None => {
                debug!(pool = %key, "pause: no such pool");
                false
            }
        }
    }

    /// `false` when no pool is registered for `key`.
    pub fn resume(&self, key: &PoolKey) -> bool {
        match self.lookup(&self.normalize(key)) {
            Some(pool) => {
                pool.resume();
                true
            }
            None => {
                debug!(pool = %key, "resume: no such pool");
                false
            }
        }
    }

    /// Pause every registered pool. Returns how many were paused.
    pub fn pause_all(&self) -> usize {
        let pools = self.pools.load();
        pools.values().for_each(|pool| pool.pause());
        pools.len()
    }

    /// Resume every registered pool. Returns how many were resumed.
    pub fn resume_all(&self) -> usize {
        let pools = self.pools.load();
        pools.values().for_each(|pool| pool.resume());
        pools.len()
    }

    /// Unregister and force-shutdown the pool for `key`. `false` if absent.
    ///
    /// A concurrent [`resolve`](Self::resolve) for the same key either sees
    /// the old pool, in which case its submissions fail with
    /// [`PoolError::Shutdown`] or come back discarded, or misses and creates
    /// a fresh pool. Both outcomes are acceptable; callers racing removal
    /// against submission must handle them.
    pub fn remove(&self, key: &PoolKey) -> bool {
        let key = self.normalize(key);

        let removed = {
            let _state = self.write.lock();
            let current = self.pools.load();
            if !current.contains_key(&key) {
                return false;
            }
            let mut next = PoolMap::clone(&current);
            drop(current);
            let removed = next.remove(&key);
            self.pools.store(Arc::new(next));
            removed
        };

        if let Some(pool) = removed {
            pool.shutdown_now();
            info!(pool = %key, "pool removed");
        }
        true
    }

    /// Force-shutdown every pool and close the registry. Idempotent.
    pub fn shutdown_all(&self) {
        let drained = {
            let mut state = self.write.lock();
            state.closed = true;
            self.pools.swap(Arc::new(PoolMap::new()))
        };

        if drained.is_empty() {
            return;
        }

        for pool in drained.values() {
            pool.shutdown_now();
        }
        info!(pools = drained.len(), "all pools shut down");
    }

    /// Make a closed registry usable again. Pools are recreated lazily.
    pub fn reopen(&self) {
        let mut state = self.write.lock();
        if state.closed {
            state.closed = false;
            info!("registry reopened");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.write.lock().closed
    }

    pub fn contains(&self, key: &PoolKey) -> bool {
        self.pools.load().contains_key(&self.normalize(key))
    }

    pub fn len(&self) -> usize {
        self.pools.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Status of every registered pool, ordered by key.
    pub fn statuses(&self) -> Vec<PoolStatus> {
        let mut statuses: Vec<_> = self
            .pools
            .load()
            .values()
            .map(|pool| pool.status())
            .collect();
        statuses.sort_by_key(|status| status.key.to_string());
        statuses
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new(SizingPolicy::detect())
    }
}

impl Drop for PoolRegistry {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}

impl fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("policy", self.policy())
            .field("default_tag", &self.default_tag)
            .field("pools", &self.len())
            .finish()
    }
}
