use serde::{Deserialize, Serialize};

/// Sizing and registry settings for the business-class worker pools.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
#[non_exhaustive]
pub struct ConcurrencyConfig {
    /// Upper bound on threads for HIGH_IO and LOW_IO pools.
    pub max_core_size: usize,

    /// Overrides the detected processor count when set.
    pub available_processors: Option<usize>,

    /// Tag used when a caller passes an empty tag.
    pub default_tag: String,

    /// Capacity of the LOW_IO bounded queue.
    pub bounded_queue_capacity: usize,

    /// Idle keep-alive recorded on each pool, in milliseconds.
    pub keep_alive_ms: u64,

    /// Create the default (HIGH_IO, default tag) pool when the registry is built.
    pub prewarm_default: bool,
}

impl ConcurrencyConfig {
    pub const DEFAULT_TAG: &'static str = "default";
    pub const MAX_CORE_SIZE: usize = 3;
    pub const BOUNDED_QUEUE_CAPACITY: usize = 10;

    pub fn with_processors(mut self, processors: usize) -> Self {
        self.available_processors = Some(processors);
        self
    }

    pub fn with_max_core_size(mut self, max_core_size: usize) -> Self {
        self.max_core_size = max_core_size;
        self
    }

    pub fn with_default_tag(mut self, tag: impl Into<String>) -> Self {
        self.default_tag = tag.into();
        self
    }

    pub fn with_bounded_queue_capacity(mut self, capacity: usize) -> Self {
        self.bounded_queue_capacity = capacity;
        self
    }

    pub fn with_prewarm_default(mut self, prewarm: bool) -> Self {
        self.prewarm_default = prewarm;
        self
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_core_size: Self::MAX_CORE_SIZE,
            available_processors: None,
            default_tag: Self::DEFAULT_TAG.to_string(),
            bounded_queue_capacity: Self::BOUNDED_QUEUE_CAPACITY,
            keep_alive_ms: 0,
            prewarm_default: false,
        }
    }
}
