//! Business-class worker pools that can be paused and resumed in bulk.
//!
//! Work is classified by [`BusinessClass`] (CPU, local I/O, remote I/O) and
//! grouped under a tag; each (class, tag) pair gets its own fixed-size pool,
//! sized by [`SizingPolicy`] and owned by a [`PoolRegistry`]. Queued work runs
//! in [`Priority`] order, first-come-first-served among equal priorities.
//!
//! ```no_run
//! use task_pool::{BusinessClass, PoolKey, PoolRegistry, Priority, SizingPolicy};
//!
//! let registry = PoolRegistry::new(SizingPolicy::detect());
//! let thumbs = PoolKey::new(BusinessClass::HighIo, "thumbnails");
//!
//! let handle = registry
//!     .submit(&thumbs, Priority::MAX, |_token| Ok(2 + 2))
//!     .unwrap();
//!
//! // list is scrolling: hold back new work, keep what is already running
//! registry.pause(&thumbs);
//! registry.resume(&thumbs);
//!
//! assert_eq!(handle.wait().unwrap(), 4);
//! registry.shutdown_all();
//! ```

pub use tokio_util::sync::CancellationToken;
pub mod class;
pub mod error;
pub mod factory;
pub mod gate;
pub mod pool;
pub mod priority;
mod queue;
pub mod registry;
pub mod sizing;
pub mod task;

pub use class::{BusinessClass, DEFAULT_TAG, PoolKey};
pub use error::{PoolError, PoolResult, TaskError, TaskErrorKind, TaskResult};
pub use factory::PoolFactory;
pub use gate::PauseGate;
pub use pool::{PausablePool, PoolStatus};
pub use priority::{Priority, PriorityTask};
pub use registry::PoolRegistry;
pub use sizing::{OverflowPolicy, QueueCapacity, SizingDecision, SizingPolicy};
pub use task::{CancelStatus, CompletionSink, Task, TaskHandle, TaskStatus};
