//! Background prefetch scanning: priority queues, the worker-pool
//! coordinator, and the cache-aware layer on top of it.

mod cached;
pub mod config;
mod coordinator;
mod events;
mod queue;

pub use cached::{CacheAwareCoordinator, CachedLoader};
pub use config::CoordinatorConfig;
pub use coordinator::ScanCoordinator;
pub use events::{Milestone, NullEvents, ScanEvents, ScanStatus};
pub use queue::{Priority, TargetQueue};
