pub mod scheduler;
pub mod snapshot;
pub mod store;

pub use scheduler::PurgeScheduler;
pub use snapshot::{MergeStats, PlanSnapshot};
pub use store::{CacheStats, Lookup, SnapshotStore, StoreSettings, parse_reference_date};
