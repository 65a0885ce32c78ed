//! `trackwatch-store` — the single owner of activity records.
//!
//! Provides:
//! - [`ActivityStore`]: monotonic merge operations over (community, channel, user) records
//! - [`ActivityPersistence`]: the load/save boundary, with JSON-file and in-memory backends

pub mod persistence;
pub mod store;

pub use persistence::{ActivityPersistence, InMemoryPersistence, JsonFilePersistence, StoreData};
pub use store::{ActivityStore, MergeOutcome};
