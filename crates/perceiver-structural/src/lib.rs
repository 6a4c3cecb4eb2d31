//! Structural perception: turns a live page into a ref-addressed element catalog, caches it per
//! URL and diffs successive catalogs.

pub mod cache;
pub mod capabilities;
pub mod catalog;
pub mod config;
pub mod differ;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod mutation;
pub mod refs;
pub mod session;

pub use cache::{CachedSnapshot, SnapshotCache};
pub use capabilities::{Capabilities, ChallengeBypasser, DateInputHandler};
pub use catalog::{BuiltCatalog, CatalogBuilder};
pub use config::{CacheConfig, CatalogConfig, FallbackSelector, SessionConfig};
pub use differ::diff;
pub use errors::PerceiverError;
pub use model::{
    Catalog, CatalogSource, ChangedElement, ElementDescriptor, RefResolutionEntry, RefTable,
    SnapshotDiff,
};
pub use mutation::{MutationState, MutationWatcher};
pub use refs::RefAllocator;
pub use session::{BrowserSession, SnapshotView};
