//! Race summary and rating seed datasets
//!
//! This module loads the two CSV inputs, derives race identifiers, and
//! caches parsed snapshots for a bounded time.

pub mod cache;
pub mod loader;

pub use cache::DatasetCache;
pub use loader::{parse_number, Dataset, DatasetLoader, SeedIndex};
