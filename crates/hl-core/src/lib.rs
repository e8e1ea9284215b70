//! hl-core: shared types, IDs, errors, configuration, the quality catalog,
//! and the conversion event bus.
//!
//! This crate is the foundational dependency for all other hl-* crates.
//! It owns the declarative side of a conversion: which quality profiles
//! exist, which ones a request selects, and how failures are classified.

pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod ids;

// Re-export the most commonly used items at the crate root.
pub use catalog::{QualityCatalog, QualityProfile, DEFAULT_QUALITY_NAMES};
pub use error::{Error, Result};
pub use ids::RunId;
