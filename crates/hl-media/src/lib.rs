//! hl-media: HLS master playlist rendering and writing.
//!
//! # Modules
//!
//! - [`hls`] - Master playlist types, rendering, and the run-directory writer

pub mod hls;

// Re-export commonly used items at the crate root.
pub use hls::{generate_master_playlist, write_master_manifest, MasterPlaylist, Variant};
