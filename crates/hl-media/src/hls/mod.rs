//! HLS master playlist generation.

mod generator;
mod types;

pub use generator::{generate_master_playlist, write_master_manifest};
pub use types::{MasterPlaylist, Variant};
