//! HLS playlist types.

use hl_core::catalog::ResolvedQualitySet;
use hl_core::{QualityProfile, Result};
use serde::{Deserialize, Serialize};

/// A stream variant in a master playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Target bandwidth in bits per second.
    pub bandwidth: u64,
    /// Resolution as (width, height).
    pub resolution: (u32, u32),
    /// URI of the variant's media playlist, relative to the master.
    pub uri: String,
}

impl Variant {
    /// Build the variant entry for one quality profile.
    ///
    /// # Errors
    ///
    /// Returns [`hl_core::Error::InvalidProfile`] if the bitrate or
    /// resolution cannot be parsed.
    pub fn from_profile(profile: &QualityProfile) -> Result<Self> {
        Ok(Self {
            bandwidth: profile.bandwidth_bps()?,
            resolution: profile.dimensions()?,
            uri: profile.manifest_filename.clone(),
        })
    }
}

/// An HLS master playlist listing one variant per encoded quality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterPlaylist {
    /// Stream variants, in catalog order.
    pub variants: Vec<Variant>,
}

impl MasterPlaylist {
    /// Build a playlist from a resolved quality set, preserving its order.
    pub fn from_qualities(qualities: &ResolvedQualitySet) -> Result<Self> {
        let variants = qualities
            .iter()
            .map(Variant::from_profile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { variants })
    }
}
