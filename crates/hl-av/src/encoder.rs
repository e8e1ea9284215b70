//! The encoder seam.
//!
//! The pipeline never spawns processes itself; it hands an
//! [`EncodeRequest`] to an [`Encoder`] and listens for [`EncoderEvent`]s.
//! [`FfmpegEncoder`] is the production implementation. Tests substitute a
//! fake that writes placeholder files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hl_core::{QualityProfile, Result};
use tokio_util::sync::CancellationToken;

use crate::actions::encode_hls_variant;
use crate::tools::ToolRegistry;

/// One quality's encode: the source, the profile, and the run directory the
/// manifest and segments are written into.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    /// Absolute path of the source media file.
    pub source: PathBuf,
    /// Profile describing the variant to produce.
    pub profile: QualityProfile,
    /// Run directory that receives this variant's files.
    pub output_dir: PathBuf,
}

impl EncodeRequest {
    pub fn new(source: impl Into<PathBuf>, profile: QualityProfile, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            profile,
            output_dir: output_dir.into(),
        }
    }

    /// Name of the quality being encoded.
    pub fn quality(&self) -> &str {
        &self.profile.name
    }

    /// Where the variant manifest is written.
    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir.join(&self.profile.manifest_filename)
    }

    /// Segment path template handed to the encoder, placeholder included.
    pub fn segment_path_pattern(&self) -> PathBuf {
        self.output_dir.join(&self.profile.segment_filename_pattern)
    }

    /// The source path.
    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Notifications an encoder emits while it works.
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderEvent {
    /// The external process was launched with this command line.
    Started { command_line: String },
    /// Percent complete, `0.0..=100.0`. Not necessarily monotonic.
    Progress { percent: f64 },
}

/// Produces one HLS variant (manifest plus segments) per call.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    /// Encode `request`, reporting through `on_event`.
    ///
    /// # Errors
    ///
    /// Returns [`hl_core::Error::Cancelled`] if `cancel` fires first, or any
    /// other error describing why the variant could not be produced.
    async fn encode(
        &self,
        request: &EncodeRequest,
        on_event: &(dyn Fn(EncoderEvent) + Send + Sync),
        cancel: CancellationToken,
    ) -> Result<()>;
}

/// [`Encoder`] backed by the ffmpeg executable found in a [`ToolRegistry`].
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    tools: ToolRegistry,
}

impl FfmpegEncoder {
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }

    /// The registry this encoder resolves ffmpeg from.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn encode(
        &self,
        request: &EncodeRequest,
        on_event: &(dyn Fn(EncoderEvent) + Send + Sync),
        cancel: CancellationToken,
    ) -> Result<()> {
        encode_hls_variant(&self.tools, request, on_event, cancel).await
    }
}
