//! # hl-av
//!
//! External encoder integration for the hlsladder pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache the ffmpeg
//!   executable, honouring configured overrides.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout,
//!   cancellation, and line-by-line stderr streaming.
//! - **Encoder seam** ([`Encoder`]) -- one HLS variant encode per call,
//!   reporting start and progress events; [`FfmpegEncoder`] is the
//!   production implementation.
//! - **Progress parsing** ([`FfmpegProgress`]) -- turns ffmpeg
//!   `-progress` output into percent complete.

pub mod actions;
pub mod command;
pub mod encoder;
pub mod progress;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use encoder::{EncodeRequest, Encoder, EncoderEvent, FfmpegEncoder};
pub use progress::FfmpegProgress;
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};

pub use actions::{encode_hls_variant, hls_variant_args};
