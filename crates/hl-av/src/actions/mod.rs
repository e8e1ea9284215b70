//! Media processing actions: per-quality HLS variant encoding.

mod hls_variant;

pub use hls_variant::{
    encode_hls_variant, hls_variant_args, AUDIO_BITRATE, ENCODER_PRESET, ENCODER_THREADS,
    SEGMENT_DURATION_SECS,
};
