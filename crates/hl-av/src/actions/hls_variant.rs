//! Single-quality HLS variant encoding using ffmpeg.
//!
//! Every variant is encoded with the same fixed policy: AAC audio at 96k,
//! 10-second segments, an unbounded VOD playlist with independent segments,
//! one encoder thread and the `veryfast` x264 preset. Only the video
//! bitrate, resolution, rate ceiling and buffer vary per quality.

use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::encoder::{EncodeRequest, EncoderEvent};
use crate::progress::FfmpegProgress;
use crate::tools::ToolRegistry;

/// Audio bitrate shared by every variant.
pub const AUDIO_BITRATE: &str = "96k";

/// Target HLS segment length in seconds.
pub const SEGMENT_DURATION_SECS: u32 = 10;

/// Encoder thread count per variant.
pub const ENCODER_THREADS: u32 = 1;

/// x264 speed preset.
pub const ENCODER_PRESET: &str = "veryfast";

/// Build the ffmpeg argument list for one variant.
///
/// Progress is requested on stderr (`-progress pipe:2`) so that it arrives
/// interleaved with the banner carrying the input duration.
pub fn hls_variant_args(request: &EncodeRequest) -> Vec<String> {
    let profile = &request.profile;
    let mut args: Vec<String> = Vec::with_capacity(48);

    let mut push = |items: &[&str]| args.extend(items.iter().map(|s| s.to_string()));

    push(&["-y", "-hide_banner", "-progress", "pipe:2", "-nostats"]);
    push(&["-i", &request.source.to_string_lossy()]);

    push(&["-c:v", "libx264", "-preset", ENCODER_PRESET]);
    push(&["-threads", &ENCODER_THREADS.to_string()]);
    push(&["-b:v", &profile.bitrate]);
    push(&["-maxrate", &profile.max_bitrate, "-bufsize", &profile.buffer_size]);
    push(&["-s", &profile.resolution]);

    push(&["-c:a", "aac", "-b:a", AUDIO_BITRATE]);

    push(&["-f", "hls"]);
    push(&["-hls_time", &SEGMENT_DURATION_SECS.to_string()]);
    push(&["-hls_list_size", "0"]);
    push(&["-hls_flags", "independent_segments"]);
    push(&["-hls_playlist_type", "vod"]);
    push(&[
        "-hls_segment_filename",
        &request.segment_path_pattern().to_string_lossy(),
    ]);
    push(&[&request.manifest_path().to_string_lossy()]);

    args
}

/// Encode one variant, streaming start and progress events to `on_event`.
///
/// The ffmpeg timeout comes from the registry's tool configuration.
///
/// # Errors
///
/// - [`hl_core::Error::Tool`] if ffmpeg is missing, fails, or times out.
/// - [`hl_core::Error::Cancelled`] if `cancel` fires mid-encode.
pub async fn encode_hls_variant(
    tools: &ToolRegistry,
    request: &EncodeRequest,
    on_event: &(dyn Fn(EncoderEvent) + Send + Sync),
    cancel: CancellationToken,
) -> hl_core::Result<()> {
    let ffmpeg = tools.require("ffmpeg")?;

    let mut cmd = ToolCommand::new(ffmpeg.path.clone());
    cmd.timeout(ffmpeg.timeout);
    cmd.args(hls_variant_args(request));

    tracing::info!(
        "HLS variant encode: {:?} -> {:?} (quality={}, bitrate={}, resolution={})",
        request.source,
        request.manifest_path(),
        request.quality(),
        request.profile.bitrate,
        request.profile.resolution,
    );

    on_event(EncoderEvent::Started {
        command_line: cmd.command_line(),
    });

    let mut progress = FfmpegProgress::new();
    cmd.execute_with_stderr_callback(
        |line| {
            if let Some(percent) = progress.feed(line) {
                on_event(EncoderEvent::Progress { percent });
            }
        },
        Some(cancel),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hl_core::{Error, QualityCatalog};
    use std::path::PathBuf;

    fn request(quality: &str) -> EncodeRequest {
        let profile = QualityCatalog::builtin().get(quality).unwrap().clone();
        EncodeRequest::new("/in/sample.mp4", profile, "/out/run1")
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn args_carry_profile_values() {
        let args = hls_variant_args(&request("720"));
        assert_eq!(value_after(&args, "-b:v"), Some("2800k"));
        assert_eq!(value_after(&args, "-maxrate"), Some("2996k"));
        assert_eq!(value_after(&args, "-bufsize"), Some("4200k"));
        assert_eq!(value_after(&args, "-s"), Some("1280x720"));
        assert_eq!(value_after(&args, "-i"), Some("/in/sample.mp4"));
    }

    #[test]
    fn args_carry_fixed_policy() {
        let args = hls_variant_args(&request("360"));
        assert_eq!(value_after(&args, "-b:a"), Some("96k"));
        assert_eq!(value_after(&args, "-hls_time"), Some("10"));
        assert_eq!(value_after(&args, "-hls_list_size"), Some("0"));
        assert_eq!(value_after(&args, "-hls_flags"), Some("independent_segments"));
        assert_eq!(value_after(&args, "-hls_playlist_type"), Some("vod"));
        assert_eq!(value_after(&args, "-threads"), Some("1"));
        assert_eq!(value_after(&args, "-preset"), Some("veryfast"));
    }

    #[test]
    fn args_end_with_output_paths() {
        let args = hls_variant_args(&request("360"));
        assert_eq!(
            value_after(&args, "-hls_segment_filename"),
            Some("/out/run1/360p_%03d.ts")
        );
        assert_eq!(
            args.last().map(PathBuf::from),
            Some(PathBuf::from("/out/run1/360p.m3u8"))
        );
    }

    #[test]
    fn input_precedes_output_options() {
        let args = hls_variant_args(&request("480"));
        let input = args.iter().position(|a| a == "-i").unwrap();
        let codec = args.iter().position(|a| a == "-c:v").unwrap();
        assert!(input < codec);
    }

    #[tokio::test]
    async fn missing_ffmpeg_fails_before_start_event() {
        let started = std::sync::atomic::AtomicBool::new(false);
        let result = encode_hls_variant(
            &ToolRegistry::default(),
            &request("360"),
            &|_: EncoderEvent| started.store(true, std::sync::atomic::Ordering::SeqCst),
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(Error::Tool { .. })));
        assert!(!started.load(std::sync::atomic::Ordering::SeqCst));
    }
}
