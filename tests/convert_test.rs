//! Conversion scenarios through the public API.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Sandbox, Script, ScriptedEncoder};
use hl_core::events::EventPayload;
use hl_core::{Error, QualityCatalog, QualityProfile, RunId};
use hl_pipeline::{ConversionRequest, Converter, JobState, ProgressSender};
use parking_lot::Mutex;

fn rungs(names: &[&str]) -> Vec<QualityProfile> {
    let builtin = QualityCatalog::builtin();
    names
        .iter()
        .map(|n| builtin.get(n).unwrap().clone())
        .collect()
}

#[tokio::test]
async fn two_qualities_succeed_and_master_lists_both() {
    let sandbox = Sandbox::new();
    let converter = Converter::new(&sandbox.input, &sandbox.output, Arc::new(ScriptedEncoder::new()));

    let progress: Arc<Mutex<Vec<(String, u8)>>> = Arc::default();
    let sink = progress.clone();

    let report = converter
        .convert(
            ConversionRequest::new("sample.mp4")
                .with_catalog(rungs(&["360", "480"]))
                .with_progress(ProgressSender::new(move |q, p| {
                    sink.lock().push((q.to_string(), p));
                })),
        )
        .await
        .unwrap();

    let master = std::fs::read_to_string(&report.master_manifest).unwrap();
    assert_eq!(
        master,
        "#EXTM3U\n\
         #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
         360p.m3u8\n\
         #EXT-X-STREAM-INF:BANDWIDTH=1400000,RESOLUTION=842x480\n\
         480p.m3u8\n"
    );

    for quality in ["360", "480"] {
        let seen: Vec<u8> = progress
            .lock()
            .iter()
            .filter(|(q, _)| q == quality)
            .map(|(_, p)| *p)
            .collect();
        assert_eq!(seen, vec![0, 25, 50, 75, 100], "quality {quality}");
    }
    assert!(report.output_dir.join("360p_000.ts").exists());
    assert!(report.output_dir.join("480p_001.ts").exists());
}

#[tokio::test]
async fn failing_quality_fails_run_and_keeps_sibling_files() {
    let sandbox = Sandbox::new();
    let encoder = ScriptedEncoder::new().with_script(
        "480",
        Script {
            fail: Some("exit status 1".into()),
            delay: Duration::from_millis(50),
            ..Script::default()
        },
    );
    let converter = Converter::new(&sandbox.input, &sandbox.output, Arc::new(encoder));

    let err = converter
        .convert(
            ConversionRequest::new("sample.mp4")
                .with_catalog(rungs(&["360", "480"]))
                .with_run_id(RunId::from_caller("partial").unwrap()),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::EncodeFailure { ref quality, .. } if quality == "480"));
    let run_dir = sandbox.output.join("partial");
    assert!(run_dir.join("360p.m3u8").exists());
    assert!(run_dir.join("360p_000.ts").exists());
    assert!(!run_dir.join("master.m3u8").exists());
    assert_eq!(err.exit_code(), 5);
}

#[tokio::test]
async fn missing_source_has_no_side_effects() {
    let sandbox = Sandbox::new();
    let encoder = Arc::new(ScriptedEncoder::new());
    let converter = Converter::new(&sandbox.input, &sandbox.output, encoder.clone());

    let err = converter
        .convert(ConversionRequest::new("missing.mp4"))
        .await
        .unwrap_err();

    match err {
        Error::SourceNotFound { path } => assert!(path.ends_with("missing.mp4")),
        other => panic!("expected SourceNotFound, got {other:?}"),
    }
    assert!(!sandbox.output.exists());
    assert_eq!(encoder.calls(), 0);
}

#[tokio::test]
async fn unknown_quality_lists_valid_names() {
    let sandbox = Sandbox::new();
    let converter = Converter::new(&sandbox.input, &sandbox.output, Arc::new(ScriptedEncoder::new()));

    let err = converter
        .convert(ConversionRequest::new("sample.mp4").with_qualities(["999"]))
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(matches!(err, Error::InvalidRequest(_)));
    for name in QualityCatalog::builtin().names() {
        assert!(message.contains(name), "{message} lacks {name}");
    }
}

#[tokio::test]
async fn source_deleted_exactly_once() {
    let sandbox = Sandbox::new();
    let converter = Converter::new(&sandbox.input, &sandbox.output, Arc::new(ScriptedEncoder::new()))
        .with_delete_source_on_success(true);

    let report = converter
        .convert(ConversionRequest::new("sample.mp4").with_qualities(["120", "240", "360", "480", "720"]))
        .await
        .unwrap();

    assert!(report.source_deleted);
    assert!(!sandbox.source().exists());
    assert_eq!(report.jobs.len(), 5);
    assert!(report.jobs.iter().all(|j| j.state == JobState::Done));
}

#[tokio::test]
async fn events_bracket_the_run() {
    let sandbox = Sandbox::new();
    let converter = Converter::new(&sandbox.input, &sandbox.output, Arc::new(ScriptedEncoder::new()));
    let mut rx = converter.events().subscribe();

    let report = converter
        .convert(ConversionRequest::new("sample.mp4").with_qualities(["360", "720"]))
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.payload.run_id(), &report.run_id);
        events.push(event.payload);
    }

    match events.first() {
        Some(EventPayload::RunStarted { qualities, .. }) => {
            assert_eq!(qualities, &vec!["360".to_string(), "720".to_string()]);
        }
        other => panic!("expected RunStarted, got {other:?}"),
    }
    assert!(matches!(events.last(), Some(EventPayload::RunCompleted { .. })));
    let started = events
        .iter()
        .filter(|e| matches!(e, EventPayload::JobStarted { .. }))
        .count();
    assert_eq!(started, 2);

    let history = converter.events().history(&report.run_id);
    assert_eq!(history.len(), events.len());
    assert!(history.windows(2).all(|w| w[0].seq < w[1].seq));
}

#[cfg(unix)]
mod with_fake_ffmpeg {
    use super::*;
    use hl_av::{FfmpegEncoder, ToolRegistry};

    fn encoder(sandbox: &Sandbox) -> FfmpegEncoder {
        let mut tools = ToolRegistry::default();
        tools.register("ffmpeg", common::fake_ffmpeg(sandbox.dir.path()), Duration::from_secs(30));
        FfmpegEncoder::new(tools)
    }

    #[tokio::test]
    async fn ffmpeg_encoder_produces_ladder() {
        let sandbox = Sandbox::new();
        let converter = Converter::new(&sandbox.input, &sandbox.output, Arc::new(encoder(&sandbox)));

        let progress: Arc<Mutex<Vec<u8>>> = Arc::default();
        let sink = progress.clone();
        let report = converter
            .convert(
                ConversionRequest::new("sample.mp4")
                    .with_qualities(["360"])
                    .with_progress(ProgressSender::new(move |_, p| sink.lock().push(p))),
            )
            .await
            .unwrap();

        assert!(report.output_dir.join("360p.m3u8").exists());
        assert!(report.output_dir.join("360p_000.ts").exists());
        assert_eq!(*progress.lock(), vec![25, 100]);
    }

    #[tokio::test]
    async fn ffmpeg_failure_becomes_encode_failure() {
        let sandbox = Sandbox::new();
        std::fs::write(sandbox.input.join("corrupt.mp4"), b"junk").unwrap();
        let converter = Converter::new(&sandbox.input, &sandbox.output, Arc::new(encoder(&sandbox)));

        let err = converter
            .convert(ConversionRequest::new("corrupt.mp4").with_qualities(["360"]))
            .await
            .unwrap_err();

        match err {
            Error::EncodeFailure { quality, cause } => {
                assert_eq!(quality, "360");
                assert!(cause.contains("Invalid data"), "{cause}");
            }
            other => panic!("expected EncodeFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failure_after_final_block_never_reports_complete() {
        let sandbox = Sandbox::new();
        std::fs::write(sandbox.input.join("trailer.mp4"), b"junk").unwrap();
        let converter = Converter::new(&sandbox.input, &sandbox.output, Arc::new(encoder(&sandbox)));

        let progress: Arc<Mutex<Vec<u8>>> = Arc::default();
        let sink = progress.clone();
        let err = converter
            .convert(
                ConversionRequest::new("trailer.mp4")
                    .with_qualities(["360"])
                    .with_progress(ProgressSender::new(move |_, p| sink.lock().push(p))),
            )
            .await
            .unwrap_err();

        match err {
            Error::EncodeFailure { quality, cause } => {
                assert_eq!(quality, "360");
                assert!(cause.contains("Error writing trailer"), "{cause}");
            }
            other => panic!("expected EncodeFailure, got {other:?}"),
        }
        assert!(!progress.lock().contains(&100), "{:?}", progress.lock());
    }
}
