//! Scripted [`Encoder`] for tests.
//!
//! Compiled for this crate's unit tests and, through the `test-support`
//! feature, for integration tests of dependent crates. Each quality follows
//! a [`Script`]; on success the encoder writes three segments and the
//! quality manifest, the files a real encode leaves in the run directory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hl_av::{EncodeRequest, Encoder, EncoderEvent};
use hl_core::{Error, Result};
use tokio_util::sync::CancellationToken;

/// Behaviour of one quality's fake encode.
#[derive(Debug, Clone)]
pub struct Script {
    pub progress: Vec<f64>,
    pub fail: Option<String>,
    pub delay: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            progress: vec![0.0, 25.0, 50.0, 75.0, 100.0],
            fail: None,
            delay: Duration::ZERO,
        }
    }
}

impl Script {
    pub fn failing(cause: &str) -> Self {
        Self {
            fail: Some(cause.to_string()),
            ..Self::default()
        }
    }

    pub fn progress(values: &[f64]) -> Self {
        Self {
            progress: values.to_vec(),
            ..Self::default()
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Writes the files a real encoder would, following per-quality scripts.
#[derive(Debug, Default)]
pub struct ScriptedEncoder {
    scripts: HashMap<String, Script>,
    calls: AtomicUsize,
}

impl ScriptedEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, quality: &str, script: Script) -> Self {
        self.scripts.insert(quality.to_string(), script);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Expand the sequence placeholder of a segment pattern.
pub fn segment_name(pattern: &str, index: u32) -> String {
    pattern
        .replace("%03d", &format!("{index:03}"))
        .replace("%d", &index.to_string())
}

#[async_trait]
impl Encoder for ScriptedEncoder {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn encode(
        &self,
        request: &EncodeRequest,
        on_event: &(dyn Fn(EncoderEvent) + Send + Sync),
        cancel: CancellationToken,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .get(request.quality())
            .cloned()
            .unwrap_or_default();

        on_event(EncoderEvent::Started {
            command_line: format!("scripted-encoder {}", request.quality()),
        });

        tokio::select! {
            _ = tokio::time::sleep(script.delay) => {}
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        }

        for percent in &script.progress {
            on_event(EncoderEvent::Progress { percent: *percent });
            tokio::task::yield_now().await;
        }

        if let Some(cause) = script.fail {
            return Err(Error::tool("scripted", cause));
        }

        let pattern = request.segment_path_pattern();
        let pattern = pattern.to_string_lossy();
        for i in 0..3 {
            let segment = segment_name(&pattern, i);
            std::fs::write(&segment, b"ts").map_err(|e| Error::io(&segment, e))?;
        }
        let manifest = request.manifest_path();
        std::fs::write(&manifest, "#EXTM3U\n").map_err(|e| Error::io(&manifest, e))?;

        Ok(())
    }
}
