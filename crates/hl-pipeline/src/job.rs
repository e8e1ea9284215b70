//! Job runner: one encoder invocation for one quality.
//!
//! The runner sits between the [`Encoder`] and the orchestrator. It turns
//! the encoder's fractional, possibly jittery progress into a monotonic
//! integer percent, guarantees a closing 100 on success, and wraps failures
//! as [`Error::EncodeFailure`] carrying the quality name.

use std::sync::Arc;

use hl_av::{EncodeRequest, Encoder, EncoderEvent};
use hl_core::{Error, Result};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Normalized lifecycle notifications from one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// The encoder launched; carries its diagnostic command line.
    Started { command_line: String },
    /// Integer percent complete. Never decreases within one job.
    Progress(u8),
}

/// Runs single-quality encodes against a shared [`Encoder`].
#[derive(Clone)]
pub struct JobRunner {
    encoder: Arc<dyn Encoder>,
}

impl JobRunner {
    pub fn new(encoder: Arc<dyn Encoder>) -> Self {
        Self { encoder }
    }

    /// Encode one quality, reporting through `on_event`.
    ///
    /// Segment files already written are left in place on failure.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if `cancel` fired.
    /// - [`Error::EncodeFailure`] for any other encoder failure, or if the
    ///   encoder reported success without producing the quality manifest.
    pub async fn run(
        &self,
        request: &EncodeRequest,
        on_event: &(dyn Fn(JobEvent) + Send + Sync),
        cancel: CancellationToken,
    ) -> Result<()> {
        let quality = request.quality();
        let last_percent: Mutex<Option<u8>> = Mutex::new(None);

        let forward = |event: EncoderEvent| match event {
            EncoderEvent::Started { command_line } => {
                tracing::debug!(quality = %quality, "Encoder command: {command_line}");
                on_event(JobEvent::Started { command_line });
            }
            EncoderEvent::Progress { percent } => {
                if percent.is_nan() {
                    return;
                }
                let percent = percent.clamp(0.0, 100.0).floor() as u8;
                // Held while emitting so reports stay ordered.
                let mut last = last_percent.lock();
                if last.map_or(true, |prev| percent > prev) {
                    *last = Some(percent);
                    on_event(JobEvent::Progress(percent));
                }
            }
        };

        tracing::info!(quality = %quality, encoder = self.encoder.name(), "Job started");

        match self.encoder.encode(request, &forward, cancel).await {
            Ok(()) => {}
            Err(Error::Cancelled) => {
                tracing::info!(quality = %quality, "Job cancelled");
                return Err(Error::Cancelled);
            }
            Err(e @ Error::EncodeFailure { .. }) => return Err(e),
            Err(e) => return Err(Error::encode_failure(quality, e)),
        }

        let manifest = request.manifest_path();
        if !manifest.is_file() {
            return Err(Error::encode_failure(
                quality,
                format!("encoder finished without writing {}", manifest.display()),
            ));
        }

        {
            let mut last = last_percent.lock();
            if *last != Some(100) {
                *last = Some(100);
                on_event(JobEvent::Progress(100));
            }
        }

        tracing::info!(quality = %quality, "Job completed");
        Ok(())
    }
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("encoder", &self.encoder.name())
            .finish()
    }
}
