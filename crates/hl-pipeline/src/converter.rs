//! Conversion orchestrator.
//!
//! [`Converter::convert`] is the single entry point. It validates the
//! request (catalog, source name, quality subset, source existence, output
//! directory, in that order, stopping at the first failure), then launches
//! one job per resolved quality on a [`JoinSet`]. Every job is awaited
//! before the call returns. Only when all of them succeed is the master
//! manifest written and the source optionally removed.

use std::path::PathBuf;
use std::sync::Arc;

use hl_av::{EncodeRequest, Encoder};
use hl_core::config::Config;
use hl_core::events::{EventBus, EventPayload};
use hl_core::{Error, QualityCatalog, QualityProfile, Result, RunId};
use hl_media::write_master_manifest;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::cleanup::SourceCleanup;
use crate::job::{JobEvent, JobRunner};
use crate::layout::prepare_output_dir;
use crate::progress::ProgressSender;
use crate::run::{ConversionRun, JobSnapshot, JobState};

// ---------------------------------------------------------------------------
// Request / report
// ---------------------------------------------------------------------------

/// What to convert and how. Consumed by one [`Converter::convert`] call.
#[derive(Debug, Default)]
pub struct ConversionRequest {
    /// File name resolved against the converter's input directory.
    pub source_file_name: String,
    /// Quality names to encode; `None` or empty selects the default subset.
    pub qualities: Option<Vec<String>>,
    /// Run directory name; a fresh id is generated when absent.
    pub run_id: Option<RunId>,
    /// Full replacement for the converter's catalog, validated first.
    pub catalog: Option<Vec<QualityProfile>>,
    /// Receives per-quality integer progress.
    pub progress: Option<ProgressSender>,
    /// Cancels every job when fired.
    pub cancel: Option<CancellationToken>,
    /// Overrides the converter's delete-on-success setting.
    pub delete_source: Option<bool>,
}

impl ConversionRequest {
    pub fn new(source_file_name: impl Into<String>) -> Self {
        Self {
            source_file_name: source_file_name.into(),
            ..Self::default()
        }
    }

    /// Builder: request specific qualities.
    pub fn with_qualities(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.qualities = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Builder: use a caller-chosen run id.
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Builder: replace the catalog for this run.
    pub fn with_catalog(mut self, profiles: Vec<QualityProfile>) -> Self {
        self.catalog = Some(profiles);
        self
    }

    /// Builder: attach a progress sender.
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Builder: attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Builder: delete (or keep) the source once every quality succeeded.
    pub fn with_delete_source(mut self, delete: bool) -> Self {
        self.delete_source = Some(delete);
        self
    }
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub run_id: RunId,
    pub output_dir: PathBuf,
    pub master_manifest: PathBuf,
    /// Final job states, in catalog order.
    pub jobs: Vec<JobSnapshot>,
    /// Whether this run removed the source file.
    pub source_deleted: bool,
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Converts source files into HLS ladders under one output base directory.
pub struct Converter {
    input_dir: PathBuf,
    output_dir: PathBuf,
    catalog: QualityCatalog,
    default_qualities: Option<Vec<String>>,
    delete_source_on_success: bool,
    encoder: Arc<dyn Encoder>,
    events: Arc<EventBus>,
}

impl Converter {
    /// Create a converter using the built-in catalog.
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        encoder: Arc<dyn Encoder>,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            catalog: QualityCatalog::builtin(),
            default_qualities: None,
            delete_source_on_success: false,
            encoder,
            events: Arc::new(EventBus::default()),
        }
    }

    /// Create a converter from application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProfile`] if the configured catalog is invalid.
    pub fn from_config(config: &Config, encoder: Arc<dyn Encoder>) -> Result<Self> {
        Ok(Self {
            catalog: config.quality_catalog()?,
            default_qualities: config.conversion.qualities.clone(),
            delete_source_on_success: config.conversion.delete_source_on_success,
            ..Self::new(
                config.paths.input_dir.clone(),
                config.paths.output_dir.clone(),
                encoder,
            )
        })
    }

    /// Builder: replace the default catalog.
    pub fn with_catalog(mut self, catalog: QualityCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Builder: qualities used when a request names none.
    pub fn with_default_qualities(mut self, names: Vec<String>) -> Self {
        self.default_qualities = Some(names);
        self
    }

    /// Builder: delete sources after fully successful runs.
    pub fn with_delete_source_on_success(mut self, delete: bool) -> Self {
        self.delete_source_on_success = delete;
        self
    }

    /// Builder: publish lifecycle events on a shared bus.
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// The bus lifecycle events are published on.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// The catalog requests resolve against when they carry none.
    pub fn catalog(&self) -> &QualityCatalog {
        &self.catalog
    }

    /// Run one conversion to completion.
    ///
    /// # Errors
    ///
    /// Validation errors ([`Error::InvalidProfile`], [`Error::InvalidRequest`],
    /// [`Error::EmptySelection`], [`Error::SourceNotFound`]) and output
    /// directory [`Error::Io`] are returned before any job starts. After the
    /// fan-out, the first job failure in completion order is returned
    /// ([`Error::EncodeFailure`] or [`Error::Cancelled`]) once every job has
    /// finished. Files written by successful jobs are left in place.
    pub async fn convert(&self, request: ConversionRequest) -> Result<ConversionReport> {
        let ConversionRequest {
            source_file_name,
            qualities,
            run_id,
            catalog,
            progress,
            cancel,
            delete_source,
        } = request;

        // 1. Catalog.
        let custom;
        let catalog = match catalog {
            Some(profiles) => {
                custom = QualityCatalog::new(profiles)?;
                &custom
            }
            None => &self.catalog,
        };

        // 2. Source name.
        if source_file_name.trim().is_empty() {
            return Err(Error::InvalidRequest("source file name is empty".into()));
        }

        // 3. Quality subset. Explicit names are strict; configured defaults
        // are filtered against whichever catalog is in effect.
        let resolved = match qualities.filter(|q| !q.is_empty()) {
            Some(names) => catalog.resolve(Some(names.as_slice()))?,
            None => match self.default_qualities.as_deref() {
                Some(defaults) if !defaults.is_empty() => {
                    let (present, missing): (Vec<&str>, Vec<&str>) = defaults
                        .iter()
                        .map(String::as_str)
                        .partition(|name| catalog.get(name).is_some());
                    if !missing.is_empty() {
                        tracing::debug!(?missing, "Configured default qualities not in catalog");
                    }
                    if present.is_empty() {
                        return Err(Error::EmptySelection);
                    }
                    catalog.resolve(Some(present.as_slice()))?
                }
                _ => catalog.resolve::<&str>(None)?,
            },
        };

        // 4. Source existence.
        let source = self.input_dir.join(&source_file_name);
        match tokio::fs::metadata(&source).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(Error::SourceNotFound { path: source }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::SourceNotFound { path: source });
            }
            Err(e) => return Err(Error::io(&source, e)),
        }
        let source = tokio::fs::canonicalize(&source)
            .await
            .map_err(|e| Error::io(&source, e))?;

        // 5. Output directory.
        let run_id = run_id.unwrap_or_default();
        let output_dir = prepare_output_dir(&self.output_dir, Some(&run_id))?;

        let run = Arc::new(ConversionRun::new(
            run_id.clone(),
            source.clone(),
            output_dir.clone(),
            resolved,
        ));
        let names: Vec<String> = run.qualities().names().into_iter().map(String::from).collect();

        tracing::info!(
            run_id = %run_id,
            qualities = ?names,
            "Conversion started: {} -> {}",
            source.display(),
            output_dir.display()
        );
        self.events.broadcast(EventPayload::RunStarted {
            run_id: run_id.clone(),
            output_dir: output_dir.clone(),
            qualities: names,
        });

        // Fan out.
        let cancel = cancel.unwrap_or_default();
        let progress = Arc::new(progress.unwrap_or_default());
        let runner = JobRunner::new(self.encoder.clone());
        let mut jobs = JoinSet::new();

        for profile in run.qualities() {
            let request = EncodeRequest::new(source.clone(), profile.clone(), output_dir.clone());
            let runner = runner.clone();
            let run = run.clone();
            let events = self.events.clone();
            let progress = progress.clone();
            let cancel = cancel.clone();

            jobs.spawn(async move {
                let result = run_job(&runner, &request, &run, &events, &progress, cancel).await;
                (request.profile.name, result)
            });
        }

        // Fan in: every job is observed before returning.
        let mut first_failure: Option<Error> = None;
        while let Some(joined) = jobs.join_next().await {
            let (quality, err) = match joined {
                Ok((_, Ok(()))) => continue,
                Ok((quality, Err(e))) => (quality, e),
                Err(join_err) => (
                    String::from("unknown"),
                    Error::encode_failure("unknown", format!("job task failed: {join_err}")),
                ),
            };
            if first_failure.is_none() {
                first_failure = Some(err);
            } else {
                tracing::warn!(run_id = %run_id, quality = %quality, "Additional job failure: {err}");
            }
        }

        if let Some(err) = first_failure {
            return Err(self.fail(&run_id, err));
        }

        let master_manifest = write_master_manifest(&output_dir, run.qualities())
            .map_err(|e| self.fail(&run_id, e))?;

        let delete_source = delete_source.unwrap_or(self.delete_source_on_success);
        let mut source_deleted = false;
        if delete_source {
            match SourceCleanup::new(&source).delete_once().await {
                Ok(deleted) => source_deleted = deleted,
                Err(e) => tracing::warn!(run_id = %run_id, "Source cleanup failed: {e}"),
            }
        }

        tracing::info!(
            run_id = %run_id,
            "Conversion completed: {}",
            master_manifest.display()
        );
        self.events.broadcast(EventPayload::RunCompleted {
            run_id: run_id.clone(),
            master_manifest: master_manifest.clone(),
        });

        Ok(ConversionReport {
            run_id,
            output_dir,
            master_manifest,
            jobs: run.snapshot(),
            source_deleted,
        })
    }

    /// Log and publish a run failure, handing the error back.
    fn fail(&self, run_id: &RunId, err: Error) -> Error {
        tracing::error!(run_id = %run_id, "Conversion failed: {err}");
        self.events.broadcast(EventPayload::RunFailed {
            run_id: run_id.clone(),
            error: err.to_string(),
        });
        err
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("catalog", &self.catalog.names())
            .field("encoder", &self.encoder.name())
            .finish_non_exhaustive()
    }
}

/// Run one job, mirroring its lifecycle into the run table, the caller's
/// progress sender and the event bus.
async fn run_job(
    runner: &JobRunner,
    request: &EncodeRequest,
    run: &ConversionRun,
    events: &EventBus,
    progress: &ProgressSender,
    cancel: CancellationToken,
) -> Result<()> {
    let quality = request.quality();
    let run_id = run.run_id();
    run.set_state(quality, JobState::Running { percent: 0 });

    let on_event = |event: JobEvent| match event {
        JobEvent::Started { command_line } => {
            events.broadcast(EventPayload::JobStarted {
                run_id: run_id.clone(),
                quality: quality.to_string(),
                command_line,
            });
        }
        JobEvent::Progress(percent) => {
            run.set_state(quality, JobState::Running { percent });
            progress.send(quality, percent);
            events.broadcast(EventPayload::JobProgress {
                run_id: run_id.clone(),
                quality: quality.to_string(),
                percent,
            });
        }
    };

    let result = runner.run(request, &on_event, cancel).await;

    match &result {
        Ok(()) => {
            run.set_state(quality, JobState::Done);
            events.broadcast(EventPayload::JobCompleted {
                run_id: run_id.clone(),
                quality: quality.to_string(),
            });
        }
        Err(e) => {
            tracing::error!(run_id = %run_id, quality = %quality, "Job failed: {e}");
            run.set_state(
                quality,
                JobState::Failed {
                    error: e.to_string(),
                },
            );
            events.broadcast(EventPayload::JobFailed {
                run_id: run_id.clone(),
                quality: quality.to_string(),
                error: e.to_string(),
            });
        }
    }

    result
}
