//! Per-run job-state table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use hl_core::catalog::ResolvedQualitySet;
use hl_core::RunId;
use parking_lot::RwLock;
use serde::Serialize;

/// Lifecycle state of one quality's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running { percent: u8 },
    Done,
    Failed { error: String },
}

impl JobState {
    /// Whether the job has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed { .. })
    }
}

/// One row of a [`ConversionRun::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub quality: String,
    #[serde(flatten)]
    pub state: JobState,
}

/// Transient aggregate for one conversion: where it reads and writes, what
/// it encodes, and how far each job has got.
///
/// Shared between the orchestrator and its job tasks; every job only ever
/// touches its own row.
#[derive(Debug)]
pub struct ConversionRun {
    run_id: RunId,
    source: PathBuf,
    output_dir: PathBuf,
    qualities: ResolvedQualitySet,
    jobs: RwLock<HashMap<String, JobState>>,
}

impl ConversionRun {
    /// Create a run with every job `Pending`.
    pub fn new(
        run_id: RunId,
        source: PathBuf,
        output_dir: PathBuf,
        qualities: ResolvedQualitySet,
    ) -> Self {
        let jobs = qualities
            .iter()
            .map(|p| (p.name.clone(), JobState::Pending))
            .collect();
        Self {
            run_id,
            source,
            output_dir,
            qualities,
            jobs: RwLock::new(jobs),
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn qualities(&self) -> &ResolvedQualitySet {
        &self.qualities
    }

    /// Record a new state. Unknown qualities are ignored. Once a job is
    /// terminal only another terminal state may replace it, so a late
    /// progress report cannot resurrect a finished job.
    pub fn set_state(&self, quality: &str, state: JobState) {
        let mut jobs = self.jobs.write();
        if let Some(current) = jobs.get_mut(quality) {
            if current.is_terminal() && !state.is_terminal() {
                return;
            }
            *current = state;
        }
    }

    /// Current state of one job.
    pub fn state(&self, quality: &str) -> Option<JobState> {
        self.jobs.read().get(quality).cloned()
    }

    /// Every job's state, in catalog order.
    pub fn snapshot(&self) -> Vec<JobSnapshot> {
        let jobs = self.jobs.read();
        self.qualities
            .iter()
            .filter_map(|p| {
                jobs.get(&p.name).map(|state| JobSnapshot {
                    quality: p.name.clone(),
                    state: state.clone(),
                })
            })
            .collect()
    }

    /// Whether every job is `Done`.
    pub fn all_done(&self) -> bool {
        self.jobs.read().values().all(|s| *s == JobState::Done)
    }
}
