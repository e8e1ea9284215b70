//! # hl-pipeline
//!
//! Orchestration of one HLS ladder conversion.
//!
//! This crate provides:
//!
//! - **[`prepare_output_dir`]** -- idempotent creation of the per-run output
//!   directory.
//! - **[`JobRunner`]** -- drives one [`Encoder`](hl_av::Encoder) call and
//!   normalizes its progress into a monotonic integer percent.
//! - **[`Converter`]** -- validates a [`ConversionRequest`], fans out one job
//!   per resolved quality, waits for all of them, writes the master
//!   manifest, and optionally deletes the source.
//! - **[`ConversionRun`]** -- per-run job-state table, snapshotted into the
//!   returned [`ConversionReport`].

pub mod cleanup;
pub mod converter;
pub mod job;
pub mod layout;
pub mod progress;
pub mod run;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

// Re-export key types at the crate root.
pub use cleanup::SourceCleanup;
pub use converter::{ConversionReport, ConversionRequest, Converter};
pub use job::{JobEvent, JobRunner};
pub use layout::prepare_output_dir;
pub use progress::ProgressSender;
pub use run::{ConversionRun, JobSnapshot, JobState};
