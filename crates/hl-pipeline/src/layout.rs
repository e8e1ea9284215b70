//! Output directory layout.
//!
//! Every run writes into `<base>/<run id>/`. Both levels are created on
//! demand and creation is idempotent, so repeating a caller-supplied run id
//! reuses the same directory.

use std::path::{Path, PathBuf};

use hl_core::{Error, Result, RunId};

/// Create `<base>/<run_id>` (generating a fresh id when `run_id` is `None`)
/// and return its absolute, normalized path.
///
/// # Errors
///
/// Returns [`Error::Io`] if either directory cannot be created or resolved.
pub fn prepare_output_dir(base: &Path, run_id: Option<&RunId>) -> Result<PathBuf> {
    std::fs::create_dir_all(base).map_err(|e| Error::io(base, e))?;

    let generated;
    let run_id = match run_id {
        Some(id) => id,
        None => {
            generated = RunId::new();
            &generated
        }
    };

    let run_dir = base.join(run_id.as_str());
    std::fs::create_dir_all(&run_dir).map_err(|e| Error::io(&run_dir, e))?;

    let run_dir = std::fs::canonicalize(&run_dir).map_err(|e| Error::io(&run_dir, e))?;
    tracing::debug!("Prepared output directory {}", run_dir.display());
    Ok(run_dir)
}
