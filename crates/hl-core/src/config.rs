//! JSON configuration shared by the CLI and `hl_pipeline::Converter::from_config`.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! path, tool, and conversion sections. Every section defaults sensibly so a
//! completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::{self, QualityCatalog, QualityProfile};
use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub tools: ToolsConfig,
    pub conversion: ConversionConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file, surfacing read and parse errors.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&contents)
    }

    /// Lenient variant of [`Config::load`]: a missing path, a missing file
    /// or a file that fails to parse all yield the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match Self::load(path) {
            Ok(config) => config,
            Err(Error::Io { ref source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "Config file absent, using built-in defaults");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "Ignoring config file: {e}");
                Self::default()
            }
        }
    }

    /// Non-fatal problems worth logging before a run.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.paths.input_dir == self.paths.output_dir {
            warnings.push(format!(
                "paths.input_dir and paths.output_dir are both {}",
                self.paths.input_dir.display()
            ));
        }

        if let Some(ref ffmpeg) = self.tools.ffmpeg_path {
            if !ffmpeg.exists() {
                warnings.push(format!(
                    "tools.ffmpeg_path {} does not exist; PATH lookup will be used",
                    ffmpeg.display()
                ));
            }
        }

        if self.tools.encode_timeout_secs == 0 {
            warnings.push("tools.encode_timeout_secs is 0; every encode will time out".into());
        }

        if let Some(ref profiles) = self.conversion.catalog {
            if let Err(e) = catalog::validate(profiles) {
                warnings.push(format!("conversion.catalog: {e}"));
            }
        }

        if let Some(ref qualities) = self.conversion.qualities {
            let catalog = self.quality_catalog().unwrap_or_default();
            for name in qualities {
                if catalog.get(name).is_none() {
                    warnings.push(format!(
                        "conversion.qualities names unknown quality '{name}'"
                    ));
                }
            }
        }

        warnings
    }

    /// The catalog conversions should resolve against: the configured
    /// replacement if present, the built-in ladder otherwise.
    pub fn quality_catalog(&self) -> Result<QualityCatalog> {
        match self.conversion.catalog {
            Some(ref profiles) => QualityCatalog::new(profiles.clone()),
            None => Ok(QualityCatalog::builtin()),
        }
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Source and destination directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory source file names are resolved against.
    pub input_dir: PathBuf,
    /// Base directory run directories are created under.
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./input"),
            output_dir: PathBuf::from("./output"),
        }
    }
}

/// Paths and limits for external CLI tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    #[serde(default = "default_encode_timeout")]
    pub encode_timeout_secs: u64,
}

fn default_encode_timeout() -> u64 {
    86_400
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            encode_timeout_secs: default_encode_timeout(),
        }
    }
}

/// Conversion defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Quality names to encode when the caller names none.
    pub qualities: Option<Vec<String>>,
    /// Remove the source file once every quality has been encoded.
    pub delete_source_on_success: bool,
    /// Full replacement for the built-in quality ladder.
    pub catalog: Option<Vec<QualityProfile>>,
}
