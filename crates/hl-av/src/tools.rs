//! Locating the encoder executable.
//!
//! Only ffmpeg is needed. [`ToolRegistry::discover`] prefers the configured
//! override and falls back to a `PATH` search; callers that already know
//! where the binary lives (tests, embedders) use [`ToolRegistry::register`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hl_core::config::ToolsConfig;
use hl_core::{Error, Result};
use serde::Serialize;

use crate::command::ToolCommand;

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Tools `check-tools` reports on.
pub const KNOWN_TOOLS: &[&str] = &["ffmpeg"];

/// A resolved executable and the time budget for one invocation of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    pub name: String,
    pub path: PathBuf,
    pub timeout: Duration,
}

/// Availability report for one known tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line of `-version` output.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// Resolved tools by name.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
}

/// An override that exists wins; a dangling one is reported and ignored.
fn locate(name: &str, configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        tracing::warn!(
            tool = name,
            "Configured path {} does not exist; searching PATH",
            path.display()
        );
    }
    which::which(name).ok()
}

impl ToolRegistry {
    /// Resolve ffmpeg from `tools.ffmpeg_path` or `PATH`. Every encode gets
    /// `tools.encode_timeout_secs`. A tool that cannot be found is simply
    /// absent; [`ToolRegistry::require`] reports it when an encode needs it.
    pub fn discover(tools_config: &ToolsConfig) -> Self {
        let mut registry = Self::default();
        let timeout = Duration::from_secs(tools_config.encode_timeout_secs);

        match locate("ffmpeg", tools_config.ffmpeg_path.as_deref()) {
            Some(path) => {
                tracing::debug!(tool = "ffmpeg", "Using {}", path.display());
                registry.register("ffmpeg", path, timeout);
            }
            None => tracing::debug!(tool = "ffmpeg", "Not found"),
        }

        registry
    }

    /// Register (or replace) a tool at an explicit path.
    pub fn register(&mut self, name: &str, path: impl Into<PathBuf>, timeout: Duration) {
        self.tools.insert(
            name.to_string(),
            ToolConfig {
                name: name.to_string(),
                path: path.into(),
                timeout,
            },
        );
    }

    /// # Errors
    ///
    /// [`Error::Tool`] when `name` was neither discovered nor registered.
    pub fn require(&self, name: &str) -> Result<&ToolConfig> {
        self.tools.get(name).ok_or_else(|| {
            Error::tool(
                name,
                format!("{name} not found; install it or set tools.{name}_path"),
            )
        })
    }

    /// Probe every known tool, registered or not, for `check-tools`.
    pub async fn check_all(&self) -> Vec<ToolInfo> {
        let mut infos = Vec::with_capacity(KNOWN_TOOLS.len());

        for &name in KNOWN_TOOLS {
            let info = match self.tools.get(name) {
                Some(cfg) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(&cfg.path).await,
                    path: Some(cfg.path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            };
            infos.push(info);
        }

        infos
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ToolConfig)> {
        self.tools.iter()
    }
}

/// Run `<tool> -version` and return the first line of stdout.
async fn detect_version(path: &Path) -> Option<String> {
    let output = ToolCommand::new(path.to_path_buf())
        .arg("-version")
        .timeout(VERSION_PROBE_TIMEOUT)
        .execute()
        .await
        .ok()?;

    output.stdout.lines().next().map(str::to_string)
}
