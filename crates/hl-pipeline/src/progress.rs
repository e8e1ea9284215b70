//! Caller-facing progress reporting.

/// Sender for per-quality progress reports.
///
/// Wraps a callback that receives the quality name and an integer
/// percentage (0 -- 100). Callbacks may be invoked concurrently from
/// different jobs; within one quality the percentages never decrease.
pub struct ProgressSender {
    callback: Box<dyn Fn(&str, u8) + Send + Sync>,
}

impl ProgressSender {
    /// Create a new sender from the given callback.
    pub fn new(callback: impl Fn(&str, u8) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create a no-op sender that discards all progress reports.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_, _| {}),
        }
    }

    /// Report progress.
    pub fn send(&self, quality: &str, percent: u8) {
        (self.callback)(quality, percent);
    }
}

impl Default for ProgressSender {
    fn default() -> Self {
        Self::noop()
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}
