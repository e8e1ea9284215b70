//! Percent-complete tracking from ffmpeg stderr.
//!
//! ffmpeg prints the input duration in its banner
//! (`  Duration: 00:01:02.50, start: ...`) and, with `-progress pipe:2`,
//! emits `key=value` blocks terminated by a `progress=continue` or
//! `progress=end` line. [`FfmpegProgress`] consumes those lines one at a
//! time and yields a percentage at each block boundary.

/// Incremental parser for ffmpeg progress output.
#[derive(Debug, Clone, Default)]
pub struct FfmpegProgress {
    duration_us: Option<i64>,
    out_time_us: Option<i64>,
}

impl FfmpegProgress {
    /// Create a parser with no known duration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total input duration in microseconds, once the banner has been seen.
    pub fn duration_us(&self) -> Option<i64> {
        self.duration_us
    }

    /// Feed one stderr line.
    ///
    /// Returns `Some(percent)` in `0.0..=100.0` at each `progress=continue`
    /// for which a percentage can be computed. The final `progress=end`
    /// block yields nothing: ffmpeg may still fail writing the trailer, so
    /// completion is only reported once the process has exited cleanly.
    pub fn feed(&mut self, line: &str) -> Option<f64> {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix("Duration:") {
            if self.duration_us.is_none() {
                self.duration_us = rest
                    .split(',')
                    .next()
                    .and_then(|ts| parse_timestamp_us(ts.trim()));
            }
            return None;
        }

        // `out_time_ms` is also microseconds despite the name.
        if let Some(val) = line
            .strip_prefix("out_time_us=")
            .or_else(|| line.strip_prefix("out_time_ms="))
        {
            if let Ok(us) = val.trim().parse::<i64>() {
                self.out_time_us = Some(us);
            }
            return None;
        }

        match line.strip_prefix("progress=") {
            Some("end") => None,
            Some(_) => self.percent(),
            None => None,
        }
    }

    fn percent(&self) -> Option<f64> {
        let duration = self.duration_us.filter(|d| *d > 0)?;
        let elapsed = self.out_time_us?;
        Some((elapsed as f64 / duration as f64 * 100.0).clamp(0.0, 100.0))
    }
}

/// Parse `HH:MM:SS(.fraction)` into microseconds.
fn parse_timestamp_us(ts: &str) -> Option<i64> {
    let mut parts = ts.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let total = (hours * 3600 + minutes * 60) as f64 + seconds;
    Some((total * 1_000_000.0).round() as i64)
}
