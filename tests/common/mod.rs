//! Shared test harness for integration tests.
//!
//! Provides [`Sandbox`], a temporary input/output tree with a source file,
//! re-exports the pipeline's scripted encoder, and [`fake_ffmpeg`], a shell
//! script that mimics ffmpeg's HLS muxer closely enough to drive the
//! production encoder.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

#[allow(unused_imports)]
pub use hl_pipeline::test_support::{Script, ScriptedEncoder};

/// Temporary `input/` + `output/` tree with `input/sample.mp4`.
pub struct Sandbox {
    pub dir: tempfile::TempDir,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        let output = dir.path().join("output");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::write(input.join("sample.mp4"), b"not really a video").unwrap();
        Self { dir, input, output }
    }

    pub fn source(&self) -> PathBuf {
        self.input.join("sample.mp4")
    }

    /// Write a config file pointing at this sandbox and return its path.
    pub fn write_config(&self, ffmpeg: Option<&Path>) -> PathBuf {
        let config = serde_json::json!({
            "paths": { "input_dir": self.input, "output_dir": self.output },
            "tools": { "ffmpeg_path": ffmpeg },
        });
        let path = self.dir.path().join("config.json");
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
        path
    }
}

/// Shell stand-in for ffmpeg: answers `-version`, prints a duration banner
/// and two progress blocks on stderr, then writes one segment and the
/// manifest named by its arguments. Exits 1 when the source path contains
/// "corrupt" (before any progress) or "trailer" (after the final progress
/// block).
#[cfg(unix)]
pub fn fake_ffmpeg(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    const SCRIPT: &str = r#"#!/bin/sh
if [ "$1" = "-version" ]; then
  echo "ffmpeg version 0.0-fake"
  exit 0
fi
seg=""
out=""
src=""
while [ $# -gt 0 ]; do
  case "$1" in
    -hls_segment_filename) seg="$2"; shift ;;
    -i) src="$2"; shift ;;
  esac
  out="$1"
  shift
done
case "$src" in
  *corrupt*) echo "$src: Invalid data found when processing input" >&2; exit 1 ;;
  *trailer*)
    echo "  Duration: 00:00:20.00, start: 0.000000, bitrate: 800 kb/s" >&2
    echo "out_time_us=20000000" >&2
    echo "progress=end" >&2
    echo "Error writing trailer of $out: No space left on device" >&2
    exit 1 ;;
esac
echo "  Duration: 00:00:20.00, start: 0.000000, bitrate: 800 kb/s" >&2
echo "out_time_us=5000000" >&2
echo "progress=continue" >&2
printf 'ts' > "$(printf "$seg" 0)"
echo "out_time_us=20000000" >&2
echo "progress=end" >&2
printf '#EXTM3U\n#EXT-X-ENDLIST\n' > "$out"
"#;

    let path = dir.join("ffmpeg");
    std::fs::write(&path, SCRIPT).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}
