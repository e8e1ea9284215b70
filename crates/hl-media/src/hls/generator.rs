//! HLS playlist generation functions.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use hl_core::catalog::{ResolvedQualitySet, MASTER_MANIFEST_FILENAME};
use hl_core::{Error, Result};

use super::types::MasterPlaylist;

/// Generate an HLS master playlist (M3U8) from a [`MasterPlaylist`].
///
/// Output is the `#EXTM3U` header followed by an `#EXT-X-STREAM-INF` line
/// and a URI line for each variant. Every line ends with `\n`.
pub fn generate_master_playlist(playlist: &MasterPlaylist) -> String {
    let mut out = String::from("#EXTM3U\n");

    for variant in &playlist.variants {
        let (w, h) = variant.resolution;
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{}",
            variant.bandwidth, w, h
        );
        let _ = writeln!(out, "{}", variant.uri);
    }

    out
}

/// Render the master playlist for `qualities` and write it to
/// `<run_dir>/master.m3u8`, replacing any existing file.
///
/// Returns the path written.
///
/// # Errors
///
/// - [`Error::InvalidProfile`] if a profile's bitrate or resolution is
///   unparseable.
/// - [`Error::Io`] if the file cannot be written.
pub fn write_master_manifest(run_dir: &Path, qualities: &ResolvedQualitySet) -> Result<PathBuf> {
    let playlist = MasterPlaylist::from_qualities(qualities)?;
    let path = run_dir.join(MASTER_MANIFEST_FILENAME);

    std::fs::write(&path, generate_master_playlist(&playlist)).map_err(|e| Error::io(&path, e))?;

    tracing::info!(
        "Wrote master manifest {} ({} variants)",
        path.display(),
        playlist.variants.len()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hls::types::Variant;
    use hl_core::QualityCatalog;

    fn resolve(names: &[&str]) -> ResolvedQualitySet {
        QualityCatalog::builtin().resolve(Some(names)).unwrap()
    }

    #[test]
    fn test_generate_master_playlist_basic() {
        let playlist = MasterPlaylist {
            variants: vec![
                Variant {
                    bandwidth: 5_000_000,
                    resolution: (1920, 1080),
                    uri: "1080p.m3u8".to_string(),
                },
                Variant {
                    bandwidth: 2_800_000,
                    resolution: (1280, 720),
                    uri: "720p.m3u8".to_string(),
                },
            ],
        };

        let m3u8 = generate_master_playlist(&playlist);

        assert!(m3u8.starts_with("#EXTM3U\n"));
        assert!(m3u8.contains("BANDWIDTH=5000000,RESOLUTION=1920x1080\n1080p.m3u8\n"));
        assert!(m3u8.contains("BANDWIDTH=2800000,RESOLUTION=1280x720\n720p.m3u8\n"));
    }

    #[test]
    fn test_generate_master_playlist_empty() {
        let m3u8 = generate_master_playlist(&MasterPlaylist::default());
        assert_eq!(m3u8, "#EXTM3U\n");
    }

    #[test]
    fn variant_scales_kilobits() {
        let profile = QualityCatalog::builtin().get("360").unwrap().clone();
        let variant = Variant::from_profile(&profile).unwrap();
        assert_eq!(variant.bandwidth, 800_000);
        assert_eq!(variant.resolution, (640, 360));
        assert_eq!(variant.uri, "360p.m3u8");
    }

    #[test]
    fn write_exact_master_for_360_and_720() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_master_manifest(dir.path(), &resolve(&["360", "720"])).unwrap();

        assert_eq!(path, dir.path().join("master.m3u8"));
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "#EXTM3U\n\
             #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
             360p.m3u8\n\
             #EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720\n\
             720p.m3u8\n"
        );
    }

    #[test]
    fn order_follows_catalog_not_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_master_manifest(dir.path(), &resolve(&["720", "360"])).unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        let p360 = contents.find("360p.m3u8").unwrap();
        let p720 = contents.find("720p.m3u8").unwrap();
        assert!(p360 < p720);
    }

    #[test]
    fn write_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("master.m3u8"), "stale content that is long").unwrap();

        write_master_manifest(dir.path(), &resolve(&["120"])).unwrap();
        let contents = std::fs::read_to_string(dir.path().join("master.m3u8")).unwrap();
        assert!(!contents.contains("stale"));
        assert!(contents.contains("120p.m3u8"));
    }

    #[test]
    fn write_to_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let err = write_master_manifest(&missing, &resolve(&["360"])).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn write_is_deterministic() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let set = resolve(&["120", "240", "480"]);
        let pa = write_master_manifest(a.path(), &set).unwrap();
        let pb = write_master_manifest(b.path(), &set).unwrap();
        assert_eq!(
            std::fs::read_to_string(pa).unwrap(),
            std::fs::read_to_string(pb).unwrap()
        );
    }
}
