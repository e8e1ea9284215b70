//! Quality catalog and subset resolution.
//!
//! A [`QualityCatalog`] is an ordered lookup table of [`QualityProfile`]s.
//! Insertion order is display order and the order variants appear in the
//! master manifest; it is not a ranking by bitrate. The built-in ladder is a
//! process-wide constant; callers override it by supplying a full
//! replacement, never by patching it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Quality names selected when a request names none.
pub const DEFAULT_QUALITY_NAMES: &[&str] = &["120", "240", "360", "480", "720"];

/// File name of the master playlist inside a run directory.
pub const MASTER_MANIFEST_FILENAME: &str = "master.m3u8";

/// Encoding parameters and output file names for one stream variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityProfile {
    /// Short unique identifier, e.g. `"720"`.
    pub name: String,
    /// Target resolution as `WIDTHxHEIGHT`.
    pub resolution: String,
    /// Target video bitrate in ffmpeg notation, e.g. `"800k"`.
    pub bitrate: String,
    /// Rate-control ceiling (`-maxrate`).
    pub max_bitrate: String,
    /// Rate-control buffer (`-bufsize`).
    pub buffer_size: String,
    /// File name of this quality's media playlist.
    pub manifest_filename: String,
    /// Segment file name with one printf-style sequence placeholder.
    pub segment_filename_pattern: String,
}

impl QualityProfile {
    /// Target bitrate in bits per second, as advertised in `BANDWIDTH=`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProfile`] if the bitrate cannot be parsed.
    pub fn bandwidth_bps(&self) -> Result<u64> {
        parse_bitrate(&self.bitrate).ok_or_else(|| {
            Error::InvalidProfile(format!(
                "quality {}: bitrate '{}' is not a valid bitrate",
                self.name, self.bitrate
            ))
        })
    }

    /// Target `(width, height)` in pixels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProfile`] if the resolution is not `WxH`.
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        parse_resolution(&self.resolution).ok_or_else(|| {
            Error::InvalidProfile(format!(
                "quality {}: resolution '{}' is not WIDTHxHEIGHT",
                self.name, self.resolution
            ))
        })
    }

    fn fields(&self) -> [(&'static str, &str); 7] {
        [
            ("name", self.name.as_str()),
            ("resolution", self.resolution.as_str()),
            ("bitrate", self.bitrate.as_str()),
            ("max_bitrate", self.max_bitrate.as_str()),
            ("buffer_size", self.buffer_size.as_str()),
            ("manifest_filename", self.manifest_filename.as_str()),
            ("segment_filename_pattern", self.segment_filename_pattern.as_str()),
        ]
    }

    fn validate(&self, index: usize) -> Result<()> {
        for (field, value) in self.fields() {
            if value.trim().is_empty() {
                return Err(Error::InvalidProfile(format!(
                    "profile #{index} ('{}') is missing required field `{field}`",
                    self.name
                )));
            }
        }

        self.dimensions()?;
        self.bandwidth_bps()?;
        for (field, value) in [
            ("max_bitrate", &self.max_bitrate),
            ("buffer_size", &self.buffer_size),
        ] {
            if parse_bitrate(value).is_none() {
                return Err(Error::InvalidProfile(format!(
                    "quality {}: {field} '{value}' is not a valid bitrate",
                    self.name
                )));
            }
        }

        for (field, value) in [
            ("manifest_filename", &self.manifest_filename),
            ("segment_filename_pattern", &self.segment_filename_pattern),
        ] {
            if value.contains(['/', '\\']) {
                return Err(Error::InvalidProfile(format!(
                    "quality {}: {field} '{value}' must be a bare file name",
                    self.name
                )));
            }
        }

        if self.manifest_filename == MASTER_MANIFEST_FILENAME {
            return Err(Error::InvalidProfile(format!(
                "quality {}: manifest_filename may not be {MASTER_MANIFEST_FILENAME}",
                self.name
            )));
        }

        let placeholders = count_sequence_placeholders(&self.segment_filename_pattern);
        if placeholders != 1 {
            return Err(Error::InvalidProfile(format!(
                "quality {}: segment_filename_pattern '{}' must contain exactly one \
                 sequence placeholder (found {placeholders})",
                self.name, self.segment_filename_pattern
            )));
        }

        Ok(())
    }
}

/// An ordered, validated table of quality profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QualityCatalog {
    profiles: Vec<QualityProfile>,
}

impl QualityCatalog {
    /// Build a catalog from caller-supplied profiles, validating them.
    ///
    /// An empty catalog is valid; resolving against it can only fail.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProfile`] on the first malformed profile or
    /// repeated name / output file name.
    pub fn new(profiles: Vec<QualityProfile>) -> Result<Self> {
        validate(&profiles)?;
        Ok(Self { profiles })
    }

    /// The built-in 13-entry ladder (120p through 2160p).
    pub fn builtin() -> Self {
        let profiles = BUILTIN_LADDER
            .iter()
            .map(|entry| entry.to_profile())
            .collect();
        Self { profiles }
    }

    /// Parse a replacement catalog from a JSON array of profiles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the JSON is malformed and
    /// [`Error::InvalidProfile`] if a profile is.
    pub fn from_json(json: &str) -> Result<Self> {
        let profiles: Vec<QualityProfile> = serde_json::from_str(json)
            .map_err(|e| Error::Validation(format!("catalog parse error: {e}")))?;
        Self::new(profiles)
    }

    /// Profiles in catalog order.
    pub fn profiles(&self) -> &[QualityProfile] {
        &self.profiles
    }

    /// Profile names in catalog order.
    pub fn names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }

    /// Look up a profile by name.
    pub fn get(&self, name: &str) -> Option<&QualityProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Select the profiles to encode for one run.
    ///
    /// With no requested names the fixed default subset
    /// ([`DEFAULT_QUALITY_NAMES`]) is used, filtered against this catalog.
    /// Explicit names must all exist. The result keeps catalog order, not
    /// request order, and never contains duplicates.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRequest`] if an explicit name is unknown; the
    ///   message lists every valid name.
    /// - [`Error::EmptySelection`] if nothing was selected.
    pub fn resolve<S: AsRef<str>>(&self, requested: Option<&[S]>) -> Result<ResolvedQualitySet> {
        let wanted: HashSet<&str> = match requested {
            Some(names) if !names.is_empty() => {
                let valid = self.names();
                for name in names {
                    let name = name.as_ref();
                    if !valid.contains(&name) {
                        return Err(Error::unknown_quality(name, &valid));
                    }
                }
                names.iter().map(AsRef::as_ref).collect()
            }
            _ => DEFAULT_QUALITY_NAMES.iter().copied().collect(),
        };

        let profiles: Vec<QualityProfile> = self
            .profiles
            .iter()
            .filter(|p| wanted.contains(p.name.as_str()))
            .cloned()
            .collect();

        if profiles.is_empty() {
            return Err(Error::EmptySelection);
        }

        Ok(ResolvedQualitySet { profiles })
    }
}

impl Default for QualityCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Check a list of profiles for missing fields and duplicate names.
///
/// Processing stops at the first violation.
///
/// # Errors
///
/// Returns [`Error::InvalidProfile`] describing the violation.
pub fn validate(profiles: &[QualityProfile]) -> Result<()> {
    let mut names = HashSet::new();
    let mut files = HashSet::new();

    for (index, profile) in profiles.iter().enumerate() {
        profile.validate(index)?;

        if !names.insert(profile.name.as_str()) {
            return Err(Error::InvalidProfile(format!(
                "duplicate quality name '{}'",
                profile.name
            )));
        }
        for file in [&profile.manifest_filename, &profile.segment_filename_pattern] {
            if !files.insert(file.as_str()) {
                return Err(Error::InvalidProfile(format!(
                    "quality {}: output file name '{file}' is used by another profile",
                    profile.name
                )));
            }
        }
    }

    Ok(())
}

/// The non-empty, catalog-ordered set of profiles chosen for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedQualitySet {
    profiles: Vec<QualityProfile>,
}

impl ResolvedQualitySet {
    pub fn profiles(&self) -> &[QualityProfile] {
        &self.profiles
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QualityProfile> {
        self.profiles.iter()
    }

    pub fn into_profiles(self) -> Vec<QualityProfile> {
        self.profiles
    }
}

impl<'a> IntoIterator for &'a ResolvedQualitySet {
    type Item = &'a QualityProfile;
    type IntoIter = std::slice::Iter<'a, QualityProfile>;

    fn into_iter(self) -> Self::IntoIter {
        self.profiles.iter()
    }
}

/// Parse ffmpeg bitrate notation (`800k`, `5M`, `2.5m`, `96000`) into
/// bits per second. Returns `None` for zero, negative or malformed values.
pub fn parse_bitrate(value: &str) -> Option<u64> {
    let value = value.trim();
    let (number, multiplier) = match value.char_indices().last()? {
        (i, 'k' | 'K') => (&value[..i], 1_000.0),
        (i, 'm' | 'M') => (&value[..i], 1_000_000.0),
        _ => (value, 1.0),
    };
    let number: f64 = number.parse().ok()?;
    let bps = (number * multiplier).round();
    if !bps.is_finite() || bps < 1.0 {
        return None;
    }
    Some(bps as u64)
}

/// Parse `WIDTHxHEIGHT` into a pair of non-zero dimensions.
pub fn parse_resolution(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.trim().split_once(['x', 'X'])?;
    let w: u32 = w.parse().ok()?;
    let h: u32 = h.parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

/// Count printf-style integer placeholders (`%d`, `%03d`) in a pattern.
/// `%%` is a literal percent sign.
fn count_sequence_placeholders(pattern: &str) -> usize {
    let mut count = 0;
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            continue;
        }
        while chars.peek().is_some_and(char::is_ascii_digit) {
            chars.next();
        }
        if chars.peek() == Some(&'d') {
            chars.next();
            count += 1;
        }
    }
    count
}

// ---------------------------------------------------------------------------
// Built-in ladder
// ---------------------------------------------------------------------------

struct LadderEntry {
    name: &'static str,
    resolution: &'static str,
    bitrate: &'static str,
    max_bitrate: &'static str,
    buffer_size: &'static str,
    file_stem: &'static str,
}

impl LadderEntry {
    fn to_profile(&self) -> QualityProfile {
        QualityProfile {
            name: self.name.to_string(),
            resolution: self.resolution.to_string(),
            bitrate: self.bitrate.to_string(),
            max_bitrate: self.max_bitrate.to_string(),
            buffer_size: self.buffer_size.to_string(),
            manifest_filename: format!("{}.m3u8", self.file_stem),
            segment_filename_pattern: format!("{}_%03d.ts", self.file_stem),
        }
    }
}

macro_rules! ladder {
    ($( $name:literal => $res:literal, $br:literal, $max:literal, $buf:literal, $stem:literal; )+) => {
        &[ $( LadderEntry {
            name: $name,
            resolution: $res,
            bitrate: $br,
            max_bitrate: $max,
            buffer_size: $buf,
            file_stem: $stem,
        }, )+ ]
    };
}

// maxrate is 107% and bufsize 150% of the target bitrate throughout.
const BUILTIN_LADDER: &[LadderEntry] = ladder! {
    "120"  => "160x120",   "128k",   "137k",   "192k",   "120p";
    "160"  => "284x160",   "192k",   "205k",   "288k",   "160p";
    "240"  => "320x240",   "300k",   "321k",   "450k",   "240p";
    "180"  => "320x180",   "250k",   "268k",   "375k",   "180p";
    "240w" => "426x240",   "400k",   "428k",   "600k",   "240w";
    "270"  => "480x270",   "500k",   "535k",   "750k",   "270p";
    "360"  => "640x360",   "800k",   "856k",   "1200k",  "360p";
    "480"  => "842x480",   "1400k",  "1498k",  "2100k",  "480p";
    "540"  => "960x540",   "2000k",  "2140k",  "3000k",  "540p";
    "720"  => "1280x720",  "2800k",  "2996k",  "4200k",  "720p";
    "1080" => "1920x1080", "5000k",  "5350k",  "7500k",  "1080p";
    "1440" => "2560x1440", "8000k",  "8560k",  "12000k", "1440p";
    "2160" => "3840x2160", "14000k", "14980k", "21000k", "2160p";
};
