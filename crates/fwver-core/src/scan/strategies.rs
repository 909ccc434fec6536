//! The three built-in recognition strategies.
//!
//! Each strategy defines one byte-level recognition rule and extraction
//! procedure over the raw image. They share the [`ExtractStrategy`]
//! interface and are independently testable; the dispatcher owns the
//! priority order and the acceptance rules.

use once_cell::sync::Lazy;
use regex::bytes::Regex;
use tracing::trace;

use super::{Candidate, ExtractStrategy, StrategyKind};

/// Strategy A: explicit version tag baked into the image.
///
/// The build links a dedicated version section containing
/// `OTT_FW_VERSION=<version>\0`. Everything between the tag and the next
/// null byte (or end of image) is captured. Only the first occurrence of
/// the tag is used; later occurrences are ignored.
#[derive(Debug, Clone)]
pub struct TaggedMarker {
    marker: Vec<u8>,
}

impl TaggedMarker {
    /// Creates the strategy with the given tag marker bytes
    pub fn new(marker: impl Into<Vec<u8>>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl ExtractStrategy for TaggedMarker {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TaggedMarker
    }

    fn candidates(&self, image: &[u8]) -> Vec<Candidate> {
        let Some(pos) = find_subsequence(image, &self.marker) else {
            return Vec::new();
        };

        let start = pos + self.marker.len();
        let end = image[start..]
            .iter()
            .position(|&b| b == 0x00)
            .map(|i| start + i)
            .unwrap_or(image.len());

        trace!("Tag at offset {}, value bytes {}..{}", pos, start, end);

        vec![Candidate::from_raw(
            &image[start..end],
            start..end,
            StrategyKind::TaggedMarker,
        )]
    }
}

/// Bare token shape: major.minor followed by an optional suffix
static PLAIN_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)\d+\.\d+[-.\w]*").unwrap());

/// The same shape behind a literal `v`; only the numeric part is captured
static V_PREFIXED_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)v(\d+\.\d+[-.\w]*)").unwrap());

/// Strategy B: generic version-looking token anywhere in the image.
///
/// Matches a run of digits, a dot, more digits and an optional `[-.\w]`
/// suffix, first bare and then behind a `v` prefix. All non-overlapping
/// matches are reported in ascending offset order, bare matches before
/// `v`-prefixed ones; the dispatcher's shape check filters out the numeric
/// noise and the first survivor wins.
#[derive(Debug, Clone, Default)]
pub struct VersionToken;

impl VersionToken {
    /// Creates the strategy
    pub fn new() -> Self {
        Self
    }
}

impl ExtractStrategy for VersionToken {
    fn kind(&self) -> StrategyKind {
        StrategyKind::VersionToken
    }

    fn candidates(&self, image: &[u8]) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for m in PLAIN_TOKEN.find_iter(image) {
            candidates.push(Candidate::from_raw(
                m.as_bytes(),
                m.range(),
                StrategyKind::VersionToken,
            ));
        }

        // The `v` is evidence, not part of the version: the reported text
        // is the capture group alone.
        for caps in V_PREFIXED_TOKEN.captures_iter(image) {
            if let Some(m) = caps.get(1) {
                candidates.push(Candidate::from_raw(
                    m.as_bytes(),
                    m.range(),
                    StrategyKind::VersionToken,
                ));
            }
        }

        trace!("Token scan produced {} candidate(s)", candidates.len());
        candidates
    }
}

/// Strategy C: `FIRMWARE_VERSION` label with the version nearby.
///
/// Older images carry the label as a plain string constant with the version
/// a few bytes further on. From the first occurrence of the label, the
/// first subsequent run of digits, dots and dashes is the candidate. The
/// forward search is bounded by `window` bytes and never crosses a null
/// byte: the label and its version live in the same string constant.
#[derive(Debug, Clone)]
pub struct LabeledFallback {
    label: Vec<u8>,
    window: usize,
}

impl LabeledFallback {
    /// Creates the strategy with the given label and search window
    pub fn new(label: impl Into<Vec<u8>>, window: usize) -> Self {
        Self {
            label: label.into(),
            window,
        }
    }
}

impl ExtractStrategy for LabeledFallback {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LabeledFallback
    }

    fn candidates(&self, image: &[u8]) -> Vec<Candidate> {
        let Some(pos) = find_subsequence(image, &self.label) else {
            return Vec::new();
        };

        let search_start = pos + self.label.len();
        let search_end = search_start.saturating_add(self.window).min(image.len());

        let region_end = image[search_start..search_end]
            .iter()
            .position(|&b| b == 0x00)
            .map(|i| search_start + i)
            .unwrap_or(search_end);

        let region = &image[search_start..region_end];
        let Some(rel_start) = region.iter().position(|&b| is_version_byte(b)) else {
            return Vec::new();
        };
        let rel_end = region[rel_start..]
            .iter()
            .position(|&b| !is_version_byte(b))
            .map(|i| rel_start + i)
            .unwrap_or(region.len());

        let start = search_start + rel_start;
        let end = search_start + rel_end;

        trace!("Label at offset {}, numeric run {}..{}", pos, start, end);

        vec![Candidate::from_raw(
            &image[start..end],
            start..end,
            StrategyKind::LabeledFallback,
        )]
    }
}

/// Bytes a labeled version run is composed of
fn is_version_byte(b: u8) -> bool {
    b.is_ascii_digit() || b == b'.' || b == b'-'
}

/// Find a subsequence within a byte slice
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
