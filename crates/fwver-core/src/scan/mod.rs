//! Recognition cascade for locating an embedded version string.
//!
//! Firmware images have no guaranteed internal structure beyond embedded
//! ASCII fragments, so the version is located heuristically:
//!
//! 1. [`TaggedMarker`]: an explicit `OTT_FW_VERSION=` tag, authoritative
//! 2. [`VersionToken`]: a generic version-shaped token (`3.0-rebuild`, `v1.2.3`)
//! 3. [`LabeledFallback`]: a `FIRMWARE_VERSION` label with the version nearby
//!
//! Strategies run in that fixed order; the first validated candidate wins,
//! and within a strategy candidates are considered in ascending byte-offset
//! order. Exhausting all three is the ordinary [`Error::VersionNotFound`]
//! outcome, not a fault.
//!
//! ## Extensibility
//!
//! The [`ExtractStrategy`] trait allows custom recognition strategies:
//!
//! ```no_run
//! use fwver_core::scan::{Candidate, ExtractStrategy, StrategyKind};
//!
//! struct CustomStrategy;
//!
//! impl ExtractStrategy for CustomStrategy {
//!     fn kind(&self) -> StrategyKind {
//!         StrategyKind::VersionToken
//!     }
//!
//!     fn candidates(&self, image: &[u8]) -> Vec<Candidate> {
//!         // Custom recognition logic
//!         Vec::new()
//!     }
//! }
//! ```

mod strategies;

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;
use tracing::{debug, trace};

pub use strategies::{LabeledFallback, TaggedMarker, VersionToken};

/// Tag the build system bakes into the image's version section
const DEFAULT_MARKER: &[u8] = b"OTT_FW_VERSION=";

/// Label carried by older images as a plain string constant
const DEFAULT_LABEL: &[u8] = b"FIRMWARE_VERSION";

/// How far past the label the fallback searches for a numeric run
const DEFAULT_LABEL_WINDOW: usize = 256;

/// Identifies which recognition strategy produced a candidate.
///
/// The kind also selects the acceptance rule the dispatcher applies: tagged
/// and labeled candidates carry their own evidence of intent, while generic
/// tokens must look like a version to be believed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Explicit `OTT_FW_VERSION=` tag
    TaggedMarker,
    /// Bare version-shaped token
    VersionToken,
    /// `FIRMWARE_VERSION` label followed by a numeric run
    LabeledFallback,
}

/// A byte range of the image provisionally identified as a version string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Decoded, whitespace-trimmed text form
    pub text: String,
    /// Byte range in the original image where this was found
    pub range: Range<usize>,
    /// Strategy that produced this candidate
    pub origin: StrategyKind,
}

impl Candidate {
    /// Creates a candidate from a raw byte range of the image.
    ///
    /// Decoding is best-effort UTF-8: the image is untrusted binary data,
    /// so invalid sequences are replaced rather than propagated as errors.
    pub fn from_raw(raw: &[u8], range: Range<usize>, origin: StrategyKind) -> Self {
        let text = String::from_utf8_lossy(raw).trim().to_string();
        Self {
            text,
            range,
            origin,
        }
    }

    /// Returns the decoded text
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Trait for implementing version recognition strategies.
///
/// Each strategy is one self-contained byte-level heuristic over the raw
/// image, tolerant of the others' absence. Candidates are returned in
/// ascending byte-offset order; the dispatcher validates them and takes
/// the first accepted one.
pub trait ExtractStrategy: Send + Sync {
    /// Identifies this strategy, selecting its acceptance rule
    fn kind(&self) -> StrategyKind;

    /// Scan the image and return zero or more raw candidates
    fn candidates(&self, image: &[u8]) -> Vec<Candidate>;
}

/// Configuration for the extractor
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Tag scanned for by the tagged-marker strategy
    pub marker: Vec<u8>,
    /// Label scanned for by the labeled-fallback strategy
    pub label: Vec<u8>,
    /// Forward search bound past the label, in bytes
    pub label_window: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_vec(),
            label: DEFAULT_LABEL.to_vec(),
            label_window: DEFAULT_LABEL_WINDOW,
        }
    }
}

impl ExtractorConfig {
    /// Creates a new extractor config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tag marker bytes
    pub fn marker(mut self, marker: impl Into<Vec<u8>>) -> Self {
        self.marker = marker.into();
        self
    }

    /// Sets the fallback label bytes
    pub fn label(mut self, label: impl Into<Vec<u8>>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the forward search bound past the label
    pub fn label_window(mut self, window: usize) -> Self {
        self.label_window = window;
        self
    }
}

/// Priority-ordered dispatcher over the recognition strategies.
///
/// The extraction is a pure computation over the immutable image buffer:
/// deterministic, idempotent, linear in image size.
pub struct Extractor {
    strategies: Vec<Box<dyn ExtractStrategy>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    /// Creates an extractor with the default strategy cascade
    pub fn new() -> Self {
        Self::with_config(ExtractorConfig::default())
    }

    /// Creates an extractor with custom configuration
    pub fn with_config(config: ExtractorConfig) -> Self {
        let strategies: Vec<Box<dyn ExtractStrategy>> = vec![
            Box::new(TaggedMarker::new(config.marker)),
            Box::new(VersionToken::new()),
            Box::new(LabeledFallback::new(config.label, config.label_window)),
        ];
        Self { strategies }
    }

    /// Creates an extractor from an explicit strategy list.
    ///
    /// Strategies run in the given order; the first accepted candidate wins.
    pub fn with_strategies(strategies: Vec<Box<dyn ExtractStrategy>>) -> Self {
        Self { strategies }
    }

    /// Runs the cascade over the image and returns the first accepted
    /// candidate in strategy priority order.
    pub fn extract(&self, image: &[u8]) -> Result<Candidate> {
        debug!("Starting extraction over {} bytes", image.len());

        for strategy in &self.strategies {
            let candidates = strategy.candidates(image);
            trace!(
                "{:?} produced {} candidate(s)",
                strategy.kind(),
                candidates.len()
            );

            for candidate in candidates {
                if is_acceptable(&candidate) {
                    debug!(
                        "Accepted {:?} candidate '{}' at {}..{}",
                        candidate.origin, candidate.text, candidate.range.start, candidate.range.end
                    );
                    return Ok(candidate);
                }
                trace!(
                    "Rejected {:?} candidate at offset {}",
                    candidate.origin,
                    candidate.range.start
                );
            }
        }

        debug!("All strategies exhausted without an accepted candidate");
        Err(Error::VersionNotFound)
    }
}

/// Shape a generic token must begin with to be accepted
static MAJOR_MINOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\d+").unwrap());

/// Acceptance rule, keyed by the candidate's originating strategy.
///
/// Tagged and labeled candidates pass on any non-empty text. Generic tokens
/// must begin with a major.minor numeric pair: bare numeric-dot runs are
/// common in binaries (timestamps, addresses, embedded IPs), and this check
/// rather than pattern specificity is what keeps false positives low.
fn is_acceptable(candidate: &Candidate) -> bool {
    if candidate.text.is_empty() {
        return false;
    }
    match candidate.origin {
        StrategyKind::VersionToken => MAJOR_MINOR.is_match(&candidate.text),
        StrategyKind::TaggedMarker | StrategyKind::LabeledFallback => true,
    }
}

/// Extract a version string from a firmware image on disk.
///
/// This is a convenience function that reads the file and runs the default
/// cascade. A read failure is reported as [`Error::FileRead`], distinct
/// from [`Error::VersionNotFound`].
pub fn extract_file(path: impl AsRef<std::path::Path>) -> Result<Candidate> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
    Extractor::new().extract(&data)
}

/// Extract a version string from an image on disk with custom configuration
pub fn extract_file_with_config(
    path: impl AsRef<std::path::Path>,
    config: ExtractorConfig,
) -> Result<Candidate> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
    Extractor::with_config(config).extract(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_tagged_marker_beats_numeric_noise() {
        // An IP-shaped token earlier in the image must not shadow the tag.
        let image = b"\x7fELF\x01 10.0.0.1 \x00junk OTT_FW_VERSION=2.4-rc1\x00trailer";
        let candidate = Extractor::new().extract(image).unwrap();
        assert_eq!(candidate.text, "2.4-rc1");
        assert_eq!(candidate.origin, StrategyKind::TaggedMarker);
    }

    #[test]
    fn test_tagged_marker_first_occurrence_wins() {
        let image = b"OTT_FW_VERSION=1.0\x00padding OTT_FW_VERSION=9.9\x00";
        let candidate = Extractor::new().extract(image).unwrap();
        assert_eq!(candidate.text, "1.0");
    }

    #[test]
    fn test_tagged_marker_value_is_authoritative() {
        // The tag is the proof of intent: no shape check on its value.
        let image = b"OTT_FW_VERSION=nightly-build\x00";
        let candidate = Extractor::new().extract(image).unwrap();
        assert_eq!(candidate.text, "nightly-build");
        assert_eq!(candidate.origin, StrategyKind::TaggedMarker);
    }

    #[test]
    fn test_tagged_marker_trims_whitespace() {
        let image = b"OTT_FW_VERSION=  3.1 \x00";
        let candidate = Extractor::new().extract(image).unwrap();
        assert_eq!(candidate.text, "3.1");
    }

    #[test]
    fn test_empty_tag_value_falls_through() {
        // A tag with nothing before the terminator is rejected by the
        // validator and the cascade continues.
        let image = b"OTT_FW_VERSION=\x00 v2.1-rc1 ";
        let candidate = Extractor::new().extract(image).unwrap();
        assert_eq!(candidate.text, "2.1-rc1");
        assert_eq!(candidate.origin, StrategyKind::VersionToken);
    }

    #[test]
    fn test_tag_at_end_of_image() {
        let image = b"no terminator here OTT_FW_VERSION=";
        let err = Extractor::new().extract(image).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_generic_token_plain() {
        let image = b"\x00\x01\x02 firmware 3.0-rebuild \xff\xfe";
        let candidate = Extractor::new().extract(image).unwrap();
        assert_eq!(candidate.text, "3.0-rebuild");
        assert_eq!(candidate.origin, StrategyKind::VersionToken);
    }

    #[test]
    fn test_generic_token_v_prefix_excluded() {
        let image = b"v3.0-rebuild";
        let candidate = Extractor::new().extract(image).unwrap();
        assert_eq!(candidate.text, "3.0-rebuild");
    }

    #[test]
    fn test_generic_token_offset_order() {
        let image = b"first 7.7.7 then 1.2.3";
        let candidate = Extractor::new().extract(image).unwrap();
        assert_eq!(candidate.text, "7.7.7");
    }

    #[test]
    fn test_labeled_fallback() {
        let image = b"strings table FIRMWARE_VERSION build 2.5.1\x00";
        let candidate = Extractor::new().extract(image).unwrap();
        assert_eq!(candidate.text, "2.5.1");
    }

    #[test]
    fn test_labeled_fallback_when_token_shape_fails() {
        // No dot anywhere, so the generic strategy has nothing; the label
        // still anchors the dash-separated run.
        let image = b"FIRMWARE_VERSION rev 2-5-1\x00";
        let candidate = Extractor::new().extract(image).unwrap();
        assert_eq!(candidate.text, "2-5-1");
        assert_eq!(candidate.origin, StrategyKind::LabeledFallback);
    }

    #[test]
    fn test_empty_image_not_found() {
        let err = Extractor::new().extract(&[]).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_garbage_image_not_found() {
        let image: Vec<u8> = (0..=255u8).filter(|b| !b.is_ascii_digit()).collect();
        let err = Extractor::new().extract(&image).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let image = b"OTT_FW_VERSION=4.2.0\x00 and 9.9.9 elsewhere";
        let extractor = Extractor::new();
        let first = extractor.extract(image).unwrap();
        let second = extractor.extract(image).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_utf8_is_absorbed() {
        let image = b"OTT_FW_VERSION=3.\xff1\x00";
        let candidate = Extractor::new().extract(image).unwrap();
        assert!(candidate.text.starts_with("3."));
    }

    #[test]
    fn test_custom_marker() {
        let config = ExtractorConfig::new().marker(&b"ACME_VER="[..]);
        let extractor = Extractor::with_config(config);
        let image = b"ACME_VER=5.0-beta\x00 OTT_FW_VERSION=1.0\x00";
        let candidate = extractor.extract(image).unwrap();
        assert_eq!(candidate.text, "5.0-beta");
    }

    #[test]
    fn test_extractor_config_builder() {
        let config = ExtractorConfig::new()
            .marker(&b"TAG="[..])
            .label(&b"VER"[..])
            .label_window(64);

        assert_eq!(config.marker, b"TAG=");
        assert_eq!(config.label, b"VER");
        assert_eq!(config.label_window, 64);
    }

    #[test]
    fn test_extract_file_missing_path() {
        let err = extract_file("/nonexistent/path/fw.bin").unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_extract_file_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"\x00\x01OTT_FW_VERSION=6.1.4\x00\xde\xad")
            .unwrap();
        let candidate = extract_file(file.path()).unwrap();
        assert_eq!(candidate.text, "6.1.4");
    }
}
