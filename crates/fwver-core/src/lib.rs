//! # fwver-core
//!
//! A library for extracting embedded version strings from compiled firmware images.
//!
//! A firmware image is an arbitrary byte blob with no structured version
//! manifest; when a version is present at all, it is an ASCII fragment
//! somewhere in the raw bytes. This crate locates it with a cascade of
//! independent byte-pattern heuristics, tried in fixed priority order:
//!
//! 1. [`TaggedMarker`]: an explicit `OTT_FW_VERSION=` tag, authoritative
//! 2. [`VersionToken`]: a generic version-shaped token (`3.0-rebuild`, `v1.2.3`)
//! 3. [`LabeledFallback`]: a `FIRMWARE_VERSION` label with the version nearby
//!
//! ## Architecture
//!
//! The library is organized into two modules:
//!
//! - [`scan`]: Recognition strategies, dispatcher and candidate validation
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use fwver_core::Extractor;
//! use std::fs;
//!
//! // Read a firmware image
//! let image = fs::read("./firmware.bin")?;
//!
//! // Run the recognition cascade
//! let extractor = Extractor::new();
//! let candidate = extractor.extract(&image)?;
//!
//! println!("{}", candidate.text);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! The [`ExtractStrategy`] trait allows plugging custom recognition
//! strategies into the cascade via [`Extractor::with_strategies`].

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod error;
pub mod scan;

// Re-export primary types for convenience
pub use error::{Error, Result};
pub use scan::{
    extract_file, extract_file_with_config, Candidate, ExtractStrategy, Extractor,
    ExtractorConfig, LabeledFallback, StrategyKind, TaggedMarker, VersionToken,
};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
