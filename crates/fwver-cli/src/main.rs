//! fwver - Extract embedded version strings from compiled firmware images
//!
//! This tool runs the recognition cascade from `fwver-core` over a single
//! image or a whole directory of build artifacts and reports what it finds,
//! as plain text or JSON.

use anyhow::{bail, Result};
use clap::{Args, Parser, ValueEnum};
use fwver_core::{Extractor, ExtractorConfig};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Exit status when no version was found in the image
const EXIT_NOT_FOUND: u8 = 1;
/// Exit status when the image could not be read
const EXIT_UNREADABLE: u8 = 2;

/// Extract embedded version strings from compiled firmware images
#[derive(Parser, Debug)]
#[command(name = "fwver")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Key name holding the version in JSON output
    #[arg(long, default_value = "version")]
    field: String,

    /// Tag marker scanned for by the tagged strategy
    #[arg(long, default_value = "OTT_FW_VERSION=")]
    marker: String,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single firmware image
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of firmware images to scan
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Output format for extraction results
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// The version string alone, nothing else
    Text,
    /// A JSON object keyed by --field
    Json,
}

/// Extensions firmware build output is typically packaged with
const FIRMWARE_EXTENSIONS: &[&str] = &["bin", "img", "fw", "rom", "elf", "dfu"];

/// Tracks scanned images for deduplication and the end-of-run summary
#[derive(Default)]
struct ScanLedger {
    /// Maps content hash -> first path seen with that content
    seen: HashMap<String, PathBuf>,
    /// Statistics
    stats: LedgerStats,
}

#[derive(Default)]
struct LedgerStats {
    scanned: usize,
    duplicates_skipped: usize,
    found: usize,
    missing: usize,
    unreadable: usize,
}

impl ScanLedger {
    fn new() -> Self {
        Self::default()
    }

    /// Compute a short hash of the image content (first 8 chars of blake3)
    fn content_hash(data: &[u8]) -> String {
        let hash = blake3::hash(data);
        hash.to_hex()[..8].to_string()
    }

    /// Returns the earlier path if this exact content was already scanned,
    /// recording the path otherwise
    fn check_duplicate(&mut self, hash: &str, path: &Path) -> Option<PathBuf> {
        match self.seen.get(hash) {
            Some(first) => Some(first.clone()),
            None => {
                self.seen.insert(hash.to_string(), path.to_path_buf());
                None
            }
        }
    }

    fn print_summary(&self) {
        info!(
            "Summary: {} scanned, {} duplicates skipped, {} versions found, {} without version, {} unreadable",
            self.stats.scanned,
            self.stats.duplicates_skipped,
            self.stats.found,
            self.stats.missing,
            self.stats.unreadable
        );
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(EXIT_UNREADABLE)
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = ExtractorConfig::new().marker(cli.marker.clone().into_bytes());
    let extractor = Extractor::with_config(config);

    // Dispatch based on input mode
    if let Some(ref file) = cli.input.file {
        process_single_image(cli, &extractor, file)
    } else if let Some(ref directory) = cli.input.directory {
        process_directory(cli, &extractor, directory)
    } else {
        bail!("Either --file or --directory must be specified")
    }
}

/// Process a single firmware image
fn process_single_image(cli: &Cli, extractor: &Extractor, file: &Path) -> Result<ExitCode> {
    if file.exists() && !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    trace!("Reading {}", file.display());
    let data = match fs::read(file) {
        Ok(data) => data,
        Err(e) => {
            let reason = format!("failed to read image '{}': {}", file.display(), e);
            report_failure(cli, &reason);
            return Ok(ExitCode::from(EXIT_UNREADABLE));
        }
    };

    debug!("Read {} bytes from {}", data.len(), file.display());

    match extractor.extract(&data) {
        Ok(candidate) => {
            debug!(
                "Version found by {:?} at offset {}",
                candidate.origin, candidate.range.start
            );
            match cli.format {
                OutputFormat::Text => println!("{}", candidate.text),
                OutputFormat::Json => {
                    println!("{}", json_payload(&cli.field, Some(&candidate.text), None));
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            report_failure(cli, &e.to_string());
            Ok(ExitCode::from(EXIT_NOT_FOUND))
        }
    }
}

/// Process a directory of firmware images recursively
fn process_directory(cli: &Cli, extractor: &Extractor, directory: &Path) -> Result<ExitCode> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut ledger = ScanLedger::new();

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        // Skip hidden files
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
        {
            continue;
        }

        if !is_likely_firmware(path) {
            trace!("Skipping non-firmware: {}", path.display());
            continue;
        }

        debug!("Scanning image: {}", path.display());
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                // Log and continue with other files
                warn!("Failed to read {}: {}", path.display(), e);
                ledger.stats.unreadable += 1;
                continue;
            }
        };

        let hash = ScanLedger::content_hash(&data);
        if let Some(first) = ledger.check_duplicate(&hash, path) {
            debug!(
                "Skipping {} (identical to {}, hash: {})",
                path.display(),
                first.display(),
                hash
            );
            ledger.stats.duplicates_skipped += 1;
            continue;
        }

        ledger.stats.scanned += 1;
        match extractor.extract(&data) {
            Ok(candidate) => {
                match cli.format {
                    OutputFormat::Text => println!("{}: {}", path.display(), candidate.text),
                    OutputFormat::Json => {
                        let mut payload = json_payload(&cli.field, Some(&candidate.text), None);
                        if let serde_json::Value::Object(ref mut map) = payload {
                            map.insert(
                                "path".to_string(),
                                serde_json::Value::String(path.display().to_string()),
                            );
                        }
                        println!("{}", payload);
                    }
                }
                ledger.stats.found += 1;
            }
            Err(e) => {
                trace!("No version in {}: {}", path.display(), e);
                ledger.stats.missing += 1;
            }
        }
    }

    ledger.print_summary();

    if ledger.stats.found > 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_NOT_FOUND))
    }
}

/// Heuristic to decide whether a file is worth scanning as a firmware image
fn is_likely_firmware(path: &Path) -> bool {
    // Tiny files can't hold a version tag; very large ones aren't images
    if let Ok(metadata) = fs::metadata(path) {
        let size = metadata.len();
        if size < 16 || size > 512 * 1024 * 1024 {
            return false;
        }
    }

    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            let ext = ext.to_lowercase();
            FIRMWARE_EXTENSIONS.contains(&ext.as_str())
        }
        // Raw dumps often carry no extension
        None => true,
    }
}

/// Build the JSON payload for a single extraction outcome
fn json_payload(field: &str, version: Option<&str>, error: Option<&str>) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    map.insert(
        field.to_string(),
        version.map_or(serde_json::Value::Null, |v| {
            serde_json::Value::String(v.to_string())
        }),
    );
    if let Some(error) = error {
        map.insert(
            "error".to_string(),
            serde_json::Value::String(error.to_string()),
        );
    }
    serde_json::Value::Object(map)
}

/// Report a failed extraction in the requested output mode.
///
/// In JSON mode the payload still goes to stdout with a null version and
/// an error field, so callers parsing the stream see the failure reason.
fn report_failure(cli: &Cli, reason: &str) {
    match cli.format {
        OutputFormat::Text => eprintln!("{}", reason),
        OutputFormat::Json => println!("{}", json_payload(&cli.field, None, Some(reason))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_json_payload_success() {
        let payload = json_payload("version", Some("3.0-rebuild"), None);
        assert_eq!(payload["version"], "3.0-rebuild");
        assert!(payload.get("error").is_none());
    }

    #[test]
    fn test_json_payload_failure() {
        let payload = json_payload("fw", None, Some("no version string found in image"));
        assert!(payload["fw"].is_null());
        assert_eq!(payload["error"], "no version string found in image");
    }

    #[test]
    fn test_content_hash_stable() {
        let hash1 = ScanLedger::content_hash(b"firmware bytes");
        let hash2 = ScanLedger::content_hash(b"firmware bytes");
        let hash3 = ScanLedger::content_hash(b"other bytes");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 8);
    }

    #[test]
    fn test_ledger_duplicate_detection() {
        let mut ledger = ScanLedger::new();
        let hash = ScanLedger::content_hash(b"image");

        assert!(ledger
            .check_duplicate(&hash, Path::new("/fw/a.bin"))
            .is_none());
        let first = ledger.check_duplicate(&hash, Path::new("/fw/b.bin"));
        assert_eq!(first, Some(PathBuf::from("/fw/a.bin")));
    }

    #[test]
    fn test_is_likely_firmware_extensions() {
        let dir = tempfile::TempDir::new().unwrap();

        let bin = dir.path().join("fw.bin");
        fs::File::create(&bin)
            .unwrap()
            .write_all(&[0u8; 64])
            .unwrap();
        assert!(is_likely_firmware(&bin));

        let txt = dir.path().join("notes.txt");
        fs::File::create(&txt)
            .unwrap()
            .write_all(&[0u8; 64])
            .unwrap();
        assert!(!is_likely_firmware(&txt));

        let raw = dir.path().join("dump");
        fs::File::create(&raw)
            .unwrap()
            .write_all(&[0u8; 64])
            .unwrap();
        assert!(is_likely_firmware(&raw));
    }

    #[test]
    fn test_is_likely_firmware_rejects_tiny_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let stub = dir.path().join("stub.bin");
        fs::File::create(&stub).unwrap().write_all(&[0u8; 4]).unwrap();
        assert!(!is_likely_firmware(&stub));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
