//! Test discovery: source scanning and test location
//!
//! Discovery is the read-only phase of a run. The scanner resolves the CLI
//! target into an ordered list of test files (plus an optional single-test
//! filter for compound `<file>::<test-id>` targets); the locator then
//! extracts test nodes from each file.
//!
//! ## Modules
//!
//! - `source` - [`SourceUnit`] and the declaration scanner
//! - `locator` - function tests and docstring suites

pub mod locator;
pub mod source;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::ident::TestId;
use locator::LocatedTests;
use source::SourceUnit;

/// Pavo source file extension.
pub const SOURCE_EXT: &str = "pv";

/// A directory containing this file is a package, and packages are not test
/// targets: the whole directory is excluded from the scan.
pub const PACKAGE_MARKER: &str = "__init__.pv";

/// Errors raised while locating tests.
///
/// A discovery error aborts discovery for the affected source unit only;
/// sibling units continue. It is reported as a diagnostic, not a test
/// failure, and makes the run exit non-zero.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid test target '{0}': expected a directory, a test_*.pv / *_test.pv file, or a test ID")]
    InvalidTestTarget(String),

    #[error("{file}:{line}: unterminated ```pavo block in docstring of {symbol}")]
    MalformedDocBlock {
        file: PathBuf,
        /// Suite tag of the enclosing symbol (`__doc__` or `Sym.__doc__`).
        symbol: String,
        /// 1-based line of the opening fence.
        line: u32,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What the scanner resolved a CLI target into.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// Test files to parse, sorted for deterministic runs.
    pub files: Vec<PathBuf>,
    /// When the target was a compound `<file>::<test-id>`, restricts
    /// execution and reporting to that single test.
    pub filter: Option<TestId>,
    /// Root used for the reporter's directory grouping.
    pub root: PathBuf,
}

/// A source unit together with the tests located in it.
#[derive(Debug)]
pub struct DiscoveredUnit {
    pub unit: SourceUnit,
    pub tests: LocatedTests,
}

impl DiscoveredUnit {
    /// Load, scan, and locate tests in one file.
    pub fn load(path: &Path) -> Result<DiscoveredUnit, DiscoveryError> {
        let unit = SourceUnit::load(path)?;
        let tests = locator::locate(&unit)?;
        Ok(DiscoveredUnit { unit, tests })
    }
}

/// True when the file name follows the test-file naming convention
/// (`test_*.pv` or `*_test.pv`).
pub fn is_test_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(&format!(".{SOURCE_EXT}"))
        && (name.starts_with("test_") || name.ends_with(&format!("_test.{SOURCE_EXT}")))
}

/// Resolve a CLI target into a scan request.
///
/// The target is, in order of preference: an existing directory (recursive
/// scan), an existing test file, or a compound test ID whose file part
/// exists. Anything else is an [`DiscoveryError::InvalidTestTarget`].
pub fn scan_target(target: &str) -> Result<ScanRequest, DiscoveryError> {
    let path = Path::new(target);

    if path.is_dir() {
        let mut files = Vec::new();
        walk_dir(path, &mut files)?;
        files.sort();
        tracing::debug!(target = %path.display(), files = files.len(), "scanned directory");
        return Ok(ScanRequest {
            files,
            filter: None,
            root: path.to_path_buf(),
        });
    }

    if path.is_file() {
        if !is_test_file(path) {
            return Err(DiscoveryError::InvalidTestTarget(target.to_string()));
        }
        return Ok(ScanRequest {
            files: vec![path.to_path_buf()],
            filter: None,
            root: parent_of(path),
        });
    }

    // Not a path on disk: try to parse it as a test ID.
    if let Some(id) = TestId::parse(target) {
        let file = id.file().to_path_buf();
        if file.is_file() && is_test_file(&file) {
            return Ok(ScanRequest {
                root: parent_of(&file),
                files: vec![file],
                filter: Some(id),
            });
        }
    }

    Err(DiscoveryError::InvalidTestTarget(target.to_string()))
}

fn parent_of(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Depth-first directory walk collecting test files. A directory holding a
/// package marker is skipped entirely, as are hidden directories.
fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), DiscoveryError> {
    if dir.join(PACKAGE_MARKER).is_file() {
        tracing::debug!(dir = %dir.display(), "skipping package directory");
        return Ok(());
    }

    let entries = fs::read_dir(dir).map_err(|e| DiscoveryError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    for entry in entries.flatten() {
        let entry_path = entry.path();
        if entry_path.is_dir() {
            let name = entry_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if !name.starts_with('.') && name != "target" {
                walk_dir(&entry_path, files)?;
            }
        } else if is_test_file(&entry_path) {
            files.push(entry_path);
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
