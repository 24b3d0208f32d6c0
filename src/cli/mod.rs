//! CLI for the Pavo test engine
//!
//! A single command surface: one positional target (directory, test file, or
//! compound `<file>::<test-id>`), repeatable `-I` search roots handed through
//! to the interpreter, `--collect-only` to stop after discovery, and
//! `--diagnostic-format` to pick text or JSON output.
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! `execute()` returns `CliResult<ExitCode>` instead of calling
//! `process::exit`; only the top-level `run()` handles errors and exits.
//! Exit codes: 0 all passed (or clean collection), 1 test failure or
//! discovery error, 2 malformed invocation or unreadable target.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::{Parser, ValueEnum};

use crate::discovery::{self, DiscoveredUnit};
use crate::execution::interpreter::{InterpreterExecutor, DEFAULT_INTERPRETER};
use crate::execution::{ExecutionEngine, FailureKind, Outcome, TestOutcome};
use crate::report::{self, FileReport, Totals};

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
    pub const USAGE: ExitCode = ExitCode(2);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }

    /// Create a usage error (exit code 2).
    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::USAGE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Output encoding for reports and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiagnosticFormat {
    Text,
    Json,
}

/// Test runner for the Pavo language
#[derive(Parser, Debug)]
#[command(name = "pavo-test")]
#[command(version = VERSION)]
#[command(about = "Discover and run Pavo unit tests and docstring tests", long_about = None)]
pub struct Cli {
    /// Directory, test file, or single test ID (`<file>::<test-id>`)
    #[arg(value_name = "TARGET", default_value = ".")]
    pub target: String,

    /// Additional module-resolution search root (repeatable); passed
    /// through to the interpreter unchanged
    #[arg(short = 'I', value_name = "PATH")]
    pub search_path: Vec<PathBuf>,

    /// Collect and list tests without executing them
    #[arg(long = "collect-only", visible_alias = "co")]
    pub collect_only: bool,

    /// Output encoding
    #[arg(long = "diagnostic-format", value_enum, default_value = "text")]
    pub diagnostic_format: DiagnosticFormat,

    /// Interpreter binary used to execute test code
    #[arg(long, value_name = "PROG", default_value = DEFAULT_INTERPRETER)]
    pub interpreter: PathBuf,

    /// Verbose output (one status line per test instead of progress dots)
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the run and return its exit code.
pub fn execute(cli: Cli) -> CliResult<ExitCode> {
    let request = discovery::scan_target(&cli.target)
        .map_err(|e| CliError::usage(format!("Error: {e}")))?;

    // Discovery: a bad source unit is diagnosed and skipped, siblings go on.
    let mut discovered = Vec::new();
    let mut discovery_errors = 0usize;
    for file in &request.files {
        match DiscoveredUnit::load(file) {
            Ok(unit) => discovered.push(unit),
            Err(e) => {
                eprintln!("Error: {e}");
                discovery_errors += 1;
            }
        }
    }

    // Discovery-ordered leaves per file, restricted by the single-test
    // filter when one was given.
    let mut planned: Vec<FileReport> = discovered.iter().map(FileReport::from_discovery).collect();
    if let Some(filter) = &request.filter {
        for file in &mut planned {
            file.leaves.retain(|leaf| &leaf.id == filter);
        }
        if planned.iter().all(|f| f.leaves.is_empty()) {
            return Err(CliError::usage(format!("Error: no such test: {filter}")));
        }
    }
    let collected: usize = planned.iter().map(|f| f.leaves.len()).sum();

    if cli.collect_only {
        let tree = report::build_tree(&request.root, &planned);
        match cli.diagnostic_format {
            DiagnosticFormat::Text => print!("{}", report::render_collection(&tree)),
            DiagnosticFormat::Json => println!(
                "{:#}",
                report::to_collect_json(&tree)
            ),
        }
        return Ok(if discovery_errors > 0 {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        });
    }

    let text_mode = cli.diagnostic_format == DiagnosticFormat::Text;
    if text_mode {
        println!("\x1b[1m=================== test session starts ===================\x1b[0m");
        println!("collected {} item(s)", collected);
        println!();
    }

    let mut executor =
        InterpreterExecutor::new(&cli.interpreter).with_search_paths(cli.search_path.clone());
    let verbose = cli.verbose;
    let start = Instant::now();

    let mut files = Vec::new();
    for unit in &discovered {
        let results = ExecutionEngine::new(&mut executor)
            .with_filter(request.filter.as_ref())
            .run_unit(unit, |result| {
                if !text_mode {
                    return;
                }
                if verbose {
                    println!("{}", status_line(result));
                } else {
                    print!("{}", progress_glyph(&result.outcome));
                    let _ = io::stdout().flush();
                }
            });
        files.push(FileReport::from_outcomes(unit.unit.path.clone(), results));
    }

    let tree = report::build_tree(&request.root, &files);
    let totals = Totals::from_tree(&tree);

    match cli.diagnostic_format {
        DiagnosticFormat::Text => {
            println!();
            print!("{}", report::render_summary(&tree, start.elapsed()));
        }
        DiagnosticFormat::Json => println!("{:#}", report::to_json(&tree)),
    }

    if totals.all_passed() && discovery_errors == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Full status line for one completed test (verbose text mode).
fn status_line(result: &TestOutcome) -> String {
    let status = match &result.outcome {
        Outcome::Passed { duration, .. } => {
            format!("\x1b[32mPASSED\x1b[0m ({}ms)", duration.as_millis())
        }
        Outcome::Failed { duration, .. } => {
            format!("\x1b[31mFAILED\x1b[0m ({}ms)", duration.as_millis())
        }
        Outcome::Skipped { reason } => {
            if reason.is_empty() {
                "\x1b[33mSKIPPED\x1b[0m".to_string()
            } else {
                format!("\x1b[33mSKIPPED\x1b[0m ({})", reason)
            }
        }
    };

    format!("{} {}", result.id, status)
}

/// Single progress character per test (default text mode).
fn progress_glyph(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Passed { .. } => ".",
        Outcome::Failed {
            kind: FailureKind::Execution,
            ..
        } => "E",
        Outcome::Failed { .. } => "F",
        Outcome::Skipped { .. } => "s",
    }
}

// ============================================================================
// Tests
// ============================================================================
