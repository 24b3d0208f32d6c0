//! Default code executor backed by the `pavo` interpreter
//!
//! Function tests run as `pavo call <file> <function>`; docstring blocks run
//! as `pavo run <script>` where the script is the suite scope's accumulated
//! preamble plus the block under test, written to a temporary file. Replaying
//! the preamble is what threads bindings from block to block; the stdout
//! already attributed to earlier blocks is tracked in the scope and trimmed
//! off, so each block reports only its own output.
//!
//! Exit-code contract with the interpreter: 0 is success, 1 is an assertion
//! failure raised by the code under test, anything else (parse error,
//! undefined name, signal, failure to launch) is an execution error.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use super::{CodeExecutor, ExecScope, ExecStatus, Execution};
use crate::discovery::source::SourceUnit;

/// Name of the interpreter binary when none is configured.
pub const DEFAULT_INTERPRETER: &str = "pavo";

/// Runs Pavo code by invoking the interpreter as a subprocess.
pub struct InterpreterExecutor {
    program: PathBuf,
    search_paths: Vec<PathBuf>,
}

impl InterpreterExecutor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        InterpreterExecutor {
            program: program.into(),
            search_paths: Vec::new(),
        }
    }

    /// Additional module-resolution roots, passed through as `-I` flags.
    /// The engine never resolves imports itself.
    pub fn with_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.search_paths = paths;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        for path in &self.search_paths {
            cmd.arg("-I").arg(path);
        }
        cmd
    }
}

impl CodeExecutor for InterpreterExecutor {
    fn run_function(&mut self, unit: &SourceUnit, function: &str) -> Execution {
        let output = self
            .command()
            .arg("call")
            .arg(&unit.path)
            .arg(function)
            .output();
        classify(output)
    }

    fn run_block(&mut self, scope: &mut ExecScope, execute_text: &str) -> Execution {
        let script = format!("{}{}", scope.preamble(), execute_text);
        let script_path = match write_scratch_script(&script) {
            Ok(path) => path,
            Err(e) => return Execution::crash(format!("failed to stage block script: {e}")),
        };

        let output = self
            .command()
            .arg("run")
            .arg(&script_path)
            .arg("--module-dir")
            .arg(parent_dir(scope.unit_path()))
            .output();
        let _ = fs::remove_file(&script_path);

        let mut execution = classify(output);
        // Output of the replayed preamble belongs to earlier blocks; trim it
        // off regardless of how this block ended.
        let total = execution.stdout.len();
        execution.stdout = execution
            .stdout
            .get(scope.stdout_seen()..)
            .unwrap_or_default()
            .to_string();
        if execution.status == ExecStatus::Success {
            scope.absorb(execute_text, total);
        }
        execution
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Write block code to a unique temporary file.
fn write_scratch_script(script: &str) -> std::io::Result<PathBuf> {
    let path = env::temp_dir().join(format!(
        "pavo_doc_{}_{}.pv",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
    ));
    fs::write(&path, script)?;
    Ok(path)
}

/// Map a subprocess result onto the executor contract.
fn classify(output: std::io::Result<Output>) -> Execution {
    let output = match output {
        Ok(o) => o,
        Err(e) => return Execution::crash(format!("failed to launch interpreter: {e}")),
    };

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let status = if output.status.success() {
        ExecStatus::Success
    } else if output.status.code() == Some(1) {
        ExecStatus::Failure {
            message: extract_assertion_error(&stderr),
        }
    } else {
        ExecStatus::Crash {
            message: crash_message(&stderr, output.status.code()),
        }
    };

    Execution {
        status,
        stdout,
        stderr,
    }
}

/// Pull the most useful line out of interpreter stderr for a failure.
fn extract_assertion_error(stderr: &str) -> String {
    for line in stderr.lines() {
        if line.contains("assertion") || line.contains("AssertionError") {
            return line.trim().to_string();
        }
    }
    let tail = stderr.trim();
    if tail.is_empty() {
        "test failed".to_string()
    } else {
        tail.to_string()
    }
}

fn crash_message(stderr: &str, code: Option<i32>) -> String {
    if let Some(line) = stderr.lines().find(|l| !l.trim().is_empty()) {
        return line.trim().to_string();
    }
    match code {
        Some(code) => format!("interpreter exited with code {code}"),
        None => "interpreter terminated by signal".to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
