//! Test execution
//!
//! The engine never runs Pavo code itself: it hands code to a
//! [`CodeExecutor`] (normally the `pavo` interpreter, see
//! [`interpreter::InterpreterExecutor`]) and turns what the executor reports
//! into per-test [`Outcome`]s.
//!
//! Two execution models:
//!
//! - **Function tests** run in isolation. No state from one function test is
//!   visible to another.
//! - **Docstring suites** run their blocks strictly in ordinal order, all
//!   inside one shared [`ExecScope`], so bindings created by block `i` are
//!   visible to block `i + 1`. The first failing block poisons the rest of
//!   its suite: every remaining block is `Skipped` and never executed.
//!
//! An error in a test body terminates only that node (or the remainder of
//! its suite); it never aborts the overall run.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod interpreter;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::discovery::locator::{FunctionTest, TestSuite};
use crate::discovery::source::{SourceUnit, Span};
use crate::discovery::DiscoveredUnit;
use crate::ident::TestId;

/// Reason a test outcome went down as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The code under test raised an assertion failure.
    Assertion,
    /// The code-execution collaborator itself failed to run the code
    /// (crash, parse error, undefined name).
    Execution,
}

/// Result of executing one test node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed {
        duration: Duration,
        stdout: String,
        stderr: String,
    },
    Failed {
        kind: FailureKind,
        message: String,
        stdout: String,
        stderr: String,
        duration: Duration,
    },
    Skipped {
        reason: String,
    },
}

impl Outcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Passed { .. })
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Outcome::Skipped { .. })
    }

    /// The outcome kind as rendered in JSON reports.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Outcome::Passed { .. } => "success",
            Outcome::Failed {
                kind: FailureKind::Assertion,
                ..
            } => "failure",
            Outcome::Failed {
                kind: FailureKind::Execution,
                ..
            } => "executionError",
            Outcome::Skipped { .. } => "skipped",
        }
    }
}

/// What a [`CodeExecutor`] reports back for one code run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub status: ExecStatus,
    pub stdout: String,
    pub stderr: String,
}

impl Execution {
    pub fn success() -> Self {
        Execution {
            status: ExecStatus::Success,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Execution {
            status: ExecStatus::Failure {
                message: message.into(),
            },
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn crash(message: impl Into<String>) -> Self {
        Execution {
            status: ExecStatus::Crash {
                message: message.into(),
            },
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecStatus {
    Success,
    /// An assertion failure raised by the code under test.
    Failure { message: String },
    /// The collaborator failed to run the code at all.
    Crash { message: String },
}

/// The mutable binding environment shared by all blocks of one suite.
///
/// Owned exclusively by the suite's execution call chain: created right
/// before the first block runs, discarded after the last block (or after the
/// first failure). Executors record successfully executed block text here so
/// later blocks see earlier bindings.
#[derive(Debug)]
pub struct ExecScope {
    unit_path: PathBuf,
    preamble: String,
    stdout_seen: usize,
}

impl ExecScope {
    pub fn new(unit_path: impl Into<PathBuf>) -> Self {
        ExecScope {
            unit_path: unit_path.into(),
            preamble: String::new(),
            stdout_seen: 0,
        }
    }

    /// The source file this scope belongs to (for import resolution).
    pub fn unit_path(&self) -> &Path {
        &self.unit_path
    }

    /// Accumulated execute-text of every block that succeeded so far.
    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    /// Bytes of stdout already attributed to earlier blocks.
    pub fn stdout_seen(&self) -> usize {
        self.stdout_seen
    }

    /// Record a successfully executed block.
    pub fn absorb(&mut self, execute_text: &str, total_stdout: usize) {
        self.preamble.push_str(execute_text);
        if !execute_text.ends_with('\n') && !execute_text.is_empty() {
            self.preamble.push('\n');
        }
        self.stdout_seen = total_stdout;
    }
}

/// The code-execution collaborator.
///
/// Implementations run Pavo code and report success, an assertion failure
/// with a message, or a crash of the execution itself. The engine does not
/// care how the code is run; tests use scripted in-memory executors.
pub trait CodeExecutor {
    /// Run the named zero-argument test function from `unit` in a fresh,
    /// isolated environment.
    fn run_function(&mut self, unit: &SourceUnit, function: &str) -> Execution;

    /// Run one docstring block inside `scope`. On success the implementation
    /// must absorb the block into the scope so later blocks see its
    /// bindings; on failure the scope must be left unchanged.
    fn run_block(&mut self, scope: &mut ExecScope, execute_text: &str) -> Execution;
}

/// One executed (or skipped) test node, ready for reporting.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub id: TestId,
    pub span: Span,
    pub outcome: Outcome,
}

/// Runs discovered tests through a [`CodeExecutor`], honoring suite ordering
/// and skip rules, optionally restricted to a single test ID.
pub struct ExecutionEngine<'a, E: CodeExecutor + ?Sized> {
    executor: &'a mut E,
    filter: Option<&'a TestId>,
}

impl<'a, E: CodeExecutor + ?Sized> ExecutionEngine<'a, E> {
    pub fn new(executor: &'a mut E) -> Self {
        ExecutionEngine {
            executor,
            filter: None,
        }
    }

    /// Restrict execution to a single test; everything else is left
    /// unexecuted and excluded from results.
    pub fn with_filter(mut self, filter: Option<&'a TestId>) -> Self {
        self.filter = filter;
        self
    }

    fn selected(&self, id: &TestId) -> bool {
        self.filter.is_none_or(|f| f == id)
    }

    /// Run every selected test in one discovered unit, suites first (in
    /// declaration order), then function tests. `observe` fires once per
    /// completed node, in execution order.
    pub fn run_unit(
        &mut self,
        discovered: &DiscoveredUnit,
        mut observe: impl FnMut(&TestOutcome),
    ) -> Vec<TestOutcome> {
        let mut results = Vec::new();

        for suite in &discovered.tests.suites {
            self.run_suite(&discovered.unit, suite, &mut results, &mut observe);
        }
        for function in &discovered.tests.functions {
            self.run_function(&discovered.unit, function, &mut results, &mut observe);
        }

        results
    }

    fn run_function(
        &mut self,
        unit: &SourceUnit,
        test: &FunctionTest,
        results: &mut Vec<TestOutcome>,
        observe: &mut impl FnMut(&TestOutcome),
    ) {
        let id = TestId::function(&unit.path, &test.name);
        if !self.selected(&id) {
            return;
        }

        let start = Instant::now();
        let execution = self.executor.run_function(unit, &test.name);
        let outcome = outcome_from(execution, start.elapsed());

        let result = TestOutcome {
            id,
            span: test.span,
            outcome,
        };
        observe(&result);
        results.push(result);
    }

    fn run_suite(
        &mut self,
        unit: &SourceUnit,
        suite: &TestSuite,
        results: &mut Vec<TestOutcome>,
        observe: &mut impl FnMut(&TestOutcome),
    ) {
        // The scope exists only for the duration of this suite.
        let mut scope = ExecScope::new(&unit.path);
        let mut poisoned = false;

        for block in &suite.blocks {
            let id = TestId::doc_block(&unit.path, suite.symbol.clone(), block.ordinal);
            if !self.selected(&id) {
                continue;
            }

            let outcome = if poisoned {
                Outcome::Skipped {
                    reason: "prior block failed".to_string(),
                }
            } else {
                let start = Instant::now();
                let execution = self.executor.run_block(&mut scope, &block.execute_text);
                let outcome = outcome_from(execution, start.elapsed());
                if outcome.is_fail() {
                    poisoned = true;
                }
                outcome
            };

            let result = TestOutcome {
                id,
                span: block.span,
                outcome,
            };
            observe(&result);
            results.push(result);
        }
    }
}

fn outcome_from(execution: Execution, duration: Duration) -> Outcome {
    let Execution {
        status,
        stdout,
        stderr,
    } = execution;
    match status {
        ExecStatus::Success => Outcome::Passed {
            duration,
            stdout,
            stderr,
        },
        ExecStatus::Failure { message } => Outcome::Failed {
            kind: FailureKind::Assertion,
            message,
            stdout,
            stderr,
            duration,
        },
        ExecStatus::Crash { message } => Outcome::Failed {
            kind: FailureKind::Execution,
            message,
            stdout,
            stderr,
            duration,
        },
    }
}

// ============================================================================
// Tests
// ============================================================================
