#![forbid(unsafe_code)]
//! Pavo test engine
//!
//! `pavo-test` discovers and runs the two kinds of tests a Pavo source tree
//! carries: module-scope `test_*` functions, and executable ```` ```pavo ````
//! code blocks embedded in docstrings. Discovery is a read-only phase that
//! assigns every test a stable, hierarchical ID; execution delegates the
//! actual code runs to the `pavo` interpreter (or any other
//! [`execution::CodeExecutor`]); reporting renders outcomes as a pytest-style
//! summary or a JSON tree.
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` and
//!   `execution` modules enforce `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **True invariants**: If a panic represents an engine bug (logic error), use
//!   `.expect("INVARIANT: reason")` with a clear explanation.

pub mod cli;
pub mod discovery;
pub mod execution;
pub mod ident;
pub mod report;

pub use discovery::locator::{DocBlockTest, FunctionTest, TestSuite};
pub use discovery::source::{SourceUnit, Span};
pub use discovery::{DiscoveryError, ScanRequest};
pub use execution::{CodeExecutor, ExecScope, Execution, ExecutionEngine, Outcome, TestOutcome};
pub use ident::TestId;
pub use report::{ReportNode, Totals};
