//! Test location: `test_*` functions and docstring suites
//!
//! The locator inspects one [`SourceUnit`] and extracts the two kinds of test
//! nodes:
//!
//! - module-scope functions whose name starts with `test_` (case-sensitive;
//!   methods are never unit tests), and
//! - executable ```` ```pavo ```` fenced blocks inside docstrings, grouped
//!   into one suite per docstring.
//!
//! Fenced regions with any other tag are display-only documentation samples
//! and never become test nodes. Inside an executable block, a line starting
//! with `#:` is executed but not displayed, so every block carries two line
//! sequences: `display_text` (for documentation rendering) and
//! `execute_text` (submitted to the interpreter).

use super::source::{DeclKind, Docstring, SourceUnit, Span};
use super::DiscoveryError;
use crate::ident::TestId;

/// Prefix of the test-function naming convention.
pub const TEST_FN_PREFIX: &str = "test_";

/// Opening fence of an executable block.
const EXEC_FENCE: &str = "```pavo";
/// Closing fence of any fenced region.
const CLOSE_FENCE: &str = "```";
/// Per-line marker for "execute but do not display".
const HIDDEN_PREFIX: &str = "#:";

/// A module-scope unit-test function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionTest {
    pub name: String,
    pub span: Span,
}

/// One executable code block inside a docstring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocBlockTest {
    /// 0-based appearance order within the suite.
    pub ordinal: usize,
    /// Block text for documentation rendering (hidden lines removed).
    pub display_text: String,
    /// Block text for execution (hidden lines retained, marker stripped).
    pub execute_text: String,
    pub span: Span,
}

/// The ordered blocks of one docstring, sharing one execution scope at run
/// time. Suites never nest: a method's suite is disjoint from its struct's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSuite {
    /// Qualified name of the enclosing symbol; `None` for the module itself.
    pub symbol: Option<String>,
    pub blocks: Vec<DocBlockTest>,
}

impl TestSuite {
    /// The suite tag used in test IDs (`__doc__` or `Sym.__doc__`).
    pub fn tag(&self) -> String {
        TestId::suite_tag(self.symbol.as_deref())
    }
}

/// Everything the locator found in one source unit, in source order.
#[derive(Debug, Default)]
pub struct LocatedTests {
    pub functions: Vec<FunctionTest>,
    pub suites: Vec<TestSuite>,
}

impl LocatedTests {
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.suites.is_empty()
    }

    /// Total number of test nodes (functions plus doc blocks).
    pub fn node_count(&self) -> usize {
        self.functions.len() + self.suites.iter().map(|s| s.blocks.len()).sum::<usize>()
    }
}

/// Locate all test nodes in a source unit.
///
/// Suites come out in declaration order, which the scanner guarantees is
/// module first, then structs/functions/methods as written.
pub fn locate(unit: &SourceUnit) -> Result<LocatedTests, DiscoveryError> {
    let mut located = LocatedTests::default();

    for decl in &unit.decls {
        if decl.kind == DeclKind::Function && decl.name.starts_with(TEST_FN_PREFIX) {
            located.functions.push(FunctionTest {
                name: decl.name.clone(),
                span: decl.span,
            });
        }

        if let Some(doc) = &decl.docstring {
            let symbol = match decl.kind {
                DeclKind::Module => None,
                _ => Some(decl.qualified_name.clone()),
            };
            let blocks = extract_blocks(unit, doc, symbol.as_deref())?;
            if !blocks.is_empty() {
                located.suites.push(TestSuite { symbol, blocks });
            }
        }
    }

    Ok(located)
}

/// Pull the executable blocks out of one docstring. Ordinals start at 0 and
/// increment in document order; display-only fences are skipped wholesale.
fn extract_blocks(
    unit: &SourceUnit,
    doc: &Docstring,
    symbol: Option<&str>,
) -> Result<Vec<DocBlockTest>, DiscoveryError> {
    let mut blocks = Vec::new();
    let mut i = 0usize;

    while i < doc.lines.len() {
        let line = &doc.lines[i];
        let trimmed = line.trim();
        if !trimmed.starts_with(CLOSE_FENCE) {
            i += 1;
            continue;
        }

        let fence_line = doc.first_line + i as u32;
        let executable = trimmed == EXEC_FENCE;
        let indent = line.len() - line.trim_start().len();

        // Find the closing fence.
        let mut j = i + 1;
        let close = loop {
            match doc.lines.get(j) {
                None => {
                    return Err(DiscoveryError::MalformedDocBlock {
                        file: unit.path.clone(),
                        symbol: TestId::suite_tag(symbol),
                        line: fence_line,
                    });
                }
                Some(l) if l.trim() == CLOSE_FENCE => break j,
                Some(_) => j += 1,
            }
        };

        if executable {
            let (display_text, execute_text) = split_block_text(&doc.lines[i + 1..close], indent);
            blocks.push(DocBlockTest {
                ordinal: blocks.len(),
                display_text,
                execute_text,
                span: Span::new(
                    fence_line,
                    indent as u32 + 1,
                    doc.first_line + close as u32,
                    indent as u32 + CLOSE_FENCE.len() as u32,
                ),
            });
        }
        i = close + 1;
    }

    Ok(blocks)
}

/// Produce the two line sequences of a block: display (hidden lines removed)
/// and execute (hidden marker stripped, content retained). Both are
/// de-indented by the fence's own indentation.
fn split_block_text(lines: &[String], fence_indent: usize) -> (String, String) {
    let mut display = Vec::new();
    let mut execute = Vec::new();

    for raw in lines {
        let line = deindent(raw, fence_indent);
        let lead = line.len() - line.trim_start().len();
        if let Some(rest) = line.trim_start().strip_prefix(HIDDEN_PREFIX) {
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            execute.push(format!("{}{}", &line[..lead], rest));
        } else {
            display.push(line.to_string());
            execute.push(line.to_string());
        }
    }

    (join_lines(display), join_lines(execute))
}

fn deindent(line: &str, amount: usize) -> &str {
    let lead = line.len() - line.trim_start().len();
    &line[lead.min(amount)..]
}

fn join_lines(lines: Vec<String>) -> String {
    let mut text = lines.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    text
}

// ============================================================================
// Tests
// ============================================================================
