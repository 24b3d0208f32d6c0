//! Test identifiers
//!
//! Every discovered test node gets a globally unique, re-parseable string ID:
//!
//! ```text
//! FunctionID  ::= <file-path> "::" <function-name> "()"
//! DocBlockID  ::= <file-path> "@" <suite-tag> "::" <ordinal>
//! suite-tag   ::= "__doc__" | <qualified-symbol-name> ".__doc__"
//! ```
//!
//! IDs are position-based, not content-based: reordering blocks inside a
//! docstring changes their ordinals (and therefore their IDs), while editing
//! a block's text does not. Within symbol names, `\`, `:` and `@` are
//! backslash-escaped so `::` and `@` stay unambiguous separators; file paths
//! are emitted verbatim.

use std::fmt;
use std::path::{Path, PathBuf};

/// The unique identity of a discovered test node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TestId {
    /// A module-scope `test_*` function.
    Function { file: PathBuf, name: String },
    /// One executable docstring block; `symbol` is `None` for the module
    /// docstring, otherwise the qualified name of the enclosing symbol.
    DocBlock {
        file: PathBuf,
        symbol: Option<String>,
        ordinal: usize,
    },
}

impl TestId {
    pub fn function(file: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        TestId::Function {
            file: file.into(),
            name: name.into(),
        }
    }

    pub fn doc_block(
        file: impl Into<PathBuf>,
        symbol: Option<String>,
        ordinal: usize,
    ) -> Self {
        TestId::DocBlock {
            file: file.into(),
            symbol,
            ordinal,
        }
    }

    /// The source file this test lives in.
    pub fn file(&self) -> &Path {
        match self {
            TestId::Function { file, .. } | TestId::DocBlock { file, .. } => file,
        }
    }

    /// The suite tag for a docstring suite (`__doc__` or `Sym.__doc__`,
    /// with the symbol escaped).
    pub fn suite_tag(symbol: Option<&str>) -> String {
        match symbol {
            None => "__doc__".to_string(),
            Some(sym) => format!("{}.__doc__", escape(sym)),
        }
    }

    /// Parse an ID string back into a [`TestId`]. Returns `None` when the
    /// string does not follow the ID grammar.
    pub fn parse(s: &str) -> Option<TestId> {
        if let Some(body) = s.strip_suffix("()") {
            let sep = body.rfind("::")?;
            let (file, name) = (&body[..sep], &body[sep + 2..]);
            if file.is_empty() || name.is_empty() {
                return None;
            }
            return Some(TestId::function(file, unescape(name)?));
        }

        let sep = s.rfind("::")?;
        let (head, ordinal) = (&s[..sep], &s[sep + 2..]);
        let ordinal: usize = ordinal.parse().ok()?;

        // The suite tag is everything after the last unescaped `@` whose
        // suffix actually looks like a tag.
        for (at, _) in head.match_indices('@').rev() {
            if is_escaped_at(head, at) {
                continue;
            }
            let (file, tag) = (&head[..at], &head[at + 1..]);
            if file.is_empty() {
                continue;
            }
            if tag == "__doc__" {
                return Some(TestId::doc_block(file, None, ordinal));
            }
            if let Some(sym) = tag.strip_suffix(".__doc__") {
                if let Some(sym) = unescape(sym) {
                    return Some(TestId::doc_block(file, Some(sym), ordinal));
                }
            }
        }
        None
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestId::Function { file, name } => {
                write!(f, "{}::{}()", file.display(), escape(name))
            }
            TestId::DocBlock {
                file,
                symbol,
                ordinal,
            } => write!(
                f,
                "{}@{}::{}",
                file.display(),
                TestId::suite_tag(symbol.as_deref()),
                ordinal
            ),
        }
    }
}

/// Escape the characters that are structurally significant in the ID grammar.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | ':' | '@') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Reverse [`escape`]. Returns `None` on a dangling or unknown escape.
fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                e @ ('\\' | ':' | '@') => out.push(e),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// True when the character at `idx` is preceded by an odd number of
/// backslashes, i.e. it is itself escaped.
fn is_escaped_at(s: &str, idx: usize) -> bool {
    s[..idx].bytes().rev().take_while(|b| *b == b'\\').count() % 2 == 1
}

// ============================================================================
// Tests
// ============================================================================
