//! Source units and the line-oriented declaration scanner
//!
//! The engine does not need a full Pavo frontend: discovery only cares about
//! declaration headers (`def`, `struct`), their nesting, and the docstrings
//! attached to them. The scanner here is deliberately line-oriented and
//! lossless: a [`SourceUnit`] keeps the raw lines so the locator can map
//! docstring content back to absolute file positions.

use std::fs;
use std::path::{Path, PathBuf};

use super::DiscoveryError;

/// Inclusive line/column range of a construct in its source file.
///
/// Lines and columns are 1-based, matching what editors and the JSON
/// `location` field expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }
}

/// What kind of declaration a [`Decl`] describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclKind {
    /// The module itself (present only when the file has a module docstring).
    Module,
    /// A module-scope `def`.
    Function,
    /// A `struct` definition.
    Struct,
    /// A `def` nested one level inside a `struct`.
    Method { owner: String },
}

/// A docstring, with enough position data to map content back to the file.
///
/// `lines[i]` is the raw text of file line `first_line + i` (1-based), with
/// the `"""` quotes themselves removed from the first and last entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Docstring {
    pub lines: Vec<String>,
    pub first_line: u32,
}

/// A top-level (or one-deep method) declaration recognized by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decl {
    pub kind: DeclKind,
    /// Bare name (`""` for the module pseudo-declaration).
    pub name: String,
    /// Dotted qualified name: `""`, `name`, `Struct`, or `Struct.method`.
    pub qualified_name: String,
    pub span: Span,
    pub docstring: Option<Docstring>,
}

/// A single parsed source file: path, raw lines, and recognized declarations
/// in source order (module pseudo-declaration first when present).
///
/// Immutable once parsed; rebuilt fresh on every invocation.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub lines: Vec<String>,
    pub decls: Vec<Decl>,
}

impl SourceUnit {
    /// Read and scan a source file.
    pub fn load(path: &Path) -> Result<SourceUnit, DiscoveryError> {
        let source = fs::read_to_string(path).map_err(|e| DiscoveryError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self::parse(path.to_path_buf(), &source))
    }

    /// Scan source text into declarations. The scanner is total: malformed
    /// input yields fewer declarations, never an error (docstring fence
    /// problems are diagnosed later, by the locator).
    pub fn parse(path: PathBuf, source: &str) -> SourceUnit {
        let lines: Vec<String> = source.lines().map(str::to_string).collect();
        let decls = scan_decls(&lines);
        SourceUnit { path, lines, decls }
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn is_blank_or_comment(line: &str) -> bool {
    let t = line.trim_start();
    t.is_empty() || (t.starts_with('#') && !t.starts_with("#:"))
}

/// Extract the identifier following a keyword in a header line, stopping at
/// `(`, `:`, or whitespace.
fn header_name(rest: &str) -> String {
    rest.trim_start()
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

fn scan_decls(lines: &[String]) -> Vec<Decl> {
    let mut decls = Vec::new();
    let mut i = 0usize;

    // Module docstring: first significant line of the file.
    while i < lines.len() && is_blank_or_comment(&lines[i]) {
        i += 1;
    }
    if i < lines.len() && lines[i].trim_start().starts_with("\"\"\"") {
        let (doc, next) = parse_docstring(lines, i);
        decls.push(Decl {
            kind: DeclKind::Module,
            name: String::new(),
            qualified_name: String::new(),
            span: Span::new(
                i as u32 + 1,
                1,
                next as u32,
                lines[next - 1].chars().count() as u32,
            ),
            docstring: Some(doc),
        });
        i = next;
    }

    while i < lines.len() {
        let line = &lines[i];
        let t = line.trim_start();
        if indent_of(line) == 0 {
            if let Some(rest) = t.strip_prefix("def ") {
                let (decl, next) = scan_function(lines, i, &header_name(rest), None);
                decls.push(decl);
                i = next;
                continue;
            }
            if let Some(rest) = t.strip_prefix("struct ") {
                let next = scan_struct(lines, i, &header_name(rest), &mut decls);
                i = next;
                continue;
            }
        }
        i += 1;
    }

    decls
}

/// Scan a `def` at line `start`; returns the declaration and the index just
/// past its body (the next line at or below the header's indent level).
fn scan_function(lines: &[String], start: usize, name: &str, owner: Option<&str>) -> (Decl, usize) {
    let header_indent = indent_of(&lines[start]);
    let mut i = start + 1;

    // Docstring must be the first statement of the body.
    let mut docstring = None;
    let mut probe = i;
    while probe < lines.len() && lines[probe].trim().is_empty() {
        probe += 1;
    }
    if probe < lines.len()
        && indent_of(&lines[probe]) > header_indent
        && lines[probe].trim_start().starts_with("\"\"\"")
    {
        let (doc, next) = parse_docstring(lines, probe);
        docstring = Some(doc);
        i = next;
    }

    // Body extends while lines are blank or more-indented than the header.
    let mut last_content = i.saturating_sub(1).max(start);
    while i < lines.len() {
        let line = &lines[i];
        if line.trim().is_empty() {
            i += 1;
            continue;
        }
        if indent_of(line) <= header_indent {
            break;
        }
        last_content = i;
        i += 1;
    }

    let qualified = match owner {
        Some(owner) => format!("{owner}.{name}"),
        None => name.to_string(),
    };
    let decl = Decl {
        kind: match owner {
            Some(owner) => DeclKind::Method {
                owner: owner.to_string(),
            },
            None => DeclKind::Function,
        },
        name: name.to_string(),
        qualified_name: qualified,
        span: Span::new(
            start as u32 + 1,
            header_indent as u32 + 1,
            last_content as u32 + 1,
            lines[last_content].chars().count() as u32,
        ),
        docstring,
    };
    (decl, i)
}

/// Scan a `struct` at line `start`, pushing the struct declaration and one
/// declaration per method. Returns the index just past the struct body.
fn scan_struct(lines: &[String], start: usize, name: &str, decls: &mut Vec<Decl>) -> usize {
    let mut i = start + 1;

    let mut docstring = None;
    let mut probe = i;
    while probe < lines.len() && lines[probe].trim().is_empty() {
        probe += 1;
    }
    if probe < lines.len()
        && indent_of(&lines[probe]) > 0
        && lines[probe].trim_start().starts_with("\"\"\"")
    {
        let (doc, next) = parse_docstring(lines, probe);
        docstring = Some(doc);
        i = next;
    }

    let struct_index = decls.len();
    decls.push(Decl {
        kind: DeclKind::Struct,
        name: name.to_string(),
        qualified_name: name.to_string(),
        span: Span::new(start as u32 + 1, 1, start as u32 + 1, lines[start].chars().count() as u32),
        docstring,
    });

    let mut last_content = start;
    while i < lines.len() {
        let line = &lines[i];
        if line.trim().is_empty() {
            i += 1;
            continue;
        }
        let indent = indent_of(line);
        if indent == 0 {
            break;
        }
        if let Some(rest) = line.trim_start().strip_prefix("def ") {
            let (decl, next) = scan_function(lines, i, &header_name(rest), Some(name));
            last_content = next.saturating_sub(1).min(lines.len() - 1);
            decls.push(decl);
            i = next;
            continue;
        }
        last_content = i;
        i += 1;
    }

    decls[struct_index].span.end_line = last_content as u32 + 1;
    decls[struct_index].span.end_col = lines[last_content].chars().count().max(1) as u32;
    i
}

/// Parse a `"""` docstring opening at line `start`. Returns the docstring and
/// the index just past its closing line. An unterminated docstring runs to
/// end of file.
fn parse_docstring(lines: &[String], start: usize) -> (Docstring, usize) {
    let opener = lines[start].trim_start();
    let after = &opener[3..];

    // One-liner: """text""" on a single line.
    if let Some(close) = after.find("\"\"\"") {
        let doc = Docstring {
            lines: vec![after[..close].to_string()],
            first_line: start as u32 + 1,
        };
        return (doc, start + 1);
    }

    let mut content = Vec::new();
    let mut first_line = start as u32 + 2;
    if !after.trim().is_empty() {
        content.push(after.to_string());
        first_line = start as u32 + 1;
    }

    let mut i = start + 1;
    while i < lines.len() {
        let line = &lines[i];
        if let Some(close) = line.find("\"\"\"") {
            content.push(line[..close].to_string());
            return (
                Docstring {
                    lines: content,
                    first_line,
                },
                i + 1,
            );
        }
        content.push(line.clone());
        i += 1;
    }

    (
        Docstring {
            lines: content,
            first_line,
        },
        i,
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(source: &str) -> SourceUnit {
        SourceUnit::parse(PathBuf::from("test_sample.pv"), source)
    }

    #[test]
    fn scans_module_docstring() {
        let u = unit("\"\"\"Module doc.\"\"\"\n\ndef main() -> Unit:\n    pass\n");
        assert_eq!(u.decls[0].kind, DeclKind::Module);
        let doc = u.decls[0].docstring.as_ref().unwrap();
        assert_eq!(doc.lines, vec!["Module doc."]);
    }

    #[test]
    fn scans_top_level_functions_with_docstrings() {
        let src = r#"
def test_add() -> Unit:
    """
    Adds things.
    """
    assert_eq(1 + 1, 2)

def helper(x: int) -> int:
    return x
"#;
        let u = unit(src);
        let names: Vec<_> = u.decls.iter().map(|d| d.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["test_add", "helper"]);
        assert_eq!(u.decls[0].kind, DeclKind::Function);
        let doc = u.decls[0].docstring.as_ref().unwrap();
        assert_eq!(doc.lines, vec!["    Adds things.", "    "]);
        // first content line of the docstring is file line 4
        assert_eq!(doc.first_line, 4);
    }

    #[test]
    fn scans_struct_and_methods() {
        let src = r#"
struct Point:
    """A 2D point."""
    x: int
    y: int

    def scale(self, k: int) -> Point:
        """Scales the point."""
        return Point(self.x * k, self.y * k)
"#;
        let u = unit(src);
        let names: Vec<_> = u.decls.iter().map(|d| d.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["Point", "Point.scale"]);
        assert_eq!(
            u.decls[1].kind,
            DeclKind::Method {
                owner: "Point".to_string()
            }
        );
        assert_eq!(
            u.decls[1].docstring.as_ref().unwrap().lines,
            vec!["Scales the point."]
        );
    }

    #[test]
    fn module_docstring_skips_leading_comments() {
        let src = "# header comment\n\n\"\"\"Docs.\"\"\"\ndef f() -> Unit:\n    pass\n";
        let u = unit(src);
        assert_eq!(u.decls[0].kind, DeclKind::Module);
    }

    #[test]
    fn function_without_docstring_has_none() {
        let u = unit("def test_x() -> Unit:\n    assert_true(True)\n");
        assert_eq!(u.decls.len(), 1);
        assert!(u.decls[0].docstring.is_none());
    }

    #[test]
    fn function_span_covers_body() {
        let src = "def test_x() -> Unit:\n    a = 1\n    assert_eq(a, 1)\n\ndef g() -> Unit:\n    pass\n";
        let u = unit(src);
        assert_eq!(u.decls[0].span.start_line, 1);
        assert_eq!(u.decls[0].span.end_line, 3);
    }

    #[test]
    fn unterminated_docstring_runs_to_eof() {
        let u = unit("\"\"\"never closed\ndef f() -> Unit:\n    pass\n");
        assert_eq!(u.decls.len(), 1);
        assert_eq!(u.decls[0].kind, DeclKind::Module);
    }
}
