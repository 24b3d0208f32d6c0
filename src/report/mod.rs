//! Report tree and renderers
//!
//! Outcomes (or bare discovery results, in collect-only mode) are aggregated
//! into a [`ReportNode`] tree mirroring the filesystem: directory groups,
//! then files, then suites/functions, then leaves. The tree renders three
//! ways: a pytest-style text summary, an indented collection listing, and a
//! JSON document.
//!
//! Child ordering is always discovery order, never outcome-dependent, so
//! output stays diffable across runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{json, Value};

use crate::discovery::source::Span;
use crate::discovery::DiscoveredUnit;
use crate::execution::{Outcome, TestOutcome};
use crate::ident::TestId;

/// What level of the hierarchy a [`ReportNode`] sits at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// The scan root or an intermediate directory.
    Group,
    /// A source file.
    File,
    /// One docstring suite.
    Suite,
    /// A single test node (function or doc block).
    Leaf,
}

/// A node of the report tree.
#[derive(Debug, Clone)]
pub struct ReportNode {
    /// Test ID for leaves; path or `<file>@<tag>` for inner nodes.
    pub id: String,
    pub kind: ReportKind,
    /// Source span; present on leaves only.
    pub span: Option<Span>,
    /// Present after execution; absent in collect-only mode.
    pub outcome: Option<Outcome>,
    pub children: Vec<ReportNode>,
}

impl ReportNode {
    fn group(id: String) -> Self {
        ReportNode {
            id,
            kind: ReportKind::Group,
            span: None,
            outcome: None,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == ReportKind::Leaf
    }

    /// Depth-first walk over leaves, in tree (discovery) order.
    pub fn leaves(&self) -> Vec<&ReportNode> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }
}

fn collect_leaves<'a>(node: &'a ReportNode, out: &mut Vec<&'a ReportNode>) {
    if node.is_leaf() {
        out.push(node);
        return;
    }
    for child in &node.children {
        collect_leaves(child, out);
    }
}

/// One reportable test of a file, in discovery order.
#[derive(Debug, Clone)]
pub struct LeafEntry {
    pub id: TestId,
    pub span: Span,
    pub outcome: Option<Outcome>,
}

/// All reportable tests of one file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub leaves: Vec<LeafEntry>,
}

impl FileReport {
    /// Leaves straight from discovery (collect-only mode): suites first in
    /// declaration order, then function tests, mirroring execution order.
    pub fn from_discovery(discovered: &DiscoveredUnit) -> FileReport {
        let path = discovered.unit.path.clone();
        let mut leaves = Vec::new();
        for suite in &discovered.tests.suites {
            for block in &suite.blocks {
                leaves.push(LeafEntry {
                    id: TestId::doc_block(&path, suite.symbol.clone(), block.ordinal),
                    span: block.span,
                    outcome: None,
                });
            }
        }
        for function in &discovered.tests.functions {
            leaves.push(LeafEntry {
                id: TestId::function(&path, &function.name),
                span: function.span,
                outcome: None,
            });
        }
        FileReport { path, leaves }
    }

    /// Leaves from executed outcomes, preserving execution order.
    pub fn from_outcomes(path: PathBuf, results: Vec<TestOutcome>) -> FileReport {
        let leaves = results
            .into_iter()
            .map(|r| LeafEntry {
                id: r.id,
                span: r.span,
                outcome: Some(r.outcome),
            })
            .collect();
        FileReport { path, leaves }
    }
}

// ============================================================================
// Tree construction
// ============================================================================

/// Build the report tree for a run: directory groups under `root`, one file
/// node per report, suite nodes grouping consecutive doc-block leaves.
pub fn build_tree(root: &Path, files: &[FileReport]) -> ReportNode {
    let mut tree = ReportNode::group(root.display().to_string());

    for file in files {
        let rel = file.path.strip_prefix(root).unwrap_or(&file.path);
        let dirs: Vec<String> = rel
            .parent()
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();

        let parent = descend(&mut tree, root.to_path_buf(), &dirs);
        parent.children.push(file_node(file));
    }

    tree
}

/// Walk (creating as needed) the group chain for a directory path.
fn descend<'a>(node: &'a mut ReportNode, path: PathBuf, dirs: &[String]) -> &'a mut ReportNode {
    let Some((first, rest)) = dirs.split_first() else {
        return node;
    };
    let child_path = path.join(first);
    let id = child_path.display().to_string();
    let pos = match node.children.iter().position(|c| c.id == id) {
        Some(pos) => pos,
        None => {
            node.children.push(ReportNode::group(id));
            node.children.len() - 1
        }
    };
    descend(&mut node.children[pos], child_path, rest)
}

fn file_node(file: &FileReport) -> ReportNode {
    let mut node = ReportNode {
        id: file.path.display().to_string(),
        kind: ReportKind::File,
        span: None,
        outcome: None,
        children: Vec::new(),
    };

    // Consecutive doc-block leaves of the same suite fold into a suite node.
    let mut current_suite: Option<(String, ReportNode)> = None;
    for leaf in &file.leaves {
        let leaf_node = ReportNode {
            id: leaf.id.to_string(),
            kind: ReportKind::Leaf,
            span: Some(leaf.span),
            outcome: leaf.outcome.clone(),
            children: Vec::new(),
        };

        match &leaf.id {
            TestId::DocBlock { symbol, .. } => {
                let tag = TestId::suite_tag(symbol.as_deref());
                let suite_id = format!("{}@{}", file.path.display(), tag);
                match &mut current_suite {
                    Some((id, suite)) if *id == suite_id => suite.children.push(leaf_node),
                    _ => {
                        if let Some((_, done)) = current_suite.take() {
                            node.children.push(done);
                        }
                        let mut suite = ReportNode::group(suite_id.clone());
                        suite.kind = ReportKind::Suite;
                        suite.children.push(leaf_node);
                        current_suite = Some((suite_id, suite));
                    }
                }
            }
            TestId::Function { .. } => {
                if let Some((_, done)) = current_suite.take() {
                    node.children.push(done);
                }
                node.children.push(leaf_node);
            }
        }
    }
    if let Some((_, done)) = current_suite.take() {
        node.children.push(done);
    }

    node
}

// ============================================================================
// Totals
// ============================================================================

/// Aggregate counts over the tree's leaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub discovered: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Totals {
    pub fn from_tree(tree: &ReportNode) -> Totals {
        let mut totals = Totals::default();
        for leaf in tree.leaves() {
            totals.discovered += 1;
            match &leaf.outcome {
                Some(o) if o.is_pass() => totals.passed += 1,
                Some(o) if o.is_fail() => totals.failed += 1,
                Some(_) => totals.skipped += 1,
                None => {}
            }
        }
        totals
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    fn pct(&self, n: usize) -> f64 {
        if self.discovered == 0 {
            0.0
        } else {
            n as f64 * 100.0 / self.discovered as f64
        }
    }
}

// ============================================================================
// Text renderers
// ============================================================================

/// Render the summary: failure detail blocks, then a totals banner with
/// counts and percentages.
pub fn render_summary(tree: &ReportNode, elapsed: Duration) -> String {
    let totals = Totals::from_tree(tree);
    let mut out = String::new();

    let failures: Vec<&ReportNode> = tree
        .leaves()
        .into_iter()
        .filter(|l| l.outcome.as_ref().is_some_and(Outcome::is_fail))
        .collect();

    if !failures.is_empty() {
        out.push_str("\x1b[1;31m=================== FAILURES ===================\x1b[0m\n");
        for leaf in failures {
            out.push('\n');
            out.push_str(&format!("\x1b[1m___________ {} ___________\x1b[0m\n", leaf.id));
            if let Some(Outcome::Failed { message, .. }) = &leaf.outcome {
                out.push_str(&format!("\n    {}\n", message));
            }
        }
        out.push('\n');
    }

    let color = if totals.all_passed() {
        "\x1b[1;32m"
    } else {
        "\x1b[1;31m"
    };
    let mut parts = vec![format!("{} collected", totals.discovered)];
    if totals.passed > 0 {
        parts.push(format!("{} passed ({:.1}%)", totals.passed, totals.pct(totals.passed)));
    }
    if totals.failed > 0 {
        parts.push(format!("{} failed ({:.1}%)", totals.failed, totals.pct(totals.failed)));
    }
    if totals.skipped > 0 {
        parts.push(format!(
            "{} skipped ({:.1}%)",
            totals.skipped,
            totals.pct(totals.skipped)
        ));
    }

    out.push_str(&format!(
        "{}=================== {} in {:.2}s ===================\x1b[0m\n",
        color,
        parts.join(", "),
        elapsed.as_secs_f64()
    ));
    out
}

/// Render the collect-only listing: nested, two-space indented, leaves shown
/// by their full test IDs.
pub fn render_collection(tree: &ReportNode) -> String {
    let mut out = String::new();
    render_listing(tree, 0, &mut out);
    out
}

fn render_listing(node: &ReportNode, depth: usize, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&node.id);
    out.push('\n');
    for child in &node.children {
        render_listing(child, depth + 1, out);
    }
}

// ============================================================================
// JSON renderers
// ============================================================================

/// Outcome-mode JSON: recursive nodes with `testID`, leaves carrying `kind`,
/// `error`, `stdOut`, `stdErr`, `duration_ms`.
pub fn to_json(node: &ReportNode) -> Value {
    if node.is_leaf() {
        let kind = node
            .outcome
            .as_ref()
            .map(Outcome::kind_str)
            .unwrap_or("skipped");
        let (error, stdout, stderr, duration_ms) = match &node.outcome {
            Some(Outcome::Passed {
                duration,
                stdout,
                stderr,
            }) => (String::new(), stdout.clone(), stderr.clone(), duration.as_millis()),
            Some(Outcome::Failed {
                message,
                stdout,
                stderr,
                duration,
                ..
            }) => (message.clone(), stdout.clone(), stderr.clone(), duration.as_millis()),
            Some(Outcome::Skipped { reason }) => {
                (reason.clone(), String::new(), String::new(), 0)
            }
            None => (String::new(), String::new(), String::new(), 0),
        };
        return json!({
            "testID": node.id,
            "kind": kind,
            "error": error,
            "stdOut": stdout,
            "stdErr": stderr,
            "duration_ms": duration_ms as u64,
        });
    }

    json!({
        "testID": node.id,
        "children": node.children.iter().map(to_json).collect::<Vec<_>>(),
    })
}

/// Collection-mode JSON: `id` instead of `testID`, no outcome fields, and a
/// `location` object on leaves.
pub fn to_collect_json(node: &ReportNode) -> Value {
    if node.is_leaf() {
        let location = node.span.map(|s| {
            json!({
                "startLine": s.start_line,
                "endLine": s.end_line,
                "startColumn": s.start_col,
                "endColumn": s.end_col,
            })
        });
        return json!({
            "id": node.id,
            "location": location,
        });
    }

    json!({
        "id": node.id,
        "children": node.children.iter().map(to_collect_json).collect::<Vec<_>>(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::FailureKind;

    fn passed() -> Option<Outcome> {
        Some(Outcome::Passed {
            duration: Duration::from_millis(5),
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    fn failed(message: &str) -> Option<Outcome> {
        Some(Outcome::Failed {
            kind: FailureKind::Assertion,
            message: message.to_string(),
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::from_millis(2),
        })
    }

    fn leaf(id: TestId, outcome: Option<Outcome>) -> LeafEntry {
        LeafEntry {
            id,
            span: Span::new(1, 1, 2, 3),
            outcome,
        }
    }

    fn sample_files() -> Vec<FileReport> {
        vec![
            FileReport {
                path: PathBuf::from("root/sub/test_a.pv"),
                leaves: vec![
                    leaf(TestId::doc_block("root/sub/test_a.pv", None, 0), passed()),
                    leaf(TestId::doc_block("root/sub/test_a.pv", None, 1), failed("2 != 3")),
                    leaf(
                        TestId::doc_block("root/sub/test_a.pv", None, 2),
                        Some(Outcome::Skipped {
                            reason: "prior block failed".to_string(),
                        }),
                    ),
                    leaf(TestId::function("root/sub/test_a.pv", "test_fn"), passed()),
                ],
            },
            FileReport {
                path: PathBuf::from("root/test_b.pv"),
                leaves: vec![leaf(TestId::function("root/test_b.pv", "test_solo"), passed())],
            },
        ]
    }

    #[test]
    fn tree_mirrors_directory_file_suite_structure() {
        let tree = build_tree(Path::new("root"), &sample_files());
        assert_eq!(tree.id, "root");
        // first child: sub/ group, second: test_b.pv file
        assert_eq!(tree.children[0].id, "root/sub");
        assert_eq!(tree.children[0].kind, ReportKind::Group);
        assert_eq!(tree.children[1].id, "root/test_b.pv");
        assert_eq!(tree.children[1].kind, ReportKind::File);

        let file_a = &tree.children[0].children[0];
        assert_eq!(file_a.kind, ReportKind::File);
        // suite node folds the three blocks; function leaf sits beside it
        assert_eq!(file_a.children.len(), 2);
        assert_eq!(file_a.children[0].kind, ReportKind::Suite);
        assert_eq!(file_a.children[0].id, "root/sub/test_a.pv@__doc__");
        assert_eq!(file_a.children[0].children.len(), 3);
        assert_eq!(file_a.children[1].kind, ReportKind::Leaf);
    }

    #[test]
    fn totals_count_leaves_by_outcome() {
        let tree = build_tree(Path::new("root"), &sample_files());
        let totals = Totals::from_tree(&tree);
        assert_eq!(
            totals,
            Totals {
                discovered: 5,
                passed: 3,
                failed: 1,
                skipped: 1
            }
        );
        assert!(!totals.all_passed());
    }

    #[test]
    fn summary_shows_failure_details_and_percentages() {
        let tree = build_tree(Path::new("root"), &sample_files());
        let text = render_summary(&tree, Duration::from_millis(120));
        assert!(text.contains("FAILURES"));
        assert!(text.contains("root/sub/test_a.pv@__doc__::1"));
        assert!(text.contains("2 != 3"));
        assert!(text.contains("5 collected"));
        assert!(text.contains("3 passed (60.0%)"));
        assert!(text.contains("1 failed (20.0%)"));
        assert!(text.contains("1 skipped (20.0%)"));
    }

    #[test]
    fn collection_listing_is_nested_and_indented() {
        let tree = build_tree(Path::new("root"), &sample_files());
        let text = render_collection(&tree);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "root");
        assert_eq!(lines[1], "  root/sub");
        assert_eq!(lines[2], "    root/sub/test_a.pv");
        assert_eq!(lines[3], "      root/sub/test_a.pv@__doc__");
        assert_eq!(lines[4], "        root/sub/test_a.pv@__doc__::0");
        assert!(lines.contains(&"      root/sub/test_a.pv::test_fn()"));
    }

    #[test]
    fn json_outcome_nodes_carry_kind_and_streams() {
        let tree = build_tree(Path::new("root"), &sample_files());
        let doc = to_json(&tree);

        let file_a = &doc["children"][0]["children"][0];
        let suite = &file_a["children"][0];
        assert_eq!(suite["testID"], "root/sub/test_a.pv@__doc__");
        let blocks = suite["children"].as_array().unwrap();
        assert_eq!(blocks[0]["kind"], "success");
        assert_eq!(blocks[1]["kind"], "failure");
        assert_eq!(blocks[1]["error"], "2 != 3");
        assert_eq!(blocks[2]["kind"], "skipped");
        assert_eq!(blocks[0]["duration_ms"], 5);
        // inner nodes carry no outcome fields
        assert!(suite.get("kind").is_none());
    }

    #[test]
    fn json_child_order_is_discovery_order_even_with_failures() {
        let tree = build_tree(Path::new("root"), &sample_files());
        let doc = to_json(&tree);
        let blocks = &doc["children"][0]["children"][0]["children"][0]["children"];
        let ids: Vec<&str> = blocks
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["testID"].as_str().unwrap())
            .collect();
        assert_eq!(
            ids,
            vec![
                "root/sub/test_a.pv@__doc__::0",
                "root/sub/test_a.pv@__doc__::1",
                "root/sub/test_a.pv@__doc__::2"
            ]
        );
    }

    #[test]
    fn collect_json_uses_id_and_location() {
        let tree = build_tree(Path::new("root"), &sample_files());
        let doc = to_collect_json(&tree);
        let leaf = &doc["children"][1]["children"][0];
        assert_eq!(leaf["id"], "root/test_b.pv::test_solo()");
        assert_eq!(leaf["location"]["startLine"], 1);
        assert_eq!(leaf["location"]["endColumn"], 3);
        assert!(leaf.get("kind").is_none());
    }

    #[test]
    fn empty_tree_renders_well_formed_output() {
        let tree = build_tree(Path::new("root"), &[]);
        let doc = to_json(&tree);
        assert_eq!(doc["children"].as_array().unwrap().len(), 0);
        let text = render_summary(&tree, Duration::ZERO);
        assert!(text.contains("0 collected"));
    }
}
