//! Integration tests for the Pavo test engine
//!
//! These drive the whole pipeline (scan -> locate -> execute -> report) on
//! scratch source trees, using a scripted in-memory executor so no real
//! interpreter is needed.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use pavo_test::discovery::{self, DiscoveredUnit, PACKAGE_MARKER};
use pavo_test::execution::{CodeExecutor, ExecScope, Execution, ExecutionEngine};
use pavo_test::report::{self, FileReport, Totals};
use pavo_test::{SourceUnit, TestId};

/// Executor that passes everything, tracking what it ran.
#[derive(Default)]
struct PassingExecutor {
    ran: Vec<String>,
}

impl CodeExecutor for PassingExecutor {
    fn run_function(&mut self, _unit: &SourceUnit, function: &str) -> Execution {
        self.ran.push(function.to_string());
        Execution::success()
    }

    fn run_block(&mut self, scope: &mut ExecScope, execute_text: &str) -> Execution {
        self.ran.push(execute_text.to_string());
        scope.absorb(execute_text, 0);
        Execution::success()
    }
}

fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
}

const TWO_TESTS: &str = "def test_a() -> Unit:\n    pass\n\ndef test_b() -> Unit:\n    pass\n";

/// Directory with one package-marked subdirectory and one plain subdirectory:
/// collection sees exactly the plain directory's tests.
#[test]
fn packages_are_not_test_targets() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[
            ("plain/test_one.pv", TWO_TESTS),
            ("plain/test_two.pv", TWO_TESTS),
            ("pkg/test_hidden.pv", TWO_TESTS),
        ],
    );
    fs::write(dir.path().join("pkg").join(PACKAGE_MARKER), "").unwrap();

    let request = discovery::scan_target(dir.path().to_str().unwrap()).unwrap();
    let discovered: Vec<DiscoveredUnit> = request
        .files
        .iter()
        .map(|f| DiscoveredUnit::load(f).unwrap())
        .collect();
    let planned: Vec<FileReport> = discovered.iter().map(FileReport::from_discovery).collect();
    let tree = report::build_tree(&request.root, &planned);

    let leaves = tree.leaves();
    assert_eq!(leaves.len(), 4);
    assert!(leaves.iter().all(|l| !l.id.contains("hidden")));
}

/// All TestIDs in one run are pairwise distinct.
#[test]
fn test_ids_are_unique_across_a_run() {
    let dir = tempfile::tempdir().unwrap();
    let doc_file = r#""""
```pavo
a = 1
```
```pavo
a += 1
```
"""

def test_a() -> Unit:
    """
    ```pavo
    b = 1
    ```
    """
    pass
"#;
    write_tree(
        dir.path(),
        &[("test_doc.pv", doc_file), ("sub/test_doc.pv", doc_file)],
    );

    let request = discovery::scan_target(dir.path().to_str().unwrap()).unwrap();
    let planned: Vec<FileReport> = request
        .files
        .iter()
        .map(|f| FileReport::from_discovery(&DiscoveredUnit::load(f).unwrap()))
        .collect();
    let tree = report::build_tree(&request.root, &planned);

    let ids: Vec<String> = tree.leaves().iter().map(|l| l.id.clone()).collect();
    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(ids.len(), 8);
    assert_eq!(unique.len(), ids.len());
}

/// Collection mode run twice on an unchanged tree yields identical JSON.
#[test]
fn collection_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[
            ("test_x.pv", TWO_TESTS),
            ("nested/test_y.pv", "\"\"\"\n```pavo\nv = 1\n```\n\"\"\"\n"),
        ],
    );

    let collect = || {
        let request = discovery::scan_target(dir.path().to_str().unwrap()).unwrap();
        let planned: Vec<FileReport> = request
            .files
            .iter()
            .map(|f| FileReport::from_discovery(&DiscoveredUnit::load(f).unwrap()))
            .collect();
        let tree = report::build_tree(&request.root, &planned);
        report::to_collect_json(&tree).to_string()
    };

    assert_eq!(collect(), collect());
}

/// A compound target executes exactly one node and the report tree contains
/// exactly one leaf.
#[test]
fn compound_target_filters_to_one_leaf() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("test_f.pv", TWO_TESTS)]);
    let file = dir.path().join("test_f.pv");

    let target = format!("{}::test_b()", file.display());
    let request = discovery::scan_target(&target).unwrap();
    let filter = request.filter.clone().unwrap();

    let discovered = DiscoveredUnit::load(&request.files[0]).unwrap();
    let mut exec = PassingExecutor::default();
    let results = ExecutionEngine::new(&mut exec)
        .with_filter(Some(&filter))
        .run_unit(&discovered, |_| {});

    assert_eq!(exec.ran, vec!["test_b"]);

    let files = vec![FileReport::from_outcomes(file.clone(), results)];
    let tree = report::build_tree(&request.root, &files);
    assert_eq!(tree.leaves().len(), 1);
    assert_eq!(tree.leaves()[0].id, format!("{}::test_b()", file.display()));
}

/// Discovery errors poison only their own source unit.
#[test]
fn malformed_unit_does_not_stop_siblings() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[
            ("test_bad.pv", "\"\"\"\n```pavo\nnever closed\n\"\"\"\n"),
            ("test_good.pv", TWO_TESTS),
        ],
    );

    let request = discovery::scan_target(dir.path().to_str().unwrap()).unwrap();
    let mut ok = 0;
    let mut errors = 0;
    for file in &request.files {
        match DiscoveredUnit::load(file) {
            Ok(unit) => {
                ok += 1;
                assert_eq!(unit.tests.node_count(), 2);
            }
            Err(e) => {
                errors += 1;
                assert!(e.to_string().contains("unterminated"));
            }
        }
    }
    assert_eq!((ok, errors), (1, 1));
}

/// Outcomes flow through to totals: a failed block skips its suite tail but
/// sibling nodes still run.
#[test]
fn end_to_end_totals_with_failures() {
    struct FailOnMarker;
    impl CodeExecutor for FailOnMarker {
        fn run_function(&mut self, _unit: &SourceUnit, _function: &str) -> Execution {
            Execution::success()
        }
        fn run_block(&mut self, scope: &mut ExecScope, execute_text: &str) -> Execution {
            if execute_text.contains("boom") {
                Execution::failure("assertion failed: boom")
            } else {
                scope.absorb(execute_text, 0);
                Execution::success()
            }
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let source = r#""""
```pavo
a = 1
```
```pavo
boom()
```
```pavo
c = 3
```
"""

def test_fine() -> Unit:
    pass
"#;
    write_tree(dir.path(), &[("test_mix.pv", source)]);

    let request = discovery::scan_target(dir.path().to_str().unwrap()).unwrap();
    let discovered = DiscoveredUnit::load(&request.files[0]).unwrap();
    let mut exec = FailOnMarker;
    let results = ExecutionEngine::new(&mut exec).run_unit(&discovered, |_| {});

    let files = vec![FileReport::from_outcomes(
        discovered.unit.path.clone(),
        results,
    )];
    let tree = report::build_tree(&request.root, &files);
    let totals = Totals::from_tree(&tree);

    assert_eq!(totals.discovered, 4);
    assert_eq!(totals.passed, 2); // first block + function test
    assert_eq!(totals.failed, 1);
    assert_eq!(totals.skipped, 1);

    // JSON stays in discovery order, failure in the middle.
    let doc = report::to_json(&tree);
    let suite = &doc["children"][0]["children"][0];
    let kinds: Vec<&str> = suite["children"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["success", "failure", "skipped"]);
}

/// Compound doc-block targets parse back into the same identity the engine
/// assigns during discovery.
#[test]
fn doc_block_target_round_trips_through_discovery() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[(
            "test_doc.pv",
            "\"\"\"\n```pavo\nx = 1\n```\n```pavo\nassert_eq(x, 1)\n```\n\"\"\"\n",
        )],
    );
    let file = dir.path().join("test_doc.pv");

    let target = format!("{}@__doc__::1", file.display());
    let request = discovery::scan_target(&target).unwrap();
    assert_eq!(
        request.filter,
        Some(TestId::doc_block(PathBuf::from(&file), None, 1))
    );
}
