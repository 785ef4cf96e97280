use std::collections::BTreeSet;
use std::path::Path;

use diffscope_core::{
    ChangeKind, ClassChangeKind, DiffConfig, DiffError, DiffReport, EngineConfig, FileChangeEntry,
    FilterConfig, LineSpan, MethodChange, SkipReason,
};
use diffscope_engine::{CancellationToken, DiffEngine, MemoryCache};
use diffscope_git::RevisionReader;
use git2::{Oid, Repository, RepositoryInitOptions, Signature};
use tempfile::TempDir;

fn init_repo(dir: &Path) -> Repository {
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("master");
    Repository::init_opts(dir, &opts).unwrap()
}

/// Apply writes (`Some`) and deletions (`None`) and commit them on HEAD.
fn commit(repo: &Repository, files: &[(&str, Option<&str>)], message: &str) -> Oid {
    let workdir = repo.workdir().unwrap().to_path_buf();
    let mut index = repo.index().unwrap();
    for (path, content) in files {
        let full = workdir.join(path);
        match content {
            Some(text) => {
                std::fs::create_dir_all(full.parent().unwrap()).unwrap();
                std::fs::write(&full, text).unwrap();
                index.add_path(Path::new(path)).unwrap();
            }
            None => {
                std::fs::remove_file(&full).unwrap();
                index.remove_path(Path::new(path)).unwrap();
            }
        }
    }
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("test", "test@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

const A_OLD: &str = "package com.acme;

public class A {
    void m() {
        int x = 1;
    }

    void keep() {}
}
";

const A_NEW: &str = "package com.acme;

public class A {
    void m() {
        int x = 2;
    }

    void keep() {}
}
";

const CALC_OLD: &str = "package com.acme;

class Calc {
    int add(int a, int b) { return a + b; }
    long add(long a, long b) { return a + b; }
    double add(double a, double b) { return a + b; }
}
";

const CALC_NEW: &str = "package com.acme;

class Calc {
    int add(int a, int b) { return a + b; }
    long add(long a, long b) { return Math.addExact(a, b); }
    double add(double a, double b) { return a + b; }
}
";

const FMT_OLD: &str = "package com.acme;
class Fmt {
    int f(int a) { return a+1; }
}
";

const FMT_NEW: &str = "package com.acme;
class Fmt {
\tint f( int a ) {  return a + 1;  }
}
";

struct Fixture {
    dir: TempDir,
    base: String,
    head: String,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let repo = init_repo(dir.path());
    let base = commit(
        &repo,
        &[
            ("src/main/java/com/acme/A.java", Some(A_OLD)),
            ("src/main/java/com/acme/Calc.java", Some(CALC_OLD)),
            ("src/main/java/com/acme/Fmt.java", Some(FMT_OLD)),
            ("src/main/java/com/acme/Gone.java", Some("package com.acme;\nclass Gone {}\n")),
            ("src/main/java/com/acme/Shape.java", Some("package com.acme;\ninterface Shape {}\n")),
            ("src/main/java/com/acme/Broken.java", Some("package com.acme;\nclass Broken {}\n")),
            ("src/test/java/com/acme/ATest.java", Some("package com.acme;\nclass ATest { void t() {} }\n")),
            ("pom.xml", Some("<project/>\n")),
        ],
        "base",
    );
    let head = commit(
        &repo,
        &[
            ("src/main/java/com/acme/A.java", Some(A_NEW)),
            ("src/main/java/com/acme/B.java", Some("package com.acme;\nclass B { void n() {} }\n")),
            ("src/main/java/com/acme/Calc.java", Some(CALC_NEW)),
            ("src/main/java/com/acme/Fmt.java", Some(FMT_NEW)),
            ("src/main/java/com/acme/Gone.java", None),
            ("src/main/java/com/acme/Shape.java", Some("package com.acme;\ninterface Shape { double area(); }\n")),
            ("src/main/java/com/acme/Broken.java", Some("package com.acme;\nclass Broken {\n  void b( {\n}\n")),
            ("src/test/java/com/acme/ATest.java", Some("package com.acme;\nclass ATest { void t() { int y; } }\n")),
            ("pom.xml", Some("<project><name>x</name></project>\n")),
        ],
        "head",
    );
    Fixture {
        dir,
        base: base.to_string(),
        head: head.to_string(),
    }
}

fn engine(fx: &Fixture, config: DiffConfig) -> DiffEngine {
    DiffEngine::new(fx.dir.path(), config).unwrap()
}

fn skip_reason<'a>(report: &'a DiffReport, file: &str) -> Option<&'a SkipReason> {
    report
        .skipped
        .iter()
        .find(|s| s.path.ends_with(file))
        .map(|s| &s.reason)
}

/// Order-independent view of a report: class identity plus its changed methods.
fn summary(report: &DiffReport) -> BTreeSet<(String, String, Vec<String>)> {
    report
        .records
        .iter()
        .map(|r| {
            let mut methods: Vec<String> = r
                .changed_methods
                .iter()
                .map(|m| format!("{}:{}", m.method.key, m.method.fingerprint))
                .collect();
            methods.sort();
            (r.package_name.clone(), r.class_name.clone(), methods)
        })
        .collect()
}

#[test]
fn modified_method_is_reported_as_replace() {
    let fx = fixture();
    let report = engine(&fx, DiffConfig::default()).run(&fx.base, &fx.head).unwrap();

    let record = report.find("com.acme", "A").unwrap();
    assert_eq!(record.kind, ClassChangeKind::Replace);
    assert_eq!(record.changed_methods.len(), 1);
    assert_eq!(record.changed_methods[0].method.key.to_string(), "m()");
    assert_eq!(record.changed_methods[0].change, MethodChange::Modified);
    assert_eq!(record.added_lines, vec![LineSpan::new(4, 5)]);
    assert_eq!(record.deleted_lines, vec![LineSpan::new(4, 5)]);
}

#[test]
fn added_file_is_reported_as_add() {
    let fx = fixture();
    let report = engine(&fx, DiffConfig::default()).run(&fx.base, &fx.head).unwrap();

    let record = report.find("com.acme", "B").unwrap();
    assert_eq!(record.kind, ClassChangeKind::Add);
    assert!(record.deleted_lines.is_empty());
    assert_eq!(record.changed_methods.len(), 1);
    assert_eq!(record.changed_methods[0].method.key.to_string(), "n()");
    assert_eq!(record.changed_methods[0].change, MethodChange::Added);
}

#[test]
fn deleted_interface_and_test_files_produce_no_record() {
    let fx = fixture();
    let report = engine(&fx, DiffConfig::default()).run(&fx.base, &fx.head).unwrap();

    assert!(report.find("com.acme", "Gone").is_none());
    assert!(report.find("com.acme", "Shape").is_none());
    assert!(report.find("com.acme", "ATest").is_none());
    assert_eq!(skip_reason(&report, "Gone.java"), Some(&SkipReason::Deleted));
    assert_eq!(skip_reason(&report, "Shape.java"), Some(&SkipReason::InterfaceOnly));
    assert_eq!(skip_reason(&report, "ATest.java"), Some(&SkipReason::TestSource));
    assert!(report.skipped.iter().all(|s| !s.path.ends_with("pom.xml")));
}

#[test]
fn only_the_changed_overload_is_reported() {
    let fx = fixture();
    let report = engine(&fx, DiffConfig::default()).run(&fx.base, &fx.head).unwrap();

    let record = report.find("com.acme", "Calc").unwrap();
    assert_eq!(record.changed_methods.len(), 1);
    assert!(record.is_method_changed("add", "(long a, long b)"));
    assert!(!record.is_method_changed("add", "(int a, int b)"));
    assert!(!record.is_method_changed("add", "(double a, double b)"));
}

#[test]
fn whitespace_only_edit_has_no_spans_or_methods() {
    let fx = fixture();
    let report = engine(&fx, DiffConfig::default()).run(&fx.base, &fx.head).unwrap();

    let record = report.find("com.acme", "Fmt").unwrap();
    assert!(record.changed_methods.is_empty());
    assert!(record.added_lines.is_empty());
    assert!(record.deleted_lines.is_empty());
}

#[test]
fn malformed_file_fails_alone() {
    let fx = fixture();
    let report = engine(&fx, DiffConfig::default()).run(&fx.base, &fx.head).unwrap();

    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert!(failure.path.ends_with("Broken.java"));
    assert_eq!(failure.revision.as_deref(), Some(fx.head.as_str()));
    assert!(failure.error.contains("parse error"));
    assert_eq!(report.records.len(), 4);
}

#[test]
fn stats_describe_the_run() {
    let fx = fixture();
    let config = DiffConfig {
        engine: EngineConfig {
            batch_size: 3,
            max_workers: 2,
        },
        ..DiffConfig::default()
    };
    let report = engine(&fx, config).run(&fx.base, &fx.head).unwrap();

    assert_eq!(report.stats.files_changed, 8);
    assert_eq!(report.stats.batches, 3);
    assert_eq!(report.stats.workers, 2);
    assert_eq!(report.old_revision, fx.base);
    assert_eq!(report.new_revision, fx.head);
}

#[test]
fn result_is_independent_of_batching() {
    let fx = fixture();
    let reference = summary(&engine(&fx, DiffConfig::default()).run(&fx.base, &fx.head).unwrap());

    for (batch_size, max_workers) in [(1, 1), (1, 8), (2, 3), (5, 0), (100, 1)] {
        let config = DiffConfig {
            engine: EngineConfig {
                batch_size,
                max_workers,
            },
            ..DiffConfig::default()
        };
        let report = engine(&fx, config).run(&fx.base, &fx.head).unwrap();
        assert_eq!(summary(&report), reference, "batch_size={batch_size} workers={max_workers}");
        assert_eq!(report.failures.len(), 1);
    }
}

#[test]
fn repeated_runs_are_identical() {
    let fx = fixture();
    let engine = engine(&fx, DiffConfig::default());
    let first = engine.run(&fx.base, &fx.head).unwrap();
    let second = engine.run(&fx.base, &fx.head).unwrap();
    assert_eq!(summary(&first), summary(&second));
}

#[test]
fn identical_revisions_produce_empty_report() {
    let fx = fixture();
    let report = engine(&fx, DiffConfig::default()).run(&fx.head, &fx.head).unwrap();
    assert!(report.records.is_empty());
    assert!(report.skipped.is_empty());
    assert_eq!(report.stats.batches, 0);
}

#[test]
fn replace_against_itself_reports_nothing() {
    let fx = fixture();
    let engine = engine(&fx, DiffConfig::default());
    let reader = RevisionReader::open(fx.dir.path()).unwrap();
    let head = reader.resolve(&fx.head).unwrap();
    let path = "src/main/java/com/acme/A.java";
    let entries = vec![FileChangeEntry::new(path, path, ChangeKind::Modify)];

    let report = engine.run_entries(&entries, &head, &head).unwrap();
    let record = report.find("com.acme", "A").unwrap();
    assert_eq!(record.kind, ClassChangeKind::Replace);
    assert!(record.changed_methods.is_empty());
    assert!(record.added_lines.is_empty());
    assert!(record.deleted_lines.is_empty());
}

#[test]
fn missing_path_is_a_file_failure() {
    let fx = fixture();
    let engine = engine(&fx, DiffConfig::default());
    let reader = RevisionReader::open(fx.dir.path()).unwrap();
    let base = reader.resolve(&fx.base).unwrap();
    let head = reader.resolve(&fx.head).unwrap();
    let entries = vec![
        FileChangeEntry::new("", "src/main/java/com/acme/Nope.java", ChangeKind::Add),
        FileChangeEntry::new("", "src/main/java/com/acme/B.java", ChangeKind::Add),
    ];

    let report = engine.run_entries(&entries, &base, &head).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].error.contains("does not exist"));
    assert!(report.find("com.acme", "B").is_some());
}

#[test]
fn unresolvable_revision_fails_the_run() {
    let fx = fixture();
    let err = engine(&fx, DiffConfig::default())
        .run(&fx.base, "refs/heads/nope")
        .unwrap_err();
    assert!(matches!(err, DiffError::Revision { .. }));
}

#[test]
fn not_a_repository_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let err = DiffEngine::new(dir.path(), DiffConfig::default())
        .unwrap()
        .run("master", "HEAD")
        .unwrap_err();
    assert!(matches!(err, DiffError::Git(_)));
}

#[test]
fn branch_names_resolve() {
    let fx = fixture();
    let report = engine(&fx, DiffConfig::default()).run(&fx.base, "master").unwrap();
    assert_eq!(report.new_revision, "master");
    assert!(report.find("com.acme", "A").is_some());
}

#[test]
fn exclude_patterns_skip_files() {
    let fx = fixture();
    let config = DiffConfig {
        filter: FilterConfig {
            exclude: vec!["**/Calc.java".into()],
            ..FilterConfig::default()
        },
        ..DiffConfig::default()
    };
    let report = engine(&fx, config).run(&fx.base, &fx.head).unwrap();
    assert!(report.find("com.acme", "Calc").is_none());
    assert!(matches!(
        skip_reason(&report, "Calc.java"),
        Some(SkipReason::PatternMatch(_))
    ));
}

#[test]
fn cancelled_run_returns_cancelled() {
    let fx = fixture();
    let token = CancellationToken::new();
    let engine = engine(&fx, DiffConfig::default()).with_cancellation(token.clone());
    token.cancel();
    let err = engine.run(&fx.base, &fx.head).unwrap_err();
    assert!(matches!(err, DiffError::Cancelled));
}

#[test]
fn cancellation_is_permanent_until_a_fresh_token() {
    let fx = fixture();
    let engine = engine(&fx, DiffConfig::default());
    engine.cancellation_token().cancel();
    for _ in 0..2 {
        assert!(matches!(
            engine.run(&fx.base, &fx.head),
            Err(DiffError::Cancelled)
        ));
    }

    let engine = engine.with_cancellation(CancellationToken::new());
    let report = engine.run(&fx.base, &fx.head).unwrap();
    assert_eq!(report.records.len(), 4);
}

#[test]
fn cached_run_reuses_report() {
    let fx = fixture();
    let engine = engine(&fx, DiffConfig::default());
    let cache = MemoryCache::new();

    let first = engine.run_cached(&fx.base, &fx.head, &cache).unwrap();
    assert_eq!(cache.len(), 1);
    let second = engine.run_cached(&fx.base, "master", &cache).unwrap();
    assert_eq!(cache.len(), 1);
    assert_eq!(second.new_revision, "master");
    assert_eq!(summary(&first), summary(&second));
}
