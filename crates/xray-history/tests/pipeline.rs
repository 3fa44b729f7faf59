//! Integration test: parse → index → analyze → serialize on hand-written logs.

use xray_core::{RiskLevel, Section, XrayConfig};
use xray_history::decay::DecayRisk;
use xray_history::parser::{parse_log, ParsePolicy};
use xray_history::report::analyze_log;
use xray_history::trend::TrendDirection;

const DAY: i64 = 86_400;

fn header(hash: &str, name: &str, email: &str, timestamp: i64, subject: &str) -> String {
    format!("@@xray@@{hash}\u{1f}{name}\u{1f}{email}\u{1f}{timestamp}\u{1f}{subject}\n")
}

/// Newest first, as `git log` emits it.
fn three_commit_log() -> String {
    let base = 1_700_000_000;
    let mut log = String::new();
    log += &header("c3", "Y", "y@example.com", base + 2 * DAY, "touch c");
    log += "4\t1\tc.py\n\n";
    log += &header("c2", "X", "x@example.com", base + DAY, "second");
    log += "3\t1\ta.py\n2\t0\tb.py\n\n";
    log += &header("c1", "X", "x@example.com", base, "first");
    log += "10\t0\ta.py\n5\t0\tb.py\n";
    log
}

#[test]
fn three_commit_scenario() {
    let report = analyze_log(&three_commit_log(), &XrayConfig::default(), &Section::ALL).unwrap();

    assert_eq!(report.summary.total_commits, 3);
    assert_eq!(report.summary.total_authors, 2);
    assert_eq!(report.summary.total_files, 3);

    let coupling = report.coupling.unwrap();
    assert_eq!(coupling.len(), 1, "only a.py/b.py co-change: {coupling:?}");
    assert_eq!(coupling[0].file_a, "a.py");
    assert_eq!(coupling[0].file_b, "b.py");
    assert_eq!(coupling[0].co_commits, 2);
    assert!((coupling[0].confidence - 1.0).abs() < f64::EPSILON);

    let bus = report.bus_factor.unwrap();
    assert_eq!(bus.len(), 1);
    assert_eq!(bus[0].directory, ".");
    assert_eq!(bus[0].bus_factor, 1);
    assert_eq!(bus[0].risk, RiskLevel::Critical);
    assert_eq!(bus[0].contributors[0].name, "X");

    let hotspots = report.hotspots.unwrap();
    assert_eq!(hotspots[0].path, "a.py");
    assert_eq!(hotspots[0].commit_count, 2);
    assert_eq!(hotspots[0].churn, 14);
}

#[test]
fn decay_control_scenario() {
    let now = 1_000 * DAY;
    let mut log = String::new();
    // Alice committed yesterday elsewhere; her old file must not be STALE.
    log += &header("c4", "Alice", "alice@example.com", now - DAY, "elsewhere");
    log += "1\t0\tsrc/active.rs\n";
    log += &header("c3", "Bob", "bob@example.com", now, "today");
    log += "1\t0\tsrc/today.rs\n";
    log += &header("c2", "Alice", "alice@example.com", now - 200 * DAY, "old");
    log += "1\t0\tsrc/alice_old.rs\n";
    log += &header("c1", "Carol", "carol@example.com", now - 300 * DAY, "gone");
    log += "1\t0\tsrc/carol_old.rs\n";

    let report = analyze_log(&log, &XrayConfig::default(), &[Section::Decay]).unwrap();
    let decay = report.decay.unwrap();

    let alice = decay.iter().find(|e| e.path == "src/alice_old.rs").unwrap();
    assert_eq!(alice.risk, DecayRisk::Aging);
    assert!(alice.author_active);

    let carol = decay.iter().find(|e| e.path == "src/carol_old.rs").unwrap();
    assert_eq!(carol.risk, DecayRisk::Stale);
    assert_eq!(carol.days_since_last_commit, 300);
    assert_eq!(decay[0].path, "src/carol_old.rs");
}

#[test]
fn json_is_byte_identical_across_runs() {
    let log = three_commit_log();
    let config = XrayConfig::default();
    let first = analyze_log(&log, &config, &Section::ALL).unwrap().to_json().unwrap();
    let second = analyze_log(&log, &config, &Section::ALL).unwrap().to_json().unwrap();
    assert_eq!(first, second);
    assert!(first.contains("\"busFactor\""));
    assert!(first.contains("\"coCommits\""));
}

#[test]
fn author_spellings_merge_across_commits() {
    let mut log = String::new();
    log += &header("c2", "alice  smith", "ALICE@Example.com ", 2_000, "b");
    log += "1\t0\tlib/a.rs\n";
    log += &header("c1", "Alice Smith", "alice@example.com", 1_000, "a");
    log += "1\t0\tlib/a.rs\n";

    let report = analyze_log(&log, &XrayConfig::default(), &Section::ALL).unwrap();
    assert_eq!(report.summary.total_authors, 1);
    let bus = report.bus_factor.unwrap();
    assert_eq!(bus[0].contributors.len(), 1);
    assert_eq!(bus[0].contributors[0].commits, 2);
}

#[test]
fn renames_binary_and_malformed_lines() {
    let mut log = String::new();
    log += &header("c3", "A", "a@example.com", 3_000, "rename");
    log += "2\t1\tsrc/{old => new}/mod.rs\n";
    log += "-\t-\tassets/logo.png\n";
    log += "not a numstat line\n";
    log += "@@xray@@broken-header\n";
    log += "1\t1\tlost.rs\n";
    log += &header("c1", "A", "a@example.com", 1_000, "init");
    log += "5\t0\tsrc/new/mod.rs\n";

    let parsed = parse_log(&log, ParsePolicy::Lenient).unwrap();
    assert_eq!(parsed.commits.len(), 2);
    assert_eq!(parsed.skipped_commits, 1);
    assert_eq!(parsed.skipped_lines, 1);

    let report = analyze_log(&log, &XrayConfig::default(), &Section::ALL).unwrap();
    assert_eq!(report.summary.skipped_commits, 1);
    assert_eq!(report.summary.skipped_lines, 1);

    let hotspots = report.hotspots.unwrap();
    let renamed = hotspots.iter().find(|h| h.path == "src/new/mod.rs").unwrap();
    assert_eq!(renamed.commit_count, 2);
    assert!(hotspots.iter().all(|h| h.path != "lost.rs"));
    let logo = hotspots.iter().find(|h| h.path == "assets/logo.png").unwrap();
    assert_eq!(logo.churn, 0);

    let mut strict = XrayConfig::default();
    strict.analysis.strict = true;
    assert!(analyze_log(&log, &strict, &Section::ALL).is_err());
}

#[test]
fn since_window_and_custom_excludes() {
    let mut log = String::new();
    // 2024-03-01 and 2023-06-01, UTC
    log += &header("c2", "A", "a@example.com", 1_709_251_200, "recent");
    log += "1\t0\tsrc/a.rs\n1\t0\tdocs/guide.md\n";
    log += &header("c1", "A", "a@example.com", 1_685_577_600, "old");
    log += "1\t0\tsrc/old.rs\n";

    let config = XrayConfig::from_toml(
        r#"
[analysis]
since = "2024-01-01"
exclude = ["docs/*"]
"#,
    )
    .unwrap();
    let report = analyze_log(&log, &config, &Section::ALL).unwrap();
    assert_eq!(report.summary.total_commits, 1);
    assert_eq!(report.summary.commits_outside_window, 1);
    let hotspots = report.hotspots.unwrap();
    assert_eq!(hotspots.len(), 1);
    assert_eq!(hotspots[0].path, "src/a.rs");
    assert_eq!(report.trend.unwrap().direction, TrendDirection::InsufficientData);
}

#[test]
fn lock_file_counts_for_ownership_but_not_hotspots() {
    let mut log = String::new();
    log += &header("c2", "A", "a@example.com", 2_000, "deps");
    log += "800\t700\tweb/package-lock.json\n";
    log += &header("c1", "B", "b@example.com", 1_000, "code");
    log += "3\t0\tweb/app.ts\n";

    let report = analyze_log(&log, &XrayConfig::default(), &Section::ALL).unwrap();
    let hotspots = report.hotspots.unwrap();
    assert_eq!(hotspots.len(), 1);
    assert_eq!(hotspots[0].path, "web/app.ts");

    let bus = report.bus_factor.unwrap();
    assert_eq!(bus[0].directory, "web/");
    assert_eq!(bus[0].total_commits, 2);
}
