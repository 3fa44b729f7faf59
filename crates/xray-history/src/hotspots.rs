//! Change-frequency × churn hotspot detection.
//!
//! Files that change often and change a lot are where defects concentrate.
//! Each file is scored from its commit count and churn, both normalized
//! against the busiest file in the history.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::index::HistoryIndex;

/// Weight of normalized commit frequency in the score.
pub const FREQUENCY_WEIGHT: f64 = 0.6;

/// Weight of normalized churn in the score.
pub const CHURN_WEIGHT: f64 = 0.4;

/// A file with frequent and large changes.
///
/// # Examples
///
/// ```
/// use xray_history::hotspots::Hotspot;
///
/// let h = Hotspot {
///     path: "src/main.rs".into(),
///     commit_count: 10,
///     lines_added: 400,
///     lines_deleted: 100,
///     churn: 500,
///     score: 0.85,
///     authors: 3,
///     last_modified: 1700000000,
/// };
/// assert!(h.score > 0.0 && h.score <= 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    /// File path relative to repo root.
    pub path: String,
    /// Number of commits touching this file.
    pub commit_count: u32,
    /// Total lines added.
    pub lines_added: u64,
    /// Total lines deleted.
    pub lines_deleted: u64,
    /// `lines_added + lines_deleted`.
    pub churn: u64,
    /// Weighted score (0.0–1.0).
    pub score: f64,
    /// Number of distinct authors.
    pub authors: u32,
    /// Unix timestamp of the most recent change.
    pub last_modified: i64,
}

/// Rank files by `0.6 × frequency + 0.4 × churn`, both normalized to the maximum.
///
/// Excluded paths never reach the index's file stats, so they are absent
/// here rather than scored zero. Ties are broken by commit count descending,
/// then path ascending. Returns at most `top_n` entries.
///
/// # Examples
///
/// ```
/// use xray_history::hotspots::analyze_hotspots;
/// use xray_history::index::{HistoryIndex, IndexOptions};
/// use xray_history::parser::{parse_log, ParsePolicy};
///
/// let log = "@@xray@@c2\u{1f}A\u{1f}a@e.com\u{1f}2000\u{1f}\n\
///            50\t10\tsrc/busy.rs\n\
///            @@xray@@c1\u{1f}A\u{1f}a@e.com\u{1f}1000\u{1f}\n\
///            5\t0\tsrc/busy.rs\n\
///            1\t0\tsrc/quiet.rs\n";
/// let commits = parse_log(log, ParsePolicy::Lenient).unwrap().commits;
/// let index = HistoryIndex::build(&commits, &IndexOptions::default());
///
/// let hotspots = analyze_hotspots(&index, 10);
/// assert_eq!(hotspots[0].path, "src/busy.rs");
/// assert!((hotspots[0].score - 1.0).abs() < f64::EPSILON);
/// ```
pub fn analyze_hotspots(index: &HistoryIndex, top_n: usize) -> Vec<Hotspot> {
    let files = index.files();
    if files.is_empty() {
        return Vec::new();
    }

    let max_commits = files.values().map(|s| s.commit_count).max().unwrap_or(0);
    let max_churn = files.values().map(|s| s.churn()).max().unwrap_or(0);

    let mut hotspots: Vec<Hotspot> = files
        .iter()
        .map(|(path, stats)| {
            let norm_frequency = ratio(u64::from(stats.commit_count), u64::from(max_commits));
            let norm_churn = ratio(stats.churn(), max_churn);
            Hotspot {
                path: path.clone(),
                commit_count: stats.commit_count,
                lines_added: stats.lines_added,
                lines_deleted: stats.lines_deleted,
                churn: stats.churn(),
                score: FREQUENCY_WEIGHT * norm_frequency + CHURN_WEIGHT * norm_churn,
                authors: stats.authors.len() as u32,
                last_modified: stats.last_modified,
            }
        })
        .collect();

    hotspots.sort_by(compare_hotspots);
    hotspots.truncate(top_n);
    hotspots
}

fn ratio(value: u64, max: u64) -> f64 {
    if max == 0 {
        0.0
    } else {
        value as f64 / max as f64
    }
}

fn compare_hotspots(a: &Hotspot, b: &Hotspot) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.commit_count.cmp(&a.commit_count))
        .then_with(|| a.path.cmp(&b.path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::test_support::*;
    use crate::index::IndexOptions;
    use crate::parser::FileChange;

    fn build(commits: &[crate::parser::Commit]) -> HistoryIndex {
        HistoryIndex::build(commits, &IndexOptions::default())
    }

    #[test]
    fn high_churn_file_gets_high_score() {
        let index = build(&[
            commit("alice", 1000, &[("src/main.rs", 100, 50)]),
            commit("alice", 2000, &[("src/main.rs", 80, 40)]),
            commit("alice", 3000, &[("src/main.rs", 60, 30)]),
            commit("bob", 4000, &[("Cargo.toml", 1, 0)]),
        ]);
        let hotspots = analyze_hotspots(&index, 10);
        assert_eq!(hotspots[0].path, "src/main.rs");
        assert!(hotspots[0].score > hotspots[1].score);
        assert_eq!(hotspots[0].churn, 360);
    }

    #[test]
    fn scores_are_in_valid_range_and_top_is_normalized() {
        let index = build(&[
            commit("alice", 1000, &[("a.rs", 50, 20), ("b.rs", 5, 0)]),
            commit("bob", 2000, &[("b.rs", 5, 2), ("c.rs", 500, 0)]),
            commit("bob", 3000, &[("b.rs", 1, 1)]),
        ]);
        let hotspots = analyze_hotspots(&index, 10);
        for h in &hotspots {
            assert!((0.0..=1.0).contains(&h.score), "{} = {}", h.path, h.score);
        }

        let stats = index.files();
        let max_commits = stats.values().map(|s| s.commit_count).max().unwrap();
        let max_churn = stats.values().map(|s| s.churn()).max().unwrap();
        let top = &hotspots[0];
        let norm_f = f64::from(top.commit_count) / f64::from(max_commits);
        let norm_c = top.churn as f64 / max_churn as f64;
        assert!(norm_f <= 1.0 && norm_c <= 1.0);
        assert!(norm_f == 1.0 || norm_c == 1.0);
    }

    #[test]
    fn ties_break_by_commit_count_then_path() {
        let index = build(&[
            commit("alice", 1000, &[("b.rs", 1, 0), ("a.rs", 1, 0)]),
            commit("alice", 2000, &[("c.rs", 1, 0)]),
        ]);
        let hotspots = analyze_hotspots(&index, 10);
        let paths: Vec<&str> = hotspots.iter().map(|h| h.path.as_str()).collect();
        assert_eq!(paths, vec!["a.rs", "b.rs", "c.rs"]);
    }

    #[test]
    fn excluded_files_are_absent() {
        let index = build(&[commit(
            "alice",
            1000,
            &[("Cargo.lock", 900, 900), ("src/lib.rs", 1, 0)],
        )]);
        let hotspots = analyze_hotspots(&index, 10);
        assert_eq!(hotspots.len(), 1);
        assert_eq!(hotspots[0].path, "src/lib.rs");
        assert!((hotspots[0].score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn binary_only_history_scores_on_frequency() {
        let mut c1 = touch("alice", 1000, &[]);
        c1.files.push(FileChange::binary("logo.png"));
        let mut c2 = touch("alice", 2000, &[]);
        c2.files.push(FileChange::binary("logo.png"));
        c2.files.push(FileChange::binary("icon.png"));
        let hotspots = analyze_hotspots(&build(&[c1, c2]), 10);
        assert_eq!(hotspots[0].path, "logo.png");
        assert!((hotspots[0].score - FREQUENCY_WEIGHT).abs() < 1e-12);
        assert!((hotspots[1].score - FREQUENCY_WEIGHT * 0.5).abs() < 1e-12);
    }

    #[test]
    fn truncates_to_top_n() {
        let index = build(&[touch("alice", 1000, &["a", "b", "c", "d"])]);
        assert_eq!(analyze_hotspots(&index, 2).len(), 2);
    }

    #[test]
    fn empty_index_gives_no_hotspots() {
        assert!(analyze_hotspots(&build(&[]), 10).is_empty());
    }
}
