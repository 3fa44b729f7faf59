//! Temporal coupling detection.
//!
//! Identifies pairs of files that keep changing in the same commits. Pairs
//! that span directories are the interesting ones: they point at
//! dependencies the module layout does not show.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::index::HistoryIndex;
use crate::paths::directory_of;

/// Knobs for [`analyze_coupling`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CouplingOptions {
    /// Maximum pairs returned.
    pub top_n: usize,
    /// Pairs sharing fewer commits are ignored.
    pub min_co_commits: u32,
    /// Pairs below this confidence are ignored.
    pub min_confidence: f64,
}

impl Default for CouplingOptions {
    fn default() -> Self {
        Self {
            top_n: 10,
            min_co_commits: 2,
            min_confidence: 0.0,
        }
    }
}

/// A pair of files that frequently change together.
///
/// # Examples
///
/// ```
/// use xray_history::coupling::CoupledPair;
///
/// let pair = CoupledPair {
///     file_a: "api/handler.rs".into(),
///     file_b: "db/schema.rs".into(),
///     co_commits: 6,
///     commits_a: 8,
///     commits_b: 6,
///     confidence: 1.0,
///     cross_directory: true,
/// };
/// assert!(pair.file_a < pair.file_b);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoupledPair {
    /// First file in the pair (lexicographically smaller).
    pub file_a: String,
    /// Second file in the pair.
    pub file_b: String,
    /// Commits touching both files.
    pub co_commits: u32,
    /// Total commits touching `file_a`.
    pub commits_a: u32,
    /// Total commits touching `file_b`.
    pub commits_b: u32,
    /// `co_commits / min(commits_a, commits_b)`.
    pub confidence: f64,
    /// Whether the files live in different directories.
    pub cross_directory: bool,
}

/// Find coupled file pairs.
///
/// Only pairs with at least `min_co_commits` shared commits and a confidence
/// of at least `min_confidence` are kept. Results are ordered by confidence
/// descending; at equal confidence cross-directory pairs come first, then
/// more shared commits, then file names.
///
/// # Examples
///
/// ```
/// use xray_history::coupling::{analyze_coupling, CouplingOptions};
/// use xray_history::index::{HistoryIndex, IndexOptions};
/// use xray_history::parser::{parse_log, ParsePolicy};
///
/// let log = "@@xray@@c2\u{1f}A\u{1f}a@e.com\u{1f}2000\u{1f}\n\
///            1\t0\tapi/route.rs\n\
///            1\t0\tdb/model.rs\n\
///            @@xray@@c1\u{1f}A\u{1f}a@e.com\u{1f}1000\u{1f}\n\
///            1\t0\tapi/route.rs\n\
///            1\t0\tdb/model.rs\n";
/// let commits = parse_log(log, ParsePolicy::Lenient).unwrap().commits;
/// let index = HistoryIndex::build(&commits, &IndexOptions::default());
///
/// let pairs = analyze_coupling(&index, &CouplingOptions::default());
/// assert_eq!(pairs.len(), 1);
/// assert_eq!(pairs[0].co_commits, 2);
/// assert!(pairs[0].cross_directory);
/// ```
pub fn analyze_coupling(index: &HistoryIndex, options: &CouplingOptions) -> Vec<CoupledPair> {
    let depth = index.dir_depth();
    let mut pairs = Vec::new();

    for ((file_a, file_b), &co_commits) in index.co_changes() {
        if co_commits < options.min_co_commits {
            continue;
        }
        let (Some(stats_a), Some(stats_b)) = (index.file(file_a), index.file(file_b)) else {
            continue;
        };
        let smaller = stats_a.commit_count.min(stats_b.commit_count);
        if smaller == 0 {
            continue;
        }

        let confidence = f64::from(co_commits) / f64::from(smaller);
        if confidence < options.min_confidence {
            continue;
        }

        pairs.push(CoupledPair {
            file_a: file_a.clone(),
            file_b: file_b.clone(),
            co_commits,
            commits_a: stats_a.commit_count,
            commits_b: stats_b.commit_count,
            confidence,
            cross_directory: directory_of(file_a, depth) != directory_of(file_b, depth),
        });
    }

    pairs.sort_by(compare_pairs);
    pairs.truncate(options.top_n);
    pairs
}

fn compare_pairs(a: &CoupledPair, b: &CoupledPair) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| b.cross_directory.cmp(&a.cross_directory))
        .then_with(|| b.co_commits.cmp(&a.co_commits))
        .then_with(|| a.file_a.cmp(&b.file_a))
        .then_with(|| a.file_b.cmp(&b.file_b))
}
