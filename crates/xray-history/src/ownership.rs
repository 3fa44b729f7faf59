//! Per-directory bus factor.
//!
//! The bus factor of a directory is the smallest number of authors whose
//! combined commits make up a strict majority of the directory's commits.
//! A directory with bus factor 1 is one departure away from being orphaned.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use xray_core::{RiskConfig, RiskLevel};

use crate::identity::AuthorId;
use crate::index::HistoryIndex;

/// Knobs for [`analyze_bus_factor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusFactorOptions {
    /// Maximum directories returned.
    pub top_n: usize,
    /// Directories with fewer commits are left out.
    pub min_directory_commits: u32,
    /// Bus factor at or below this is CRITICAL.
    pub critical: u32,
    /// Bus factor at or below this (and above critical) is WARNING.
    pub warning: u32,
}

impl Default for BusFactorOptions {
    fn default() -> Self {
        Self {
            top_n: 10,
            min_directory_commits: 1,
            critical: 1,
            warning: 2,
        }
    }
}

impl BusFactorOptions {
    /// Combine the result limit with risk thresholds from configuration.
    pub fn new(top_n: usize, min_directory_commits: u32, risk: &RiskConfig) -> Self {
        Self {
            top_n,
            min_directory_commits,
            critical: risk.critical_bus_factor,
            warning: risk.warning_bus_factor,
        }
    }

    /// Classify a bus factor.
    ///
    /// # Examples
    ///
    /// ```
    /// use xray_core::RiskLevel;
    /// use xray_history::ownership::BusFactorOptions;
    ///
    /// let opts = BusFactorOptions::default();
    /// assert_eq!(opts.classify(1), RiskLevel::Critical);
    /// assert_eq!(opts.classify(2), RiskLevel::Warning);
    /// assert_eq!(opts.classify(3), RiskLevel::Ok);
    /// ```
    pub fn classify(&self, bus_factor: u32) -> RiskLevel {
        if bus_factor <= self.critical {
            RiskLevel::Critical
        } else if bus_factor <= self.warning {
            RiskLevel::Warning
        } else {
            RiskLevel::Ok
        }
    }
}

/// One author's share of a directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contributor {
    /// Normalized author key.
    pub author: AuthorId,
    /// Display name as first seen in the history.
    pub name: String,
    /// Commits by this author touching the directory.
    pub commits: u32,
    /// Percentage of the directory's commits, 0 to 100.
    pub share: f64,
}

/// Bus factor of a single directory.
///
/// # Examples
///
/// ```
/// use xray_core::RiskLevel;
/// use xray_history::ownership::DirectoryBusFactor;
///
/// let entry = DirectoryBusFactor {
///     directory: "src/".into(),
///     bus_factor: 1,
///     total_commits: 40,
///     risk: RiskLevel::Critical,
///     contributors: vec![],
/// };
/// assert_eq!(entry.risk.to_string(), "CRITICAL");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryBusFactor {
    /// Directory label from [`crate::paths::directory_of`].
    pub directory: String,
    /// Smallest number of authors holding more than half of the commits.
    pub bus_factor: u32,
    /// Commits touching the directory.
    pub total_commits: u32,
    /// Classification of `bus_factor`.
    pub risk: RiskLevel,
    /// Every author, most commits first.
    pub contributors: Vec<Contributor>,
}

/// Compute the bus factor of every directory in the index.
///
/// Directories are ordered by risk (CRITICAL first), then total commits
/// descending, then name. Returns at most `options.top_n` entries.
///
/// # Examples
///
/// ```
/// use xray_core::RiskLevel;
/// use xray_history::index::{HistoryIndex, IndexOptions};
/// use xray_history::ownership::{analyze_bus_factor, BusFactorOptions};
/// use xray_history::parser::{parse_log, ParsePolicy};
///
/// let log = "@@xray@@c3\u{1f}Bob\u{1f}b@e.com\u{1f}3000\u{1f}\n\
///            1\t0\tsrc/a.rs\n\
///            @@xray@@c2\u{1f}Ann\u{1f}a@e.com\u{1f}2000\u{1f}\n\
///            1\t0\tsrc/a.rs\n\
///            @@xray@@c1\u{1f}Ann\u{1f}a@e.com\u{1f}1000\u{1f}\n\
///            1\t0\tsrc/b.rs\n";
/// let commits = parse_log(log, ParsePolicy::Lenient).unwrap().commits;
/// let index = HistoryIndex::build(&commits, &IndexOptions::default());
///
/// let result = analyze_bus_factor(&index, &BusFactorOptions::default());
/// assert_eq!(result[0].directory, "src/");
/// assert_eq!(result[0].bus_factor, 1);
/// assert_eq!(result[0].risk, RiskLevel::Critical);
/// ```
pub fn analyze_bus_factor(index: &HistoryIndex, options: &BusFactorOptions) -> Vec<DirectoryBusFactor> {
    let mut entries: Vec<DirectoryBusFactor> = index
        .directories()
        .iter()
        .filter_map(|(directory, authors)| {
            let total: u32 = authors.values().sum();
            if total == 0 || total < options.min_directory_commits {
                return None;
            }

            let mut ranked: Vec<(&AuthorId, u32)> =
                authors.iter().map(|(id, &count)| (id, count)).collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

            let bus_factor = majority_count(ranked.iter().map(|(_, c)| *c), total);
            let contributors = ranked
                .into_iter()
                .map(|(id, commits)| Contributor {
                    author: id.clone(),
                    name: index.author_name(id).to_string(),
                    commits,
                    share: f64::from(commits) / f64::from(total) * 100.0,
                })
                .collect();

            Some(DirectoryBusFactor {
                directory: directory.clone(),
                bus_factor,
                total_commits: total,
                risk: options.classify(bus_factor),
                contributors,
            })
        })
        .collect();

    entries.sort_by(compare_entries);
    entries.truncate(options.top_n);
    entries
}

/// Smallest prefix of `counts` (already descending) whose sum exceeds half of `total`.
fn majority_count(counts: impl Iterator<Item = u32>, total: u32) -> u32 {
    let mut running: u64 = 0;
    let mut k = 0;
    for count in counts {
        running += u64::from(count);
        k += 1;
        // running / total > 1/2
        if running * 2 > u64::from(total) {
            break;
        }
    }
    k
}

fn compare_entries(a: &DirectoryBusFactor, b: &DirectoryBusFactor) -> Ordering {
    a.risk
        .cmp(&b.risk)
        .then_with(|| b.total_commits.cmp(&a.total_commits))
        .then_with(|| a.directory.cmp(&b.directory))
}
