//! The aggregation index: one sequential fold over the commit list.
//!
//! Every analysis reads from a [`HistoryIndex`] instead of rescanning the
//! commits, so exclusion rules are applied exactly once and consistently.
//! Which rule affects which structure:
//!
//! | rule            | file stats | co-changes | directories | touches | quarters |
//! |-----------------|------------|------------|-------------|---------|----------|
//! | `since` window  | skip       | skip       | skip        | skip    | skip     |
//! | path exclusion  | skip       | skip       | count       | count   | count    |
//! | noise threshold | count      | skip       | count       | count   | count    |

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use chrono::{DateTime, Datelike};
use serde::{Deserialize, Serialize};
use xray_core::{AnalysisConfig, XrayError};

use crate::identity::AuthorId;
use crate::parser::{Commit, LineStats};
use crate::paths::{directory_of, PathFilter};

/// Options that shape the fold.
///
/// # Examples
///
/// ```
/// use xray_history::index::IndexOptions;
///
/// let opts = IndexOptions::default();
/// assert_eq!(opts.noise_threshold, 30);
/// assert_eq!(opts.dir_depth, 2);
/// assert!(opts.since.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Paths left out of file stats and co-changes.
    pub filter: PathFilter,
    /// Commits with more distinct files than this add no co-changes.
    pub noise_threshold: usize,
    /// Depth passed to [`directory_of`].
    pub dir_depth: usize,
    /// Commits older than this Unix timestamp are ignored entirely.
    pub since: Option<i64>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            filter: PathFilter::default_filter(),
            noise_threshold: 30,
            dir_depth: 2,
            since: None,
        }
    }
}

impl IndexOptions {
    /// Compile options from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`XrayError::Config`] if an exclude pattern is invalid.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, XrayError> {
        Ok(Self {
            filter: PathFilter::from_config(config)?,
            noise_threshold: config.noise_threshold,
            dir_depth: config.dir_depth,
            since: config
                .since
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc().timestamp()),
        })
    }
}

/// Accumulated history of one non-excluded file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileStats {
    /// Distinct commits touching the file.
    pub commit_count: u32,
    /// Lines added over all text changes.
    pub lines_added: u64,
    /// Lines deleted over all text changes.
    pub lines_deleted: u64,
    /// Changes recorded as binary.
    pub binary_changes: u32,
    /// Distinct authors who touched the file.
    pub authors: BTreeSet<AuthorId>,
    /// Author of the newest commit touching the file.
    pub last_author: AuthorId,
    /// Timestamp of the newest commit touching the file.
    pub last_modified: i64,
}

impl FileStats {
    fn first_seen(author: &AuthorId, timestamp: i64) -> Self {
        Self {
            commit_count: 0,
            lines_added: 0,
            lines_deleted: 0,
            binary_changes: 0,
            authors: BTreeSet::new(),
            last_author: author.clone(),
            last_modified: timestamp,
        }
    }

    /// Lines added + deleted.
    pub fn churn(&self) -> u64 {
        self.lines_added + self.lines_deleted
    }
}

/// Newest touch of a path, excluded or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastTouch {
    /// Who made the newest change.
    pub author: AuthorId,
    /// When.
    pub timestamp: i64,
}

/// A UTC calendar quarter.
///
/// # Examples
///
/// ```
/// use xray_history::index::QuarterKey;
///
/// // 2024-05-15T00:00:00Z
/// let key = QuarterKey::from_timestamp(1_715_731_200).unwrap();
/// assert_eq!(key, QuarterKey { year: 2024, quarter: 2 });
/// assert_eq!(key.to_string(), "2024 Q2");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuarterKey {
    /// Calendar year.
    pub year: i32,
    /// Quarter number, 1 to 4.
    pub quarter: u32,
}

impl QuarterKey {
    /// Quarter containing `timestamp`, or `None` if it is out of range.
    pub fn from_timestamp(timestamp: i64) -> Option<Self> {
        let dt = DateTime::from_timestamp(timestamp, 0)?;
        Some(Self {
            year: dt.year(),
            quarter: (dt.month() - 1) / 3 + 1,
        })
    }
}

impl fmt::Display for QuarterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Q{}", self.year, self.quarter)
    }
}

/// Commit and churn totals of one quarter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuarterBucket {
    /// Commits in the quarter.
    pub commit_count: u32,
    /// Lines added in the quarter.
    pub lines_added: u64,
    /// Lines deleted in the quarter.
    pub lines_deleted: u64,
    /// Distinct paths touched in the quarter.
    pub files: BTreeSet<String>,
}

impl QuarterBucket {
    /// Lines added + deleted.
    pub fn churn(&self) -> u64 {
        self.lines_added + self.lines_deleted
    }
}

/// Read-only lookup structures derived from one pass over the history.
///
/// # Examples
///
/// ```
/// use xray_history::index::{HistoryIndex, IndexOptions};
/// use xray_history::parser::{parse_log, ParsePolicy};
///
/// let log = "@@xray@@c1\u{1f}Alice\u{1f}a@e.com\u{1f}1700000000\u{1f}init\n\
///            3\t0\tsrc/lib.rs\n\
///            1\t0\tCargo.lock\n";
/// let parsed = parse_log(log, ParsePolicy::Lenient).unwrap();
/// let index = HistoryIndex::build(&parsed.commits, &IndexOptions::default());
///
/// assert_eq!(index.commit_count(), 1);
/// assert!(index.file("src/lib.rs").is_some());
/// // Lock files are left out of file stats but still count as touched.
/// assert!(index.file("Cargo.lock").is_none());
/// assert_eq!(index.path_count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct HistoryIndex {
    files: BTreeMap<String, FileStats>,
    touches: BTreeMap<String, LastTouch>,
    directories: BTreeMap<String, BTreeMap<AuthorId, u32>>,
    co_changes: BTreeMap<(String, String), u32>,
    quarters: BTreeMap<QuarterKey, QuarterBucket>,
    author_last_seen: BTreeMap<AuthorId, i64>,
    author_names: BTreeMap<AuthorId, String>,
    dir_depth: usize,
    commit_count: usize,
    oldest: Option<i64>,
    newest: Option<i64>,
    outside_window: usize,
    bulk_commits: usize,
}

impl HistoryIndex {
    /// Fold `commits` in encounter order.
    pub fn build(commits: &[Commit], options: &IndexOptions) -> Self {
        let mut index = Self {
            dir_depth: options.dir_depth,
            ..Self::default()
        };

        for commit in commits {
            if options.since.is_some_and(|since| commit.timestamp < since) {
                index.outside_window += 1;
                continue;
            }
            index.fold_commit(commit, options);
        }

        tracing::info!(
            commits = index.commit_count,
            files = index.files.len(),
            authors = index.author_last_seen.len(),
            skipped_by_window = index.outside_window,
            bulk_commits = index.bulk_commits,
            "history index built"
        );
        index
    }

    fn fold_commit(&mut self, commit: &Commit, options: &IndexOptions) {
        let ts = commit.timestamp;
        self.commit_count += 1;
        self.oldest = Some(self.oldest.map_or(ts, |o| o.min(ts)));
        self.newest = Some(self.newest.map_or(ts, |n| n.max(ts)));

        let seen = self.author_last_seen.entry(commit.author.clone()).or_insert(ts);
        *seen = (*seen).max(ts);
        self.author_names
            .entry(commit.author.clone())
            .or_insert_with(|| display_name(commit));

        let mut counted: HashSet<&str> = HashSet::new();
        for change in &commit.files {
            let path = change.path.as_str();

            match self.touches.get_mut(path) {
                Some(touch) if ts > touch.timestamp => {
                    touch.author = commit.author.clone();
                    touch.timestamp = ts;
                }
                Some(_) => {}
                None => {
                    self.touches.insert(
                        path.to_string(),
                        LastTouch {
                            author: commit.author.clone(),
                            timestamp: ts,
                        },
                    );
                }
            }

            if options.filter.is_excluded(path) {
                continue;
            }
            let stats = self
                .files
                .entry(path.to_string())
                .or_insert_with(|| FileStats::first_seen(&commit.author, ts));
            if counted.insert(path) {
                stats.commit_count += 1;
                stats.authors.insert(commit.author.clone());
                if ts > stats.last_modified {
                    stats.last_author = commit.author.clone();
                    stats.last_modified = ts;
                }
            }
            match change.lines {
                LineStats::Text { added, deleted } => {
                    stats.lines_added += added;
                    stats.lines_deleted += deleted;
                }
                LineStats::Binary => stats.binary_changes += 1,
            }
        }

        let paths = commit.distinct_paths();

        let dirs: BTreeSet<String> = paths
            .iter()
            .map(|p| directory_of(p, options.dir_depth))
            .collect();
        for dir in dirs {
            *self
                .directories
                .entry(dir)
                .or_default()
                .entry(commit.author.clone())
                .or_default() += 1;
        }

        if paths.len() > options.noise_threshold {
            self.bulk_commits += 1;
        } else {
            let mut eligible: Vec<&str> = paths
                .iter()
                .copied()
                .filter(|p| !options.filter.is_excluded(p))
                .collect();
            eligible.sort_unstable();
            for (i, a) in eligible.iter().enumerate() {
                for b in &eligible[i + 1..] {
                    *self
                        .co_changes
                        .entry((a.to_string(), b.to_string()))
                        .or_default() += 1;
                }
            }
        }

        match QuarterKey::from_timestamp(ts) {
            Some(key) => {
                let bucket = self.quarters.entry(key).or_default();
                bucket.commit_count += 1;
                for change in &commit.files {
                    bucket.lines_added += change.lines.added();
                    bucket.lines_deleted += change.lines.deleted();
                }
                bucket.files.extend(paths.iter().map(|p| p.to_string()));
            }
            None => {
                tracing::debug!(commit = %commit.hash, timestamp = ts, "timestamp outside calendar range");
            }
        }
    }

    /// Per-file stats for non-excluded paths, keyed by path.
    pub fn files(&self) -> &BTreeMap<String, FileStats> {
        &self.files
    }

    /// Stats for one path.
    pub fn file(&self, path: &str) -> Option<&FileStats> {
        self.files.get(path)
    }

    /// Newest touch of every path seen, including excluded ones.
    pub fn touches(&self) -> &BTreeMap<String, LastTouch> {
        &self.touches
    }

    /// Directory prefix → author → commits touching that directory.
    pub fn directories(&self) -> &BTreeMap<String, BTreeMap<AuthorId, u32>> {
        &self.directories
    }

    /// Lexicographically ordered file pair → commits touching both.
    pub fn co_changes(&self) -> &BTreeMap<(String, String), u32> {
        &self.co_changes
    }

    /// Shared commits of two files, in either order.
    pub fn co_change_count(&self, a: &str, b: &str) -> u32 {
        let key = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        self.co_changes.get(&key).copied().unwrap_or(0)
    }

    /// Quarter buckets in chronological order.
    pub fn quarters(&self) -> &BTreeMap<QuarterKey, QuarterBucket> {
        &self.quarters
    }

    /// Newest commit timestamp of an author.
    pub fn author_last_seen(&self, author: &AuthorId) -> Option<i64> {
        self.author_last_seen.get(author).copied()
    }

    /// Display name for an author key, falling back to the key itself.
    pub fn author_name<'a>(&'a self, author: &'a AuthorId) -> &'a str {
        self.author_names
            .get(author)
            .map(String::as_str)
            .unwrap_or_else(|| author.as_str())
    }

    /// Depth used for directory grouping.
    pub fn dir_depth(&self) -> usize {
        self.dir_depth
    }

    /// Commits folded into the index.
    pub fn commit_count(&self) -> usize {
        self.commit_count
    }

    /// Distinct normalized authors.
    pub fn author_count(&self) -> usize {
        self.author_last_seen.len()
    }

    /// Distinct paths touched, excluded ones included.
    pub fn path_count(&self) -> usize {
        self.touches.len()
    }

    /// Timestamp of the oldest folded commit.
    pub fn oldest_timestamp(&self) -> Option<i64> {
        self.oldest
    }

    /// Timestamp of the newest folded commit; the reference "now" for decay.
    pub fn newest_timestamp(&self) -> Option<i64> {
        self.newest
    }

    /// Commits dropped by the `since` window.
    pub fn commits_outside_window(&self) -> usize {
        self.outside_window
    }

    /// Commits too large to count toward coupling.
    pub fn bulk_commits(&self) -> usize {
        self.bulk_commits
    }
}

fn display_name(commit: &Commit) -> String {
    if commit.author_name.is_empty() {
        commit.author_email.clone()
    } else {
        commit.author_name.clone()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::parser::FileChange;

    #[test]
    fn file_commit_count_matches_commits_containing_path() {
        let commits = vec![
            commit("alice", 3000, &[("a.rs", 5, 1), ("b.rs", 2, 2)]),
            commit("bob", 2000, &[("a.rs", 1, 1), ("a.rs", 1, 0)]),
            commit("alice", 1000, &[("b.rs", 10, 0)]),
        ];
        let index = HistoryIndex::build(&commits, &IndexOptions::default());

        for (path, stats) in index.files() {
            let expected = commits
                .iter()
                .filter(|c| c.files.iter().any(|f| &f.path == path))
                .count() as u32;
            assert_eq!(stats.commit_count, expected, "{path}");
        }
        let a = index.file("a.rs").unwrap();
        assert_eq!(a.lines_added, 7);
        assert_eq!(a.lines_deleted, 2);
        assert_eq!(a.authors.len(), 2);
    }

    #[test]
    fn last_modified_uses_timestamps_not_position() {
        // Deliberately out of chronological order.
        let commits = vec![
            touch("alice", 1000, &["a.rs"]),
            touch("bob", 5000, &["a.rs"]),
            touch("carol", 3000, &["a.rs"]),
        ];
        let index = HistoryIndex::build(&commits, &IndexOptions::default());
        let stats = index.file("a.rs").unwrap();
        assert_eq!(stats.last_modified, 5000);
        assert_eq!(stats.last_author, AuthorId::from_parts("bob", "bob@example.com"));
        assert_eq!(index.touches()["a.rs"].timestamp, 5000);
        assert_eq!(index.oldest_timestamp(), Some(1000));
        assert_eq!(index.newest_timestamp(), Some(5000));
    }

    #[test]
    fn excluded_paths_still_count_for_directories_and_touches() {
        let commits = vec![touch("alice", 1000, &["web/package-lock.json"])];
        let index = HistoryIndex::build(&commits, &IndexOptions::default());
        assert!(index.files().is_empty());
        assert!(index.touches().contains_key("web/package-lock.json"));
        assert_eq!(index.directories()["web/"].values().sum::<u32>(), 1);
    }

    #[test]
    fn bulk_commits_add_no_co_changes_but_count_in_file_stats() {
        let opts = IndexOptions {
            noise_threshold: 3,
            ..IndexOptions::default()
        };
        let commits = vec![
            touch("alice", 2000, &["a", "b", "c", "d"]),
            touch("alice", 1000, &["a", "b"]),
        ];
        let index = HistoryIndex::build(&commits, &opts);
        assert_eq!(index.bulk_commits(), 1);
        assert_eq!(index.co_changes().len(), 1);
        assert_eq!(index.co_change_count("b", "a"), 1);
        assert_eq!(index.file("d").unwrap().commit_count, 1);
        assert_eq!(index.file("a").unwrap().commit_count, 2);
    }

    #[test]
    fn commit_at_threshold_still_couples() {
        let opts = IndexOptions {
            noise_threshold: 3,
            ..IndexOptions::default()
        };
        let index = HistoryIndex::build(&[touch("alice", 1000, &["a", "b", "c"])], &opts);
        assert_eq!(index.bulk_commits(), 0);
        assert_eq!(index.co_changes().len(), 3);
    }

    #[test]
    fn directories_count_each_commit_once() {
        let commits = vec![
            touch("alice", 1000, &["src/a.rs", "src/b.rs", "README.md"]),
            touch("bob", 2000, &["src/c.rs"]),
        ];
        let index = HistoryIndex::build(&commits, &IndexOptions::default());
        let src = &index.directories()["src/"];
        assert_eq!(src.values().sum::<u32>(), 2);
        assert_eq!(index.directories()["."].values().sum::<u32>(), 1);
    }

    #[test]
    fn since_window_drops_old_commits_everywhere() {
        let opts = IndexOptions {
            since: Some(1500),
            ..IndexOptions::default()
        };
        let commits = vec![
            touch("alice", 2000, &["new.rs"]),
            touch("bob", 1000, &["old.rs"]),
        ];
        let index = HistoryIndex::build(&commits, &opts);
        assert_eq!(index.commit_count(), 1);
        assert_eq!(index.commits_outside_window(), 1);
        assert!(index.file("old.rs").is_none());
        assert!(!index.touches().contains_key("old.rs"));
        assert_eq!(index.author_count(), 1);
    }

    #[test]
    fn binary_changes_count_as_touches_without_churn() {
        let mut c = touch("alice", 1000, &[]);
        c.files.push(FileChange::binary("logo.png"));
        let index = HistoryIndex::build(&[c], &IndexOptions::default());
        let stats = index.file("logo.png").unwrap();
        assert_eq!(stats.commit_count, 1);
        assert_eq!(stats.churn(), 0);
        assert_eq!(stats.binary_changes, 1);
    }

    #[test]
    fn quarters_bucket_by_calendar() {
        // 2024-03-31T23:59:59Z and 2024-04-01T00:00:00Z
        let commits = vec![
            commit("alice", 1_711_929_599, &[("a", 10, 0)]),
            commit("alice", 1_711_929_600, &[("a", 4, 4)]),
        ];
        let index = HistoryIndex::build(&commits, &IndexOptions::default());
        let keys: Vec<String> = index.quarters().keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["2024 Q1", "2024 Q2"]);
        assert_eq!(index.quarters().values().next().unwrap().churn(), 10);
    }

    #[test]
    fn empty_history_builds_empty_index() {
        let index = HistoryIndex::build(&[], &IndexOptions::default());
        assert_eq!(index.commit_count(), 0);
        assert!(index.newest_timestamp().is_none());
        assert!(index.quarters().is_empty());
    }

    #[test]
    fn since_from_config_is_midnight_utc() {
        let config = AnalysisConfig {
            since: chrono::NaiveDate::from_ymd_opt(2024, 1, 1),
            ..AnalysisConfig::default()
        };
        let opts = IndexOptions::from_config(&config).unwrap();
        assert_eq!(opts.since, Some(1_704_067_200));
    }
}
