//! Knowledge decay: files whose last author has gone quiet.
//!
//! All ages are measured against the newest commit in the history, so the
//! same log always produces the same report regardless of when it runs.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::identity::AuthorId;
use crate::index::HistoryIndex;

const SECONDS_PER_DAY: i64 = 86_400;

/// Knobs for [`analyze_decay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecayOptions {
    /// Maximum entries returned.
    pub top_n: usize,
    /// An author with no commit in this many days is inactive.
    pub active_days: u32,
    /// A file unmodified for this many days is stale.
    pub stale_days: u32,
}

impl Default for DecayOptions {
    fn default() -> Self {
        Self {
            top_n: 10,
            active_days: 90,
            stale_days: 180,
        }
    }
}

/// How badly a stale file has decayed.
///
/// # Examples
///
/// ```
/// use xray_history::decay::DecayRisk;
///
/// assert!(DecayRisk::Stale < DecayRisk::Aging);
/// assert_eq!(DecayRisk::Stale.to_string(), "STALE");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecayRisk {
    /// Stale file whose last author is inactive.
    Stale,
    /// Stale file whose last author is still around.
    Aging,
}

impl std::fmt::Display for DecayRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecayRisk::Stale => write!(f, "STALE"),
            DecayRisk::Aging => write!(f, "AGING"),
        }
    }
}

/// A file that has not been modified within the staleness window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecayEntry {
    /// File path relative to repo root.
    pub path: String,
    /// Author of the newest change to the file.
    pub last_author: AuthorId,
    /// Display name of `last_author`.
    pub last_author_name: String,
    /// Whole days between the file's last change and the newest commit.
    pub days_since_last_commit: i64,
    /// Whether `last_author` committed anywhere within the active window.
    pub author_active: bool,
    /// Classification.
    pub risk: DecayRisk,
    /// Unix timestamp of the file's last change.
    pub last_modified: i64,
}

/// Flag stale files and classify them by whether their last author is active.
///
/// Paths excluded from hotspots and coupling are still considered here.
/// Entries are ordered STALE first, then oldest, then by path.
///
/// # Examples
///
/// ```
/// use xray_history::decay::{analyze_decay, DecayOptions, DecayRisk};
/// use xray_history::index::{HistoryIndex, IndexOptions};
/// use xray_history::parser::{parse_log, ParsePolicy};
///
/// const DAY: i64 = 86_400;
/// let log = format!(
///     "@@xray@@c2\u{1f}Bob\u{1f}b@e.com\u{1f}{}\u{1f}\n1\t0\tnew.rs\n\
///      @@xray@@c1\u{1f}Ann\u{1f}a@e.com\u{1f}{}\u{1f}\n1\t0\told.rs\n",
///     400 * DAY,
///     100 * DAY,
/// );
/// let commits = parse_log(&log, ParsePolicy::Lenient).unwrap().commits;
/// let index = HistoryIndex::build(&commits, &IndexOptions::default());
///
/// let entries = analyze_decay(&index, &DecayOptions::default());
/// assert_eq!(entries.len(), 1);
/// assert_eq!(entries[0].path, "old.rs");
/// assert_eq!(entries[0].risk, DecayRisk::Stale);
/// assert_eq!(entries[0].days_since_last_commit, 300);
/// ```
pub fn analyze_decay(index: &HistoryIndex, options: &DecayOptions) -> Vec<DecayEntry> {
    let Some(reference) = index.newest_timestamp() else {
        return Vec::new();
    };
    let active_window = i64::from(options.active_days) * SECONDS_PER_DAY;
    let stale_window = i64::from(options.stale_days) * SECONDS_PER_DAY;

    let mut entries: Vec<DecayEntry> = index
        .touches()
        .iter()
        .filter(|(_, touch)| reference - touch.timestamp > stale_window)
        .map(|(path, touch)| {
            let last_seen = index.author_last_seen(&touch.author).unwrap_or(touch.timestamp);
            let author_active = reference - last_seen <= active_window;
            DecayEntry {
                path: path.clone(),
                last_author: touch.author.clone(),
                last_author_name: index.author_name(&touch.author).to_string(),
                days_since_last_commit: (reference - touch.timestamp) / SECONDS_PER_DAY,
                author_active,
                risk: if author_active {
                    DecayRisk::Aging
                } else {
                    DecayRisk::Stale
                },
                last_modified: touch.timestamp,
            }
        })
        .collect();

    entries.sort_by(compare_entries);
    entries.truncate(options.top_n);
    entries
}

fn compare_entries(a: &DecayEntry, b: &DecayEntry) -> Ordering {
    a.risk
        .cmp(&b.risk)
        .then_with(|| b.days_since_last_commit.cmp(&a.days_since_last_commit))
        .then_with(|| a.path.cmp(&b.path))
}
