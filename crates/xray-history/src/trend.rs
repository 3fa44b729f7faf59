//! Quarterly churn trend.
//!
//! Rising average churn per commit means each change touches more code,
//! which is how a codebase that is getting harder to change shows up in its
//! history.

use serde::{Deserialize, Serialize};

use crate::index::HistoryIndex;

/// Which way average churn moved between the last two quarters.
///
/// # Examples
///
/// ```
/// use xray_history::trend::TrendDirection;
///
/// assert_eq!(TrendDirection::InsufficientData.to_string(), "insufficient-data");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrendDirection {
    /// More churn per commit than the quarter before.
    Up,
    /// Less churn per commit than the quarter before.
    Down,
    /// Exactly the same.
    Flat,
    /// Fewer than two quarters with commits.
    InsufficientData,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Up => write!(f, "up"),
            TrendDirection::Down => write!(f, "down"),
            TrendDirection::Flat => write!(f, "flat"),
            TrendDirection::InsufficientData => write!(f, "insufficient-data"),
        }
    }
}

/// Activity of one calendar quarter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarterTrend {
    /// Display label, e.g. `2024 Q1`.
    pub label: String,
    /// Calendar year.
    pub year: i32,
    /// Quarter number, 1 to 4.
    pub quarter: u32,
    /// Commits in the quarter.
    pub commit_count: u32,
    /// Lines added in the quarter.
    pub lines_added: u64,
    /// Lines deleted in the quarter.
    pub lines_deleted: u64,
    /// `(lines_added + lines_deleted) / commit_count`.
    pub avg_churn: f64,
    /// Distinct paths touched.
    pub files_touched: usize,
    /// Percentage change of `avg_churn` against the previous listed quarter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_pct: Option<f64>,
}

/// Quarters in chronological order plus the overall direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityTrend {
    /// Non-empty quarters, oldest first.
    pub quarters: Vec<QuarterTrend>,
    /// Movement between the last two quarters.
    pub direction: TrendDirection,
}

/// Summarize churn per quarter.
///
/// Quarters without commits are not listed, so "previous quarter" always
/// means the previous quarter that had activity. The direction compares the
/// last two listed quarters, so a still-running quarter that holds the newest
/// commit counts as the latest one.
///
/// # Examples
///
/// ```
/// use xray_history::index::{HistoryIndex, IndexOptions};
/// use xray_history::parser::{parse_log, ParsePolicy};
/// use xray_history::trend::{analyze_trend, TrendDirection};
///
/// // 2024-01-15 and 2024-04-15, UTC
/// let log = "@@xray@@c2\u{1f}A\u{1f}a@e.com\u{1f}1713139200\u{1f}\n\
///            90\t10\tsrc/a.rs\n\
///            @@xray@@c1\u{1f}A\u{1f}a@e.com\u{1f}1705276800\u{1f}\n\
///            10\t0\tsrc/a.rs\n";
/// let commits = parse_log(log, ParsePolicy::Lenient).unwrap().commits;
/// let index = HistoryIndex::build(&commits, &IndexOptions::default());
///
/// let trend = analyze_trend(&index);
/// assert_eq!(trend.quarters.len(), 2);
/// assert_eq!(trend.quarters[0].label, "2024 Q1");
/// assert_eq!(trend.direction, TrendDirection::Up);
/// ```
pub fn analyze_trend(index: &HistoryIndex) -> ComplexityTrend {
    let mut quarters: Vec<QuarterTrend> = Vec::with_capacity(index.quarters().len());
    let mut previous_avg: Option<f64> = None;

    for (key, bucket) in index.quarters() {
        if bucket.commit_count == 0 {
            continue;
        }
        let avg_churn = bucket.churn() as f64 / f64::from(bucket.commit_count);
        let change_pct = previous_avg
            .filter(|prev| *prev > 0.0)
            .map(|prev| (avg_churn - prev) / prev * 100.0);

        quarters.push(QuarterTrend {
            label: key.to_string(),
            year: key.year,
            quarter: key.quarter,
            commit_count: bucket.commit_count,
            lines_added: bucket.lines_added,
            lines_deleted: bucket.lines_deleted,
            avg_churn,
            files_touched: bucket.files.len(),
            change_pct,
        });
        previous_avg = Some(avg_churn);
    }

    let direction = match quarters.as_slice() {
        [.., before, last] => {
            if last.avg_churn > before.avg_churn {
                TrendDirection::Up
            } else if last.avg_churn < before.avg_churn {
                TrendDirection::Down
            } else {
                TrendDirection::Flat
            }
        }
        _ => TrendDirection::InsufficientData,
    };

    ComplexityTrend {
        quarters,
        direction,
    }
}
