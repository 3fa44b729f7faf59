//! Report assembly: validate, index once, run the analyses in parallel.

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use xray_core::{Section, XrayConfig, XrayError};

use crate::coupling::{analyze_coupling, CoupledPair, CouplingOptions};
use crate::decay::{analyze_decay, DecayEntry, DecayOptions};
use crate::hotspots::{analyze_hotspots, Hotspot};
use crate::index::{HistoryIndex, IndexOptions};
use crate::ownership::{analyze_bus_factor, BusFactorOptions, DirectoryBusFactor};
use crate::parser::{parse_log, ParsePolicy, ParsedLog};
use crate::trend::{analyze_trend, ComplexityTrend};

/// Repository-level counts shown above the sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySummary {
    /// Commits analyzed.
    pub total_commits: usize,
    /// Distinct normalized authors.
    pub total_authors: usize,
    /// Distinct paths touched.
    pub total_files: usize,
    /// Oldest analyzed commit, RFC 3339 UTC.
    pub first_commit: Option<String>,
    /// Newest analyzed commit, RFC 3339 UTC.
    pub last_commit: Option<String>,
    /// Malformed commit blocks dropped by the parser.
    pub skipped_commits: usize,
    /// Malformed file lines dropped by the parser.
    pub skipped_lines: usize,
    /// Commits older than the `since` window.
    pub commits_outside_window: usize,
    /// Commits too large to count toward coupling.
    pub bulk_commits: usize,
}

/// The full analysis result.
///
/// Sections that were not requested are `None` and absent from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Repository-level counts.
    pub summary: RepositorySummary,
    /// Ranked hotspots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotspots: Option<Vec<Hotspot>>,
    /// Directories by bus-factor risk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus_factor: Option<Vec<DirectoryBusFactor>>,
    /// Coupled file pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupling: Option<Vec<CoupledPair>>,
    /// Decayed files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay: Option<Vec<DecayEntry>>,
    /// Quarterly churn trend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<ComplexityTrend>,
}

impl Report {
    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`XrayError::Serialization`] if serialization fails.
    pub fn to_json(&self) -> Result<String, XrayError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Build a report from already-parsed history.
///
/// The configuration is validated first. The index is built sequentially;
/// the requested analyses then run concurrently over the shared index.
///
/// # Errors
///
/// Returns [`XrayError::Config`] if the configuration is out of range or an
/// exclude pattern is not a valid glob.
///
/// # Examples
///
/// ```
/// use xray_core::{Section, XrayConfig};
/// use xray_history::build_report;
/// use xray_history::parser::{parse_log, ParsePolicy};
///
/// let log = "@@xray@@c1\u{1f}Alice\u{1f}a@e.com\u{1f}1700000000\u{1f}init\n\
///            3\t0\tsrc/lib.rs\n";
/// let parsed = parse_log(log, ParsePolicy::Lenient).unwrap();
///
/// let report = build_report(&parsed, &XrayConfig::default(), &[Section::Hotspots]).unwrap();
/// assert_eq!(report.summary.total_commits, 1);
/// assert_eq!(report.hotspots.as_ref().map(Vec::len), Some(1));
/// assert!(report.coupling.is_none());
/// ```
pub fn build_report(
    log: &ParsedLog,
    config: &XrayConfig,
    sections: &[Section],
) -> Result<Report, XrayError> {
    config.validate()?;
    let analysis = &config.analysis;
    let index = HistoryIndex::build(&log.commits, &IndexOptions::from_config(analysis)?);

    let wants = |section: Section| sections.contains(&section);
    let bus_options = BusFactorOptions::new(
        analysis.top_n,
        analysis.min_directory_commits,
        &config.risk,
    );
    let coupling_options = CouplingOptions {
        top_n: analysis.top_n,
        min_co_commits: analysis.min_co_commits,
        min_confidence: analysis.min_confidence,
    };
    let decay_options = DecayOptions {
        top_n: analysis.top_n,
        active_days: analysis.active_days,
        stale_days: analysis.stale_days,
    };

    let index = &index;
    let ((hotspots, bus_factor), ((coupling, decay), trend)) = rayon::join(
        || {
            rayon::join(
                || wants(Section::Hotspots).then(|| analyze_hotspots(index, analysis.top_n)),
                || wants(Section::BusFactor).then(|| analyze_bus_factor(index, &bus_options)),
            )
        },
        || {
            rayon::join(
                || {
                    rayon::join(
                        || wants(Section::Coupling).then(|| analyze_coupling(index, &coupling_options)),
                        || wants(Section::Decay).then(|| analyze_decay(index, &decay_options)),
                    )
                },
                || wants(Section::Trend).then(|| analyze_trend(index)),
            )
        },
    );

    Ok(Report {
        summary: summarize(index, log),
        hotspots,
        bus_factor,
        coupling,
        decay,
        trend,
    })
}

/// Parse raw `git log` text and build a report in one step.
///
/// Parsing follows `config.analysis.strict`.
///
/// # Errors
///
/// Returns [`XrayError::Parse`] for malformed input in strict mode, or any
/// error from [`build_report`].
pub fn analyze_log(
    input: &str,
    config: &XrayConfig,
    sections: &[Section],
) -> Result<Report, XrayError> {
    config.validate()?;
    let parsed = parse_log(input, ParsePolicy::from_strict(config.analysis.strict))?;
    build_report(&parsed, config, sections)
}

fn summarize(index: &HistoryIndex, log: &ParsedLog) -> RepositorySummary {
    RepositorySummary {
        total_commits: index.commit_count(),
        total_authors: index.author_count(),
        total_files: index.path_count(),
        first_commit: index.oldest_timestamp().and_then(rfc3339),
        last_commit: index.newest_timestamp().and_then(rfc3339),
        skipped_commits: log.skipped_commits,
        skipped_lines: log.skipped_lines,
        commits_outside_window: index.commits_outside_window(),
        bulk_commits: index.bulk_commits(),
    }
}

fn rfc3339(timestamp: i64) -> Option<String> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::test_support::*;

    fn parsed(commits: Vec<crate::parser::Commit>) -> ParsedLog {
        ParsedLog {
            commits,
            skipped_commits: 0,
            skipped_lines: 0,
        }
    }

    #[test]
    fn all_sections_present_when_requested() {
        let log = parsed(vec![touch("alice", 1_700_000_000, &["src/a.rs"])]);
        let report = build_report(&log, &XrayConfig::default(), &Section::ALL).unwrap();
        assert!(report.hotspots.is_some());
        assert!(report.bus_factor.is_some());
        assert!(report.coupling.is_some());
        assert!(report.decay.is_some());
        assert!(report.trend.is_some());
    }

    #[test]
    fn omitted_sections_are_absent_from_json() {
        let log = parsed(vec![touch("alice", 1_700_000_000, &["src/a.rs"])]);
        let report = build_report(&log, &XrayConfig::default(), &[Section::Trend]).unwrap();
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert!(json.get("trend").is_some());
        assert!(json.get("hotspots").is_none());
        assert!(json.get("busFactor").is_none());
    }

    #[test]
    fn summary_reports_dates_and_skips() {
        let mut log = parsed(vec![
            touch("alice", 1_700_000_000, &["a"]),
            touch("bob", 1_600_000_000, &["b"]),
        ]);
        log.skipped_commits = 2;
        log.skipped_lines = 3;
        let report = build_report(&log, &XrayConfig::default(), &[]).unwrap();
        let summary = &report.summary;
        assert_eq!(summary.total_commits, 2);
        assert_eq!(summary.total_authors, 2);
        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.first_commit.as_deref(), Some("2020-09-13T12:26:40Z"));
        assert_eq!(summary.last_commit.as_deref(), Some("2023-11-14T22:13:20Z"));
        assert_eq!(summary.skipped_commits, 2);
        assert_eq!(summary.skipped_lines, 3);
    }

    #[test]
    fn invalid_config_is_rejected_before_analysis() {
        let mut config = XrayConfig::default();
        config.analysis.top_n = 0;
        let err = build_report(&parsed(Vec::new()), &config, &Section::ALL).unwrap_err();
        assert!(matches!(err, XrayError::Config(_)));
    }

    #[test]
    fn empty_history_is_not_an_error() {
        let report = build_report(&parsed(Vec::new()), &XrayConfig::default(), &Section::ALL).unwrap();
        assert_eq!(report.summary.total_commits, 0);
        assert!(report.summary.first_commit.is_none());
        assert_eq!(report.hotspots, Some(Vec::new()));
        assert_eq!(
            report.trend.map(|t| t.direction),
            Some(crate::trend::TrendDirection::InsufficientData)
        );
    }

    #[test]
    fn strict_config_fails_on_malformed_log() {
        let mut config = XrayConfig::default();
        config.analysis.strict = true;
        let err = analyze_log("garbage\n", &config, &Section::ALL).unwrap_err();
        assert!(matches!(err, XrayError::Parse { .. }));
    }

    #[test]
    fn top_n_bounds_every_list() {
        let mut config = XrayConfig::default();
        config.analysis.top_n = 1;
        let log = parsed(vec![
            touch("alice", DAY * 1000, &["a/x", "b/y", "c/z"]),
            touch("alice", DAY * 1001, &["a/x", "b/y", "c/z"]),
        ]);
        let report = build_report(&log, &config, &Section::ALL).unwrap();
        assert_eq!(report.hotspots.unwrap().len(), 1);
        assert_eq!(report.bus_factor.unwrap().len(), 1);
        assert_eq!(report.coupling.unwrap().len(), 1);
    }
}
