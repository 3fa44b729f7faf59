//! Text and Markdown renderers for a [`Report`].

use std::fmt::Write;

use chrono::DateTime;
use xray_core::RiskLevel;
use xray_history::coupling::CoupledPair;
use xray_history::decay::{DecayEntry, DecayRisk};
use xray_history::hotspots::Hotspot;
use xray_history::ownership::DirectoryBusFactor;
use xray_history::report::{RepositorySummary, Report};
use xray_history::trend::{ComplexityTrend, TrendDirection};

const WIDTH: usize = 70;

/// Where the history came from, shown above the summary.
pub struct Origin {
    pub repo_name: String,
    pub branch: Option<String>,
}

struct Style {
    color: bool,
}

impl Style {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint("1", text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    fn red(&self, text: &str) -> String {
        self.paint("91", text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint("93", text)
    }

    fn green(&self, text: &str) -> String {
        self.paint("92", text)
    }

    fn heading(&self, title: &str, tagline: &str) -> String {
        format!(
            "{}{}\n{}\n",
            self.paint("1;96", &format!("  {title}")),
            self.dim(&format!("  {tagline}")),
            self.rule()
        )
    }

    fn rule(&self) -> String {
        self.dim(&"─".repeat(WIDTH))
    }

    fn risk(&self, risk: RiskLevel) -> String {
        match risk {
            RiskLevel::Critical => self.red(&self.bold("CRITICAL")),
            RiskLevel::Warning => self.yellow("WARNING "),
            RiskLevel::Ok => self.green("OK      "),
        }
    }

    fn decay(&self, risk: DecayRisk) -> String {
        match risk {
            DecayRisk::Stale => self.red(&self.bold("STALE   ")),
            DecayRisk::Aging => self.yellow("AGING   "),
        }
    }
}

/// Render the report for a terminal.
pub fn render_text(report: &Report, origin: &Origin, color: bool) -> String {
    let style = Style { color };
    let mut out = String::new();

    text_header(&mut out, &style, &report.summary, origin);
    if let Some(hotspots) = &report.hotspots {
        text_hotspots(&mut out, &style, hotspots);
    }
    if let Some(entries) = &report.bus_factor {
        text_bus_factor(&mut out, &style, entries);
    }
    if let Some(pairs) = &report.coupling {
        text_coupling(&mut out, &style, pairs);
    }
    if let Some(entries) = &report.decay {
        text_decay(&mut out, &style, entries);
    }
    if let Some(trend) = &report.trend {
        text_trend(&mut out, &style, trend);
    }
    let _ = writeln!(out, "{}", style.rule());
    out
}

fn text_header(out: &mut String, style: &Style, summary: &RepositorySummary, origin: &Origin) {
    let _ = writeln!(out, "{}", style.rule());
    let _ = writeln!(
        out,
        "{}{}",
        style.bold("  GIT X-RAY"),
        style.dim(&format!("  v{}", env!("CARGO_PKG_VERSION")))
    );
    let branch = origin.branch.as_deref().unwrap_or("unknown");
    let _ = writeln!(
        out,
        "  {}  {}  {}",
        style.bold(&origin.repo_name),
        style.dim("·"),
        style.dim(branch)
    );
    let _ = writeln!(
        out,
        "  {}  {}  {}  {}  {}",
        plural(summary.total_commits, "commit"),
        style.dim("·"),
        plural(summary.total_authors, "author"),
        style.dim("·"),
        plural(summary.total_files, "file"),
    );
    if let (Some(first), Some(last)) = (&summary.first_commit, &summary.last_commit) {
        if let (Ok(first), Ok(last)) = (
            DateTime::parse_from_rfc3339(first),
            DateTime::parse_from_rfc3339(last),
        ) {
            let days = (last - first).num_days();
            let _ = writeln!(
                out,
                "  {} - {} {}",
                first.format("%b %d, %Y"),
                last.format("%b %d, %Y"),
                style.dim(&format!("({days} days)"))
            );
        }
    }
    let mut notes = Vec::new();
    if summary.skipped_commits > 0 || summary.skipped_lines > 0 {
        notes.push(format!(
            "skipped {} malformed commits and {} lines",
            summary.skipped_commits, summary.skipped_lines
        ));
    }
    if summary.commits_outside_window > 0 {
        notes.push(format!(
            "{} outside the time window",
            plural(summary.commits_outside_window, "commit")
        ));
    }
    if summary.bulk_commits > 0 {
        notes.push(format!(
            "{} too large for coupling",
            plural(summary.bulk_commits, "commit")
        ));
    }
    if !notes.is_empty() {
        let _ = writeln!(out, "  {}", style.dim(&notes.join("; ")));
    }
    let _ = writeln!(out, "{}\n", style.rule());
}

fn text_hotspots(out: &mut String, style: &Style, hotspots: &[Hotspot]) {
    out.push_str(&style.heading("HOTSPOTS", "files with the highest change frequency and churn"));
    if hotspots.is_empty() {
        let _ = writeln!(out, "  No hotspots found.\n");
        return;
    }
    let _ = writeln!(
        out,
        "{}",
        style.dim(&format!("  {:<10} {:<42} {:>7}  {:>14}", "SCORE", "FILE", "COMMITS", "CHURN"))
    );
    for h in hotspots {
        let path = format!("{:<42}", truncate(&h.path, 40));
        let path = if h.score > 0.7 {
            style.red(&path)
        } else if h.score > 0.4 {
            style.yellow(&path)
        } else {
            path
        };
        let churn = format!("+{}/-{}", h.lines_added, h.lines_deleted);
        let _ = writeln!(
            out,
            "  {} {} {:>7}  {}",
            bar(h.score, 10),
            path,
            h.commit_count,
            style.dim(&format!("{churn:>14}"))
        );
    }
    out.push('\n');
}

fn text_bus_factor(out: &mut String, style: &Style, entries: &[DirectoryBusFactor]) {
    out.push_str(&style.heading("BUS FACTOR", "knowledge concentration risk"));
    if entries.is_empty() {
        let _ = writeln!(out, "  No directories to report.\n");
        return;
    }
    for entry in entries {
        let _ = writeln!(
            out,
            "  {}  {}  {}",
            style.risk(entry.risk),
            style.bold(&format!("{:<35}", truncate(&entry.directory, 35))),
            style.dim(&format!("bus factor: {}", entry.bus_factor))
        );
        let legend: Vec<String> = entry
            .contributors
            .iter()
            .take(4)
            .map(|c| format!("{} {}", short_name(&c.name), style.dim(&format!("{:.0}%", c.share))))
            .collect();
        let _ = writeln!(out, "            {}\n", legend.join(style.dim(" · ").as_str()));
    }
}

fn text_coupling(out: &mut String, style: &Style, pairs: &[CoupledPair]) {
    out.push_str(&style.heading("HIDDEN COUPLING", "files that change together"));
    if pairs.is_empty() {
        let _ = writeln!(out, "  No significant coupling detected.\n");
        return;
    }
    for pair in pairs {
        let pct = format!("{:>4}", format!("{:.0}%", pair.confidence * 100.0));
        let (pct, tag) = if pair.cross_directory {
            (style.red(&style.bold(&pct)), style.red(" (cross-directory)"))
        } else {
            (style.yellow(&pct), String::new())
        };
        let _ = writeln!(out, "  {pct}  {}", truncate(&pair.file_a, 60));
        let _ = writeln!(out, "        {}  {}", style.dim("<->"), truncate(&pair.file_b, 60));
        let _ = writeln!(
            out,
            "        {}{tag}\n",
            style.dim(&format!(
                "{} shared commits (A: {}, B: {})",
                pair.co_commits, pair.commits_a, pair.commits_b
            ))
        );
    }
}

fn text_decay(out: &mut String, style: &Style, entries: &[DecayEntry]) {
    out.push_str(&style.heading("KNOWLEDGE DECAY", "code without active maintainers"));
    if entries.is_empty() {
        let _ = writeln!(out, "  No decayed files.\n");
        return;
    }
    for entry in entries {
        let active = if entry.author_active {
            style.dim("still active")
        } else {
            style.red("no longer active")
        };
        let _ = writeln!(out, "  {}  {}", style.decay(entry.risk), truncate(&entry.path, 58));
        let _ = writeln!(
            out,
            "            last: {}, {} ({}d ago), {active}\n",
            entry.last_author_name,
            format_date(entry.last_modified),
            entry.days_since_last_commit
        );
    }
}

fn text_trend(out: &mut String, style: &Style, trend: &ComplexityTrend) {
    out.push_str(&style.heading("COMPLEXITY TREND", "average churn per commit by quarter"));
    if trend.quarters.is_empty() {
        let _ = writeln!(out, "  No commits to chart.\n");
        return;
    }
    let max_avg = trend
        .quarters
        .iter()
        .map(|q| q.avg_churn)
        .fold(0.0_f64, f64::max);
    for q in &trend.quarters {
        let ratio = if max_avg > 0.0 { q.avg_churn / max_avg } else { 0.0 };
        let change = match q.change_pct {
            Some(pct) if pct > 0.0 => style.red(&format!(" +{pct:.0}%")),
            Some(pct) if pct < 0.0 => style.green(&format!(" {pct:.0}%")),
            _ => String::new(),
        };
        let _ = writeln!(
            out,
            "  {}  {}  avg {:.0} lines/commit {}{change}",
            style.dim(&q.label),
            bar(ratio, 15),
            q.avg_churn,
            style.dim(&format!("({})", plural(q.commit_count as usize, "commit")))
        );
    }
    let verdict = match trend.direction {
        TrendDirection::Up => style.red(&style.bold(">> Churn per commit is trending UP.")),
        TrendDirection::Down => style.green(&style.bold(">> Churn per commit is trending DOWN.")),
        TrendDirection::Flat => style.dim(">> Churn per commit is flat."),
        TrendDirection::InsufficientData => style.dim(">> Not enough quarters to call a trend."),
    };
    let _ = writeln!(out, "\n  {verdict}\n");
}

/// Render the report as GitHub-flavored Markdown.
pub fn render_markdown(report: &Report, origin: &Origin) -> String {
    let mut out = String::new();
    let summary = &report.summary;

    let _ = writeln!(out, "# Git X-Ray: {}\n", origin.repo_name);
    if let Some(branch) = &origin.branch {
        let _ = writeln!(out, "- **Branch:** {branch}");
    }
    let _ = writeln!(out, "- **Commits:** {}", summary.total_commits);
    let _ = writeln!(out, "- **Authors:** {}", summary.total_authors);
    let _ = writeln!(out, "- **Files:** {}", summary.total_files);
    if let (Some(first), Some(last)) = (&summary.first_commit, &summary.last_commit) {
        let _ = writeln!(out, "- **Range:** {first} to {last}");
    }
    out.push('\n');

    if let Some(hotspots) = &report.hotspots {
        let _ = writeln!(out, "## Hotspots\n");
        if hotspots.is_empty() {
            let _ = writeln!(out, "No hotspots found.\n");
        } else {
            let _ = writeln!(out, "| Rank | File | Score | Commits | Churn | Authors |");
            let _ = writeln!(out, "|------|------|-------|---------|-------|---------|");
            for (i, h) in hotspots.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "| {} | `{}` | {:.2} | {} | +{}/-{} | {} |",
                    i + 1,
                    h.path,
                    h.score,
                    h.commit_count,
                    h.lines_added,
                    h.lines_deleted,
                    h.authors
                );
            }
            out.push('\n');
        }
    }

    if let Some(entries) = &report.bus_factor {
        let _ = writeln!(out, "## Bus Factor\n");
        if entries.is_empty() {
            let _ = writeln!(out, "No directories to report.\n");
        } else {
            let _ = writeln!(out, "| Risk | Directory | Bus factor | Commits | Top contributors |");
            let _ = writeln!(out, "|------|-----------|------------|---------|------------------|");
            for entry in entries {
                let top: Vec<String> = entry
                    .contributors
                    .iter()
                    .take(3)
                    .map(|c| format!("{} ({:.0}%)", c.name, c.share))
                    .collect();
                let _ = writeln!(
                    out,
                    "| {} | `{}` | {} | {} | {} |",
                    entry.risk,
                    entry.directory,
                    entry.bus_factor,
                    entry.total_commits,
                    top.join(", ")
                );
            }
            out.push('\n');
        }
    }

    if let Some(pairs) = &report.coupling {
        let _ = writeln!(out, "## Hidden Coupling\n");
        if pairs.is_empty() {
            let _ = writeln!(out, "No significant coupling detected.\n");
        } else {
            let _ = writeln!(out, "| File A | File B | Confidence | Shared commits | Cross-directory |");
            let _ = writeln!(out, "|--------|--------|------------|----------------|-----------------|");
            for pair in pairs {
                let _ = writeln!(
                    out,
                    "| `{}` | `{}` | {:.0}% | {} | {} |",
                    pair.file_a,
                    pair.file_b,
                    pair.confidence * 100.0,
                    pair.co_commits,
                    if pair.cross_directory { "yes" } else { "no" }
                );
            }
            out.push('\n');
        }
    }

    if let Some(entries) = &report.decay {
        let _ = writeln!(out, "## Knowledge Decay\n");
        if entries.is_empty() {
            let _ = writeln!(out, "No decayed files.\n");
        } else {
            let _ = writeln!(out, "| Risk | File | Last author | Days | Author active |");
            let _ = writeln!(out, "|------|------|-------------|------|---------------|");
            for entry in entries {
                let _ = writeln!(
                    out,
                    "| {} | `{}` | {} | {} | {} |",
                    entry.risk,
                    entry.path,
                    entry.last_author_name,
                    entry.days_since_last_commit,
                    if entry.author_active { "yes" } else { "no" }
                );
            }
            out.push('\n');
        }
    }

    if let Some(trend) = &report.trend {
        let _ = writeln!(out, "## Complexity Trend\n");
        if !trend.quarters.is_empty() {
            let _ = writeln!(out, "| Quarter | Commits | Avg churn | Files | Change |");
            let _ = writeln!(out, "|---------|---------|-----------|-------|--------|");
            for q in &trend.quarters {
                let change = q
                    .change_pct
                    .map(|pct| format!("{pct:+.0}%"))
                    .unwrap_or_else(|| "-".into());
                let _ = writeln!(
                    out,
                    "| {} | {} | {:.1} | {} | {} |",
                    q.label, q.commit_count, q.avg_churn, q.files_touched, change
                );
            }
            out.push('\n');
        }
        let _ = writeln!(out, "**Direction:** {}\n", trend.direction);
    }

    out
}

fn bar(value: f64, width: usize) -> String {
    let filled = ((value.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("{}{}", "▓".repeat(filled), "░".repeat(width - filled))
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Keep the tail of long paths, where the file name is.
fn truncate(s: &str, max: usize) -> String {
    let len = s.chars().count();
    if len <= max {
        return s.to_string();
    }
    let tail: String = s.chars().skip(len - (max - 3)).collect();
    format!("...{tail}")
}

fn short_name(name: &str) -> String {
    let name = name.split('@').next().unwrap_or(name);
    if name.chars().count() > 12 {
        let head: String = name.chars().take(11).collect();
        format!("{head}.")
    } else {
        name.to_string()
    }
}

fn format_date(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
