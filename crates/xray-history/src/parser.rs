//! History stream parsing.
//!
//! Turns the text produced by `git log --numstat` with the [`LOG_FORMAT`]
//! header into an ordered list of [`Commit`]s. The parser never invokes git
//! itself; it only drains a string or a readable source.

use std::collections::HashSet;
use std::io::BufRead;

use serde::{Deserialize, Serialize};
use xray_core::XrayError;

use crate::identity::{AuthorId, IdentityNormalizer};

/// Prefix that marks a commit header line.
pub const HEADER_MARKER: &str = "@@xray@@";

/// Separator between header fields (ASCII unit separator).
pub const FIELD_SEPARATOR: char = '\u{1f}';

/// `--format` argument that makes `git log` emit headers this parser reads.
///
/// Pair it with `--numstat`.
pub const LOG_FORMAT: &str = "--format=@@xray@@%H%x1f%an%x1f%ae%x1f%at%x1f%s";

/// What to do with a record that does not match the expected layout.
///
/// # Examples
///
/// ```
/// use xray_history::parser::ParsePolicy;
///
/// assert_eq!(ParsePolicy::default(), ParsePolicy::Lenient);
/// assert_eq!(ParsePolicy::from_strict(true), ParsePolicy::Strict);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParsePolicy {
    /// Skip the malformed block or line and count it.
    #[default]
    Lenient,
    /// Fail the whole parse on the first malformed record.
    Strict,
}

impl ParsePolicy {
    /// Map a `strict` flag to a policy.
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            ParsePolicy::Strict
        } else {
            ParsePolicy::Lenient
        }
    }
}

/// One commit from the history stream.
///
/// # Examples
///
/// ```
/// use xray_history::identity::AuthorId;
/// use xray_history::parser::{Commit, FileChange, LineStats};
///
/// let commit = Commit {
///     hash: "abc123".into(),
///     author: AuthorId::from_parts("alice", "alice@example.com"),
///     author_name: "alice".into(),
///     author_email: "alice@example.com".into(),
///     timestamp: 1_700_000_000,
///     subject: "fix: auth bug".into(),
///     files: vec![FileChange::text("src/auth.rs", 10, 3)],
/// };
/// assert_eq!(commit.churn(), 13);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    /// Full commit hash.
    pub hash: String,
    /// Normalized author key.
    pub author: AuthorId,
    /// Author name as logged.
    pub author_name: String,
    /// Author email as logged.
    pub author_email: String,
    /// Unix timestamp of the commit (UTC seconds).
    pub timestamp: i64,
    /// First line of the commit message.
    pub subject: String,
    /// Files touched, in log order.
    pub files: Vec<FileChange>,
}

impl Commit {
    /// Total lines added + deleted over all text changes.
    pub fn churn(&self) -> u64 {
        self.files.iter().map(FileChange::churn).sum()
    }

    /// Touched paths with duplicates removed, in first-seen order.
    pub fn distinct_paths(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.files
            .iter()
            .map(|f| f.path.as_str())
            .filter(|p| seen.insert(*p))
            .collect()
    }
}

/// A single file change within a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    /// Destination path relative to the repository root.
    pub path: String,
    /// Line counts, or the binary marker.
    pub lines: LineStats,
}

impl FileChange {
    /// A text change with line counts.
    pub fn text(path: impl Into<String>, added: u64, deleted: u64) -> Self {
        Self {
            path: path.into(),
            lines: LineStats::Text { added, deleted },
        }
    }

    /// A binary change with no line counts.
    pub fn binary(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            lines: LineStats::Binary,
        }
    }

    /// Lines added + deleted; zero for binary changes.
    pub fn churn(&self) -> u64 {
        self.lines.churn()
    }
}

/// Line statistics of a change.
///
/// Binary changes are kept distinct from zero-line text changes: they count
/// as a touch of the file but add nothing to churn.
///
/// # Examples
///
/// ```
/// use xray_history::parser::LineStats;
///
/// assert_eq!(LineStats::Text { added: 4, deleted: 1 }.churn(), 5);
/// assert_eq!(LineStats::Binary.churn(), 0);
/// assert!(LineStats::Binary.is_binary());
/// assert!(!LineStats::Text { added: 0, deleted: 0 }.is_binary());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum LineStats {
    /// Text change with counted lines.
    Text {
        /// Lines added.
        added: u64,
        /// Lines deleted.
        deleted: u64,
    },
    /// Binary change, or counts that could not be read.
    Binary,
}

impl LineStats {
    /// Lines added, zero for binary.
    pub fn added(self) -> u64 {
        match self {
            LineStats::Text { added, .. } => added,
            LineStats::Binary => 0,
        }
    }

    /// Lines deleted, zero for binary.
    pub fn deleted(self) -> u64 {
        match self {
            LineStats::Text { deleted, .. } => deleted,
            LineStats::Binary => 0,
        }
    }

    /// Lines added + deleted.
    pub fn churn(self) -> u64 {
        self.added() + self.deleted()
    }

    /// Whether this is the binary marker.
    pub fn is_binary(self) -> bool {
        matches!(self, LineStats::Binary)
    }
}

/// Result of parsing a history stream.
#[derive(Debug, Clone, Default)]
pub struct ParsedLog {
    /// Commits in encounter order.
    pub commits: Vec<Commit>,
    /// Commit blocks dropped because their header was malformed.
    pub skipped_commits: usize,
    /// Numstat lines dropped because they were malformed.
    pub skipped_lines: usize,
}

/// Parse a complete history stream held in memory.
///
/// # Errors
///
/// With [`ParsePolicy::Strict`], returns [`XrayError::Parse`] on the first
/// malformed header or numstat line. Lenient parsing never fails.
///
/// # Examples
///
/// ```
/// use xray_history::parser::{parse_log, ParsePolicy};
///
/// let log = "@@xray@@abc\u{1f}Alice\u{1f}alice@example.com\u{1f}1700000000\u{1f}init\n\
///            10\t2\tsrc/main.rs\n\
///            -\t-\tlogo.png\n";
/// let parsed = parse_log(log, ParsePolicy::Lenient).unwrap();
/// assert_eq!(parsed.commits.len(), 1);
/// assert_eq!(parsed.commits[0].files.len(), 2);
/// assert!(parsed.commits[0].files[1].lines.is_binary());
/// ```
pub fn parse_log(input: &str, policy: ParsePolicy) -> Result<ParsedLog, XrayError> {
    let mut parser = LogParser::new(policy);
    for (idx, line) in input.lines().enumerate() {
        parser.feed(idx + 1, line)?;
    }
    Ok(parser.finish())
}

/// Drain a readable source and parse it.
///
/// Invalid UTF-8 (for example in legacy-encoded paths) is replaced rather
/// than rejected.
///
/// # Errors
///
/// Returns [`XrayError::Io`] if reading fails, or [`XrayError::Parse`] under
/// [`ParsePolicy::Strict`].
///
/// # Examples
///
/// ```
/// use std::io::Cursor;
/// use xray_history::parser::{parse_reader, ParsePolicy};
///
/// let parsed = parse_reader(Cursor::new(""), ParsePolicy::Strict).unwrap();
/// assert!(parsed.commits.is_empty());
/// ```
pub fn parse_reader<R: BufRead>(mut reader: R, policy: ParsePolicy) -> Result<ParsedLog, XrayError> {
    let mut parser = LogParser::new(policy);
    let mut buf = Vec::new();
    let mut line_no = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;
        let line = String::from_utf8_lossy(&buf);
        parser.feed(line_no, line.trim_end_matches(['\n', '\r']))?;
    }
    Ok(parser.finish())
}

struct LogParser {
    policy: ParsePolicy,
    normalizer: IdentityNormalizer,
    current: Option<Commit>,
    skipping_block: bool,
    out: ParsedLog,
}

impl LogParser {
    fn new(policy: ParsePolicy) -> Self {
        Self {
            policy,
            normalizer: IdentityNormalizer::new(),
            current: None,
            skipping_block: false,
            out: ParsedLog::default(),
        }
    }

    fn feed(&mut self, line_no: usize, line: &str) -> Result<(), XrayError> {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            return Ok(());
        }

        if let Some(rest) = line.strip_prefix(HEADER_MARKER) {
            self.flush();
            match parse_header(rest, &mut self.normalizer) {
                Ok(commit) => {
                    self.current = Some(commit);
                    self.skipping_block = false;
                }
                Err(message) => {
                    if self.policy == ParsePolicy::Strict {
                        return Err(XrayError::Parse {
                            line: line_no,
                            message,
                        });
                    }
                    tracing::debug!(line = line_no, %message, "skipping malformed commit block");
                    self.out.skipped_commits += 1;
                    self.skipping_block = true;
                }
            }
            return Ok(());
        }

        // Numstat lines that belong to a dropped header go with it.
        if self.skipping_block {
            return Ok(());
        }

        let parsed = match self.current.as_mut() {
            Some(commit) => parse_numstat_line(line).map(|change| commit.files.push(change)),
            None => Err("file change before any commit header".to_string()),
        };
        if let Err(message) = parsed {
            if self.policy == ParsePolicy::Strict {
                return Err(XrayError::Parse {
                    line: line_no,
                    message,
                });
            }
            tracing::debug!(line = line_no, %message, "skipping malformed numstat line");
            self.out.skipped_lines += 1;
        }
        Ok(())
    }

    fn flush(&mut self) {
        if let Some(commit) = self.current.take() {
            self.out.commits.push(commit);
        }
    }

    fn finish(mut self) -> ParsedLog {
        self.flush();
        self.out
    }
}

fn parse_header(rest: &str, normalizer: &mut IdentityNormalizer) -> Result<Commit, String> {
    let fields: Vec<&str> = rest.splitn(5, FIELD_SEPARATOR).collect();
    if fields.len() < 4 {
        return Err(format!(
            "commit header has {} fields, expected hash, name, email, timestamp, subject",
            fields.len()
        ));
    }

    let hash = fields[0].trim();
    if hash.is_empty() {
        return Err("commit header has an empty hash".into());
    }
    let timestamp: i64 = fields[3]
        .trim()
        .parse()
        .map_err(|_| format!("invalid commit timestamp '{}'", fields[3].trim()))?;

    let author_name = fields[1].trim();
    let author_email = fields[2].trim();

    Ok(Commit {
        hash: hash.to_string(),
        author: normalizer.normalize(author_name, author_email),
        author_name: author_name.to_string(),
        author_email: author_email.to_string(),
        timestamp,
        subject: fields.get(4).map(|s| s.trim().to_string()).unwrap_or_default(),
        files: Vec::new(),
    })
}

fn parse_numstat_line(line: &str) -> Result<FileChange, String> {
    let mut parts = line.splitn(3, '\t');
    let (Some(raw_added), Some(raw_deleted), Some(raw_path)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("expected '<added>\\t<deleted>\\t<path>', got '{line}'"));
    };

    let path = resolve_path(raw_path);
    if path.is_empty() {
        return Err("file change has an empty path".into());
    }

    let lines = match (parse_count(raw_added), parse_count(raw_deleted)) {
        (Some(added), Some(deleted)) => LineStats::Text { added, deleted },
        _ => LineStats::Binary,
    };

    Ok(FileChange { path, lines })
}

/// `-` (binary) and anything non-numeric yield `None`.
fn parse_count(raw: &str) -> Option<u64> {
    raw.trim().parse().ok()
}

/// Resolve rename notation and quoting to the destination path.
///
/// Git quotes each side of a rename on its own, so the arrow is located
/// before anything is unquoted.
fn resolve_path(raw: &str) -> String {
    let raw = raw.trim_end();
    match find_arrow(raw) {
        Some(at) => resolve_rename(&raw[..at], &raw[at + ARROW.len()..]),
        None => unquote_token(raw),
    }
}

const ARROW: &str = " => ";

/// Byte offset of the first ` => ` outside a quoted token.
fn find_arrow(raw: &str) -> Option<usize> {
    let bytes = raw.as_bytes();
    let mut in_quotes = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_quotes => i += 1,
            b'"' => in_quotes = !in_quotes,
            b' ' if !in_quotes && raw[i..].starts_with(ARROW) => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// `src/{old => new}/lib.rs` and `old/path => new/path` become the new path.
fn resolve_rename(before: &str, after: &str) -> String {
    if let (Some(open), Some(close)) = (before.rfind('{'), after.find('}')) {
        let joined = format!("{}{}{}", &before[..open], &after[..close], &after[close + 1..]);
        return collapse_slashes(&unquote_token(&joined));
    }
    unquote_token(after.trim())
}

fn unquote_token(token: &str) -> String {
    if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        unquote(&token[1..token.len() - 1])
    } else {
        token.to_string()
    }
}

fn collapse_slashes(path: &str) -> String {
    path.split('/')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Undo git's C-style path quoting (`core.quotePath`).
fn unquote(quoted: &str) -> String {
    let mut bytes = Vec::with_capacity(quoted.len());
    let mut chars = quoted.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut utf8 = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => bytes.push(b'\n'),
            Some('t') => bytes.push(b'\t'),
            Some('r') => bytes.push(b'\r'),
            Some('a') => bytes.push(0x07),
            Some('b') => bytes.push(0x08),
            Some('f') => bytes.push(0x0c),
            Some('v') => bytes.push(0x0b),
            Some(d @ '0'..='7') => {
                let mut value = d.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                bytes.push((value & 0xff) as u8);
            }
            Some(other) => {
                let mut utf8 = [0u8; 4];
                bytes.extend_from_slice(other.encode_utf8(&mut utf8).as_bytes());
            }
            None => bytes.push(b'\\'),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(hash: &str, name: &str, email: &str, ts: &str, subject: &str) -> String {
        format!("{HEADER_MARKER}{hash}\u{1f}{name}\u{1f}{email}\u{1f}{ts}\u{1f}{subject}")
    }

    #[test]
    fn parses_commits_in_encounter_order() {
        let log = format!(
            "{}\n3\t1\tsrc/a.rs\n1\t0\tsrc/b.rs\n\n{}\n7\t7\tREADME.md\n",
            header("c2", "Bob", "bob@e.com", "2000", "second"),
            header("c1", "Alice", "alice@e.com", "1000", "first"),
        );
        let parsed = parse_log(&log, ParsePolicy::Strict).unwrap();
        assert_eq!(parsed.commits.len(), 2);
        assert_eq!(parsed.commits[0].hash, "c2");
        assert_eq!(parsed.commits[1].hash, "c1");
        assert_eq!(parsed.commits[0].files.len(), 2);
        assert_eq!(parsed.commits[0].subject, "second");
        assert_eq!(parsed.commits[1].timestamp, 1000);
        assert_eq!(parsed.skipped_commits, 0);
        assert_eq!(parsed.skipped_lines, 0);
    }

    #[test]
    fn empty_commits_are_kept() {
        let log = format!(
            "{}\n\n{}\n1\t1\ta.txt\n",
            header("merge", "Alice", "a@e.com", "3000", "Merge branch"),
            header("c1", "Alice", "a@e.com", "1000", "work"),
        );
        let parsed = parse_log(&log, ParsePolicy::Strict).unwrap();
        assert_eq!(parsed.commits.len(), 2);
        assert!(parsed.commits[0].files.is_empty());
    }

    #[test]
    fn binary_and_non_numeric_counts_are_binary() {
        let log = format!(
            "{}\n-\t-\timg/logo.png\nabc\t3\tweird.txt\n0\t0\tempty.txt\n",
            header("c1", "Alice", "a@e.com", "1000", ""),
        );
        let parsed = parse_log(&log, ParsePolicy::Strict).unwrap();
        let files = &parsed.commits[0].files;
        assert_eq!(files[0].lines, LineStats::Binary);
        assert_eq!(files[1].lines, LineStats::Binary);
        assert_eq!(files[2].lines, LineStats::Text { added: 0, deleted: 0 });
    }

    #[test]
    fn paths_keep_embedded_tabs_and_spaces() {
        let log = format!(
            "{}\n2\t1\tdocs/my file\twith tab.md\n",
            header("c1", "Alice", "a@e.com", "1000", "docs"),
        );
        let parsed = parse_log(&log, ParsePolicy::Strict).unwrap();
        assert_eq!(parsed.commits[0].files[0].path, "docs/my file\twith tab.md");
    }

    #[test]
    fn renames_resolve_to_destination() {
        assert_eq!(resolve_path("src/{old => new}/lib.rs"), "src/new/lib.rs");
        assert_eq!(resolve_path("src/{ => nested}/lib.rs"), "src/nested/lib.rs");
        assert_eq!(resolve_path("src/{nested => }/lib.rs"), "src/lib.rs");
        assert_eq!(resolve_path("{a => b}/c.rs"), "b/c.rs");
        assert_eq!(resolve_path("old.rs => new/place.rs"), "new/place.rs");
        assert_eq!(resolve_path("plain/path.rs"), "plain/path.rs");
    }

    #[test]
    fn quoted_paths_are_unquoted() {
        assert_eq!(resolve_path("\"caf\\303\\251.txt\""), "café.txt");
        assert_eq!(resolve_path("\"a\\tb\""), "a\tb");
        assert_eq!(resolve_path("\"say \\\"hi\\\".txt\""), "say \"hi\".txt");
    }

    #[test]
    fn renames_with_quoted_sides_land_on_unquoted_destination() {
        let log = format!(
            "{}\n2\t0\t\"caf\\303\\251.txt\"\n{}\n0\t0\tplain.txt => \"caf\\303\\251.txt\"\n\
             1\t1\t\"a\\tb\" => \"c\\td\"\n3\t0\t\"tab\\tname.txt\" => moved.txt\n",
            header("c2", "Alice", "a@e.com", "2000", "edit"),
            header("c1", "Alice", "a@e.com", "1000", "renames"),
        );
        let parsed = parse_log(&log, ParsePolicy::Strict).unwrap();
        let paths: Vec<&str> = parsed
            .commits
            .iter()
            .flat_map(|c| c.files.iter().map(|f| f.path.as_str()))
            .collect();
        assert_eq!(paths, ["café.txt", "café.txt", "c\td", "moved.txt"]);
        assert_eq!(resolve_path("\"dir/{a => caf\\303\\251}.txt\""), "dir/café.txt");
    }

    #[test]
    fn author_spellings_share_one_key() {
        let log = format!(
            "{}\n1\t0\ta\n{}\n1\t0\tb\n",
            header("c2", "ALICE", "Alice@E.com", "2000", ""),
            header("c1", "alice", "alice@e.com ", "1000", ""),
        );
        let parsed = parse_log(&log, ParsePolicy::Strict).unwrap();
        assert_eq!(parsed.commits[0].author, parsed.commits[1].author);
        assert_eq!(parsed.commits[0].author_name, "ALICE");
    }

    #[test]
    fn subject_may_contain_separator() {
        let log = format!(
            "{}\n",
            header("c1", "Alice", "a@e.com", "1000", "weird\u{1f}subject"),
        );
        let parsed = parse_log(&log, ParsePolicy::Strict).unwrap();
        assert_eq!(parsed.commits[0].subject, "weird\u{1f}subject");
    }

    #[test]
    fn lenient_skips_malformed_block_and_continues() {
        let log = format!(
            "{}\n1\t1\tgood_before.rs\n{HEADER_MARKER}broken-header\n5\t5\tlost.rs\n{}\n2\t2\tgood_after.rs\n",
            header("c3", "Alice", "a@e.com", "3000", ""),
            header("c1", "Bob", "b@e.com", "1000", ""),
        );
        let parsed = parse_log(&log, ParsePolicy::Lenient).unwrap();
        assert_eq!(parsed.commits.len(), 2);
        assert_eq!(parsed.skipped_commits, 1);
        let paths: Vec<&str> = parsed
            .commits
            .iter()
            .flat_map(|c| c.files.iter().map(|f| f.path.as_str()))
            .collect();
        assert_eq!(paths, vec!["good_before.rs", "good_after.rs"]);
    }

    #[test]
    fn strict_fails_on_malformed_header() {
        let log = format!(
            "{}\n{}\n",
            header("c2", "Alice", "a@e.com", "2000", ""),
            header("c1", "Bob", "b@e.com", "yesterday", ""),
        );
        let err = parse_log(&log, ParsePolicy::Strict).unwrap_err();
        match err {
            XrayError::Parse { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("yesterday"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn lenient_skips_malformed_numstat_line() {
        let log = format!(
            "{}\nnot a numstat line\n1\t2\tok.rs\n",
            header("c1", "Alice", "a@e.com", "1000", ""),
        );
        let parsed = parse_log(&log, ParsePolicy::Lenient).unwrap();
        assert_eq!(parsed.skipped_lines, 1);
        assert_eq!(parsed.commits[0].files.len(), 1);

        let err = parse_log(&log, ParsePolicy::Strict).unwrap_err();
        assert!(matches!(err, XrayError::Parse { line: 2, .. }));
    }

    #[test]
    fn lines_before_first_header_are_malformed() {
        let log = format!(
            "1\t1\torphan.rs\n{}\n1\t1\tkept.rs\n",
            header("c1", "Alice", "a@e.com", "1000", ""),
        );
        let parsed = parse_log(&log, ParsePolicy::Lenient).unwrap();
        assert_eq!(parsed.skipped_lines, 1);
        assert_eq!(parsed.commits[0].files[0].path, "kept.rs");
    }

    #[test]
    fn reader_matches_string_parse_and_tolerates_crlf() {
        let log = format!(
            "{}\r\n4\t2\tsrc/x.rs\r\n",
            header("c1", "Alice", "a@e.com", "1000", "subj"),
        );
        let from_reader =
            parse_reader(std::io::Cursor::new(log.as_bytes()), ParsePolicy::Strict).unwrap();
        let from_str = parse_log(&log, ParsePolicy::Strict).unwrap();
        assert_eq!(from_reader.commits, from_str.commits);
        assert_eq!(from_reader.commits[0].files[0].path, "src/x.rs");
        assert_eq!(from_reader.commits[0].subject, "subj");
    }

    #[test]
    fn distinct_paths_drops_repeats() {
        let commit = Commit {
            hash: "c".into(),
            author: AuthorId::from_parts("a", "a@e.com"),
            author_name: "a".into(),
            author_email: "a@e.com".into(),
            timestamp: 0,
            subject: String::new(),
            files: vec![
                FileChange::text("a.rs", 1, 0),
                FileChange::binary("b.png"),
                FileChange::text("a.rs", 2, 0),
            ],
        };
        assert_eq!(commit.distinct_paths(), vec!["a.rs", "b.png"]);
        assert_eq!(commit.churn(), 3);
    }
}
