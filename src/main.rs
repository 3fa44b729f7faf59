mod render;

use std::io::{BufReader, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use xray_core::{OutputFormat, Section, XrayConfig, XrayError};
use xray_history::parser::{parse_reader, ParsePolicy, ParsedLog, LOG_FORMAT};
use xray_history::report::build_report;

use crate::render::Origin;

const CONFIG_FILE: &str = ".git-xray.toml";

#[derive(Parser)]
#[command(
    name = "git-xray",
    version,
    about = "Reveal hidden risks in a git repository",
    long_about = "git-xray reads a repository's commit history and reports where the risk is.\n\n\
                   Sections:\n  \
                     hotspots    Files that change often and change a lot\n  \
                     bus-factor  Directories one or two people hold the keys to\n  \
                     coupling    Files that always change together, across directories\n  \
                     decay       Stale files whose last author is gone\n  \
                     trend       Churn per commit, quarter by quarter\n\n\
                   Examples:\n  \
                     git-xray                          Analyze the current repository\n  \
                     git-xray ../service --top 20      Longer lists for another repository\n  \
                     git-xray -s hotspots -s coupling  Only two sections\n  \
                     git-xray --since 2024-01-01       Ignore older history\n  \
                     git-xray --format json > x.json   Machine-readable report"
)]
struct Cli {
    /// Path to the git repository (default: current directory)
    #[arg(default_value = ".")]
    repo: PathBuf,

    /// Results per section
    #[arg(long, short = 'n')]
    top: Option<usize>,

    /// Directory depth used to group files for bus factor and coupling
    #[arg(long)]
    depth: Option<usize>,

    /// Days without a commit before an author counts as inactive
    #[arg(long)]
    active_days: Option<u32>,

    /// Days without a change before a file counts as stale
    #[arg(long)]
    stale_days: Option<u32>,

    /// Commits touching more files than this are ignored for coupling
    #[arg(long)]
    noise_threshold: Option<usize>,

    /// Minimum shared commits for a coupled pair
    #[arg(long)]
    min_co_commits: Option<u32>,

    /// Only analyze commits since DATE (YYYY-MM-DD, or a git date such as "6 months ago")
    #[arg(long, value_name = "DATE")]
    since: Option<SinceArg>,

    /// Glob of paths to leave out of hotspots and coupling (repeatable)
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Keep lock files, minified bundles, and vendored code in every section
    #[arg(long)]
    no_default_excludes: bool,

    /// Only show the given section (repeatable)
    #[arg(
        long,
        short = 's',
        value_name = "SECTION",
        long_help = "Only show the given section. Repeat to select several.\n\n\
                       Sections: hotspots, bus-factor, coupling, decay, trend"
    )]
    section: Vec<Section>,

    /// Fail on the first malformed log record instead of skipping it
    #[arg(long)]
    strict: bool,

    /// Read a saved `git log` stream from FILE, or stdin with `-`
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        default_value = "text",
        long_help = "Output format for the report.\n\n\
                       Formats:\n  \
                         text      Terminal report with bar charts (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Path to configuration file (default: <REPO>/.git-xray.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// When to use colors
    #[arg(long, default_value = "auto")]
    color: ColorChoice,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

/// `--since` value: a calendar date, or any expression `git log --since` understands.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SinceArg {
    Date(NaiveDate),
    Git(String),
}

impl std::str::FromStr for SinceArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("date must not be empty".into());
        }
        Ok(match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(date) => SinceArg::Date(date),
            Err(_) => SinceArg::Git(s.to_string()),
        })
    }
}

/// Where the numstat stream comes from.
enum HistorySource {
    Git(PathBuf),
    File(PathBuf),
    Stdin,
}

fn init_tracing(verbose: bool) {
    if verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_config(cli: &Cli) -> Result<XrayConfig> {
    let mut config = match &cli.config {
        Some(path) => XrayConfig::from_file(path)
            .wrap_err_with(|| format!("loading {}", path.display()))?,
        None => {
            let default_path = cli.repo.join(CONFIG_FILE);
            if default_path.exists() {
                XrayConfig::from_file(&default_path)
                    .wrap_err_with(|| format!("loading {}", default_path.display()))?
            } else {
                XrayConfig::default()
            }
        }
    };
    apply_overrides(&mut config, cli);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut XrayConfig, cli: &Cli) {
    let analysis = &mut config.analysis;
    if let Some(top) = cli.top {
        analysis.top_n = top;
    }
    if let Some(depth) = cli.depth {
        analysis.dir_depth = depth;
    }
    if let Some(days) = cli.active_days {
        analysis.active_days = days;
    }
    if let Some(days) = cli.stale_days {
        analysis.stale_days = days;
    }
    if let Some(threshold) = cli.noise_threshold {
        analysis.noise_threshold = threshold;
    }
    if let Some(min) = cli.min_co_commits {
        analysis.min_co_commits = min;
    }
    if let Some(SinceArg::Date(date)) = &cli.since {
        analysis.since = Some(*date);
    }
    analysis.exclude.extend(cli.exclude.iter().cloned());
    if cli.no_default_excludes {
        analysis.default_excludes = false;
    }
    if cli.strict {
        analysis.strict = true;
    }
}

/// Locate the repository and describe it for the report header.
fn discover_repo(path: &Path) -> Result<(PathBuf, Origin)> {
    let repo = git2::Repository::discover(path).map_err(|e| {
        miette::miette!(
            help = "Run git-xray inside a git repository, pass the path to one, or use --input",
            "Not a git repository: {} ({})",
            path.display(),
            e.message()
        )
    })?;
    let dir = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();

    let branch = repo
        .head()
        .ok()
        .and_then(|head| head.shorthand().map(str::to_string))
        .or_else(|| {
            // Unborn branch: HEAD still names it symbolically.
            repo.find_reference("HEAD").ok().and_then(|head| {
                head.symbolic_target()
                    .map(|t| t.trim_start_matches("refs/heads/").to_string())
            })
        });

    let origin = Origin {
        repo_name: repo_name(&dir),
        branch,
    };
    Ok((dir, origin))
}

fn repo_name(dir: &Path) -> String {
    let name = dir
        .canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .or_else(|| dir.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "repository".into());
    name.strip_suffix(".git")
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
        .unwrap_or(name)
}

/// The `--since` argument handed to git, if any.
///
/// A calendar date also becomes the index cutoff; a git date expression is
/// only understood by git, so it cannot filter a saved log.
fn git_since(cli: &Cli, config: &XrayConfig) -> Result<Option<String>> {
    match &cli.since {
        Some(SinceArg::Git(expr)) if cli.input.is_some() => Err(miette::miette!(
            help = "Use a YYYY-MM-DD date together with --input",
            "--since '{expr}' needs git to resolve it"
        )),
        Some(SinceArg::Git(expr)) => Ok(Some(expr.clone())),
        _ => Ok(config.analysis.since.map(|date| date.to_string())),
    }
}

fn read_history(source: &HistorySource, since: Option<&str>, policy: ParsePolicy) -> Result<ParsedLog> {
    match source {
        HistorySource::Git(dir) => run_git_log(dir, since, policy),
        HistorySource::File(path) => {
            let file = std::fs::File::open(path)
                .into_diagnostic()
                .wrap_err(format!("reading {}", path.display()))?;
            Ok(parse_reader(BufReader::new(file), policy)?)
        }
        HistorySource::Stdin => Ok(parse_reader(std::io::stdin().lock(), policy)?),
    }
}

/// Stream `git log --numstat` straight into the parser.
fn run_git_log(dir: &Path, since: Option<&str>, policy: ParsePolicy) -> Result<ParsedLog> {
    let mut cmd = Command::new("git");
    cmd.arg("-C")
        .arg(dir)
        .args(["log", "--no-merges", LOG_FORMAT, "--numstat"]);
    if let Some(since) = since {
        cmd.arg(format!("--since={since}"));
    }
    tracing::debug!(dir = %dir.display(), "running git log");

    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .into_diagnostic()
        .wrap_err("failed to run `git`; is it installed and on PATH?")?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| miette::miette!("git log did not provide an output stream"))?;

    let stderr_reader = child.stderr.take().map(|mut stderr| {
        std::thread::spawn(move || {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text);
            text
        })
    });

    // The reader is dropped before waiting so a strict-mode failure closes the pipe.
    let parsed = parse_reader(BufReader::new(stdout), policy);
    let status = child.wait().into_diagnostic()?;
    let stderr = stderr_reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    Ok(finish_git_log(parsed, status.success(), &stderr)?)
}

/// Combine the parse result with git's exit status.
///
/// A parse error wins: it is why git lost its reader.
fn finish_git_log(
    parsed: Result<ParsedLog, XrayError>,
    success: bool,
    stderr: &str,
) -> Result<ParsedLog, XrayError> {
    let parsed = parsed?;
    if success {
        return Ok(parsed);
    }
    if stderr.contains("does not have any commits") {
        return Ok(ParsedLog::default());
    }
    Err(XrayError::Git(format!("git log failed: {}", stderr.trim())))
}

fn spinner(message: &str) -> Option<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    let sections: Vec<Section> = if cli.section.is_empty() {
        Section::ALL.to_vec()
    } else {
        cli.section.clone()
    };

    if cli.verbose {
        eprintln!("format: {}", cli.format);
        let names: Vec<String> = sections.iter().map(ToString::to_string).collect();
        eprintln!("sections: {}", names.join(", "));
        if !config.analysis.exclude.is_empty() {
            eprintln!("exclude patterns: {}", config.analysis.exclude.join(", "));
        }
    }

    let (source, origin) = match &cli.input {
        Some(path) if path.as_os_str() == "-" => (
            HistorySource::Stdin,
            Origin {
                repo_name: "stdin".into(),
                branch: None,
            },
        ),
        Some(path) => (
            HistorySource::File(path.clone()),
            Origin {
                repo_name: path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
                branch: None,
            },
        ),
        None => {
            let (dir, origin) = discover_repo(&cli.repo)?;
            (HistorySource::Git(dir), origin)
        }
    };

    let policy = ParsePolicy::from_strict(config.analysis.strict);
    let pb = spinner("Reading git history...");
    if pb.is_none() {
        eprintln!("Reading git history for {}...", origin.repo_name);
    }
    let since = git_since(&cli, &config)?;
    let history = read_history(&source, since.as_deref(), policy);
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }
    let history = history?;
    eprintln!("Parsed {} commits.", history.commits.len());
    if history.commits.is_empty() {
        eprintln!("No commits found.");
    }

    let report = build_report(&history, &config, &sections)?;

    match cli.format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Markdown => print!("{}", render::render_markdown(&report, &origin)),
        OutputFormat::Text => print!("{}", render::render_text(&report, &origin, use_color)),
    }

    Ok(())
}
