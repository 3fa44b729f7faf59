//! Path grouping and exclusion rules shared by every analysis.

use xray_core::{AnalysisConfig, XrayError};

/// Directory label for files at the repository root.
pub const ROOT_DIRECTORY: &str = ".";

/// Directory prefix of `path` at `depth` components.
///
/// A path nested deeper than `depth` keeps its first `depth` directory
/// components; a shallower nested path maps to its parent directory; a
/// top-level file maps to [`ROOT_DIRECTORY`]. Labels other than the root end
/// with `/`. Bus factor and coupling both group through this function so the
/// two sections always agree on what a directory is.
///
/// # Examples
///
/// ```
/// use xray_history::paths::directory_of;
///
/// assert_eq!(directory_of("src/core/engine/mod.rs", 2), "src/core/");
/// assert_eq!(directory_of("src/lib.rs", 2), "src/");
/// assert_eq!(directory_of("README.md", 2), ".");
/// ```
pub fn directory_of(path: &str, depth: usize) -> String {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() <= 1 {
        return ROOT_DIRECTORY.to_string();
    }
    let dir_parts = &parts[..parts.len() - 1];
    let keep = dir_parts.len().min(depth.max(1));
    format!("{}/", dir_parts[..keep].join("/"))
}

const LOCK_FILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "poetry.lock",
    "Pipfile.lock",
    "composer.lock",
    "Gemfile.lock",
    "go.sum",
];

const VENDORED_DIRS: &[&str] = &["vendor", "third_party", "node_modules"];

/// Why a path is excluded from hotspots and coupling.
///
/// # Examples
///
/// ```
/// use xray_history::paths::ExcludeReason;
///
/// assert_eq!(ExcludeReason::LockFile.to_string(), "lock file");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExcludeReason {
    /// Package manager lock file.
    LockFile,
    /// Minified bundle or source map.
    MinifiedFile,
    /// Generated source, by file name.
    GeneratedFile,
    /// Third-party code checked into the repository.
    VendoredCode,
    /// Matched a configured glob.
    PatternMatch(String),
}

impl std::fmt::Display for ExcludeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExcludeReason::LockFile => write!(f, "lock file"),
            ExcludeReason::MinifiedFile => write!(f, "minified file"),
            ExcludeReason::GeneratedFile => write!(f, "generated file"),
            ExcludeReason::VendoredCode => write!(f, "vendored code"),
            ExcludeReason::PatternMatch(pat) => write!(f, "pattern: {pat}"),
        }
    }
}

/// Decides which paths are noise for hotspot and coupling analysis.
///
/// # Examples
///
/// ```
/// use xray_history::paths::PathFilter;
///
/// let filter = PathFilter::default_filter();
/// assert!(filter.is_excluded("web/package-lock.json"));
/// assert!(filter.is_excluded("static/app.min.js"));
/// assert!(!filter.is_excluded("src/main.rs"));
/// ```
#[derive(Debug, Clone)]
pub struct PathFilter {
    default_rules: bool,
    patterns: Vec<glob::Pattern>,
}

impl PathFilter {
    /// Built-in rules only.
    pub fn default_filter() -> Self {
        Self {
            default_rules: true,
            patterns: Vec::new(),
        }
    }

    /// Exclude nothing.
    pub fn none() -> Self {
        Self {
            default_rules: false,
            patterns: Vec::new(),
        }
    }

    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`XrayError::Config`] if an exclude pattern is not a valid glob.
    ///
    /// # Examples
    ///
    /// ```
    /// use xray_core::AnalysisConfig;
    /// use xray_history::paths::PathFilter;
    ///
    /// let config = AnalysisConfig {
    ///     exclude: vec!["docs/*".into()],
    ///     default_excludes: false,
    ///     ..AnalysisConfig::default()
    /// };
    /// let filter = PathFilter::from_config(&config).unwrap();
    /// assert!(filter.is_excluded("docs/guide.md"));
    /// assert!(!filter.is_excluded("Cargo.lock"));
    /// ```
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, XrayError> {
        let mut patterns = Vec::with_capacity(config.exclude.len());
        for pat in &config.exclude {
            let pattern = glob::Pattern::new(pat).map_err(|e| {
                XrayError::Config(format!("exclude pattern '{pat}' is not a valid glob: {e}"))
            })?;
            patterns.push(pattern);
        }
        Ok(Self {
            default_rules: config.default_excludes,
            patterns,
        })
    }

    /// Whether `path` should be left out of hotspots and coupling.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.check(path).is_some()
    }

    /// The first rule that excludes `path`, if any.
    pub fn check(&self, path: &str) -> Option<ExcludeReason> {
        if self.default_rules {
            if let Some(reason) = default_rule(path) {
                return Some(reason);
            }
        }
        self.patterns
            .iter()
            .find(|p| p.matches(path))
            .map(|p| ExcludeReason::PatternMatch(p.to_string()))
    }
}

fn default_rule(path: &str) -> Option<ExcludeReason> {
    let file_name = path.rsplit('/').next().unwrap_or(path);

    if LOCK_FILES.contains(&file_name) {
        return Some(ExcludeReason::LockFile);
    }
    if file_name.ends_with(".min.js") || file_name.ends_with(".min.css") || file_name.ends_with(".map")
    {
        return Some(ExcludeReason::MinifiedFile);
    }
    if file_name.contains(".generated.")
        || file_name.ends_with(".g.dart")
        || file_name.ends_with(".pb.go")
        || file_name.ends_with(".pb.rs")
    {
        return Some(ExcludeReason::GeneratedFile);
    }
    let mut dirs = path.split('/');
    dirs.next_back();
    if dirs.any(|part| VENDORED_DIRS.contains(&part)) {
        return Some(ExcludeReason::VendoredCode);
    }
    None
}
