use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::XrayError;

/// Top-level configuration loaded from `.git-xray.toml`.
///
/// Supports layered resolution: CLI flags > config file > defaults. Call
/// [`XrayConfig::validate`] once all layers are applied and before any
/// history is parsed.
///
/// # Examples
///
/// ```
/// use xray_core::XrayConfig;
///
/// let config = XrayConfig::default();
/// assert_eq!(config.analysis.top_n, 10);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XrayConfig {
    /// Analysis windows, thresholds, and exclusions.
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Bus-factor risk thresholds.
    #[serde(default)]
    pub risk: RiskConfig,
}

impl XrayConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`XrayError::Io`] if the file cannot be read, or
    /// [`XrayError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use xray_core::XrayConfig;
    /// use std::path::Path;
    ///
    /// let config = XrayConfig::from_file(Path::new(".git-xray.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, XrayError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`XrayError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use xray_core::XrayConfig;
    ///
    /// let toml = r#"
    /// [analysis]
    /// top_n = 25
    /// "#;
    /// let config = XrayConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.analysis.top_n, 25);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, XrayError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Check every option for out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`XrayError::Config`] naming the first offending option.
    ///
    /// # Examples
    ///
    /// ```
    /// use xray_core::XrayConfig;
    ///
    /// let mut config = XrayConfig::default();
    /// config.analysis.dir_depth = 0;
    /// let err = config.validate().unwrap_err();
    /// assert!(err.to_string().contains("dir_depth"));
    /// ```
    pub fn validate(&self) -> Result<(), XrayError> {
        let a = &self.analysis;
        if a.top_n == 0 {
            return Err(XrayError::Config("top_n must be at least 1".into()));
        }
        if a.dir_depth == 0 {
            return Err(XrayError::Config("dir_depth must be at least 1".into()));
        }
        if a.active_days == 0 {
            return Err(XrayError::Config("active_days must be at least 1".into()));
        }
        if a.stale_days == 0 {
            return Err(XrayError::Config("stale_days must be at least 1".into()));
        }
        if a.noise_threshold < 2 {
            return Err(XrayError::Config(format!(
                "noise_threshold must be at least 2 (got {}), a commit needs two files to couple them",
                a.noise_threshold
            )));
        }
        if a.min_co_commits == 0 {
            return Err(XrayError::Config(
                "min_co_commits must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&a.min_confidence) {
            return Err(XrayError::Config(format!(
                "min_confidence must be between 0.0 and 1.0 (got {})",
                a.min_confidence
            )));
        }
        if a.min_directory_commits == 0 {
            return Err(XrayError::Config(
                "min_directory_commits must be at least 1".into(),
            ));
        }
        for pattern in &a.exclude {
            if let Err(e) = glob::Pattern::new(pattern) {
                return Err(XrayError::Config(format!(
                    "exclude pattern '{pattern}' is not a valid glob: {e}"
                )));
            }
        }

        let r = &self.risk;
        if r.critical_bus_factor == 0 {
            return Err(XrayError::Config(
                "critical_bus_factor must be at least 1".into(),
            ));
        }
        if r.warning_bus_factor < r.critical_bus_factor {
            return Err(XrayError::Config(format!(
                "warning_bus_factor ({}) must not be below critical_bus_factor ({})",
                r.warning_bus_factor, r.critical_bus_factor
            )));
        }
        Ok(())
    }
}

/// History analysis configuration.
///
/// # Examples
///
/// ```
/// use xray_core::AnalysisConfig;
///
/// let config = AnalysisConfig::default();
/// assert_eq!(config.dir_depth, 2);
/// assert_eq!(config.active_days, 90);
/// assert_eq!(config.stale_days, 180);
/// assert_eq!(config.noise_threshold, 30);
/// assert_eq!(config.min_co_commits, 2);
/// assert!(config.default_excludes);
/// assert!(!config.strict);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum entries per report section (default: 10).
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Path components that define a directory for bus factor and coupling (default: 2).
    #[serde(default = "default_dir_depth")]
    pub dir_depth: usize,
    /// An author is active if they committed within this many days (default: 90).
    #[serde(default = "default_active_days")]
    pub active_days: u32,
    /// A file is stale if untouched for more than this many days (default: 180).
    #[serde(default = "default_stale_days")]
    pub stale_days: u32,
    /// Commits touching more files than this are ignored for coupling (default: 30).
    #[serde(default = "default_noise_threshold")]
    pub noise_threshold: usize,
    /// Minimum shared commits before a pair is reported as coupled (default: 2).
    #[serde(default = "default_min_co_commits")]
    pub min_co_commits: u32,
    /// Minimum coupling confidence to report (default: 0.0).
    #[serde(default)]
    pub min_confidence: f64,
    /// Directories with fewer commits are left out of the bus-factor section (default: 1).
    #[serde(default = "default_min_directory_commits")]
    pub min_directory_commits: u32,
    /// Glob patterns for paths excluded from hotspots and coupling.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Also exclude lock files, minified bundles, and vendored code (default: true).
    #[serde(default = "default_true")]
    pub default_excludes: bool,
    /// Ignore commits before this date (`"YYYY-MM-DD"`, UTC).
    #[serde(default)]
    pub since: Option<NaiveDate>,
    /// Fail on malformed history records instead of skipping them (default: false).
    #[serde(default)]
    pub strict: bool,
}

fn default_top_n() -> usize {
    10
}

fn default_dir_depth() -> usize {
    2
}

fn default_active_days() -> u32 {
    90
}

fn default_stale_days() -> u32 {
    180
}

fn default_noise_threshold() -> usize {
    30
}

fn default_min_co_commits() -> u32 {
    2
}

fn default_min_directory_commits() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            dir_depth: default_dir_depth(),
            active_days: default_active_days(),
            stale_days: default_stale_days(),
            noise_threshold: default_noise_threshold(),
            min_co_commits: default_min_co_commits(),
            min_confidence: 0.0,
            min_directory_commits: default_min_directory_commits(),
            exclude: Vec::new(),
            default_excludes: true,
            since: None,
            strict: false,
        }
    }
}

/// Bus-factor risk thresholds.
///
/// A directory whose bus factor is at most `critical_bus_factor` is
/// critical; at most `warning_bus_factor` is a warning; anything higher is ok.
///
/// # Examples
///
/// ```
/// use xray_core::RiskConfig;
///
/// let config = RiskConfig::default();
/// assert_eq!(config.critical_bus_factor, 1);
/// assert_eq!(config.warning_bus_factor, 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Highest bus factor labelled CRITICAL (default: 1).
    #[serde(default = "default_critical_bus_factor")]
    pub critical_bus_factor: u32,
    /// Highest bus factor labelled WARNING (default: 2).
    #[serde(default = "default_warning_bus_factor")]
    pub warning_bus_factor: u32,
}

fn default_critical_bus_factor() -> u32 {
    1
}

fn default_warning_bus_factor() -> u32 {
    2
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            critical_bus_factor: default_critical_bus_factor(),
            warning_bus_factor: default_warning_bus_factor(),
        }
    }
}
