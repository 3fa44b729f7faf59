use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Output format for the rendered report.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use xray_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable terminal report with bar charts.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown tables.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Knowledge-concentration risk of a directory.
///
/// Ordered from most to least severe, so sorting ascending puts
/// [`RiskLevel::Critical`] first.
///
/// # Examples
///
/// ```
/// use xray_core::RiskLevel;
///
/// assert!(RiskLevel::Critical < RiskLevel::Warning);
/// assert_eq!(RiskLevel::Ok.to_string(), "OK");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// A single person holds the majority of the knowledge.
    Critical,
    /// Two people hold the majority of the knowledge.
    Warning,
    /// Knowledge is spread across enough people.
    Ok,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Critical => write!(f, "CRITICAL"),
            RiskLevel::Warning => write!(f, "WARNING"),
            RiskLevel::Ok => write!(f, "OK"),
        }
    }
}

/// A section of the risk report.
///
/// # Examples
///
/// ```
/// use xray_core::Section;
///
/// let section: Section = "bus-factor".parse().unwrap();
/// assert_eq!(section, Section::BusFactor);
/// assert_eq!(Section::ALL.len(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
    /// Volatile files ranked by frequency and churn.
    Hotspots,
    /// Directories that depend on too few people.
    BusFactor,
    /// Files that change together.
    Coupling,
    /// Code last maintained by inactive authors.
    Decay,
    /// Quarterly change-size trend.
    Trend,
}

impl Section {
    /// Every section, in report order.
    pub const ALL: [Section; 5] = [
        Section::Hotspots,
        Section::BusFactor,
        Section::Coupling,
        Section::Decay,
        Section::Trend,
    ];
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Hotspots => write!(f, "hotspots"),
            Section::BusFactor => write!(f, "bus-factor"),
            Section::Coupling => write!(f, "coupling"),
            Section::Decay => write!(f, "decay"),
            Section::Trend => write!(f, "trend"),
        }
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hotspots" => Ok(Section::Hotspots),
            "bus-factor" | "bus_factor" | "busfactor" => Ok(Section::BusFactor),
            "coupling" => Ok(Section::Coupling),
            "decay" => Ok(Section::Decay),
            "trend" => Ok(Section::Trend),
            other => Err(format!("unknown section: {other}")),
        }
    }
}
