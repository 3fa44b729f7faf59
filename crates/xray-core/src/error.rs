/// Errors that can occur while loading configuration or analyzing history.
///
/// Every variant is a `miette` diagnostic with an `xray::*` code.
///
/// # Examples
///
/// ```
/// use xray_core::XrayError;
///
/// let err = XrayError::Config("top_n must be at least 1".into());
/// assert!(err.to_string().contains("top_n"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum XrayError {
    /// Filesystem or stream I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(xray::io))]
    Io(#[from] std::io::Error),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    #[diagnostic(
        code(xray::config),
        help("check .git-xray.toml and the command-line flags")
    )]
    Config(String),

    /// Git invocation or repository discovery failure.
    #[error("git error: {0}")]
    #[diagnostic(code(xray::git))]
    Git(String),

    /// Malformed history record (strict parsing only).
    #[error("parse error at line {line}: {message}")]
    #[diagnostic(
        code(xray::parse),
        help("rerun without --strict to skip malformed records")
    )]
    Parse {
        /// 1-based line number in the history stream.
        line: usize,
        /// What was wrong with the record.
        message: String,
    },

    /// JSON serialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(xray::serialization))]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(xray::toml))]
    Toml(#[from] toml::de::Error),
}
