//! Core types, configuration, and error handling for git-xray.
//!
//! This crate provides the shared foundation used by the history engine and
//! the command-line binary:
//! - [`XrayError`]: unified error type using `thiserror`
//! - [`XrayConfig`]: configuration loaded from `.git-xray.toml`
//! - Shared types: [`OutputFormat`], [`RiskLevel`], [`Section`]

mod config;
mod error;
mod types;

pub use config::{AnalysisConfig, RiskConfig, XrayConfig};
pub use error::XrayError;
pub use types::{OutputFormat, RiskLevel, Section};
