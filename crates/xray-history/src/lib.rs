//! Git history risk analysis: hotspots, bus factor, coupling, decay, and trend.
//!
//! Parses `git log --numstat` output into typed commits, folds them once
//! into a read-only [`index::HistoryIndex`], and runs five independent
//! analyses over that index to build a deterministic [`report::Report`].

pub mod coupling;
pub mod decay;
pub mod hotspots;
pub mod identity;
pub mod index;
pub mod ownership;
pub mod parser;
pub mod paths;
pub mod report;
pub mod trend;

pub use parser::{Commit, FileChange, LineStats};
pub use report::{build_report, Report};
