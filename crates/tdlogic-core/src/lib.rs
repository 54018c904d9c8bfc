//! tdlogic-core: rule-based advisory and grouping engine for Java thread dumps
//!
//! Takes a structured thread-dump snapshot and produces a health diagnosis
//! per thread, per lock and per thread group.
//!
//! # Architecture
//!
//! ```text
//! ThreadSnapshot → ThreadDump (arena)
//!                      ↓
//!        ThreadClassifier ← AdvisoryCatalog
//!                      ↓
//!         lock contention pass
//!                      ↓
//!        GroupAggregator → strategies (per GroupKind)
//!                      ↓
//!            Analysis / AnalysisReport
//! ```
//!
//! # Modules
//!
//! - `health`: severity scale
//! - `advisory`: advisory rules and per-thread advisory sets
//! - `catalog`: keyword/name lookup and the combined stack scanner
//! - `definitions`: built-in and file-based advisory/group definitions
//! - `filter`: simple and composite thread predicates
//! - `thread`: thread/lock records and the snapshot arena
//! - `classifier`: ordered per-thread passes
//! - `overrides`: global lock-contention pass
//! - `groups`, `aggregator`, `strategy`, `hot_call`: grouping and group heuristics
//! - `analysis`: the pipeline and its serializable report
//! - `config`, `logging`, `error`: ambient plumbing
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod advisory;
pub mod aggregator;
pub mod analysis;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod definitions;
pub mod error;
pub mod filter;
pub mod groups;
pub mod health;
pub mod hot_call;
pub mod logging;
pub mod overrides;
pub mod strategy;
pub mod thread;

pub use advisory::{Advisory, AdvisorySet};
pub use analysis::{Analysis, AnalysisReport, Analyzer};
pub use catalog::AdvisoryCatalog;
pub use config::Config;
pub use error::{Error, Result};
pub use groups::{GroupKind, ThreadGroup};
pub use health::HealthLevel;
pub use thread::{ThreadDump, ThreadSnapshot, WaitState};

/// Version of the tdlogic-core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
