//! Snapshot in, diagnosis out.
//!
//! [`Analyzer`] owns the loaded catalog, the compiled groups and the config.
//! [`Analyzer::analyze`] runs the full pipeline over one snapshot:
//!
//! ```text
//! snapshot → ThreadDump → classify (all threads) → lock contention
//!          → partition + group strategies → Analysis
//! ```
//!
//! Each stage finishes for every thread before the next starts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::advisory::Advisory;
use crate::aggregator::GroupAggregator;
use crate::catalog::AdvisoryCatalog;
use crate::classifier::ThreadClassifier;
use crate::config::Config;
use crate::definitions::{self, CompiledGroup, GroupDefinitions};
use crate::groups::{GroupCounters, GroupKind, ThreadGroup};
use crate::health::HealthLevel;
use crate::overrides;
use crate::thread::{LockId, ThreadDump, ThreadId, ThreadSnapshot, WaitState};
use crate::Result;

/// Loaded definitions plus configuration; reusable across snapshots.
#[derive(Debug, Clone)]
pub struct Analyzer {
    catalog: AdvisoryCatalog,
    groups: Vec<CompiledGroup>,
    config: Config,
}

impl Analyzer {
    #[must_use]
    pub fn new(catalog: AdvisoryCatalog, groups: Vec<CompiledGroup>, config: Config) -> Self {
        Self {
            catalog,
            groups,
            config,
        }
    }

    /// Built-in advisories and groups with default thresholds.
    pub fn builtin() -> Result<Self> {
        Self::from_config(Config::default())
    }

    /// Load the catalog and groups named by `config.definitions`.
    ///
    /// Individual bad definitions are logged and skipped; only unreadable or
    /// unparseable files are errors.
    pub fn from_config(config: Config) -> Result<Self> {
        let catalog = AdvisoryCatalog::from_config(&config.definitions, &[])?;
        let definitions = match &config.definitions.group_file {
            Some(path) => definitions::load_group_file(path)?,
            None if config.definitions.builtin_groups => GroupDefinitions::builtin()?,
            None => GroupDefinitions::default(),
        };
        let (groups, errors) = definitions.compile();
        for err in &errors {
            tracing::warn!(error = %err, "Skipping group definition");
        }
        Ok(Self::new(catalog, groups, config))
    }

    pub fn catalog(&self) -> &AdvisoryCatalog {
        &self.catalog
    }

    pub fn groups(&self) -> &[CompiledGroup] {
        &self.groups
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every stage over `snapshot`.
    pub fn analyze(&self, snapshot: &ThreadSnapshot) -> Analysis {
        let span = tracing::info_span!("analyze", threads = snapshot.threads.len());
        let _guard = span.enter();

        let mut dump = ThreadDump::from_snapshot(snapshot);
        ThreadClassifier::new(&self.catalog, &self.config).classify_all(&mut dump);
        let contended_locks =
            overrides::apply_lock_contention(&mut dump, &self.catalog, &self.config);
        let groups =
            GroupAggregator::new(&self.groups, &self.catalog, &self.config).aggregate(&mut dump);

        let analysis = Analysis {
            dump,
            groups,
            contended_locks,
        };
        tracing::info!(
            threads = analysis.dump.len(),
            groups = analysis.groups.len(),
            contended_locks = analysis.contended_locks.len(),
            worst = %analysis.worst_health(),
            "Analysis complete"
        );
        analysis
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub dump: ThreadDump,
    pub groups: Vec<ThreadGroup>,
    /// Locks tagged by the contention pass, in lock order.
    pub contended_locks: Vec<LockId>,
}

impl Analysis {
    /// Worst health across all groups (NORMAL for an empty snapshot).
    pub fn worst_health(&self) -> HealthLevel {
        HealthLevel::max_of(self.groups.iter().map(ThreadGroup::health)).unwrap_or_default()
    }

    pub fn group_named(&self, name: &str) -> Option<&ThreadGroup> {
        self.groups.iter().find(|g| g.name() == name)
    }

    /// Serializable view with names instead of arena indices.
    pub fn report(&self) -> AnalysisReport {
        let dump = &self.dump;
        let thread_name = |id: ThreadId| dump.thread(id).name().to_string();

        let threads: Vec<ThreadReport> = dump
            .threads()
            .iter()
            .map(|t| ThreadReport {
                name: t.name().to_string(),
                state: t.state,
                health: t.health(),
                group: t.group.map(|g| self.groups[g.0].name().to_string()),
                advisories: t.advisories.sorted(),
            })
            .collect();

        let groups = self
            .groups
            .iter()
            .map(|g| GroupReport {
                name: g.name().to_string(),
                kind: g.kind(),
                health: g.health(),
                members: g.members.len(),
                advisories: g.advisories.sorted(),
                counters: g.counters.clone(),
                hot_calls: g
                    .hot_calls
                    .iter()
                    .map(|p| HotCallReport {
                        text: p.text.clone(),
                        threads: p.threads.iter().map(|&id| thread_name(id)).collect(),
                    })
                    .collect(),
            })
            .collect();

        let locks = self
            .contended_locks
            .iter()
            .map(|&id| {
                let lock = dump.lock(id);
                LockReport {
                    address: lock.address().to_string(),
                    class_name: lock.class_name().map(str::to_string),
                    owner: lock.owner().map(thread_name),
                    blockers: lock.blockers().iter().map(|&b| thread_name(b)).collect(),
                    advisories: lock.advisories.sorted(),
                }
            })
            .collect();

        let mut by_health: BTreeMap<HealthLevel, usize> = BTreeMap::new();
        for t in &threads {
            *by_health.entry(t.health).or_default() += 1;
        }
        let summary = ReportSummary {
            threads: threads.len(),
            groups: self.groups.len(),
            worst_health: self.worst_health(),
            by_health: by_health
                .into_iter()
                .rev()
                .map(|(level, count)| (level.as_str().to_string(), count))
                .collect(),
        };

        AnalysisReport {
            analyzed_at: Utc::now(),
            summary,
            threads,
            groups,
            locks,
        }
    }
}

/// JSON-friendly analysis output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub analyzed_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub threads: Vec<ThreadReport>,
    pub groups: Vec<GroupReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locks: Vec<LockReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub threads: usize,
    pub groups: usize,
    pub worst_health: HealthLevel,
    /// Thread count per health level, worst first.
    pub by_health: Vec<(String, usize)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadReport {
    pub name: String,
    pub state: WaitState,
    pub health: HealthLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub advisories: Vec<Advisory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupReport {
    pub name: String,
    pub kind: GroupKind,
    pub health: HealthLevel,
    pub members: usize,
    pub advisories: Vec<Advisory>,
    pub counters: GroupCounters,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hot_calls: Vec<HotCallReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotCallReport {
    pub text: String,
    pub threads: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockReport {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub blockers: Vec<String>,
    pub advisories: Vec<Advisory>,
}
