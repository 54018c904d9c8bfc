//! Thread groups produced by partitioning a dump.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::advisory::{Advisory, AdvisorySet};
use crate::health::HealthLevel;
use crate::thread::{ThreadId, ThreadRecord, WaitState};

/// Index of a group in an analysis result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub usize);

/// Strategy tag; selects group heuristics and thread reset hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Generic,
    Jvm,
    Osb,
    RestOfWls,
    Muxer,
    Cluster,
    Soa,
    Mft,
    Adf,
    Ons,
}

impl GroupKind {
    /// Derive the kind from a group name. Checks run in a fixed order, so a
    /// name containing both `SOA` and `Muxer` is a SOA group.
    pub fn from_group_name(name: &str) -> Self {
        const ORDER: [(&str, GroupKind); 9] = [
            ("SOA", GroupKind::Soa),
            ("MFT", GroupKind::Mft),
            ("Muxer", GroupKind::Muxer),
            ("JVM", GroupKind::Jvm),
            ("Cluster", GroupKind::Cluster),
            ("Rest of WLS", GroupKind::RestOfWls),
            ("OSB", GroupKind::Osb),
            ("ADF", GroupKind::Adf),
            ("ONS", GroupKind::Ons),
        ];
        ORDER
            .iter()
            .find(|(needle, _)| name.contains(needle))
            .map_or(Self::Generic, |(_, kind)| *kind)
    }

    /// Kind used to pick a thread's reset hook.
    pub fn for_thread(thread: &ThreadRecord) -> Self {
        if thread.has_in_name("Muxer") {
            Self::Muxer
        } else if thread.has_in_stack("oracle.mft") {
            Self::Mft
        } else if ["oracle.tip.adapter", "com.collaxa.cube", "oracle.soa"]
            .iter()
            .any(|frame| thread.has_in_stack(frame))
        {
            Self::Soa
        } else if thread.has_in_stack("oracle.adf") {
            Self::Adf
        } else {
            Self::Generic
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Jvm => "jvm",
            Self::Osb => "osb",
            Self::RestOfWls => "rest_of_wls",
            Self::Muxer => "muxer",
            Self::Cluster => "cluster",
            Self::Soa => "soa",
            Self::Mft => "mft",
            Self::Adf => "adf",
            Self::Ons => "ons",
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-group thread counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCounters {
    pub total: usize,
    pub blocked: usize,
    pub running: usize,
    /// WAITING, TIMED_WAITING or PARKING
    pub waiting: usize,
    /// SLEEPING or UNKNOWN
    pub other: usize,
    /// Idle BPEL engine threads
    pub idle_engine: usize,
    /// Idle invoke threads
    pub idle_invoke: usize,
    /// Idle adapter/poller threads
    pub idle_adapter: usize,
}

impl GroupCounters {
    pub fn record(&mut self, state: WaitState) {
        self.total += 1;
        match state {
            WaitState::Blocked => self.blocked += 1,
            WaitState::Running => self.running += 1,
            WaitState::Waiting | WaitState::TimedWaiting | WaitState::Parking => self.waiting += 1,
            WaitState::Sleeping | WaitState::Unknown => self.other += 1,
        }
    }
}

/// Threads sharing one stack window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotCallPattern {
    pub text: String,
    pub threads: Vec<ThreadId>,
}

impl HotCallPattern {
    pub fn count(&self) -> usize {
        self.threads.len()
    }
}

/// A named set of threads with its own diagnosis.
#[derive(Debug, Clone)]
pub struct ThreadGroup {
    id: GroupId,
    name: String,
    kind: GroupKind,
    pub members: Vec<ThreadId>,
    health: HealthLevel,
    pub advisories: AdvisorySet,
    pub counters: GroupCounters,
    pub excluded_advisories: Vec<String>,
    pub hot_calls: Vec<HotCallPattern>,
    forced_health: Option<HealthLevel>,
}

impl ThreadGroup {
    #[must_use]
    pub fn new(id: GroupId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            kind: GroupKind::from_group_name(&name),
            name,
            members: Vec::new(),
            health: HealthLevel::Normal,
            advisories: AdvisorySet::new(),
            counters: GroupCounters::default(),
            excluded_advisories: Vec::new(),
            hot_calls: Vec::new(),
            forced_health: None,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn health(&self) -> HealthLevel {
        self.health
    }

    pub fn forced_health(&self) -> Option<HealthLevel> {
        self.forced_health
    }

    /// Pin group health to at least `level` regardless of members.
    pub fn force_health(&mut self, level: HealthLevel) {
        self.forced_health = Some(self.forced_health.map_or(level, |h| h.max(level)));
    }

    /// Attach an advisory to the group and force group health to its level.
    pub fn attach_forced(&mut self, advisory: Advisory) {
        self.force_health(advisory.health());
        self.advisories.upsert(advisory);
    }

    /// Health becomes the worst member health, or the forced level if higher.
    pub fn fold_health(&mut self, member_health: impl IntoIterator<Item = HealthLevel>) {
        let worst = HealthLevel::max_of(member_health).unwrap_or(HealthLevel::Normal);
        self.health = self.forced_health.map_or(worst, |forced| forced.max(worst));
    }
}
