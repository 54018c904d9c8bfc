//! Per-kind group heuristics and thread reset hooks.
//!
//! Every [`GroupKind`] maps to one [`GroupAdvisor`]. The same registry is used
//! twice per analysis: once per thread during classification (reset hooks)
//! and once per group during aggregation.

mod adf;
mod base;
mod jvm;
mod osb;
mod soa;
mod wls;

pub use base::BaseOptions;
pub use jvm::is_finalizer;
pub use soa::is_idle_poller;

use crate::advisory::Advisory;
use crate::catalog::AdvisoryCatalog;
use crate::config::Config;
use crate::groups::{GroupKind, ThreadGroup};
use crate::thread::{ThreadDump, ThreadId, ThreadRecord};

/// Look up an advisory the engine attaches by name. A missing advisory
/// (custom catalog without built-ins) disables the heuristic that needs it.
pub fn engine_advisory(catalog: &AdvisoryCatalog, name: &str) -> Option<Advisory> {
    let advisory = catalog.lookup_by_display_name(name);
    if advisory.is_none() {
        tracing::warn!(advisory = name, "Advisory not in catalog; heuristic skipped");
    }
    advisory
}

/// Mutable view of one group during aggregation.
pub struct GroupContext<'a> {
    pub dump: &'a mut ThreadDump,
    pub group: &'a mut ThreadGroup,
    pub catalog: &'a AdvisoryCatalog,
    pub config: &'a Config,
}

impl GroupContext<'_> {
    pub fn advisory(&self, name: &str) -> Option<Advisory> {
        engine_advisory(self.catalog, name)
    }

    pub fn members(&self) -> Vec<ThreadId> {
        self.group.members.clone()
    }

    /// Members satisfying `pred`, in member order.
    pub fn members_where(&self, pred: impl Fn(&ThreadRecord) -> bool) -> Vec<ThreadId> {
        self.group
            .members
            .iter()
            .copied()
            .filter(|&id| pred(self.dump.thread(id)))
            .collect()
    }

    pub fn thread(&self, id: ThreadId) -> &ThreadRecord {
        self.dump.thread(id)
    }

    pub fn thread_mut(&mut self, id: ThreadId) -> &mut ThreadRecord {
        self.dump.thread_mut(id)
    }
}

/// Mutable view of one thread during classification.
pub struct ThreadContext<'a> {
    pub dump: &'a mut ThreadDump,
    pub thread: ThreadId,
    pub catalog: &'a AdvisoryCatalog,
    pub config: &'a Config,
}

impl ThreadContext<'_> {
    pub fn advisory(&self, name: &str) -> Option<Advisory> {
        engine_advisory(self.catalog, name)
    }

    pub fn record(&self) -> &ThreadRecord {
        self.dump.thread(self.thread)
    }

    pub fn record_mut(&mut self) -> &mut ThreadRecord {
        self.dump.thread_mut(self.thread)
    }
}

/// Heuristics for one group kind.
pub trait GroupAdvisor: Sync {
    fn kind(&self) -> GroupKind;

    /// Run the group-level heuristics. Called after counters are computed and
    /// before member advisories are folded into the group.
    fn run_group_advisory(&self, cx: &mut GroupContext<'_>);

    /// Per-thread downgrade/escalation hook (classification step 5).
    /// Overrides finish with [`base::reset_socket_read`].
    fn reset_thread(&self, cx: &mut ThreadContext<'_>) {
        base::reset_socket_read(cx);
    }
}

static GENERIC: base::GenericAdvisor = base::GenericAdvisor;
static ONS: base::OnsAdvisor = base::OnsAdvisor;
static JVM: jvm::JvmAdvisor = jvm::JvmAdvisor;
static OSB: osb::OsbAdvisor = osb::OsbAdvisor;
static REST_OF_WLS: wls::RestOfWlsAdvisor = wls::RestOfWlsAdvisor;
static MUXER: wls::MuxerAdvisor = wls::MuxerAdvisor;
static CLUSTER: wls::ClusterAdvisor = wls::ClusterAdvisor;
static SOA: soa::SoaAdvisor = soa::SoaAdvisor;
static MFT: soa::MftAdvisor = soa::MftAdvisor;
static ADF: adf::AdfAdvisor = adf::AdfAdvisor;

/// The advisor registered for `kind`.
pub fn advisor_for(kind: GroupKind) -> &'static dyn GroupAdvisor {
    match kind {
        GroupKind::Generic => &GENERIC,
        GroupKind::Ons => &ONS,
        GroupKind::Jvm => &JVM,
        GroupKind::Osb => &OSB,
        GroupKind::RestOfWls => &REST_OF_WLS,
        GroupKind::Muxer => &MUXER,
        GroupKind::Cluster => &CLUSTER,
        GroupKind::Soa => &SOA,
        GroupKind::Mft => &MFT,
        GroupKind::Adf => &ADF,
    }
}
