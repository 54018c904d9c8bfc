//! Per-thread classification.
//!
//! Every thread goes through the same ordered passes. Later passes read the
//! advisories earlier ones attached, so the order is part of the contract:
//!
//! 1. blocked for a known lock → WATCH
//! 2. stuck marker in the name (non-poller) → STUCK
//! 3. stack scan against the catalog
//! 4. lock fairness (owner waiting while others queue on its lock)
//! 5. kind-specific reset hook
//! 6. context bumps (servlet, EJB, BPEL, stuck sub-patterns)
//! 7. finalizer special case
//! 8. deep but unexplained → UNKNOWN

use crate::advisory::{names, normalize_keyword};
use crate::catalog::AdvisoryCatalog;
use crate::config::Config;
use crate::groups::GroupKind;
use crate::health::HealthLevel;
use crate::strategy::{self, ThreadContext, advisor_for, engine_advisory};
use crate::thread::{ThreadDump, ThreadId, WaitState};

/// Synchronizer classes a thread parks on when it is really waiting for a
/// lock, in normalized form.
const SYNC_MARKERS: [&str; 4] = [
    "ReentrantLock.NonfairSync",
    "ReentrantLock.FairSync",
    "Semaphore.NonfairSync",
    "Semaphore.FairSync",
];

const SERVLET_FRAME: &str = "weblogic.servlet.internal";
const EJB_FRAME: &str = "weblogic.ejb.container";
const BPEL_FRAME: &str = "com.collaxa.cube.engine";
const HTTP_FRAMES: [&str; 2] = ["HTTPClient.HTTPConnection", "sun.net.www.protocol.http"];
const DMS_FRAME: &str = "oracle.dms.";
const XPATH_FRAME: &str = "oracle.xml.xpath";

fn is_sync_marker(normalized: &str) -> bool {
    SYNC_MARKERS.iter().any(|marker| normalized.contains(marker))
}

/// Runs the ordered passes over threads of a dump.
pub struct ThreadClassifier<'a> {
    catalog: &'a AdvisoryCatalog,
    config: &'a Config,
}

impl<'a> ThreadClassifier<'a> {
    pub fn new(catalog: &'a AdvisoryCatalog, config: &'a Config) -> Self {
        Self { catalog, config }
    }

    /// Classify every thread in arena order.
    pub fn classify_all(&self, dump: &mut ThreadDump) {
        for id in dump.thread_ids() {
            self.classify(dump, id);
        }
        tracing::debug!(threads = dump.len(), "Classified threads");
    }

    /// Classify one thread. Reads other threads only through lock ownership.
    pub fn classify(&self, dump: &mut ThreadDump, id: ThreadId) {
        self.mark_blocked(dump, id);
        self.mark_stuck(dump, id);
        self.scan_stack(dump, id);
        self.check_lock_fairness(dump, id);
        self.reset(dump, id);
        self.bump_context(dump, id);
        self.check_finalizer(dump, id);
        self.mark_unexplained(dump, id);
    }

    fn mark_blocked(&self, dump: &mut ThreadDump, id: ThreadId) {
        let thread = dump.thread_mut(id);
        if thread.is_blocked_for_lock() {
            thread.raise_health(HealthLevel::Watch);
        }
    }

    fn mark_stuck(&self, dump: &mut ThreadDump, id: ThreadId) {
        let markers = &self.config.markers;
        let thread = dump.thread(id);
        if !thread.has_in_name(&markers.stuck_marker) || markers.is_poller_name(thread.name()) {
            return;
        }
        if let Some(stuck) = engine_advisory(self.catalog, names::STUCK) {
            let thread = dump.thread_mut(id);
            thread.attach(stuck);
            thread.raise_health(HealthLevel::Fatal);
        }
    }

    fn scan_stack(&self, dump: &mut ThreadDump, id: ThreadId) {
        let matches: Vec<String> = self
            .catalog
            .scan(dump.thread(id).stack())
            .map(normalize_keyword)
            .collect();
        if matches.is_empty() {
            return;
        }

        let thread = dump.thread_mut(id);
        let mut parked_on_sync = false;
        for found in matches {
            if is_sync_marker(&found) && (parked_on_sync || thread.state == WaitState::Parking) {
                // Parked on a lock synchronizer: treat as blocked.
                parked_on_sync = true;
                thread.state = WaitState::Blocked;
                thread.raise_health(HealthLevel::Watch);
                continue;
            }
            match self.catalog.lookup_by_keyword(&found) {
                Some(advisory) => {
                    thread.attach(advisory);
                }
                None => {
                    tracing::warn!(
                        thread = thread.name(),
                        keyword = %found,
                        "No advisory for matched keyword"
                    );
                }
            }
        }
    }

    fn check_lock_fairness(&self, dump: &mut ThreadDump, id: ThreadId) {
        let thread = dump.thread(id);
        if !thread.state.is_waiting() {
            return;
        }
        let starving = thread
            .held_locks()
            .iter()
            .any(|&lock| dump.lock(lock).blockers().len() > 1);
        if !starving {
            return;
        }
        if let Some(advisory) = engine_advisory(self.catalog, names::WAITING_WHILE_BLOCKING) {
            let thread = dump.thread_mut(id);
            tracing::debug!(thread = thread.name(), "Owner waiting while others queue on its lock");
            thread.attach(advisory);
        }
    }

    fn reset(&self, dump: &mut ThreadDump, id: ThreadId) {
        let kind = GroupKind::for_thread(dump.thread(id));
        let mut cx = ThreadContext {
            dump,
            thread: id,
            catalog: self.catalog,
            config: self.config,
        };
        advisor_for(kind).reset_thread(&mut cx);
    }

    fn bump_context(&self, dump: &mut ThreadDump, id: ThreadId) {
        let thread = dump.thread(id);
        let state = thread.state;
        let mut bumps = Vec::new();

        if thread.has_in_stack(SERVLET_FRAME)
            && (state == WaitState::Blocked || state.is_waiting())
        {
            bumps.push(names::SERVLET_BLOCKED);
        }
        if thread.has_in_stack(EJB_FRAME) && state == WaitState::Blocked {
            bumps.push(names::EJB_BLOCKED);
        }
        if thread.has_in_stack(BPEL_FRAME) && state == WaitState::Blocked {
            bumps.push(names::BPEL_ENGINE_BLOCKED);
        }
        if thread.has_advisory(names::STUCK) {
            if HTTP_FRAMES.iter().any(|frame| thread.has_in_stack(frame)) {
                bumps.push(names::STUCK_HTTP);
            }
            if thread.has_in_stack(DMS_FRAME) {
                bumps.push(names::STUCK_DMS);
            }
            if thread.has_in_stack(XPATH_FRAME) {
                bumps.push(names::STUCK_XPATH);
            }
        }

        for name in bumps {
            if let Some(advisory) = engine_advisory(self.catalog, name) {
                dump.thread_mut(id).attach(advisory);
            }
        }
    }

    fn check_finalizer(&self, dump: &mut ThreadDump, id: ThreadId) {
        let thread = dump.thread_mut(id);
        if strategy::is_finalizer(thread) && !thread.is_blocked_for_lock() {
            thread.advisories.remove_named(names::FINALIZER_BLOCKED);
            thread.reset_health(HealthLevel::Normal);
        }
    }

    fn mark_unexplained(&self, dump: &mut ThreadDump, id: ThreadId) {
        let thread = dump.thread_mut(id);
        if thread.advisories.is_empty()
            && thread.health() < HealthLevel::Watch
            && thread.stack_depth() >= self.config.thresholds.active_stack_depth
        {
            thread.reset_health(HealthLevel::Unknown);
        }
    }
}
