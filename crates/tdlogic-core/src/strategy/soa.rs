//! SOA and MFT groups: adapter pollers and BPEL engine threads spend most of
//! their life idle, which generic stuck detection misreads.

use crate::advisory::{ADAPTER_ADVISORIES, names};
use crate::groups::{GroupCounters, GroupKind};
use crate::health::HealthLevel;
use crate::thread::ThreadRecord;

use super::base::{BaseOptions, reset_socket_read, run_base};
use super::{GroupAdvisor, GroupContext, ThreadContext};

/// Frames of the BPEL engine.
const ENGINE_FRAME: &str = "com.collaxa.cube.engine";
/// Frames of the BPEL invoke dispatcher.
const INVOKE_FRAME: &str = "com.collaxa.cube.engine.dispatch";

fn is_shallow_idle(thread: &ThreadRecord, poller_depth: usize) -> bool {
    thread.state.is_sleep_or_wait() && thread.stack_depth() <= poller_depth
}

/// An adapter or poller thread parked between polls.
pub fn is_idle_poller(thread: &ThreadRecord, poller_depth: usize) -> bool {
    ADAPTER_ADVISORIES.iter().any(|name| thread.has_advisory(name))
        && is_shallow_idle(thread, poller_depth)
}

/// Shared by the SOA and MFT advisors.
fn run_idle_poller_pass(cx: &mut GroupContext<'_>) {
    let poller_depth = cx.config.thresholds.poller_depth;
    let mut idle = Vec::new();
    let mut counters = GroupCounters::default();
    for id in cx.members() {
        let thread = cx.thread(id);
        if is_idle_poller(thread, poller_depth) {
            counters.idle_adapter += 1;
            idle.push(id);
        } else if is_shallow_idle(thread, poller_depth) {
            if thread.has_in_stack(INVOKE_FRAME) {
                counters.idle_invoke += 1;
            } else if thread.has_in_stack(ENGINE_FRAME) {
                counters.idle_engine += 1;
            }
        }
    }
    tracing::debug!(
        group = cx.group.name(),
        idle_adapter = counters.idle_adapter,
        idle_engine = counters.idle_engine,
        idle_invoke = counters.idle_invoke,
        "Idle poller census"
    );
    cx.group.counters.idle_adapter = counters.idle_adapter;
    cx.group.counters.idle_engine = counters.idle_engine;
    cx.group.counters.idle_invoke = counters.idle_invoke;

    for id in idle {
        cx.thread_mut(id).reset_health(HealthLevel::Ignore);
    }
    run_base(cx, BaseOptions::ALL);
}

/// A stuck marker on a poller between polls is a false positive.
fn reset_idle_poller(cx: &mut ThreadContext<'_>) {
    let poller_depth = cx.config.thresholds.poller_depth;
    let thread = cx.record();
    if !is_idle_poller(thread, poller_depth) || !thread.has_advisory(names::STUCK) {
        return;
    }
    let thread = cx.record_mut();
    thread.advisories.remove_named(names::STUCK);
    thread.reset_health(HealthLevel::Normal);
    tracing::debug!(thread = thread.name(), "Idle poller marked stuck; cleared");
}

pub struct SoaAdvisor;

impl GroupAdvisor for SoaAdvisor {
    fn kind(&self) -> GroupKind {
        GroupKind::Soa
    }

    fn run_group_advisory(&self, cx: &mut GroupContext<'_>) {
        run_idle_poller_pass(cx);
    }

    fn reset_thread(&self, cx: &mut ThreadContext<'_>) {
        reset_idle_poller(cx);
        reset_socket_read(cx);
    }
}

pub struct MftAdvisor;

impl GroupAdvisor for MftAdvisor {
    fn kind(&self) -> GroupKind {
        GroupKind::Mft
    }

    fn run_group_advisory(&self, cx: &mut GroupContext<'_>) {
        run_idle_poller_pass(cx);
    }

    fn reset_thread(&self, cx: &mut ThreadContext<'_>) {
        reset_idle_poller(cx);
        reset_socket_read(cx);
    }
}
