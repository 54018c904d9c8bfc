//! WebLogic server groups: default pool, socket muxers and cluster threads.

use crate::advisory::names;
use crate::groups::GroupKind;
use crate::health::HealthLevel;
use crate::thread::{ThreadId, WaitState};

use super::base::{BaseOptions, reset_socket_read, run_base};
use super::{GroupAdvisor, GroupContext, ThreadContext};

/// Name token of threads in the default self-tuning pool.
const DEFAULT_POOL_TOKEN: &str = "weblogic.kernel.Default";
/// Name token of idle threads parked in the standby pool.
const STANDBY_TOKEN: &str = "[STANDBY]";
/// Name token of channel listen threads.
const LISTEN_THREAD_TOKEN: &str = "ListenThread";
/// Frame of a muxer handing work straight to the work manager.
pub const WORK_DISPATCH_FRAME: &str = "weblogic.work.SelfTuningWorkManagerImpl.schedule";
/// Frames of servlet request processing.
pub const SERVLET_FRAME: &str = "weblogic.servlet";

pub struct RestOfWlsAdvisor;

impl GroupAdvisor for RestOfWlsAdvisor {
    fn kind(&self) -> GroupKind {
        GroupKind::RestOfWls
    }

    fn run_group_advisory(&self, cx: &mut GroupContext<'_>) {
        // Pool and listener checks are meaningless while services start.
        if !cx
            .members_where(|t| t.has_advisory(names::SERVICES_STARTING))
            .is_empty()
        {
            tracing::debug!(group = cx.group.name(), "Server starting up; skipping group checks");
            return;
        }

        let default_pool = cx.members_where(|t| t.has_in_name(DEFAULT_POOL_TOKEN));
        let pool_size = default_pool.len();
        let (idle, busy): (Vec<ThreadId>, Vec<ThreadId>) =
            default_pool.into_iter().partition(|&id| {
                let t = cx.thread(id);
                t.has_advisory(names::IDLE_THREAD) || t.has_in_name(STANDBY_TOKEN)
            });
        if pool_size > 0 && idle.len() < cx.config.thresholds.min_idle_default {
            if let Some(advisory) = cx.advisory(names::THREAD_STARVATION) {
                tracing::debug!(
                    group = cx.group.name(),
                    idle = idle.len(),
                    busy = busy.len(),
                    "Default pool starving"
                );
                for id in busy {
                    let thread = cx.thread_mut(id);
                    thread.advisories.upsert(advisory.clone());
                    thread.reset_health(advisory.health());
                }
                cx.group.attach_forced(advisory);
            }
        }

        let has_listener = !cx
            .members_where(|t| {
                t.has_in_name(LISTEN_THREAD_TOKEN) || t.has_advisory(names::LISTENER)
            })
            .is_empty();
        if !has_listener {
            if let Some(advisory) = cx.advisory(names::LISTENER_MISSING) {
                cx.group.attach_forced(advisory);
            }
        }

        run_base(cx, BaseOptions::ALL);
    }
}

pub struct MuxerAdvisor;

impl GroupAdvisor for MuxerAdvisor {
    fn kind(&self) -> GroupKind {
        GroupKind::Muxer
    }

    fn run_group_advisory(&self, cx: &mut GroupContext<'_>) {
        if cx.group.members.len() > cx.config.thresholds.muxer_threads {
            if let Some(advisory) = cx.advisory(names::MUXER_VOLUME) {
                for id in cx.members() {
                    let thread = cx.thread_mut(id);
                    thread.advisories.upsert(advisory.clone());
                    thread.reset_health(advisory.health());
                }
                cx.group.attach_forced(advisory);
            }
        }
        run_base(
            cx,
            BaseOptions {
                hot_calls: false,
                blocked_tag: false,
            },
        );
    }

    /// Muxers block on each other by design; anything else holding a muxer
    /// up is fatal.
    fn reset_thread(&self, cx: &mut ThreadContext<'_>) {
        let state = cx.record().state;
        if state == WaitState::Blocked && cx.record().health() == HealthLevel::Watch {
            let owner = cx.dump.blocking_owner(cx.thread);
            let owner_is_muxer = owner.is_some_and(|o| cx.dump.thread(o).has_in_name("Muxer"));
            let thread = cx.record_mut();
            if owner.is_none() || owner_is_muxer {
                thread.reset_health(HealthLevel::Normal);
            } else {
                thread.advisories.remove_named(names::MUXER_PROCESSING_SOCKETS);
                thread.reset_health(HealthLevel::Fatal);
                tracing::debug!(thread = thread.name(), "Muxer blocked by a non-muxer thread");
            }
        } else if state.is_waiting() || state == WaitState::Parking {
            let active_depth = cx.config.thresholds.active_stack_depth;
            let thread = cx.record_mut();
            if thread.advisories.remove_named(names::WAITING_WHILE_BLOCKING) {
                thread.rederive_health(active_depth);
            }
        }

        if cx.record().has_in_stack(WORK_DISPATCH_FRAME) {
            if let Some(advisory) = cx.advisory(names::SUBSYSTEM_REQUEST_OVERFLOW) {
                let thread = cx.record_mut();
                thread.advisories.remove_named(names::MUXER_PROCESSING_SOCKETS);
                thread.attach(advisory);
            }
        }
        reset_socket_read(cx);
    }
}

pub struct ClusterAdvisor;

impl GroupAdvisor for ClusterAdvisor {
    fn kind(&self) -> GroupKind {
        GroupKind::Cluster
    }

    fn run_group_advisory(&self, cx: &mut GroupContext<'_>) {
        let non_web = cx.members_where(|t| !t.has_in_stack(SERVLET_FRAME));
        if non_web.len() >= cx.config.thresholds.cluster_threads {
            if let Some(advisory) = cx.advisory(names::CLUSTER_UNHEALTHY) {
                for id in non_web {
                    cx.thread_mut(id).attach(advisory.clone());
                }
                cx.group.attach_forced(advisory);
            }
        }
        run_base(cx, BaseOptions::ALL);
    }
}
