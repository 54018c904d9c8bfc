use crate::advisory::names;
use crate::groups::GroupKind;
use crate::health::HealthLevel;
use crate::thread::ThreadId;

use super::base::{BaseOptions, run_base};
use super::{GroupAdvisor, GroupContext};

pub struct OsbAdvisor;

impl OsbAdvisor {
    /// Too many service callouts: every callout thread goes to WARNING.
    fn escalate_callouts(cx: &mut GroupContext<'_>) {
        let callouts = cx.members_where(|t| t.has_advisory(names::OSB_SERVICE_CALLOUT));
        if callouts.len() <= cx.config.thresholds.osb_callouts {
            return;
        }
        tracing::debug!(
            group = cx.group.name(),
            callouts = callouts.len(),
            "Service callout overload"
        );
        for id in callouts {
            let thread = cx.thread_mut(id);
            if let Some(advisory) = thread.advisories.get_named_mut(names::OSB_SERVICE_CALLOUT) {
                *advisory = advisory.clone().with_health(HealthLevel::Warning);
            }
            thread.reset_health(HealthLevel::Warning);
        }
    }

    /// Derived-cache readers together with blocked transaction begins are the
    /// signature of the cache deadlock.
    fn detect_cache_deadlock(cx: &mut GroupContext<'_>) {
        let cache = cx.members_where(|t| t.has_advisory(names::OSB_DERIVED_CACHE));
        let begin =
            cx.members_where(|t| t.has_advisory(names::BEGIN_TX) && t.is_blocked_for_lock());
        if cache.is_empty() || begin.is_empty() {
            return;
        }
        let (Some(cache_tag), Some(begin_tag)) =
            (cx.advisory(names::OSB_DERIVED_CACHE), cx.advisory(names::BEGIN_TX))
        else {
            return;
        };
        let cache_tag = cache_tag.with_health(HealthLevel::Fatal);
        let begin_tag = begin_tag.with_health(HealthLevel::Fatal);

        let mut involved: Vec<ThreadId> = cache;
        for id in begin {
            if !involved.contains(&id) {
                involved.push(id);
            }
        }
        tracing::debug!(
            group = cx.group.name(),
            threads = involved.len(),
            "Derived cache deadlock"
        );
        for id in involved {
            let thread = cx.thread_mut(id);
            thread.upsert(cache_tag.clone());
            thread.upsert(begin_tag.clone());
            thread.raise_health(HealthLevel::Fatal);
        }
        cx.group.force_health(HealthLevel::Fatal);
    }

    /// Inbound EJB threads parked on a semaphore are waiting for a response.
    fn merge_ejb_waits(cx: &mut GroupContext<'_>) {
        let waiting = cx.members_where(|t| {
            t.has_advisory(names::SEMAPHORE_WAIT) && t.has_advisory(names::EJB_INBOUND)
        });
        if waiting.is_empty() {
            return;
        }
        let Some(merged) = cx.advisory(names::WAITING_FOR_EJB_RESPONSE) else {
            return;
        };
        let active_depth = cx.config.thresholds.active_stack_depth;
        for id in waiting {
            let thread = cx.thread_mut(id);
            thread.advisories.remove_named(names::SEMAPHORE_WAIT);
            thread.advisories.remove_named(names::EJB_INBOUND);
            thread.advisories.insert(merged.clone());
            thread.rederive_health(active_depth);
        }
    }
}

impl GroupAdvisor for OsbAdvisor {
    fn kind(&self) -> GroupKind {
        GroupKind::Osb
    }

    fn run_group_advisory(&self, cx: &mut GroupContext<'_>) {
        Self::escalate_callouts(cx);
        Self::detect_cache_deadlock(cx);
        Self::merge_ejb_waits(cx);
        run_base(cx, BaseOptions::ALL);
    }
}
