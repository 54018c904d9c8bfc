use crate::advisory::names;
use crate::groups::GroupKind;
use crate::health::HealthLevel;
use crate::thread::ThreadRecord;

use super::base::{BaseOptions, run_base};
use super::{GroupAdvisor, GroupContext};

/// Thread name token of parallel/concurrent GC worker threads.
const GC_THREAD_TOKEN: &str = "GC ";

/// The JVM's single finalizer thread.
pub fn is_finalizer(thread: &ThreadRecord) -> bool {
    thread.name().trim_matches('"') == "Finalizer"
}

pub struct JvmAdvisor;

impl GroupAdvisor for JvmAdvisor {
    fn kind(&self) -> GroupKind {
        GroupKind::Jvm
    }

    fn run_group_advisory(&self, cx: &mut GroupContext<'_>) {
        let finalizers = cx.members_where(|t| is_finalizer(t) && t.is_blocked_for_lock());
        if !finalizers.is_empty() {
            if let Some(advisory) = cx.advisory(names::FINALIZER_BLOCKED) {
                for id in finalizers {
                    let thread = cx.thread_mut(id);
                    thread.attach(advisory.clone());
                    thread.raise_health(HealthLevel::Fatal);
                    tracing::debug!(thread = thread.name(), "Finalizer blocked");
                }
                cx.group.force_health(HealthLevel::Fatal);
            }
        }

        let gc_threads = cx.members_where(|t| t.has_in_name(GC_THREAD_TOKEN));
        if gc_threads.len() > cx.config.thresholds.gc_threads {
            if let Some(advisory) = cx.advisory(names::EXCESSIVE_GC_THREADS) {
                tracing::debug!(
                    group = cx.group.name(),
                    gc_threads = gc_threads.len(),
                    "Excessive GC threads"
                );
                for id in gc_threads {
                    cx.thread_mut(id).attach(advisory.clone());
                }
                cx.group.attach_forced(advisory);
            }
        }

        run_base(
            cx,
            BaseOptions {
                hot_calls: false,
                blocked_tag: true,
            },
        );
    }
}
