//! Heuristics shared by every group kind, and the generic thread reset.

use crate::advisory::{Advisory, names};
use crate::groups::GroupKind;
use crate::health::HealthLevel;
use crate::hot_call;

use super::{GroupAdvisor, GroupContext, ThreadContext};

/// Thread name tokens of directory and AQ adapter threads, which sit in
/// socket reads by design.
const SOCKET_WAITER_NAMES: [&str; 2] = ["LDAPConnThread", "AQAdapter"];

/// Which parts of the base logic a kind runs.
#[derive(Debug, Clone, Copy)]
pub struct BaseOptions {
    pub hot_calls: bool,
    pub blocked_tag: bool,
}

impl BaseOptions {
    pub const ALL: Self = Self {
        hot_calls: true,
        blocked_tag: true,
    };
}

/// Size, hot call, blocked count and repeated WATCH checks.
pub fn run_base(cx: &mut GroupContext<'_>, options: BaseOptions) {
    let config = cx.config;
    let thresholds = &config.thresholds;

    if cx.group.members.len() > thresholds.large_group {
        if let Some(advisory) = cx.advisory(names::TOO_MANY_THREADS) {
            cx.group.advisories.insert(advisory);
        }
    }

    if options.hot_calls {
        let hot = hot_call::detect(cx.dump, &cx.group.members, &config.hot_calls);
        if !hot.is_empty() {
            tracing::debug!(
                group = cx.group.name(),
                patterns = hot.len(),
                "Hot call patterns found"
            );
            if let Some(advisory) = cx.advisory(names::HOT_CALL_PATTERN) {
                cx.group.advisories.insert(advisory);
            }
        }
        cx.group.hot_calls = hot;
    }

    if options.blocked_tag && cx.group.counters.blocked > thresholds.blocked_group {
        if let Some(advisory) = cx.advisory(names::BLOCKED_THREADS) {
            cx.group.advisories.insert(advisory);
        }
    }

    let mut watch: Vec<(Advisory, usize)> = Vec::new();
    for &id in &cx.group.members {
        for advisory in &cx.dump.thread(id).advisories {
            if advisory.health() != HealthLevel::Watch {
                continue;
            }
            match watch.iter_mut().find(|(seen, _)| seen.is_named(advisory.pattern())) {
                Some((_, count)) => *count += 1,
                None => watch.push((advisory.clone(), 1)),
            }
        }
    }
    for (advisory, count) in watch {
        if count > thresholds.repeat_watch {
            cx.group
                .advisories
                .upsert(advisory.with_health(HealthLevel::Warning));
        }
    }
}

/// LDAP/AQ threads at WATCH only because of a socket or database read go
/// back to NORMAL.
pub fn reset_socket_read(cx: &mut ThreadContext<'_>) {
    let thread = cx.record();
    if thread.health() != HealthLevel::Watch
        || thread.is_blocked_for_lock()
        || !SOCKET_WAITER_NAMES.iter().any(|n| thread.has_in_name(n))
    {
        return;
    }
    let mut serious = thread
        .advisories
        .iter()
        .filter(|a| a.health() >= HealthLevel::Watch)
        .peekable();
    if serious.peek().is_none() {
        return;
    }
    if serious.all(|a| a.is_named(names::SOCKET_READ) || a.is_named(names::DB_STATEMENT_WAIT)) {
        tracing::debug!(thread = thread.name(), "Socket read wait is expected; downgrading");
        cx.record_mut().reset_health(HealthLevel::Normal);
    }
}

pub struct GenericAdvisor;

impl GroupAdvisor for GenericAdvisor {
    fn kind(&self) -> GroupKind {
        GroupKind::Generic
    }

    fn run_group_advisory(&self, cx: &mut GroupContext<'_>) {
        run_base(cx, BaseOptions::ALL);
    }
}

pub struct OnsAdvisor;

impl GroupAdvisor for OnsAdvisor {
    fn kind(&self) -> GroupKind {
        GroupKind::Ons
    }

    fn run_group_advisory(&self, cx: &mut GroupContext<'_>) {
        run_base(
            cx,
            BaseOptions {
                hot_calls: false,
                blocked_tag: true,
            },
        );
    }
}
