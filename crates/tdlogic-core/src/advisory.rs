//! Advisory rules and per-thread advisory sets.
//!
//! An [`Advisory`] is a diagnostic rule: a keyword found in stack text (or a
//! tag attached by a heuristic), a display pattern name, a health level and
//! remediation text. The catalog owns one template per keyword and hands out
//! clones, so bumping the health of one occurrence never touches the template.

use serde::{Deserialize, Serialize};

use crate::health::HealthLevel;

/// Keyword prefix for advisories that are attached by heuristics only and
/// never participate in the stack scan.
pub const TAG_ONLY_PREFIX: &str = "tdl:";

/// Marker that turns a keyword into a wildcard pattern.
pub const WILDCARD_MARKER: char = '*';

/// Display names of advisories the engine attaches or inspects by name.
///
/// Every name here has an entry in the built-in definitions
/// (`data/advisories.toml`).
pub mod names {
    pub const STUCK: &str = "Stuck Thread";
    pub const WAITING_WHILE_BLOCKING: &str = "Waiting while Blocking";
    pub const BLOCKED_THREADS: &str = "Blocked Threads";
    pub const CONTENTION_UNOWNED: &str = "Contention for Unowned Lock";
    pub const TOO_MANY_THREADS: &str = "Too Many Threads";
    pub const HOT_CALL_PATTERN: &str = "Hot Call Pattern";
    pub const FINALIZER_BLOCKED: &str = "Finalizer Thread Blocked";
    pub const EXCESSIVE_GC_THREADS: &str = "Excessive Parallel GC Threads";
    pub const THREAD_STARVATION: &str = "Thread Starvation";
    pub const LISTENER_MISSING: &str = "Listener Missing";
    pub const MUXER_VOLUME: &str = "Too Many Muxer Threads";
    pub const CLUSTER_UNHEALTHY: &str = "WLS Cluster Unhealthy";
    pub const SUBSYSTEM_REQUEST_OVERFLOW: &str = "Subsystem Request Overflow";
    pub const WAITING_FOR_EJB_RESPONSE: &str = "Waiting for EJB Response";
    pub const SERVLET_BLOCKED: &str = "Servlet Request Blocked";
    pub const EJB_BLOCKED: &str = "EJB Call Blocked";
    pub const BPEL_ENGINE_BLOCKED: &str = "BPEL Engine Blocked";
    pub const STUCK_HTTP: &str = "Stuck in HTTP Call";
    pub const STUCK_DMS: &str = "Stuck in DMS Collection";
    pub const STUCK_XPATH: &str = "Stuck in XPath Evaluation";

    pub const SOCKET_READ: &str = "Socket Read";
    pub const DB_STATEMENT_WAIT: &str = "Database Statement Execution";
    pub const MUXER_PROCESSING_SOCKETS: &str = "Muxer Processing Sockets";
    pub const IDLE_THREAD: &str = "Idle Thread";
    pub const SERVICES_STARTING: &str = "Services Starting Up";
    pub const LISTENER: &str = "Listener Thread";
    pub const SEMAPHORE_WAIT: &str = "Semaphore Wait";
    pub const EJB_INBOUND: &str = "EJB Inbound Request";
    pub const OSB_SERVICE_CALLOUT: &str = "OSB Service Callout";
    pub const OSB_DERIVED_CACHE: &str = "OSB Derived Cache";
    pub const BEGIN_TX: &str = "Transaction Begin";
    pub const JCA_ADAPTER: &str = "JCA Adapter";
    pub const MFT_POLLER: &str = "MFT Poller";
}

/// Advisory names that mark a thread as an adapter/poller.
pub const ADAPTER_ADVISORIES: &[&str] = &[names::JCA_ADAPTER, names::MFT_POLLER];

/// Normalize keyword or matched stack text so that `/`, `$` and `_`
/// separators compare equal to `.`.
#[must_use]
pub fn normalize_keyword(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| match c {
            '/' | '$' | '_' => '.',
            other => other,
        })
        .collect()
}

/// One advisory definition as it appears in a definition source.
///
/// `keyword` may hold a comma separated list: the first entry is the primary
/// keyword, the rest are alternates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryDefinition {
    pub keyword: String,
    pub health: String,
    pub pattern: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub advice: String,
}

/// A diagnostic rule attachable to threads, groups and locks.
///
/// Identity is "same display name OR same keyword"; see the `PartialEq` impl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advisory {
    keyword: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    alternates: Vec<String>,
    health: HealthLevel,
    pattern: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    advice: String,
}

impl Advisory {
    #[must_use]
    pub fn new(
        keyword: impl Into<String>,
        pattern: impl Into<String>,
        health: HealthLevel,
    ) -> Self {
        Self {
            keyword: keyword.into(),
            alternates: Vec::new(),
            health,
            pattern: pattern.into(),
            description: String::new(),
            advice: String::new(),
        }
    }

    #[must_use]
    pub fn with_alternates(mut self, alternates: Vec<String>) -> Self {
        self.alternates = alternates;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_advice(mut self, advice: impl Into<String>) -> Self {
        self.advice = advice.into();
        self
    }

    /// Copy of this advisory carrying a different health level.
    #[must_use]
    pub fn with_health(mut self, health: HealthLevel) -> Self {
        self.health = health;
        self
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn alternates(&self) -> &[String] {
        &self.alternates
    }

    pub fn health(&self) -> HealthLevel {
        self.health
    }

    /// Display name.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn advice(&self) -> &str {
        &self.advice
    }

    pub fn is_tag_only(&self) -> bool {
        self.keyword.starts_with(TAG_ONLY_PREFIX)
    }

    pub fn is_wildcard(&self) -> bool {
        self.keyword.contains(WILDCARD_MARKER)
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.pattern == name
    }
}

impl PartialEq for Advisory {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern || self.keyword == other.keyword
    }
}

/// Advisories attached to one thread, group or lock.
///
/// Never holds two entries of equal identity. Insertion order is kept so
/// reports are stable; use [`AdvisorySet::sorted`] for display order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdvisorySet {
    items: Vec<Advisory>,
}

impl AdvisorySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless an advisory of equal identity is present.
    /// Returns `true` when inserted.
    pub fn insert(&mut self, advisory: Advisory) -> bool {
        if self.items.contains(&advisory) {
            return false;
        }
        self.items.push(advisory);
        true
    }

    /// Replace every entry of equal identity with `advisory`, or append it.
    pub fn upsert(&mut self, advisory: Advisory) {
        if let Some(pos) = self.items.iter().position(|a| *a == advisory) {
            self.items[pos] = advisory;
            let mut idx = pos + 1;
            while idx < self.items.len() {
                if self.items[idx] == self.items[pos] {
                    self.items.remove(idx);
                } else {
                    idx += 1;
                }
            }
        } else {
            self.items.push(advisory);
        }
    }

    /// Remove the advisory with the given display name.
    /// Returns `true` when something was removed.
    pub fn remove_named(&mut self, name: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|a| !a.is_named(name));
        before != self.items.len()
    }

    pub fn contains_named(&self, name: &str) -> bool {
        self.items.iter().any(|a| a.is_named(name))
    }

    pub fn get_named(&self, name: &str) -> Option<&Advisory> {
        self.items.iter().find(|a| a.is_named(name))
    }

    pub fn get_named_mut(&mut self, name: &str) -> Option<&mut Advisory> {
        self.items.iter_mut().find(|a| a.is_named(name))
    }

    /// Worst health of any member, `None` when empty.
    pub fn max_health(&self) -> Option<HealthLevel> {
        HealthLevel::max_of(self.items.iter().map(Advisory::health))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Advisory> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Clones sorted by descending health, ties broken by display name.
    #[must_use]
    pub fn sorted(&self) -> Vec<Advisory> {
        let mut out = self.items.clone();
        out.sort_by(|a, b| {
            b.health
                .cmp(&a.health)
                .then_with(|| a.pattern.cmp(&b.pattern))
        });
        out
    }
}

impl<'a> IntoIterator for &'a AdvisorySet {
    type Item = &'a Advisory;
    type IntoIter = std::slice::Iter<'a, Advisory>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adv(keyword: &str, name: &str, health: HealthLevel) -> Advisory {
        Advisory::new(keyword, name, health)
    }

    #[test]
    fn identity_is_name_or_keyword() {
        let a = adv("socketRead0", "Socket Read", HealthLevel::Watch);
        let same_name = adv("other", "Socket Read", HealthLevel::Fatal);
        let same_keyword = adv("socketRead0", "Renamed", HealthLevel::Normal);
        let different = adv("x", "y", HealthLevel::Watch);
        assert_eq!(a, same_name);
        assert_eq!(a, same_keyword);
        assert_ne!(a, different);
    }

    #[test]
    fn set_rejects_duplicate_identity() {
        let mut set = AdvisorySet::new();
        assert!(set.insert(adv("k1", "One", HealthLevel::Watch)));
        assert!(!set.insert(adv("k2", "One", HealthLevel::Fatal)));
        assert!(!set.insert(adv("k1", "Two", HealthLevel::Fatal)));
        assert_eq!(set.len(), 1);
        assert_eq!(set.max_health(), Some(HealthLevel::Watch));
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut set = AdvisorySet::new();
        set.insert(adv("k1", "One", HealthLevel::Watch));
        set.insert(adv("k2", "Two", HealthLevel::Normal));
        set.upsert(adv("k1", "One", HealthLevel::Warning));
        assert_eq!(set.len(), 2);
        assert_eq!(set.get_named("One").unwrap().health(), HealthLevel::Warning);
        assert_eq!(set.iter().next().unwrap().pattern(), "One");
    }

    #[test]
    fn upsert_collapses_entries_matching_by_both_keys() {
        let mut set = AdvisorySet::new();
        set.insert(adv("k1", "One", HealthLevel::Watch));
        set.insert(adv("k2", "Two", HealthLevel::Watch));
        // Equal to the first by keyword and to the second by name.
        set.upsert(adv("k1", "Two", HealthLevel::Fatal));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn sorted_is_descending_by_health() {
        let mut set = AdvisorySet::new();
        set.insert(adv("a", "Alpha", HealthLevel::Normal));
        set.insert(adv("b", "Beta", HealthLevel::Fatal));
        set.insert(adv("c", "Gamma", HealthLevel::Watch));
        let names: Vec<_> = set.sorted().iter().map(|a| a.pattern().to_string()).collect();
        assert_eq!(names, vec!["Beta", "Gamma", "Alpha"]);
    }

    #[test]
    fn remove_named_reports_change() {
        let mut set = AdvisorySet::new();
        set.insert(adv("a", "Alpha", HealthLevel::Normal));
        assert!(set.remove_named("Alpha"));
        assert!(!set.remove_named("Alpha"));
        assert!(set.is_empty());
    }

    #[test]
    fn normalize_maps_separators_to_dots() {
        assert_eq!(
            normalize_keyword(" java/lang/ref/Finalizer$FinalizerThread.run "),
            "java.lang.ref.Finalizer.FinalizerThread.run"
        );
        assert_eq!(normalize_keyword("a_b"), "a.b");
    }

    #[test]
    fn with_health_leaves_template_untouched() {
        let template = adv("k", "Name", HealthLevel::Watch);
        let bumped = template.clone().with_health(HealthLevel::Warning);
        assert_eq!(template.health(), HealthLevel::Watch);
        assert_eq!(bumped.health(), HealthLevel::Warning);
        assert_eq!(template, bumped);
    }

    #[test]
    fn tag_only_and_wildcard_flags() {
        assert!(adv("tdl:stuck", "Stuck", HealthLevel::Fatal).is_tag_only());
        assert!(adv("oracle.mft.*.poll", "MFT", HealthLevel::Normal).is_wildcard());
        assert!(!adv("socketRead0", "Socket Read", HealthLevel::Watch).is_wildcard());
    }
}
