//! Partition classified threads into groups and run the group strategies.

use crate::catalog::AdvisoryCatalog;
use crate::config::Config;
use crate::definitions::CompiledGroup;
use crate::groups::{GroupId, ThreadGroup};
use crate::strategy::{GroupContext, advisor_for};
use crate::thread::{ThreadDump, ThreadId};

/// Group that collects threads no visible group claimed.
pub const REMAINING_GROUP: &str = "Remaining Threads";

pub struct GroupAggregator<'a> {
    groups: &'a [CompiledGroup],
    catalog: &'a AdvisoryCatalog,
    config: &'a Config,
}

impl<'a> GroupAggregator<'a> {
    pub fn new(
        groups: &'a [CompiledGroup],
        catalog: &'a AdvisoryCatalog,
        config: &'a Config,
    ) -> Self {
        Self {
            groups,
            catalog,
            config,
        }
    }

    /// Assign every thread to the first visible group whose filter matches.
    /// Returns member lists per compiled group plus the leftovers.
    pub fn partition(&self, dump: &ThreadDump) -> (Vec<Vec<ThreadId>>, Vec<ThreadId>) {
        let mut members = vec![Vec::new(); self.groups.len()];
        let mut remaining = Vec::new();
        for thread in dump.threads() {
            let slot = self
                .groups
                .iter()
                .position(|group| group.visible && group.filter.matches(thread));
            match slot {
                Some(idx) => members[idx].push(thread.id()),
                None => remaining.push(thread.id()),
            }
        }
        (members, remaining)
    }

    /// Build, diagnose and fold every non-empty group, in partition order.
    pub fn aggregate(&self, dump: &mut ThreadDump) -> Vec<ThreadGroup> {
        let (members, remaining) = self.partition(dump);

        let mut planned: Vec<(&str, Vec<ThreadId>, Vec<String>)> = self
            .groups
            .iter()
            .zip(members)
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(group, ids)| {
                let mut excluded = group.excluded_advisories.clone();
                for name in group.filter.excluded_advisories() {
                    if !excluded.iter().any(|e| e == name) {
                        excluded.push(name.to_string());
                    }
                }
                (group.name.as_str(), ids, excluded)
            })
            .collect();
        if !remaining.is_empty() {
            planned.push((REMAINING_GROUP, remaining, Vec::new()));
        }

        let mut out = Vec::with_capacity(planned.len());
        for (idx, (name, ids, excluded)) in planned.into_iter().enumerate() {
            let mut group = ThreadGroup::new(GroupId(idx), name);
            group.members = ids;
            group.excluded_advisories = excluded;
            self.diagnose(dump, &mut group);
            out.push(group);
        }

        tracing::debug!(groups = out.len(), "Aggregated groups");
        out
    }

    fn diagnose(&self, dump: &mut ThreadDump, group: &mut ThreadGroup) {
        let active_depth = self.config.thresholds.active_stack_depth;
        for &id in &group.members {
            let thread = dump.thread_mut(id);
            thread.group = Some(group.id());
            let mut removed = false;
            for name in &group.excluded_advisories {
                removed |= thread.advisories.remove_named(name);
            }
            if removed {
                thread.rederive_health(active_depth);
            }
            group.counters.record(thread.state);
        }

        let advisor = advisor_for(group.kind());
        advisor.run_group_advisory(&mut GroupContext {
            dump: &mut *dump,
            group: &mut *group,
            catalog: self.catalog,
            config: self.config,
        });

        for &id in &group.members {
            for advisory in &dump.thread(id).advisories {
                group.advisories.insert(advisory.clone());
            }
        }
        let member_health: Vec<_> = group
            .members
            .iter()
            .map(|&id| dump.thread(id).health())
            .collect();
        group.fold_health(member_health);
        tracing::debug!(
            group = group.name(),
            kind = %group.kind(),
            members = group.members.len(),
            health = %group.health(),
            "Group diagnosed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::names;
    use crate::definitions::GroupDefinitions;
    use crate::health::HealthLevel;
    use crate::thread::{ThreadInput, ThreadSnapshot, WaitState};

    fn aggregate(inputs: Vec<ThreadInput>) -> (ThreadDump, Vec<ThreadGroup>) {
        let catalog = AdvisoryCatalog::builtin().unwrap();
        let config = Config::default();
        let (groups, errors) = GroupDefinitions::builtin().unwrap().compile();
        assert!(errors.is_empty(), "{errors:?}");
        let mut dump = ThreadDump::from_snapshot(&ThreadSnapshot { threads: inputs });
        let out = GroupAggregator::new(&groups, &catalog, &config).aggregate(&mut dump);
        (dump, out)
    }

    fn names_of(groups: &[ThreadGroup]) -> Vec<&str> {
        groups.iter().map(ThreadGroup::name).collect()
    }

    #[test]
    fn threads_land_in_first_matching_group() {
        let (dump, groups) = aggregate(vec![
            ThreadInput::new(
                "ExecuteThread: '0' for queue: 'weblogic.socket.Muxer'",
                "",
                WaitState::Running,
            ),
            ThreadInput::new("GC task thread#0 (ParallelGC)", "", WaitState::Running),
            ThreadInput::new("main", "", WaitState::Running),
        ]);
        assert_eq!(names_of(&groups), vec!["WLS Muxer Threads", "JVM Threads", REMAINING_GROUP]);
        for (idx, group) in groups.iter().enumerate() {
            assert_eq!(group.id(), GroupId(idx));
            for &id in &group.members {
                assert_eq!(dump.thread(id).group, Some(group.id()));
            }
        }
    }

    #[test]
    fn every_thread_in_exactly_one_group() {
        let inputs = (0..20)
            .map(|i| {
                let name = if i % 2 == 0 {
                    format!("ExecuteThread: '{i}' Muxer")
                } else {
                    format!("t{i}")
                };
                ThreadInput::new(name, "", WaitState::Running)
            })
            .collect();
        let (dump, groups) = aggregate(inputs);
        let total: usize = groups.iter().map(|g| g.members.len()).sum();
        assert_eq!(total, dump.len());
        assert!(groups.iter().all(|g| !g.members.is_empty()));
    }

    #[test]
    fn excluded_advisory_is_removed_and_health_rederived() {
        let catalog = AdvisoryCatalog::builtin().unwrap();
        let inputs = vec![ThreadInput::new(
            "LDAPConnThread-0 ldap://dir:389",
            "",
            WaitState::Running,
        )];
        let (groups, _) = GroupDefinitions::builtin().unwrap().compile();
        let config = Config::default();
        let mut dump = ThreadDump::from_snapshot(&ThreadSnapshot { threads: inputs });
        dump.thread_mut(ThreadId(0))
            .attach(catalog.lookup_by_display_name(names::SOCKET_READ).unwrap());
        assert_eq!(dump.thread(ThreadId(0)).health(), HealthLevel::Watch);

        let out = GroupAggregator::new(&groups, &catalog, &config).aggregate(&mut dump);
        assert_eq!(out[0].name(), "LDAP Threads");
        let t = dump.thread(ThreadId(0));
        assert!(!t.has_advisory(names::SOCKET_READ));
        assert_eq!(t.health(), HealthLevel::Normal);
        assert!(!out[0].advisories.contains_named(names::SOCKET_READ));
    }

    #[test]
    fn group_health_is_worst_member() {
        let catalog = AdvisoryCatalog::builtin().unwrap();
        let (groups, _) = GroupDefinitions::builtin().unwrap().compile();
        let config = Config::default();
        let inputs = vec![
            ThreadInput::new("a", "", WaitState::Running),
            ThreadInput::new("b", "", WaitState::Running),
        ];
        let mut dump = ThreadDump::from_snapshot(&ThreadSnapshot { threads: inputs });
        dump.thread_mut(ThreadId(1))
            .attach(catalog.lookup_by_display_name(names::STUCK).unwrap());
        let out = GroupAggregator::new(&groups, &catalog, &config).aggregate(&mut dump);
        assert_eq!(out[0].health(), HealthLevel::Fatal);
        assert!(out[0].advisories.contains_named(names::STUCK));
    }
}
