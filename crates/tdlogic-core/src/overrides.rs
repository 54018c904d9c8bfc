//! Cross-thread overrides that need every thread classified first.
//!
//! The per-thread reset hooks live with their group strategies (see
//! [`crate::strategy::GroupAdvisor::reset_thread`]); this module holds the
//! global lock-contention pass.

use crate::advisory::names;
use crate::catalog::AdvisoryCatalog;
use crate::config::Config;
use crate::strategy::engine_advisory;
use crate::thread::{LockId, ThreadDump, ThreadId};

/// Monitor class of `java.util.Timer` queues.
const TIMER_QUEUE_CLASS: &str = "java.util.TaskQueue";
/// Frame of a timer thread waiting for its next task.
const TIMER_LOOP_FRAME: &str = "java.util.TimerThread.mainLoop";

/// High fan-out on muxer and timer locks is normal.
fn is_expected_fan_out(dump: &ThreadDump, lock: LockId) -> bool {
    let record = dump.lock(lock);
    if record.class_name() == Some(TIMER_QUEUE_CLASS) {
        return true;
    }
    record.owner().is_some_and(|owner| {
        let owner = dump.thread(owner);
        owner.has_in_name("Muxer") || owner.has_in_stack(TIMER_LOOP_FRAME)
    })
}

/// Tag contended locks and every thread involved. Returns the tagged locks.
pub fn apply_lock_contention(
    dump: &mut ThreadDump,
    catalog: &AdvisoryCatalog,
    config: &Config,
) -> Vec<LockId> {
    let threshold = config.thresholds.lock_contention;
    let mut tagged = Vec::new();

    for lock in dump.lock_ids() {
        if dump.lock(lock).blockers().len() < threshold || is_expected_fan_out(dump, lock) {
            continue;
        }
        let owner = dump.lock(lock).owner();
        let name = if owner.is_some() {
            names::BLOCKED_THREADS
        } else {
            names::CONTENTION_UNOWNED
        };
        let Some(advisory) = engine_advisory(catalog, name) else {
            continue;
        };

        let mut involved: Vec<ThreadId> = dump.lock(lock).blockers().to_vec();
        if let Some(owner) = owner {
            involved.insert(0, owner);
        }
        tracing::debug!(
            lock = dump.lock(lock).address(),
            blockers = involved.len() - usize::from(owner.is_some()),
            advisory = name,
            "Contended lock"
        );
        for id in involved {
            dump.thread_mut(id).attach(advisory.clone());
        }
        dump.lock_mut(lock).advisories.insert(advisory);
        tagged.push(lock);
    }
    tagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthLevel;
    use crate::thread::{LockRef, ThreadInput, ThreadSnapshot, WaitState};

    fn contended(owner: Option<ThreadInput>, lock: LockRef, blockers: usize) -> ThreadDump {
        let mut threads: Vec<ThreadInput> = owner.into_iter().collect();
        for i in 0..blockers {
            threads.push(
                ThreadInput::new(format!("b{i}"), "", WaitState::Blocked).blocked_on(lock.clone()),
            );
        }
        ThreadDump::from_snapshot(&ThreadSnapshot { threads })
    }

    fn run(dump: &mut ThreadDump) -> Vec<LockId> {
        let catalog = AdvisoryCatalog::builtin().unwrap();
        apply_lock_contention(dump, &catalog, &Config::default())
    }

    #[test]
    fn owned_lock_tags_owner_and_blockers() {
        let lock = LockRef::new("0xa");
        let owner = ThreadInput::new("owner", "", WaitState::Running).holding(lock.clone());
        let mut dump = contended(Some(owner), lock, 3);
        assert_eq!(run(&mut dump), vec![LockId(0)]);
        for t in dump.threads() {
            assert!(t.has_advisory(names::BLOCKED_THREADS), "{}", t.name());
            assert_eq!(t.health(), HealthLevel::Warning);
        }
        assert!(dump.lock(LockId(0)).advisories.contains_named(names::BLOCKED_THREADS));
    }

    #[test]
    fn unowned_lock_tags_blockers_only() {
        let mut dump = contended(None, LockRef::new("0xb"), 4);
        run(&mut dump);
        assert!(dump.threads().iter().all(|t| t.has_advisory(names::CONTENTION_UNOWNED)));
        assert!(dump.lock(LockId(0)).advisories.contains_named(names::CONTENTION_UNOWNED));
    }

    #[test]
    fn below_threshold_is_untouched() {
        let lock = LockRef::new("0xc");
        let owner = ThreadInput::new("owner", "", WaitState::Running).holding(lock.clone());
        let mut dump = contended(Some(owner), lock, 2);
        assert!(run(&mut dump).is_empty());
        assert!(dump.threads().iter().all(|t| t.advisories.is_empty()));
    }

    #[test]
    fn muxer_and_timer_locks_are_skipped() {
        let lock = LockRef::new("0xd");
        let muxer = ThreadInput::new(
            "ExecuteThread: '0' for queue: 'weblogic.socket.Muxer'",
            "",
            WaitState::Running,
        )
        .holding(lock.clone());
        let mut dump = contended(Some(muxer), lock, 5);
        assert!(run(&mut dump).is_empty());

        let mut dump = contended(None, LockRef::new("0xe").with_class(TIMER_QUEUE_CLASS), 5);
        assert!(run(&mut dump).is_empty());

        let lock = LockRef::new("0xf");
        let timer = ThreadInput::new(
            "Timer-0",
            "\tat java.util.TimerThread.mainLoop(Timer.java:552)\n",
            WaitState::Waiting,
        )
        .holding(lock.clone());
        let mut dump = contended(Some(timer), lock, 5);
        assert!(run(&mut dump).is_empty());
    }
}
