//! End-to-end classification scenarios over the built-in definitions.

use tdlogic_core::advisory::names;
use tdlogic_core::analysis::Analyzer;
use tdlogic_core::catalog::AdvisoryCatalog;
use tdlogic_core::classifier::ThreadClassifier;
use tdlogic_core::config::Config;
use tdlogic_core::health::HealthLevel;
use tdlogic_core::thread::{LockRef, ThreadDump, ThreadId, ThreadInput, ThreadSnapshot, WaitState};

const STUCK_NAME: &str = "[STUCK] 'ExecuteThread: 14'";
const DEFAULT_QUEUE: &str = "weblogic.kernel.Default (self-tuning)";

fn classify_one(input: ThreadInput) -> ThreadDump {
    let catalog = AdvisoryCatalog::builtin().unwrap();
    let config = Config::default();
    let mut dump = ThreadDump::from_snapshot(&ThreadSnapshot {
        threads: vec![input],
    });
    ThreadClassifier::new(&catalog, &config).classify_all(&mut dump);
    dump
}

fn frames(lines: &[&str]) -> String {
    lines.iter().map(|l| format!("\tat {l}\n")).collect()
}

// =============================================================================
// Scenario 1: stuck marker
// =============================================================================

#[test]
fn stuck_worker_is_fatal() {
    let stack = frames(&[
        "java.lang.Object.wait(Native Method)",
        "com.example.orders.OrderService.await(OrderService.java:88)",
        "weblogic.work.ExecuteThread.run(ExecuteThread.java:263)",
    ]);
    let dump = classify_one(ThreadInput::new(STUCK_NAME, stack, WaitState::Running));
    let thread = dump.thread(ThreadId(0));
    assert!(thread.has_advisory(names::STUCK));
    assert_eq!(thread.health(), HealthLevel::Fatal);
}

// =============================================================================
// Scenario 2: stuck marker on an idle MFT poller
// =============================================================================

#[test]
fn stuck_idle_mft_poller_is_cleared() {
    let stack = frames(&[
        "java.lang.Thread.sleep(Native Method)",
        "oracle.mft.source.ftp.FtpSource.poll(FtpSource.java:412)",
        "oracle.mft.source.PollingSource.run(PollingSource.java:77)",
        "weblogic.work.ExecuteThread.run(ExecuteThread.java:263)",
    ]);
    let dump = classify_one(ThreadInput::new(STUCK_NAME, stack, WaitState::TimedWaiting));
    let thread = dump.thread(ThreadId(0));
    assert!(thread.stack_depth() <= 15);
    assert!(thread.has_advisory(names::MFT_POLLER));
    assert!(!thread.has_advisory(names::STUCK));
    assert_eq!(thread.health(), HealthLevel::Normal);
}

// =============================================================================
// Scenario 3: excessive GC threads
// =============================================================================

#[test]
fn excessive_gc_threads_tag_group_and_threads() {
    let threads = (0..25)
        .map(|i| {
            ThreadInput::new(format!("GC task thread#{i} (ParallelGC)"), "", WaitState::Running)
        })
        .collect();
    let analysis = Analyzer::builtin()
        .unwrap()
        .analyze(&ThreadSnapshot { threads });

    let jvm = analysis.group_named("JVM Threads").unwrap();
    assert_eq!(jvm.members.len(), 25);
    assert!(jvm.advisories.contains_named(names::EXCESSIVE_GC_THREADS));
    for thread in analysis.dump.threads() {
        assert!(thread.has_advisory(names::EXCESSIVE_GC_THREADS));
        assert_eq!(thread.health(), HealthLevel::Warning);
    }
    assert_eq!(jvm.health(), HealthLevel::Warning);
}

// =============================================================================
// Scenario 4: lock contention
// =============================================================================

#[test]
fn contended_lock_tags_owner_and_blockers() {
    let lock = LockRef::new("0x00000000f0a1b2c3").with_class("com.example.Cache");
    let mut threads =
        vec![ThreadInput::new("worker-A", "", WaitState::Running).holding(lock.clone())];
    for i in 0..4 {
        threads.push(
            ThreadInput::new(format!("worker-{i}"), "", WaitState::Blocked)
                .blocked_on(lock.clone()),
        );
    }
    let analysis = Analyzer::builtin()
        .unwrap()
        .analyze(&ThreadSnapshot { threads });

    assert_eq!(analysis.contended_locks.len(), 1);
    let owner = analysis.dump.thread(ThreadId(0));
    assert!(owner.has_advisory(names::BLOCKED_THREADS));
    for idx in 1..=4 {
        let blocker = analysis.dump.thread(ThreadId(idx));
        assert!(blocker.has_advisory(names::BLOCKED_THREADS));
        assert!(blocker.health() >= HealthLevel::Warning);
    }
}

// =============================================================================
// Scenario 5: server still starting
// =============================================================================

#[test]
fn starting_server_skips_rest_of_wls_checks() {
    let startup = frames(&[
        "weblogic.t3.srvr.ServerServicesManager.startService(ServerServicesManager.java:462)",
        "weblogic.t3.srvr.ServerServicesManager.startInitServices(ServerServicesManager.java:1)",
    ]);
    let mut threads = vec![ThreadInput::new("main", startup, WaitState::Running)];
    for i in 0..4 {
        let name = format!("[ACTIVE] ExecuteThread: '{i}' for queue: '{DEFAULT_QUEUE}'");
        threads.push(ThreadInput::new(name, "", WaitState::Running));
    }
    let analysis = Analyzer::builtin()
        .unwrap()
        .analyze(&ThreadSnapshot { threads });

    let rest = analysis.group_named("Rest of WLS").unwrap();
    assert_eq!(rest.members.len(), 5);
    assert!(rest.advisories.contains_named(names::SERVICES_STARTING));
    assert!(!rest.advisories.contains_named(names::THREAD_STARVATION));
    assert!(!rest.advisories.contains_named(names::LISTENER_MISSING));
    assert_eq!(rest.forced_health(), None);
}
