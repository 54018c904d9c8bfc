use crate::advisory::names;
use crate::groups::GroupKind;
use crate::health::HealthLevel;
use crate::thread::ThreadRecord;

use super::base::{BaseOptions, reset_socket_read, run_base};
use super::{GroupAdvisor, GroupContext, ThreadContext};

/// ADF requests routinely outlive the stuck timeout; cap them at WARNING.
fn soften_stuck(thread: &mut ThreadRecord) {
    if thread.health() == HealthLevel::Fatal && thread.has_advisory(names::STUCK) {
        thread.reset_health(HealthLevel::Warning);
    }
}

pub struct AdfAdvisor;

impl GroupAdvisor for AdfAdvisor {
    fn kind(&self) -> GroupKind {
        GroupKind::Adf
    }

    fn run_group_advisory(&self, cx: &mut GroupContext<'_>) {
        for id in cx.members() {
            soften_stuck(cx.thread_mut(id));
        }
        run_base(cx, BaseOptions::ALL);
    }

    fn reset_thread(&self, cx: &mut ThreadContext<'_>) {
        soften_stuck(cx.record_mut());
        reset_socket_read(cx);
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{attach, group_over, reset, run_group};
    use crate::advisory::names;
    use crate::catalog::AdvisoryCatalog;
    use crate::config::Config;
    use crate::health::HealthLevel;
    use crate::thread::{ThreadId, ThreadInput, WaitState};

    const ADF_STACK: &str =
        "\tat oracle.adf.model.binding.DCIteratorBinding.executeQuery(DCIteratorBinding.java:1)\n";

    #[test]
    fn stuck_adf_thread_is_warning() {
        let catalog = AdvisoryCatalog::builtin().unwrap();
        let (mut dump, _) = group_over(
            "x",
            vec![ThreadInput::new("[STUCK] ExecuteThread: '3'", ADF_STACK, WaitState::Running)],
        );
        attach(&mut dump, ThreadId(0), &catalog, names::STUCK);
        reset(&mut dump, ThreadId(0), &catalog, &Config::default());
        let t = dump.thread(ThreadId(0));
        assert!(t.has_advisory(names::STUCK));
        assert_eq!(t.health(), HealthLevel::Warning);
    }

    #[test]
    fn group_pass_softens_members() {
        let catalog = AdvisoryCatalog::builtin().unwrap();
        let inputs = vec![
            ThreadInput::new("[STUCK] a", ADF_STACK, WaitState::Running),
            ThreadInput::new("b", ADF_STACK, WaitState::Running),
        ];
        let (mut dump, mut group) = group_over("ADF Threads", inputs);
        attach(&mut dump, ThreadId(0), &catalog, names::STUCK);
        attach(&mut dump, ThreadId(1), &catalog, names::FINALIZER_BLOCKED);
        run_group(&mut dump, &mut group, &catalog, &Config::default());
        assert_eq!(dump.thread(ThreadId(0)).health(), HealthLevel::Warning);
        assert_eq!(dump.thread(ThreadId(1)).health(), HealthLevel::Fatal);
    }
}
