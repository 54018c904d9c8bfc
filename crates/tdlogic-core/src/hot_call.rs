//! Hot call pattern detection.
//!
//! Threads whose stacks share the same window of frames (below the top
//! `skip` frames) are bucketed together; a bucket with enough threads is a
//! hot call pattern.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::config::HotCallConfig;
use crate::groups::HotCallPattern;
use crate::thread::{ThreadDump, ThreadId, ThreadRecord};

static LOCK_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^<>]*>").unwrap());

/// Placeholder for lock identities so equal call paths on different
/// monitors compare equal.
pub const LOCK_PLACEHOLDER: &str = "<lock>";

/// Window text of `thread`, or `None` when its stack is too shallow.
pub fn call_window(thread: &ThreadRecord, config: &HotCallConfig) -> Option<String> {
    if thread.stack_depth() < config.min_depth() {
        return None;
    }
    let lines: Vec<String> = thread
        .frames()
        .skip(config.skip_lines)
        .take(config.window_lines)
        .map(|line| LOCK_ID.replace_all(line.trim(), LOCK_PLACEHOLDER).into_owned())
        .collect();
    Some(lines.join("\n"))
}

/// Hot patterns among `members`, most common first (ties by text).
pub fn detect(
    dump: &ThreadDump,
    members: &[ThreadId],
    config: &HotCallConfig,
) -> Vec<HotCallPattern> {
    let mut buckets: HashMap<String, Vec<ThreadId>> = HashMap::new();
    for &id in members {
        if let Some(window) = call_window(dump.thread(id), config) {
            buckets.entry(window).or_default().push(id);
        }
    }

    let mut hot: Vec<HotCallPattern> = buckets
        .into_iter()
        .filter(|(_, threads)| threads.len() >= config.min_occurrences)
        .map(|(text, threads)| HotCallPattern { text, threads })
        .collect();
    hot.sort_by(|a, b| b.count().cmp(&a.count()).then_with(|| a.text.cmp(&b.text)));
    hot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::{ThreadInput, ThreadSnapshot, WaitState};

    fn stack(top: &str, lock: &str) -> String {
        let mut s = format!("\"worker\" prio=5\n\tat {top}.run(X.java:1)\n");
        s.push_str(&format!("\tat {top}.call(X.java:2)\n"));
        s.push_str(&format!("\t- locked <{lock}> (a java.lang.Object)\n"));
        for i in 0..9 {
            s.push_str(&format!("\tat com.example.Service.step{i}(Service.java:{i})\n"));
        }
        s
    }

    fn dump(stacks: Vec<String>) -> ThreadDump {
        ThreadDump::from_snapshot(&ThreadSnapshot {
            threads: stacks
                .into_iter()
                .enumerate()
                .map(|(i, s)| ThreadInput::new(format!("t{i}"), s, WaitState::Running))
                .collect(),
        })
    }

    #[test]
    fn window_skips_top_frames_and_masks_locks() {
        let d = dump(vec![stack("a.Top", "0x01")]);
        let window = call_window(d.thread(ThreadId(0)), &HotCallConfig::default()).unwrap();
        assert!(window.starts_with("- locked <lock> (a java.lang.Object)"));
        assert_eq!(window.lines().count(), 8);
        assert!(!window.contains("a.Top"));
    }

    #[test]
    fn shallow_stacks_are_ignored() {
        let d = dump(vec!["\tat a.b(X.java:1)\n".to_string()]);
        assert!(call_window(d.thread(ThreadId(0)), &HotCallConfig::default()).is_none());
    }

    #[test]
    fn different_tops_and_locks_share_a_pattern() {
        let stacks: Vec<String> = (0..6)
            .map(|i| stack(&format!("t{i}.Top"), &format!("0x{i:02x}")))
            .collect();
        let d = dump(stacks);
        let members: Vec<ThreadId> = d.thread_ids().collect();
        let hot = detect(&d, &members, &HotCallConfig::default());
        assert_eq!(hot.len(), 1);
        assert_eq!(hot[0].count(), 6);
    }

    #[test]
    fn below_min_occurrences_is_not_hot() {
        let stacks: Vec<String> = (0..4).map(|i| stack(&format!("t{i}.Top"), "0x01")).collect();
        let d = dump(stacks);
        let members: Vec<ThreadId> = d.thread_ids().collect();
        assert!(detect(&d, &members, &HotCallConfig::default()).is_empty());
    }
}
