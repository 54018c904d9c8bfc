#![no_main]

use std::sync::LazyLock;

use libfuzzer_sys::fuzz_target;
use tdlogic_core::catalog::AdvisoryCatalog;
use tdlogic_core::filter::{CompositeFilter, Filter, FilterRule};
use tdlogic_core::thread::{ThreadId, ThreadRecord, WaitState};

static CATALOG: LazyLock<AdvisoryCatalog> =
    LazyLock::new(|| AdvisoryCatalog::builtin().expect("built-in catalog"));

const RULES: [FilterRule; 7] = [
    FilterRule::HasInName,
    FilterRule::MatchesName,
    FilterRule::HasInStack,
    FilterRule::MatchesStack,
    FilterRule::WaitingOn,
    FilterRule::WaitingFor,
    FilterRule::Locking,
];

// Input layout: <rule byte><expression>\0<thread name>\0<stack text>
fuzz_target!(|data: &[u8]| {
    let Some((&rule, rest)) = data.split_first() else {
        return;
    };
    let text = String::from_utf8_lossy(rest);
    let mut parts = text.splitn(3, '\0');
    let expression = parts.next().unwrap_or_default();
    let name = parts.next().unwrap_or_default();
    let stack = parts.next().unwrap_or_default();

    let thread = ThreadRecord::new(ThreadId(0), name, stack, WaitState::Running);

    let rule = RULES[usize::from(rule) % RULES.len()];
    if let Ok(filter) = Filter::new("fuzz", rule, vec![expression.to_string()]) {
        let plain = filter.matches(&thread);
        let composite = CompositeFilter::new("fuzz").exclude(filter.clone());
        assert_eq!(composite.matches(&thread), !plain);
        assert_eq!(filter.with_exclusion(true).matches(&thread), !plain);
    }

    let _ = Filter::stack_longer_than("depth", usize::from(rule)).matches(&thread);

    for hit in CATALOG.scan(stack) {
        let _ = CATALOG.lookup_by_keyword(hit);
    }
    let _ = CATALOG.lookup_by_keyword(expression);
    let _ = CATALOG.lookup_by_display_name(expression);
});
