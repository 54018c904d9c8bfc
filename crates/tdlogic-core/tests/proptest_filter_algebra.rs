//! Property-based tests for filter composition.
//!
//! Checks the include/exclude algebra of `CompositeFilter`, the exclusion
//! flag, and that substring and regex rules agree on literal input.

use proptest::prelude::*;

use tdlogic_core::filter::{CompositeFilter, Filter, FilterRule};
use tdlogic_core::thread::{ThreadId, ThreadRecord, WaitState};

// =============================================================================
// Strategies
// =============================================================================

const WORDS: &[&str] = &["Muxer", "Default", "GC", "Timer", "ldap", "oracle", "worker"];

fn arb_word() -> impl Strategy<Value = String> {
    prop::sample::select(WORDS.to_vec()).prop_map(str::to_string)
}

fn arb_thread() -> impl Strategy<Value = ThreadRecord> {
    (
        prop::collection::vec(arb_word(), 0..4),
        prop::collection::vec(arb_word(), 0..6),
    )
        .prop_map(|(name_words, frames)| {
            let stack: String = frames
                .iter()
                .map(|f| format!("\tat com.{f}.Run.run(Run.java:1)\n"))
                .collect();
            ThreadRecord::new(ThreadId(0), name_words.join("-"), stack, WaitState::Running)
        })
}

fn arb_filter() -> impl Strategy<Value = Filter> {
    (
        prop::sample::select(vec![FilterRule::HasInName, FilterRule::HasInStack]),
        prop::collection::vec(arb_word(), 1..3),
        any::<bool>(),
    )
        .prop_map(|(rule, words, exclusion)| {
            Filter::new("f", rule, words).unwrap().with_exclusion(exclusion)
        })
}

// =============================================================================
// Composite algebra
// =============================================================================

proptest! {
    #[test]
    fn empty_composite_matches_everything(thread in arb_thread()) {
        prop_assert!(CompositeFilter::new("all").matches(&thread));
    }

    #[test]
    fn includes_are_a_disjunction(
        filters in prop::collection::vec(arb_filter(), 1..5),
        thread in arb_thread(),
    ) {
        let expected = filters.iter().any(|f| f.matches(&thread));
        let composite = filters
            .into_iter()
            .fold(CompositeFilter::new("any"), CompositeFilter::include);
        prop_assert_eq!(composite.matches(&thread), expected);
    }

    #[test]
    fn excludes_veto_matches(
        includes in prop::collection::vec(arb_filter(), 0..4),
        excludes in prop::collection::vec(arb_filter(), 1..4),
        thread in arb_thread(),
    ) {
        let included = includes.is_empty() || includes.iter().any(|f| f.matches(&thread));
        let vetoed = excludes.iter().any(|f| f.matches(&thread));
        let mut composite = includes
            .into_iter()
            .fold(CompositeFilter::new("mixed"), CompositeFilter::include);
        composite = excludes.into_iter().fold(composite, CompositeFilter::exclude);
        prop_assert_eq!(composite.matches(&thread), included && !vetoed);
    }

    #[test]
    fn entry_order_does_not_matter(
        a in arb_filter(),
        b in arb_filter(),
        thread in arb_thread(),
    ) {
        let forward = CompositeFilter::new("x").include(a.clone()).exclude(b.clone());
        let backward = CompositeFilter::new("x").exclude(b).include(a);
        prop_assert_eq!(forward.matches(&thread), backward.matches(&thread));
    }
}

// =============================================================================
// Single filters
// =============================================================================

proptest! {
    #[test]
    fn exclusion_flag_negates(
        rule in prop::sample::select(vec![FilterRule::HasInName, FilterRule::HasInStack]),
        words in prop::collection::vec(arb_word(), 1..3),
        thread in arb_thread(),
    ) {
        let plain = Filter::new("p", rule, words.clone()).unwrap();
        let negated = Filter::new("n", rule, words).unwrap().with_exclusion(true);
        prop_assert_eq!(plain.matches(&thread), !negated.matches(&thread));
    }

    #[test]
    fn substring_agrees_with_regex(word in arb_word(), thread in arb_thread()) {
        let substring = Filter::new("s", FilterRule::HasInName, vec![word.clone()]).unwrap();
        let regex = Filter::new("r", FilterRule::MatchesName, vec![format!(".*{word}.*")]).unwrap();
        prop_assert_eq!(substring.matches(&thread), regex.matches(&thread));
    }

    #[test]
    fn stack_depth_threshold(depth in 0usize..8, thread in arb_thread()) {
        let filter = Filter::stack_longer_than("deep", depth);
        prop_assert_eq!(filter.matches(&thread), thread.stack_depth() > depth);
    }
}
