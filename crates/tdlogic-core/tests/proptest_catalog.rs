//! Property-based tests for the advisory catalog.
//!
//! Keyword normalization, separator-insensitive lookup, wildcard resolution
//! and the ordering of the full listing.

use proptest::prelude::*;

use tdlogic_core::advisory::{Advisory, names, normalize_keyword};
use tdlogic_core::catalog::AdvisoryCatalog;

fn literal_advisories(catalog: &AdvisoryCatalog) -> Vec<Advisory> {
    catalog
        .all_sorted()
        .into_iter()
        .filter(|a| !a.is_wildcard() && !a.is_tag_only())
        .collect()
}

// =============================================================================
// Strategies
// =============================================================================

fn arb_separator() -> impl Strategy<Value = char> {
    prop::sample::select(vec!['.', '/', '$', '_'])
}

fn arb_segment() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9]{0,7}"
}

/// Rewrite every `.` in `keyword` with the next separator from `seps`.
fn respell(keyword: &str, seps: &[char]) -> String {
    let mut i = 0;
    keyword
        .chars()
        .map(|c| {
            if c == '.' {
                i += 1;
                seps[(i - 1) % seps.len()]
            } else {
                c
            }
        })
        .collect()
}

// =============================================================================
// Normalization
// =============================================================================

proptest! {
    #[test]
    fn normalize_is_idempotent(text in "[ a-zA-Z0-9./$_]{0,40}") {
        let once = normalize_keyword(&text);
        prop_assert_eq!(normalize_keyword(&once), once.clone());
        prop_assert!(!once.contains(['/', '$', '_']));
    }
}

// =============================================================================
// Lookup
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn separators_do_not_change_lookup(
        pick in any::<prop::sample::Index>(),
        seps in prop::collection::vec(arb_separator(), 1..4),
    ) {
        let catalog = AdvisoryCatalog::builtin().unwrap();
        let literals = literal_advisories(&catalog);
        let advisory = pick.get(&literals);
        let exact = catalog.lookup_by_keyword(advisory.keyword()).unwrap();
        let respelled = catalog.lookup_by_keyword(&respell(advisory.keyword(), &seps)).unwrap();
        prop_assert_eq!(exact.pattern(), respelled.pattern());
    }

    #[test]
    fn wildcard_poller_keyword_resolves(
        middle in prop::collection::vec(arb_segment(), 1..3),
    ) {
        let catalog = AdvisoryCatalog::builtin().unwrap();
        let key = format!("oracle.mft.{}.poll", middle.join("."));
        let advisory = catalog.lookup_by_keyword(&key).unwrap();
        prop_assert_eq!(advisory.pattern(), names::MFT_POLLER);
    }

    #[test]
    fn lookup_is_stable(key in "[a-z]{1,6}(\\.[a-z]{1,6}){0,3}") {
        let catalog = AdvisoryCatalog::builtin().unwrap();
        let first = catalog.lookup_by_keyword(&key).map(|a| a.pattern().to_string());
        let second = catalog.lookup_by_keyword(&key).map(|a| a.pattern().to_string());
        prop_assert_eq!(first, second);
    }
}

// =============================================================================
// Listing
// =============================================================================

#[test]
fn all_sorted_is_descending_and_named() {
    let catalog = AdvisoryCatalog::builtin().unwrap();
    let all = catalog.all_sorted();
    assert_eq!(all.len(), catalog.len());
    for pair in all.windows(2) {
        assert!(pair[0].health() >= pair[1].health());
        if pair[0].health() == pair[1].health() {
            assert!(pair[0].pattern() <= pair[1].pattern());
        }
    }
    for advisory in &all {
        let by_name = catalog.lookup_by_display_name(advisory.pattern()).unwrap();
        assert_eq!(by_name.keyword(), advisory.keyword());
    }
}
