//! Thread predicates used to partition threads into groups.
//!
//! A [`Filter`] applies one rule to a thread's name or stack. A
//! [`CompositeFilter`] combines filters with include/exclude semantics:
//!
//! ```text
//! matches = (no include entries OR any include matches) AND no exclude matches
//! ```
//!
//! Substring rules run on Aho-Corasick automatons; regex rules are full
//! matches; structural rules search the text that follows a lock annotation.

use aho_corasick::AhoCorasick;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::FilterError;
use crate::thread::ThreadRecord;

/// Lock annotation that precedes the monitor a thread waits on.
pub const WAITING_ON_MARKER: &str = "- waiting on <";
/// Lock annotation that precedes the monitor a thread tries to enter.
pub const WAITING_FOR_MARKER: &str = "- waiting to lock <";
/// Lock annotation that precedes a monitor the thread holds.
pub const LOCKING_MARKER: &str = "- locked <";

/// What a [`Filter`] tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule", content = "value")]
pub enum FilterRule {
    /// Any expression is a substring of the name.
    HasInName,
    /// The name fully matches the expression regex.
    MatchesName,
    /// Any expression is a substring of the stack.
    HasInStack,
    /// The stack fully matches the expression regex.
    MatchesStack,
    /// The stack has more than N frame lines.
    StackLongerThan(usize),
    /// A `- waiting on <...)` annotation matches the expression regex.
    WaitingOn,
    /// A `- waiting to lock <...)` annotation matches the expression regex.
    WaitingFor,
    /// A `- locked <...)` annotation matches the expression regex.
    Locking,
}

impl FilterRule {
    fn marker(self) -> Option<&'static str> {
        match self {
            Self::WaitingOn => Some(WAITING_ON_MARKER),
            Self::WaitingFor => Some(WAITING_FOR_MARKER),
            Self::Locking => Some(LOCKING_MARKER),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Substrings(AhoCorasick),
    Regex(Regex),
    Depth(usize),
}

/// A single thread predicate.
#[derive(Debug, Clone)]
pub struct Filter {
    name: String,
    rule: FilterRule,
    expressions: Vec<String>,
    exclusion: bool,
    excluded_advisories: Vec<String>,
    matcher: Matcher,
}

impl Filter {
    /// Compile a filter. Regex expressions are joined as alternatives.
    pub fn new(
        name: impl Into<String>,
        rule: FilterRule,
        expressions: Vec<String>,
    ) -> Result<Self, FilterError> {
        let name = name.into();
        let matcher = match rule {
            FilterRule::StackLongerThan(depth) => Matcher::Depth(depth),
            _ if expressions.is_empty() => return Err(FilterError::MissingExpression(name)),
            FilterRule::HasInName | FilterRule::HasInStack => {
                let automaton =
                    AhoCorasick::new(&expressions).map_err(|e| FilterError::InvalidSubstrings {
                        filter: name.clone(),
                        reason: e.to_string(),
                    })?;
                Matcher::Substrings(automaton)
            }
            FilterRule::MatchesName => Matcher::Regex(compile(&name, "^(?:", &expressions, ")$")?),
            FilterRule::MatchesStack => {
                Matcher::Regex(compile(&name, "(?s)^(?:", &expressions, ")$")?)
            }
            FilterRule::WaitingOn | FilterRule::WaitingFor | FilterRule::Locking => {
                Matcher::Regex(compile(&name, "(?:", &expressions, ")")?)
            }
        };
        Ok(Self {
            name,
            rule,
            expressions,
            exclusion: false,
            excluded_advisories: Vec::new(),
            matcher,
        })
    }

    /// Filter on stack depth: matches threads with more than `depth` frames.
    #[must_use]
    pub fn stack_longer_than(name: impl Into<String>, depth: usize) -> Self {
        Self {
            name: name.into(),
            rule: FilterRule::StackLongerThan(depth),
            expressions: vec![depth.to_string()],
            exclusion: false,
            excluded_advisories: Vec::new(),
            matcher: Matcher::Depth(depth),
        }
    }

    /// Invert the result of [`Filter::matches`].
    #[must_use]
    pub fn with_exclusion(mut self, exclusion: bool) -> Self {
        self.exclusion = exclusion;
        self
    }

    /// Advisory names stripped from threads grouped through this filter.
    #[must_use]
    pub fn with_excluded_advisories(mut self, names: Vec<String>) -> Self {
        self.excluded_advisories = names;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule(&self) -> FilterRule {
        self.rule
    }

    pub fn expressions(&self) -> &[String] {
        &self.expressions
    }

    pub fn is_exclusion(&self) -> bool {
        self.exclusion
    }

    pub fn excluded_advisories(&self) -> &[String] {
        &self.excluded_advisories
    }

    pub fn matches(&self, thread: &ThreadRecord) -> bool {
        self.raw_match(thread) != self.exclusion
    }

    fn raw_match(&self, thread: &ThreadRecord) -> bool {
        match (&self.matcher, self.rule) {
            (Matcher::Depth(depth), _) => thread.stack_depth() > *depth,
            (Matcher::Substrings(ac), FilterRule::HasInName) => ac.is_match(thread.name()),
            (Matcher::Substrings(ac), _) => ac.is_match(thread.stack()),
            (Matcher::Regex(re), FilterRule::MatchesName) => re.is_match(thread.name()),
            (Matcher::Regex(re), FilterRule::MatchesStack) => re.is_match(thread.stack()),
            (Matcher::Regex(re), rule) => rule
                .marker()
                .is_some_and(|marker| annotations(thread.stack(), marker).any(|t| re.is_match(t))),
        }
    }
}

fn compile(
    filter: &str,
    prefix: &str,
    expressions: &[String],
    suffix: &str,
) -> Result<Regex, FilterError> {
    let source = format!("{prefix}{}{suffix}", expressions.join("|"));
    Regex::new(&source).map_err(|e| FilterError::InvalidRegex {
        filter: filter.to_string(),
        reason: e.to_string(),
    })
}

/// Text between each occurrence of `marker` and the next `)`.
///
/// An occurrence with no closing parenthesis yields nothing.
pub fn annotations<'a>(stack: &'a str, marker: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    memchr::memmem::find_iter(stack.as_bytes(), marker.as_bytes()).filter_map(move |pos| {
        let rest = &stack[pos + marker.len()..];
        memchr::memchr(b')', rest.as_bytes()).map(|end| &rest[..end])
    })
}

/// Whether a composite entry adds or removes threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Include,
    Exclude,
}

/// Ordered include/exclude combination of filters.
#[derive(Debug, Clone)]
pub struct CompositeFilter {
    name: String,
    entries: Vec<(Filter, FilterMode)>,
}

impl CompositeFilter {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn include(mut self, filter: Filter) -> Self {
        self.entries.push((filter, FilterMode::Include));
        self
    }

    #[must_use]
    pub fn exclude(mut self, filter: Filter) -> Self {
        self.entries.push((filter, FilterMode::Exclude));
        self
    }

    pub fn push(&mut self, filter: Filter, mode: FilterMode) {
        self.entries.push((filter, mode));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[(Filter, FilterMode)] {
        &self.entries
    }

    /// Excluded advisory names contributed by include entries. Exclude
    /// entries never contribute.
    pub fn excluded_advisories(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, mode)| *mode == FilterMode::Include)
            .flat_map(|(filter, _)| filter.excluded_advisories().iter().map(String::as_str))
    }

    /// An empty composite matches every thread.
    pub fn matches(&self, thread: &ThreadRecord) -> bool {
        let mut has_include = false;
        let mut included = false;
        for (filter, mode) in &self.entries {
            match mode {
                FilterMode::Include => {
                    has_include = true;
                    if !included && filter.matches(thread) {
                        included = true;
                    }
                }
                FilterMode::Exclude => {
                    if filter.matches(thread) {
                        return false;
                    }
                }
            }
        }
        !has_include || included
    }
}
