//! Keyword-indexed advisory catalog.
//!
//! Built once from ordered definition sources and read-only afterwards. The
//! catalog answers three questions:
//!
//! - which advisory does this keyword (or matched stack text) name?
//! - which advisory has this display name?
//! - where in a stack does any scannable keyword occur? (`combined_pattern`)
//!
//! Lookups return clones so callers can change health per occurrence without
//! touching the template.

use regex::Regex;
use std::collections::HashMap;

use crate::advisory::{
    Advisory, AdvisoryDefinition, TAG_ONLY_PREFIX, WILDCARD_MARKER, normalize_keyword,
};
use crate::config::DefinitionsConfig;
use crate::definitions::{self, DefinitionSource};
use crate::error::{DefinitionError, Result};
use crate::health::HealthLevel;

/// Separator class that stands in for `.` in the combined scan.
const SEPARATOR_CLASS: &str = "[./$_]";

#[derive(Debug, Clone)]
struct WildcardKeyword {
    keyword: String,
    regex: Regex,
    index: usize,
}

/// The loaded set of advisories.
#[derive(Debug, Clone, Default)]
pub struct AdvisoryCatalog {
    advisories: Vec<Advisory>,
    by_keyword: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
    wildcards: Vec<WildcardKeyword>,
    scanner: Option<Regex>,
    warnings: Vec<DefinitionError>,
}

impl AdvisoryCatalog {
    /// Build a catalog from ordered sources. The first registration of a
    /// keyword wins; rejected definitions are logged and kept as warnings.
    #[must_use]
    pub fn load(sources: &[DefinitionSource]) -> Self {
        let mut catalog = Self::default();
        for source in sources {
            catalog.warnings.extend(source.skipped.iter().cloned());
            for def in &source.advisories {
                if let Err(err) = catalog.register(&source.name, def) {
                    tracing::warn!(
                        source = %source.name,
                        advisory = %def.pattern,
                        error = %err,
                        "Skipping advisory definition"
                    );
                    catalog.warnings.push(err);
                }
            }
        }
        catalog.scanner = catalog.build_scanner();
        tracing::debug!(
            advisories = catalog.advisories.len(),
            keywords = catalog.by_keyword.len(),
            wildcards = catalog.wildcards.len(),
            warnings = catalog.warnings.len(),
            "Advisory catalog loaded"
        );
        catalog
    }

    /// Catalog of the built-in definitions only.
    pub fn builtin() -> Result<Self> {
        Ok(Self::load(&[DefinitionSource::builtin()?]))
    }

    /// Catalog from the configured sources: built-ins (unless disabled), then
    /// configured directories, then `extra_dirs`.
    pub fn from_config(
        config: &DefinitionsConfig,
        extra_dirs: &[std::path::PathBuf],
    ) -> Result<Self> {
        let mut sources = Vec::new();
        if config.builtin_advisories {
            sources.push(DefinitionSource::builtin()?);
        }
        for dir in config.advisory_dirs.iter().chain(extra_dirs) {
            sources.extend(definitions::load_advisory_dir(dir)?);
        }
        Ok(Self::load(&sources))
    }

    fn register(
        &mut self,
        source: &str,
        def: &AdvisoryDefinition,
    ) -> std::result::Result<(), DefinitionError> {
        let mut keywords = def
            .keyword
            .split(',')
            .map(normalize_keyword)
            .filter(|k| !k.is_empty());
        let Some(primary) = keywords.next() else {
            return Err(DefinitionError::EmptyKeyword {
                pattern: def.pattern.clone(),
            });
        };
        let health: HealthLevel =
            def.health
                .parse()
                .map_err(|_| DefinitionError::UnknownHealth {
                    pattern: def.pattern.clone(),
                    health: def.health.clone(),
                })?;
        if let Some(existing) = self.owner_of(&primary) {
            return Err(DefinitionError::DuplicateKeyword {
                keyword: primary,
                source_name: source.to_string(),
                existing: existing.to_string(),
            });
        }

        let mut alternates = Vec::new();
        for alt in keywords {
            if alt == primary || alternates.contains(&alt) {
                continue;
            }
            if let Some(existing) = self.owner_of(&alt) {
                let err = DefinitionError::DuplicateKeyword {
                    keyword: alt,
                    source_name: source.to_string(),
                    existing: existing.to_string(),
                };
                tracing::warn!(source, error = %err, "Dropping alternate keyword");
                self.warnings.push(err);
                continue;
            }
            alternates.push(alt);
        }

        let mut wildcards = Vec::new();
        for keyword in std::iter::once(&primary).chain(&alternates) {
            if keyword.contains(WILDCARD_MARKER) {
                let regex = wildcard_regex(keyword).map_err(|e| DefinitionError::InvalidWildcard {
                    pattern: def.pattern.clone(),
                    keyword: keyword.clone(),
                    reason: e.to_string(),
                })?;
                wildcards.push((keyword.clone(), regex));
            }
        }

        let index = self.advisories.len();
        let advisory = Advisory::new(primary.clone(), def.pattern.clone(), health)
            .with_alternates(alternates.clone())
            .with_description(def.description.clone())
            .with_advice(def.advice.clone());

        for keyword in std::iter::once(primary).chain(alternates) {
            self.by_keyword.insert(keyword, index);
        }
        for (keyword, regex) in wildcards {
            self.wildcards.push(WildcardKeyword {
                keyword,
                regex,
                index,
            });
        }
        if self.by_name.contains_key(&def.pattern) {
            let err = DefinitionError::DuplicateName {
                name: def.pattern.clone(),
                source_name: source.to_string(),
            };
            tracing::warn!(source, error = %err, "Display name collision");
            self.warnings.push(err);
        } else {
            self.by_name.insert(def.pattern.clone(), index);
        }
        self.advisories.push(advisory);
        Ok(())
    }

    fn owner_of(&self, keyword: &str) -> Option<&str> {
        self.by_keyword
            .get(keyword)
            .map(|&idx| self.advisories[idx].pattern())
    }

    fn build_scanner(&self) -> Option<Regex> {
        let mut keys: Vec<&str> = self
            .by_keyword
            .keys()
            .map(String::as_str)
            .filter(|k| !k.starts_with(TAG_ONLY_PREFIX))
            .collect();
        if keys.is_empty() {
            return None;
        }
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut source = String::from("(?s)(?:");
        for (i, key) in keys.iter().enumerate() {
            if i > 0 {
                source.push('|');
            }
            for c in key.chars() {
                match c {
                    '.' => source.push_str(SEPARATOR_CLASS),
                    WILDCARD_MARKER => source.push_str(".*?"),
                    other => source.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
                }
            }
        }
        source.push(')');

        match Regex::new(&source) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Combined keyword pattern failed to compile; stack scan disabled"
                );
                None
            }
        }
    }

    /// Resolve a keyword or matched stack text. Exact keywords win; otherwise
    /// wildcard keywords are tried in load order.
    pub fn lookup_by_keyword(&self, key: &str) -> Option<Advisory> {
        let normalized = normalize_keyword(key);
        if let Some(&idx) = self.by_keyword.get(&normalized) {
            return Some(self.advisories[idx].clone());
        }
        self.wildcards
            .iter()
            .find(|w| w.regex.is_match(&normalized))
            .map(|w| self.advisories[w.index].clone())
    }

    /// Resolve a display name.
    pub fn lookup_by_display_name(&self, name: &str) -> Option<Advisory> {
        self.by_name.get(name).map(|&idx| self.advisories[idx].clone())
    }

    /// Alternation over every scannable keyword, longest first.
    pub fn combined_pattern(&self) -> Option<&Regex> {
        self.scanner.as_ref()
    }

    /// Every keyword occurrence in `stack`, left to right.
    pub fn scan<'a>(&'a self, stack: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.scanner
            .iter()
            .flat_map(move |re| re.find_iter(stack).map(|m| m.as_str()))
    }

    /// Every advisory, descending health then display name.
    #[must_use]
    pub fn all_sorted(&self) -> Vec<Advisory> {
        let mut out = self.advisories.clone();
        out.sort_by(|a, b| {
            b.health()
                .cmp(&a.health())
                .then_with(|| a.pattern().cmp(b.pattern()))
        });
        out
    }

    /// Wildcard keywords in load order.
    pub fn wildcard_keywords(&self) -> impl Iterator<Item = &str> {
        self.wildcards.iter().map(|w| w.keyword.as_str())
    }

    /// Definitions rejected or trimmed while loading.
    pub fn load_warnings(&self) -> &[DefinitionError] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.advisories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.advisories.is_empty()
    }
}

/// Full-match regex for a wildcard keyword: `*` matches anything, the rest is
/// literal.
fn wildcard_regex(keyword: &str) -> std::result::Result<Regex, regex::Error> {
    let body = keyword
        .split(WILDCARD_MARKER)
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("(?s)^{body}$"))
}
