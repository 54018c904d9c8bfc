//! Advisory and group definition sources.
//!
//! Definitions come from the built-in files under `data/` (embedded at compile
//! time) or from user files in TOML, YAML or JSON. Files are parsed into a
//! generic value first and every entry is validated on its own, so one bad
//! entry is logged and skipped instead of rejecting the whole file.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::advisory::AdvisoryDefinition;
use crate::error::{DefinitionError, FilterError, Result};
use crate::filter::{CompositeFilter, Filter, FilterRule};

const BUILTIN_ADVISORIES: &str = include_str!("../data/advisories.toml");
const BUILTIN_GROUPS: &str = include_str!("../data/groups.toml");

/// Name of the built-in advisory source.
pub const BUILTIN_SOURCE: &str = "builtin";

// ============================================================================
// File formats
// ============================================================================

/// Serialization format of a definition file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    Toml,
    Yaml,
    Json,
}

impl DefinitionFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> std::result::Result<Self, DefinitionError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("toml") => Ok(Self::Toml),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(DefinitionError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    fn parse(self, raw: &str) -> Result<Value> {
        Ok(match self {
            Self::Toml => toml::from_str(raw)?,
            Self::Yaml => serde_yaml::from_str(raw)?,
            Self::Json => serde_json::from_str(raw)?,
        })
    }
}

/// Entries under `key`, or the document itself when it is a bare list.
fn entries(doc: Value, key: &str) -> Vec<Value> {
    match doc {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Deserialize each entry on its own, collecting failures.
fn validate_entries<T: serde::de::DeserializeOwned>(
    source_name: &str,
    items: Vec<Value>,
    skipped: &mut Vec<DefinitionError>,
) -> Vec<T> {
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<T>(item) {
            Ok(entry) => out.push(entry),
            Err(e) => {
                let err = DefinitionError::Malformed {
                    source_name: source_name.to_string(),
                    index,
                    reason: e.to_string(),
                };
                tracing::warn!(
                    source = source_name,
                    index,
                    error = %err,
                    "Skipping malformed definition"
                );
                skipped.push(err);
            }
        }
    }
    out
}

// ============================================================================
// Advisory sources
// ============================================================================

/// One ordered batch of advisory definitions.
#[derive(Debug, Clone, Default)]
pub struct DefinitionSource {
    pub name: String,
    pub advisories: Vec<AdvisoryDefinition>,
    /// Entries that failed validation while parsing this source.
    pub skipped: Vec<DefinitionError>,
}

impl DefinitionSource {
    #[must_use]
    pub fn new(name: impl Into<String>, advisories: Vec<AdvisoryDefinition>) -> Self {
        Self {
            name: name.into(),
            advisories,
            skipped: Vec::new(),
        }
    }

    /// Parse definition text. Accepts `[[advisory]]` tables or a bare list.
    pub fn parse(name: impl Into<String>, raw: &str, format: DefinitionFormat) -> Result<Self> {
        let name = name.into();
        let doc = format.parse(raw)?;
        let mut skipped = Vec::new();
        let advisories = validate_entries(&name, entries(doc, "advisory"), &mut skipped);
        tracing::debug!(
            source = %name,
            loaded = advisories.len(),
            skipped = skipped.len(),
            "Parsed advisory source"
        );
        Ok(Self {
            name,
            advisories,
            skipped,
        })
    }

    /// The advisory definitions shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_SOURCE, BUILTIN_ADVISORIES, DefinitionFormat::Toml)
    }
}

/// Load one advisory definition file.
pub fn load_advisory_file(path: &Path) -> Result<DefinitionSource> {
    let format = DefinitionFormat::from_path(path)?;
    let raw = std::fs::read_to_string(path)?;
    DefinitionSource::parse(path.display().to_string(), &raw, format)
}

/// Load every supported file in `dir`, in file-name order.
pub fn load_advisory_dir(dir: &Path) -> Result<Vec<DefinitionSource>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if DefinitionFormat::from_path(&path).is_err() {
            tracing::debug!(path = %path.display(), "Ignoring non-definition file");
            continue;
        }
        paths.push(path);
    }
    paths.sort();
    paths.iter().map(|p| load_advisory_file(p)).collect()
}

// ============================================================================
// Group definitions
// ============================================================================

fn default_true() -> bool {
    true
}

/// Where a simple group looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupLocation {
    Stack,
    Name,
}

/// How a simple group's patterns are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    #[default]
    Contains,
    Regex,
    StackLongerThan,
    WaitingOn,
    WaitingFor,
    Locking,
}

/// A group defined by one filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleGroupDefinition {
    pub name: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    pub location: GroupLocation,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub match_rule: MatchRule,
    #[serde(default)]
    pub exclusion: bool,
    #[serde(default)]
    pub excluded_advisories: Vec<String>,
}

impl SimpleGroupDefinition {
    /// Compile the group's filter.
    pub fn to_filter(&self) -> Result<Filter> {
        let rule = match (self.match_rule, self.location) {
            (MatchRule::Contains, GroupLocation::Name) => FilterRule::HasInName,
            (MatchRule::Contains, GroupLocation::Stack) => FilterRule::HasInStack,
            (MatchRule::Regex, GroupLocation::Name) => FilterRule::MatchesName,
            (MatchRule::Regex, GroupLocation::Stack) => FilterRule::MatchesStack,
            (MatchRule::StackLongerThan, _) => {
                let raw = self.patterns.first().map(|p| p.trim()).unwrap_or_default();
                let depth = raw.parse::<usize>().map_err(|_| FilterError::InvalidLength {
                    filter: self.name.clone(),
                    value: raw.to_string(),
                })?;
                FilterRule::StackLongerThan(depth)
            }
            (MatchRule::WaitingOn, _) => FilterRule::WaitingOn,
            (MatchRule::WaitingFor, _) => FilterRule::WaitingFor,
            (MatchRule::Locking, _) => FilterRule::Locking,
        };
        let filter = match rule {
            FilterRule::StackLongerThan(depth) => Filter::stack_longer_than(&self.name, depth),
            _ => Filter::new(&self.name, rule, self.patterns.clone())?,
        };
        Ok(filter
            .with_exclusion(self.exclusion)
            .with_excluded_advisories(self.excluded_advisories.clone()))
    }
}

/// A group combining earlier simple groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexGroupDefinition {
    pub name: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub excluded_advisories: Vec<String>,
}

/// One entry of a group list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GroupDefinition {
    Simple(SimpleGroupDefinition),
    Complex(ComplexGroupDefinition),
}

impl GroupDefinition {
    pub fn name(&self) -> &str {
        match self {
            Self::Simple(def) => &def.name,
            Self::Complex(def) => &def.name,
        }
    }
}

/// A group ready for partitioning.
#[derive(Debug, Clone)]
pub struct CompiledGroup {
    pub name: String,
    pub visible: bool,
    pub filter: CompositeFilter,
    /// Advisory names declared on the group itself.
    pub excluded_advisories: Vec<String>,
}

/// Ordered group definitions: the WLS list is partitioned before the rest.
#[derive(Debug, Clone, Default)]
pub struct GroupDefinitions {
    pub wls: Vec<GroupDefinition>,
    pub non_wls: Vec<GroupDefinition>,
    /// Entries that failed validation while parsing.
    pub skipped: Vec<DefinitionError>,
}

impl GroupDefinitions {
    /// Parse definition text with `wls` and `non_wls` lists.
    pub fn parse(source_name: &str, raw: &str, format: DefinitionFormat) -> Result<Self> {
        let doc = format.parse(raw)?;
        let mut skipped = Vec::new();
        let (wls, non_wls) = match doc {
            Value::Object(mut map) => {
                let wls = map.remove("wls").map_or_else(Vec::new, |v| entries(v, "wls"));
                let non_wls = map
                    .remove("non_wls")
                    .map_or_else(Vec::new, |v| entries(v, "non_wls"));
                (wls, non_wls)
            }
            _ => (Vec::new(), Vec::new()),
        };
        let wls = validate_entries(source_name, wls, &mut skipped);
        let non_wls = validate_entries(source_name, non_wls, &mut skipped);
        Ok(Self {
            wls,
            non_wls,
            skipped,
        })
    }

    /// The group definitions shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_SOURCE, BUILTIN_GROUPS, DefinitionFormat::Toml)
    }

    /// All definitions in partition order.
    pub fn iter(&self) -> impl Iterator<Item = &GroupDefinition> {
        self.wls.iter().chain(self.non_wls.iter())
    }

    /// Compile every definition to a composite filter, in partition order.
    ///
    /// Invalid groups (bad filter, duplicate name, unknown reference) are
    /// logged, returned in the error list and left out.
    pub fn compile(&self) -> (Vec<CompiledGroup>, Vec<DefinitionError>) {
        let mut compiled = Vec::new();
        let mut errors = Vec::new();
        let mut simple: HashMap<&str, Filter> = HashMap::new();
        let mut seen: Vec<&str> = Vec::new();

        for def in self.iter() {
            let name = def.name();
            if seen.contains(&name) {
                let err = DefinitionError::DuplicateGroup(name.to_string());
                tracing::warn!(group = name, error = %err, "Skipping group");
                errors.push(err);
                continue;
            }
            seen.push(name);

            let result = match def {
                GroupDefinition::Simple(simple_def) => simple_def.to_filter().map(|filter| {
                    simple.insert(name, filter.clone());
                    CompiledGroup {
                        name: name.to_string(),
                        visible: simple_def.visible,
                        filter: CompositeFilter::new(name).include(filter),
                        excluded_advisories: Vec::new(),
                    }
                }),
                GroupDefinition::Complex(complex) => compile_complex(complex, &simple),
            };

            match result {
                Ok(group) => compiled.push(group),
                Err(crate::Error::Definition(err)) => {
                    tracing::warn!(group = name, error = %err, "Skipping group");
                    errors.push(err);
                }
                Err(err) => {
                    tracing::warn!(group = name, error = %err, "Skipping group");
                    errors.push(DefinitionError::Malformed {
                        source_name: name.to_string(),
                        index: 0,
                        reason: err.to_string(),
                    });
                }
            }
        }

        (compiled, errors)
    }
}

fn compile_complex(
    def: &ComplexGroupDefinition,
    simple: &HashMap<&str, Filter>,
) -> Result<CompiledGroup> {
    let resolve = |reference: &String| {
        simple.get(reference.as_str()).cloned().ok_or_else(|| {
            DefinitionError::UnknownGroupReference {
                group: def.name.clone(),
                reference: reference.clone(),
            }
        })
    };

    let mut filter = CompositeFilter::new(&def.name);
    for reference in &def.include {
        filter = filter.include(resolve(reference)?);
    }
    for reference in &def.exclude {
        filter = filter.exclude(resolve(reference)?);
    }
    Ok(CompiledGroup {
        name: def.name.clone(),
        visible: def.visible,
        filter,
        excluded_advisories: def.excluded_advisories.clone(),
    })
}

/// Load a group definition file.
pub fn load_group_file(path: &Path) -> Result<GroupDefinitions> {
    let format = DefinitionFormat::from_path(path)?;
    let raw = std::fs::read_to_string(path)?;
    GroupDefinitions::parse(&path.display().to_string(), &raw, format)
}
