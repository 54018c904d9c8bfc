//! Error types for tdlogic-core

use std::fmt::Write;
use std::path::PathBuf;
use thiserror::Error;

/// Remediation command for resolving an error
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RemediationCommand {
    /// Short label describing the command purpose
    pub label: String,
    /// Command to run
    pub command: String,
}

/// Actionable remediation guidance for an error
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Remediation {
    /// One-line summary of how to fix the issue
    pub summary: String,
    /// Suggested commands to resolve or diagnose the issue
    pub commands: Vec<RemediationCommand>,
    /// Additional alternative guidance
    pub alternatives: Vec<String>,
    /// Optional reference for more details
    pub learn_more: Option<String>,
}

impl Remediation {
    /// Create a new remediation with a summary
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            commands: Vec::new(),
            alternatives: Vec::new(),
            learn_more: None,
        }
    }

    /// Add a command
    #[must_use]
    pub fn command(mut self, label: impl Into<String>, command: impl Into<String>) -> Self {
        self.commands.push(RemediationCommand {
            label: label.into(),
            command: command.into(),
        });
        self
    }

    /// Add an alternative suggestion
    #[must_use]
    pub fn alternative(mut self, alternative: impl Into<String>) -> Self {
        self.alternatives.push(alternative.into());
        self
    }

    /// Add a learn-more reference
    #[must_use]
    pub fn learn_more(mut self, link: impl Into<String>) -> Self {
        self.learn_more = Some(link.into());
        self
    }

    /// Render remediation text for human-readable output
    #[must_use]
    pub fn render_plain(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "To fix:");
        let _ = writeln!(output, "  {}", self.summary);

        if !self.commands.is_empty() {
            let _ = writeln!(output, "  Commands:");
            for cmd in &self.commands {
                let _ = writeln!(output, "    - {}: {}", cmd.label, cmd.command);
            }
        }

        if !self.alternatives.is_empty() {
            let _ = writeln!(output, "  Alternatives:");
            for alt in &self.alternatives {
                let _ = writeln!(output, "    - {alt}");
            }
        }

        if let Some(learn_more) = &self.learn_more {
            let _ = writeln!(output, "  Learn more: {learn_more}");
        }

        output
    }
}

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tdlogic-core
#[derive(Error, Debug)]
pub enum Error {
    /// Advisory or group definition errors
    #[error("Definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// Filter construction errors
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// YAML parse errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Return remediation guidance when available.
    #[must_use]
    pub fn remediation(&self) -> Option<Remediation> {
        match self {
            Self::Definition(err) => Some(err.remediation()),
            Self::Filter(err) => Some(err.remediation()),
            Self::Config(err) => Some(err.remediation()),
            Self::Io(_) => Some(
                Remediation::new("Check file permissions and paths, then retry.")
                    .alternative("Verify the snapshot and definition files are readable."),
            ),
            Self::Json(_) => Some(
                Remediation::new("Validate the JSON input and retry.")
                    .command("Validate JSON", "python -m json.tool < snapshot.json")
                    .alternative("Check for trailing commas or invalid UTF-8."),
            ),
            Self::Toml(_) => Some(
                Remediation::new("Fix the TOML syntax error reported above.")
                    .alternative("Compare against the built-in definitions shipped in data/."),
            ),
            Self::Yaml(_) => Some(
                Remediation::new("Fix the YAML syntax error reported above.")
                    .alternative("Convert the file to TOML if indentation keeps breaking."),
            ),
        }
    }
}

/// Advisory/group definition errors.
///
/// During catalog and group loading these are logged and the offending entry
/// is skipped; they only surface as `Err` from the single-entry validators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("Advisory '{pattern}' has no keyword")]
    EmptyKeyword { pattern: String },

    #[error("Advisory '{pattern}' has unknown health '{health}'")]
    UnknownHealth { pattern: String, health: String },

    #[error("Advisory '{pattern}' has an invalid wildcard keyword '{keyword}': {reason}")]
    InvalidWildcard {
        pattern: String,
        keyword: String,
        reason: String,
    },

    #[error("Keyword '{keyword}' from '{source_name}' is already registered by '{existing}'")]
    DuplicateKeyword {
        keyword: String,
        source_name: String,
        existing: String,
    },

    #[error("Display name '{name}' from '{source_name}' is already used; keeping the first")]
    DuplicateName { name: String, source_name: String },

    #[error("Group '{0}' is declared more than once")]
    DuplicateGroup(String),

    #[error("Group '{group}' references unknown group '{reference}'")]
    UnknownGroupReference { group: String, reference: String },

    #[error("Malformed entry #{index} in '{source_name}': {reason}")]
    Malformed {
        source_name: String,
        index: usize,
        reason: String,
    },

    #[error("Unsupported definition file type: {0}")]
    UnsupportedFormat(PathBuf),
}

impl DefinitionError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::EmptyKeyword { .. } | Self::Malformed { .. } => {
                Remediation::new("Fix the definition entry; it was skipped.")
                    .command("List loaded advisories", "tdl advisories list")
                    .alternative("Each entry needs keyword, health and pattern fields.")
            }
            Self::UnknownHealth { .. } => Remediation::new(
                "Use one of IGNORE, NORMAL, UNKNOWN, WATCH, WARNING or FATAL.",
            )
            .command("List loaded advisories", "tdl advisories list"),
            Self::InvalidWildcard { .. } => {
                Remediation::new("Simplify the wildcard keyword; only '*' is special.")
                    .alternative("Split the keyword into several literal alternates.")
            }
            Self::DuplicateKeyword { keyword, .. } => Remediation::new(format!(
                "Keyword '{keyword}' is already defined; the first definition wins."
            ))
            .command("Show existing advisory", format!("tdl advisories show '{keyword}'"))
            .alternative("Rename the keyword or remove the duplicate entry."),
            Self::DuplicateName { name, .. } => Remediation::new(format!(
                "Display name '{name}' is already used; name lookups return the first advisory."
            ))
            .command("Show existing advisory", format!("tdl advisories show '{name}'")),
            Self::DuplicateGroup(_) => Remediation::new("Give every group a unique name.")
                .command("List groups", "tdl groups list"),
            Self::UnknownGroupReference { reference, .. } => Remediation::new(format!(
                "Declare simple group '{reference}' before the complex group that uses it."
            ))
            .command("List groups", "tdl groups list"),
            Self::UnsupportedFormat(_) => {
                Remediation::new("Definition files must end in .toml, .yaml, .yml or .json.")
            }
        }
    }
}

/// Filter construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Filter '{filter}' has an invalid regex: {reason}")]
    InvalidRegex { filter: String, reason: String },

    #[error("Filter '{filter}' has an invalid substring set: {reason}")]
    InvalidSubstrings { filter: String, reason: String },

    #[error("Filter '{filter}' needs a numeric line count, got '{value}'")]
    InvalidLength { filter: String, value: String },

    #[error("Filter '{0}' has no expression")]
    MissingExpression(String),
}

impl FilterError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::InvalidRegex { .. } => Remediation::new("Fix the regex in the group pattern.")
                .alternative("Use match_rule = \"contains\" for plain substrings."),
            Self::InvalidSubstrings { .. } => {
                Remediation::new("Shorten or deduplicate the group's substring patterns.")
            }
            Self::InvalidLength { .. } => {
                Remediation::new("stack_longer_than needs a single integer pattern.")
            }
            Self::MissingExpression(_) => {
                Remediation::new("Add at least one entry to the group's patterns list.")
            }
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid config value: {0}")]
    ValidationError(String),
}

impl ConfigError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::FileNotFound(path) => Remediation::new(format!(
                "Create the config file or pass a different path: {}",
                path.display()
            ))
            .alternative("Run without --config to use the built-in defaults."),
            Self::ReadFailed { .. } => {
                Remediation::new("Check file permissions for the config file.")
            }
            Self::ParseError(_) => Remediation::new("Fix the TOML syntax in tdlogic.toml.")
                .alternative("Remove unknown keys and retry."),
            Self::ValidationError(_) => Remediation::new("Correct the invalid config value.")
                .alternative("Thresholds must be positive integers."),
        }
    }
}
