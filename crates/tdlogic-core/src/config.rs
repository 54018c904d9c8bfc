//! Configuration management for tdlogic
//!
//! Handles loading and validation of tdlogic.toml configuration files.
//! Every section is optional; missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Environment variable that points at a config file.
pub const CONFIG_ENV_VAR: &str = "TDLOGIC_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Definition sources
    #[serde(default)]
    pub definitions: DefinitionsConfig,

    /// Heuristic thresholds
    #[serde(default)]
    pub thresholds: Thresholds,

    /// Hot call pattern detection
    #[serde(default)]
    pub hot_calls: HotCallConfig,

    /// Thread name markers
    #[serde(default)]
    pub markers: MarkerConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-friendly output
    #[default]
    Pretty,
    /// JSON lines
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown log format: {s}. Expected pretty or json")),
        }
    }
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Optional log file
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            log_file: None,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_true() -> bool {
    true
}

/// Where advisory and group definitions come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionsConfig {
    /// Load the built-in advisory definitions first
    #[serde(default = "default_true")]
    pub builtin_advisories: bool,

    /// Use the built-in group definitions when no group file is set
    #[serde(default = "default_true")]
    pub builtin_groups: bool,

    /// Extra advisory directories, applied in order after the built-ins
    #[serde(default)]
    pub advisory_dirs: Vec<PathBuf>,

    /// Group definition file replacing the built-in groups
    #[serde(default)]
    pub group_file: Option<PathBuf>,
}

impl Default for DefinitionsConfig {
    fn default() -> Self {
        Self {
            builtin_advisories: true,
            builtin_groups: true,
            advisory_dirs: Vec::new(),
            group_file: None,
        }
    }
}

/// Counts and depths used by the classification heuristics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Stack depth at which an unexplained thread counts as busy
    pub active_stack_depth: usize,
    /// Maximum stack depth of an idle poller
    pub poller_depth: usize,
    /// Group size that triggers "Too Many Threads"
    pub large_group: usize,
    /// Blocked members above which a group gets "Blocked Threads"
    pub blocked_group: usize,
    /// Members sharing a WATCH advisory above which it becomes WARNING
    pub repeat_watch: usize,
    /// GC threads above which the JVM group is flagged
    pub gc_threads: usize,
    /// Service callouts above which OSB members are escalated
    pub osb_callouts: usize,
    /// Minimum idle default-pool threads before starvation is reported
    pub min_idle_default: usize,
    /// Muxer threads above which the muxer group is flagged
    pub muxer_threads: usize,
    /// Non-web cluster threads at which the cluster group is unhealthy
    pub cluster_threads: usize,
    /// Blockers on one lock that trigger the contention advisories
    pub lock_contention: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            active_stack_depth: 10,
            poller_depth: 15,
            large_group: 100,
            blocked_group: 5,
            repeat_watch: 10,
            gc_threads: 20,
            osb_callouts: 15,
            min_idle_default: 3,
            muxer_threads: 5,
            cluster_threads: 5,
            lock_contention: 3,
        }
    }
}

/// Hot call pattern window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotCallConfig {
    /// Frame lines skipped from the top of the stack
    pub skip_lines: usize,
    /// Frame lines compared after the skipped ones
    pub window_lines: usize,
    /// Threads that must share a window for it to be hot
    pub min_occurrences: usize,
}

impl Default for HotCallConfig {
    fn default() -> Self {
        Self {
            skip_lines: 2,
            window_lines: 8,
            min_occurrences: 5,
        }
    }
}

impl HotCallConfig {
    /// Shallowest stack that can contribute a pattern.
    #[must_use]
    pub fn min_depth(&self) -> usize {
        self.skip_lines + self.window_lines
    }
}

/// Thread-name markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Token the application server puts in front of stuck thread names
    pub stuck_marker: String,
    /// Name tokens of threads that poll by design and are never "stuck"
    pub poller_names: Vec<String>,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            stuck_marker: "[STUCK]".to_string(),
            poller_names: vec![
                "Poller".to_string(),
                "DaemonWorkThread".to_string(),
                "JMSPoller".to_string(),
            ],
        }
    }
}

impl MarkerConfig {
    /// True when the thread name identifies a poller.
    #[must_use]
    pub fn is_poller_name(&self, name: &str) -> bool {
        self.poller_names.iter().any(|token| name.contains(token.as_str()))
    }
}

impl Config {
    /// Load configuration from `explicit`, else the resolved default
    /// location, or defaults when no file exists.
    pub fn load(explicit: Option<&Path>) -> crate::Result<Self> {
        match resolve_config_path(explicit) {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()).into());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&raw)?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(raw: &str) -> crate::Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a heuristic meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hot_calls.window_lines == 0 {
            return Err(ConfigError::ValidationError(
                "hot_calls.window_lines must be at least 1".to_string(),
            ));
        }
        if self.hot_calls.min_occurrences == 0 {
            return Err(ConfigError::ValidationError(
                "hot_calls.min_occurrences must be at least 1".to_string(),
            ));
        }
        if self.markers.stuck_marker.is_empty() {
            return Err(ConfigError::ValidationError(
                "markers.stuck_marker must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve the config file to read.
///
/// Order: explicit path, `$TDLOGIC_CONFIG`, `<config_dir>/tdlogic/tdlogic.toml`.
/// The explicit path is returned even when missing so the caller can report
/// it; the implicit locations are only returned when the file exists.
#[must_use]
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
        if !env_path.is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    let candidate = dirs::config_dir()?.join("tdlogic").join("tdlogic.toml");
    candidate.exists().then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.thresholds.lock_contention, 3);
        assert_eq!(config.hot_calls.min_depth(), 10);
        assert!(config.definitions.builtin_advisories);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [thresholds]
            gc_threads = 8

            [general]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.thresholds.gc_threads, 8);
        assert_eq!(config.thresholds.osb_callouts, 15);
        assert_eq!(config.general.log_format, LogFormat::Json);
    }

    #[test]
    fn zero_window_is_rejected() {
        let err = Config::from_toml("[hot_calls]\nwindow_lines = 0\n").unwrap_err();
        assert!(err.to_string().contains("window_lines"));
    }

    #[test]
    fn load_from_missing_file_reports_path() {
        let err = Config::load_from(Path::new("/nonexistent/tdlogic.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tdlogic.toml"));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tdlogic.toml");
        std::fs::write(&path, "[markers]\nstuck_marker = \"<STUCK>\"\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.markers.stuck_marker, "<STUCK>");
        assert!(config.markers.is_poller_name("FileAdapterPoller-3"));
    }

    #[test]
    fn load_uses_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tdlogic.toml");
        std::fs::write(&path, "[thresholds]\nlock_contention = 7\n").unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().thresholds.lock_contention, 7);
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn explicit_path_wins() {
        let path = Path::new("/tmp/explicit.toml");
        assert_eq!(resolve_config_path(Some(path)), Some(path.to_path_buf()));
    }

    #[test]
    fn log_format_parses() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
