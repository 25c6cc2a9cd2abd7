//! Supervisor Configuration - intervals, health thresholds, recovery strategies
//!
//! Each struct implements `Default` with the values in `defaults.rs`, so an
//! empty or missing config file yields a fully working supervisor.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;
use crate::types::{HealthLevel, RecoveryAction};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "OPWATCH_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "opwatch.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one supervisor process.
///
/// Load with `SupervisorConfig::load()` which searches:
/// 1. `$OPWATCH_CONFIG` env var
/// 2. `./opwatch.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SupervisorConfig {
    /// Loop cadence, timeouts and retention
    #[serde(default)]
    pub supervisor: SupervisorSection,

    /// Health scoring thresholds
    #[serde(default)]
    pub health: HealthThresholds,

    /// Strategy table: health level -> ordered recovery actions
    #[serde(default)]
    pub recovery: RecoveryStrategies,

    /// HTTP status server
    #[serde(default)]
    pub server: ServerConfig,

    /// Console and rotating file logging
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Built-in probe components
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
}

impl SupervisorConfig {
    /// Load configuration using the standard search order:
    /// 1. `$OPWATCH_CONFIG` environment variable
    /// 2. `./opwatch.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), components = config.components.len(), "Loaded supervisor config from OPWATCH_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from OPWATCH_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "OPWATCH_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(components = config.components.len(), "Loaded supervisor config from ./opwatch.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./opwatch.toml, using defaults");
                }
            }
        }

        info!("No opwatch.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are logged as warnings and never fail the load.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate the config for internal consistency.
    ///
    /// Rules:
    /// - Critical thresholds must be > warning thresholds
    /// - Intervals and timeouts must be > 0, ceiling >= tick interval
    /// - Score cut-offs must be strictly descending
    /// - Strategy lists must be non-empty, terminal actions only last
    /// - Component names unique, max_failures > 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let s = &self.supervisor;
        for (name, value) in [
            ("supervisor.health_check_interval_secs", s.health_check_interval_secs),
            ("supervisor.recovery_poll_interval_secs", s.recovery_poll_interval_secs),
            ("supervisor.callback_timeout_secs", s.callback_timeout_secs),
            ("supervisor.metrics_timeout_secs", s.metrics_timeout_secs),
            ("supervisor.history_retention_secs", s.history_retention_secs),
            ("supervisor.error_window_secs", s.error_window_secs),
        ] {
            if value == 0 {
                errors.push(format!("{name} must be > 0"));
            }
        }
        if s.max_monitoring_interval_secs < s.health_check_interval_secs {
            errors.push(format!(
                "supervisor.max_monitoring_interval_secs ({}) must be >= health_check_interval_secs ({})",
                s.max_monitoring_interval_secs, s.health_check_interval_secs
            ));
        }

        let h = &self.health;
        Self::check_escalation(h.cpu_warning_percent, h.cpu_critical_percent, "health.cpu", &mut errors);
        Self::check_escalation(h.memory_warning_percent, h.memory_critical_percent, "health.memory", &mut errors);
        Self::check_escalation(h.disk_warning_percent, h.disk_critical_percent, "health.disk", &mut errors);

        if !(h.failure_score > h.critical_score
            && h.critical_score > h.warning_score
            && h.warning_score > h.good_score
            && h.good_score > 0)
        {
            errors.push(format!(
                "health score cut-offs must be strictly descending and > 0 (failure={}, critical={}, warning={}, good={})",
                h.failure_score, h.critical_score, h.warning_score, h.good_score
            ));
        }

        for (level, actions) in self.recovery.iter() {
            if actions.is_empty() {
                errors.push(format!("recovery.{level} must list at least one action"));
            }
            if let Some(pos) = actions.iter().position(|a| a.is_terminal()) {
                if pos + 1 != actions.len() {
                    errors.push(format!(
                        "recovery.{level}: {} must be the last action",
                        actions[pos]
                    ));
                }
            }
        }

        let mut seen = HashSet::new();
        for c in &self.components {
            if c.name.trim().is_empty() {
                errors.push("components: name must not be empty".to_string());
            }
            if !seen.insert(c.name.as_str()) {
                errors.push(format!("components: duplicate name '{}'", c.name));
            }
            if c.max_failures == 0 {
                errors.push(format!("components.{}: max_failures must be > 0", c.name));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_escalation(warning: f64, critical: f64, name: &str, errors: &mut Vec<String>) {
        // NaN/Inf comparisons silently pass, catch them explicitly
        if !warning.is_finite() || !critical.is_finite() {
            errors.push(format!(
                "{name}: values must be finite (got warning={warning}, critical={critical})"
            ));
            return;
        }
        if !(0.0..=100.0).contains(&warning) || !(0.0..=100.0).contains(&critical) {
            errors.push(format!("{name}: thresholds are percentages and must lie in 0-100"));
        }
        if critical <= warning {
            errors.push(format!(
                "{name}: critical ({critical:.1}) must be > warning ({warning:.1})"
            ));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// [supervisor]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SupervisorSection {
    pub health_check_interval_secs: u64,
    pub recovery_poll_interval_secs: u64,
    /// ReduceLoad never doubles the tick interval past this
    pub max_monitoring_interval_secs: u64,
    /// Per-invocation timeout for health checks and restarts
    pub callback_timeout_secs: u64,
    pub metrics_timeout_secs: u64,
    pub history_retention_secs: u64,
    pub error_window_secs: u64,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            health_check_interval_secs: defaults::HEALTH_CHECK_INTERVAL_SECS,
            recovery_poll_interval_secs: defaults::RECOVERY_POLL_INTERVAL_SECS,
            max_monitoring_interval_secs: defaults::MAX_MONITORING_INTERVAL_SECS,
            callback_timeout_secs: defaults::CALLBACK_TIMEOUT_SECS,
            metrics_timeout_secs: defaults::METRICS_TIMEOUT_SECS,
            history_retention_secs: defaults::HISTORY_RETENTION_SECS,
            error_window_secs: defaults::ERROR_WINDOW_SECS,
        }
    }
}

impl SupervisorSection {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn recovery_poll_interval(&self) -> Duration {
        Duration::from_secs(self.recovery_poll_interval_secs)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }

    pub fn metrics_timeout(&self) -> Duration {
        Duration::from_secs(self.metrics_timeout_secs)
    }

    pub fn error_window(&self) -> Duration {
        Duration::from_secs(self.error_window_secs)
    }

    /// Number of ticks the history ring buffer holds at the base cadence.
    ///
    /// 43 200 s retention at 30 s resolution = 1 440 entries.
    pub fn history_capacity(&self) -> usize {
        let ticks = self.history_retention_secs / self.health_check_interval_secs.max(1);
        usize::try_from(ticks).unwrap_or(usize::MAX).max(1)
    }
}

// ============================================================================
// [health]
// ============================================================================

/// Breakpoints used by the health evaluator.
///
/// Each resource is compared against a soft (warning) and hard (critical)
/// breakpoint. CPU and memory score 1/2, disk scores 1/3.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthThresholds {
    pub cpu_warning_percent: f64,
    pub cpu_critical_percent: f64,
    pub memory_warning_percent: f64,
    pub memory_critical_percent: f64,
    pub disk_warning_percent: f64,
    pub disk_critical_percent: f64,
    pub error_score_per_error: u32,
    pub error_score_cap: u32,
    pub failure_score: u32,
    pub critical_score: u32,
    pub warning_score: u32,
    pub good_score: u32,
    /// Filesystem sampled for `disk_usage`
    pub disk_path: String,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            cpu_warning_percent: defaults::CPU_WARNING_PERCENT,
            cpu_critical_percent: defaults::CPU_CRITICAL_PERCENT,
            memory_warning_percent: defaults::MEMORY_WARNING_PERCENT,
            memory_critical_percent: defaults::MEMORY_CRITICAL_PERCENT,
            disk_warning_percent: defaults::DISK_WARNING_PERCENT,
            disk_critical_percent: defaults::DISK_CRITICAL_PERCENT,
            error_score_per_error: defaults::ERROR_SCORE_PER_ERROR,
            error_score_cap: defaults::ERROR_SCORE_CAP,
            failure_score: defaults::FAILURE_SCORE,
            critical_score: defaults::CRITICAL_SCORE,
            warning_score: defaults::WARNING_SCORE,
            good_score: defaults::GOOD_SCORE,
            disk_path: defaults::DISK_PATH.to_string(),
        }
    }
}

// ============================================================================
// [recovery]
// ============================================================================

/// Ordered recovery actions per degraded health level.
///
/// Levels at or above `Warning` each carry one list; `Good` and `Excellent`
/// never trigger recovery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecoveryStrategies {
    pub warning: Vec<RecoveryAction>,
    pub critical: Vec<RecoveryAction>,
    pub failure: Vec<RecoveryAction>,
}

impl Default for RecoveryStrategies {
    fn default() -> Self {
        Self {
            warning: vec![RecoveryAction::CleanupResources],
            critical: vec![RecoveryAction::ReduceLoad, RecoveryAction::RestartComponent],
            failure: vec![RecoveryAction::RestartSystem, RecoveryAction::EmergencyShutdown],
        }
    }
}

impl RecoveryStrategies {
    /// Actions for `level`; empty for healthy levels.
    pub fn for_level(&self, level: HealthLevel) -> &[RecoveryAction] {
        match level {
            HealthLevel::Excellent | HealthLevel::Good => &[],
            HealthLevel::Warning => &self.warning,
            HealthLevel::Critical => &self.critical,
            HealthLevel::Failure => &self.failure,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (HealthLevel, &[RecoveryAction])> {
        [
            (HealthLevel::Warning, self.warning.as_slice()),
            (HealthLevel::Critical, self.critical.as_slice()),
            (HealthLevel::Failure, self.failure.as_slice()),
        ]
        .into_iter()
    }
}

// ============================================================================
// [server]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: defaults::SERVER_ADDR.to_string(),
        }
    }
}

// ============================================================================
// [logging]
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for the rotating JSON log; file logging is off when `None`
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
    pub rotation: LogRotation,
    /// Emit JSON on the console as well
    pub json_console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: Some(PathBuf::from(defaults::LOG_DIRECTORY)),
            file_prefix: defaults::LOG_FILE_PREFIX.to_string(),
            rotation: LogRotation::Daily,
            json_console: false,
        }
    }
}

// ============================================================================
// [[components]]
// ============================================================================

/// A built-in probe declared in the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentConfig {
    pub name: String,
    #[serde(default)]
    pub critical: bool,
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    #[serde(flatten)]
    pub probe: ProbeKind,
}

fn default_max_failures() -> u32 {
    defaults::MAX_FAILURES
}

fn default_min_free_mb() -> u64 {
    defaults::DISK_PROBE_MIN_FREE_MB
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeKind {
    /// Healthy while a TCP connection to `addr` succeeds
    Tcp { addr: String },
    /// Healthy while `check` exits 0; `restart` runs on restart
    Command {
        check: String,
        #[serde(default)]
        restart: Option<String>,
    },
    /// Healthy while `path` has at least `min_free_mb` free
    Disk {
        path: String,
        #[serde(default = "default_min_free_mb")]
        min_free_mb: u64,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SupervisorConfig::default();
        assert!(config.validate().is_ok(), "Default config must validate");
    }

    #[test]
    fn test_default_strategy_table() {
        let r = RecoveryStrategies::default();
        assert_eq!(r.for_level(HealthLevel::Warning), &[RecoveryAction::CleanupResources]);
        assert_eq!(
            r.for_level(HealthLevel::Critical),
            &[RecoveryAction::ReduceLoad, RecoveryAction::RestartComponent]
        );
        assert_eq!(
            r.for_level(HealthLevel::Failure),
            &[RecoveryAction::RestartSystem, RecoveryAction::EmergencyShutdown]
        );
        assert!(r.for_level(HealthLevel::Good).is_empty());
        assert!(r.for_level(HealthLevel::Excellent).is_empty());
    }

    #[test]
    fn test_history_capacity_twelve_hours_at_thirty_seconds() {
        let s = SupervisorSection::default();
        assert_eq!(s.history_capacity(), 1_440);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_str = r#"
[supervisor]
health_check_interval_secs = 10

[health]
cpu_critical_percent = 95.0
"#;
        let config = SupervisorConfig::from_toml_str(toml_str).expect("partial TOML should parse");
        assert_eq!(config.supervisor.health_check_interval_secs, 10);
        assert_eq!(config.supervisor.recovery_poll_interval_secs, 60);
        assert_eq!(config.health.cpu_critical_percent, 95.0);
        assert_eq!(config.health.cpu_warning_percent, 70.0);
    }

    #[test]
    fn test_components_parse_by_kind() {
        let toml_str = r#"
[[components]]
name = "api"
kind = "tcp"
addr = "127.0.0.1:8080"
critical = true

[[components]]
name = "worker"
kind = "command"
check = "systemctl is-active worker"
restart = "systemctl restart worker"
max_failures = 5

[[components]]
name = "data-volume"
kind = "disk"
path = "/var/lib"
"#;
        let config = SupervisorConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.components.len(), 3);
        assert!(config.components[0].critical);
        assert_eq!(config.components[0].max_failures, 3);
        assert_eq!(
            config.components[0].probe,
            ProbeKind::Tcp { addr: "127.0.0.1:8080".to_string() }
        );
        assert_eq!(config.components[1].max_failures, 5);
        assert_eq!(
            config.components[2].probe,
            ProbeKind::Disk { path: "/var/lib".to_string(), min_free_mb: 500 }
        );
    }

    #[test]
    fn test_validation_catches_inverted_thresholds() {
        let mut config = SupervisorConfig::default();
        config.health.cpu_warning_percent = 90.0;
        config.health.cpu_critical_percent = 80.0;
        let result = config.validate();
        assert!(result.is_err(), "Inverted thresholds should fail validation");
        if let Err(ConfigError::Validation(errors)) = result {
            assert!(errors.iter().any(|e| e.contains("health.cpu")));
        }
    }

    #[test]
    fn test_validation_rejects_shutdown_before_other_actions() {
        let mut config = SupervisorConfig::default();
        config.recovery.failure = vec![RecoveryAction::EmergencyShutdown, RecoveryAction::RestartSystem];
        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("expected validation failure");
        };
        assert!(errors.iter().any(|e| e.contains("emergency_shutdown must be the last")));
    }

    #[test]
    fn test_validation_rejects_empty_strategy() {
        let mut config = SupervisorConfig::default();
        config.recovery.warning.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_duplicate_component_names() {
        let toml_str = r#"
[[components]]
name = "api"
kind = "tcp"
addr = "127.0.0.1:1"

[[components]]
name = "api"
kind = "tcp"
addr = "127.0.0.1:2"
"#;
        let Err(ConfigError::Validation(errors)) = SupervisorConfig::from_toml_str(toml_str) else {
            panic!("expected validation failure");
        };
        assert!(errors.iter().any(|e| e.contains("duplicate name 'api'")));
    }

    #[test]
    fn test_validation_rejects_ceiling_below_interval() {
        let mut config = SupervisorConfig::default();
        config.supervisor.max_monitoring_interval_secs = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_roundtrip_toml() {
        let original = SupervisorConfig::default();
        let toml_str = original.to_toml().expect("serialization should work");
        let roundtripped: SupervisorConfig =
            toml::from_str(&toml_str).expect("deserialization should work");
        assert_eq!(original, roundtripped);
    }

    #[test]
    fn test_recovery_actions_parse_from_names() {
        let toml_str = r#"
[recovery]
warning = ["cleanup_resources", "reduce_load"]
"#;
        let config = SupervisorConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(
            config.recovery.warning,
            vec![RecoveryAction::CleanupResources, RecoveryAction::ReduceLoad]
        );
        // Untouched levels keep their defaults
        assert_eq!(config.recovery.failure.len(), 2);
    }
}
