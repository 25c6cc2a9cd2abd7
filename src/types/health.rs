//! Health and lifecycle enums: HealthLevel, OperationStatus, ComponentStatus

use serde::{Deserialize, Serialize};

// ============================================================================
// Health Level
// ============================================================================

/// Ordered severity classification of the supervised system.
///
/// Variants are declared best-first so the derived `Ord` ranks severity:
/// `Excellent < Good < Warning < Critical < Failure`. "Worse of two levels"
/// is therefore simply `max`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum HealthLevel {
    #[default]
    Excellent,
    Good,
    Warning,
    Critical,
    Failure,
}

impl HealthLevel {
    /// Levels that warrant a recovery attempt.
    pub fn is_degraded(self) -> bool {
        self >= HealthLevel::Warning
    }

    /// Levels at which the system counts as recovered.
    pub fn is_healthy(self) -> bool {
        self <= HealthLevel::Good
    }

    /// Return the more severe of two levels.
    pub fn worst(self, other: HealthLevel) -> HealthLevel {
        self.max(other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthLevel::Excellent => "excellent",
            HealthLevel::Good => "good",
            HealthLevel::Warning => "warning",
            HealthLevel::Critical => "critical",
            HealthLevel::Failure => "failure",
        }
    }
}

impl std::fmt::Display for HealthLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Operation Status (controller state machine)
// ============================================================================

/// Operational state of the supervisor as a whole.
///
/// ```text
/// Starting -> Running <-> Degraded <-> Recovering -> Stopping -> Stopped
///                 \_________ any ________/  -> Error
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    #[default]
    Starting,
    Running,
    Degraded,
    Recovering,
    Stopping,
    Stopped,
    Error,
}

impl OperationStatus {
    /// Stopping and Stopped are never left once entered.
    pub fn is_shutting_down(self) -> bool {
        matches!(self, OperationStatus::Stopping | OperationStatus::Stopped)
    }

    /// Compute the status that follows a monitoring tick.
    ///
    /// `all_components_running` is only consulted while `Starting`. A
    /// `Failure` level always forces `Error`; shutdown states are sticky.
    pub fn after_tick(self, level: HealthLevel, all_components_running: bool) -> OperationStatus {
        use OperationStatus::*;

        if self.is_shutting_down() {
            return self;
        }
        if level == HealthLevel::Failure {
            return Error;
        }

        match (self, level.is_degraded()) {
            (Starting, true) => Degraded,
            (Starting, false) if all_components_running => Running,
            (Starting, false) => Starting,
            (Running | Degraded, true) => Degraded,
            (Running | Degraded, false) => Running,
            // Stay in Recovering until a tick evaluates healthy.
            (Recovering, true) => Recovering,
            (Recovering, false) => Running,
            (Error, true) => Degraded,
            (Error, false) => Running,
            (Stopping | Stopped, _) => self,
        }
    }

    /// Status when the recovery engine is about to run.
    ///
    /// Only `Degraded` (and a repeated `Recovering`) moves to `Recovering`;
    /// `Error` stays `Error` while a Failure-level strategy executes.
    pub fn on_recovery_started(self) -> OperationStatus {
        match self {
            OperationStatus::Degraded | OperationStatus::Recovering => OperationStatus::Recovering,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationStatus::Starting => "starting",
            OperationStatus::Running => "running",
            OperationStatus::Degraded => "degraded",
            OperationStatus::Recovering => "recovering",
            OperationStatus::Stopping => "stopping",
            OperationStatus::Stopped => "stopped",
            OperationStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Component Status
// ============================================================================

/// Lifecycle state of one registered component.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    /// Registered, no health check has completed yet
    #[default]
    Starting,
    /// Last health check succeeded
    Running,
    /// Failed at least once but still under its failure threshold
    Failing,
    /// Reached its failure threshold; eligible for restart
    Error,
    /// Suspended by fallback mode; skipped by health ticks
    Paused,
}

impl std::fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentStatus::Starting => write!(f, "starting"),
            ComponentStatus::Running => write!(f, "running"),
            ComponentStatus::Failing => write!(f, "failing"),
            ComponentStatus::Error => write!(f, "error"),
            ComponentStatus::Paused => write!(f, "paused"),
        }
    }
}
