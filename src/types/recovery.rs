//! Recovery actions and their outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::HealthLevel;

/// One discrete remediation step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Trim history buffers and release spare capacity
    CleanupResources,
    /// Slow the monitoring cadence and throttle non-critical components
    ReduceLoad,
    /// Restart every component currently in `Error`
    RestartComponent,
    /// Stop and restart every component, then re-probe the critical ones
    RestartSystem,
    /// Pause non-critical components until health returns
    FallbackMode,
    /// Trigger graceful shutdown of the supervisor
    EmergencyShutdown,
}

impl RecoveryAction {
    pub const ALL: [RecoveryAction; 6] = [
        RecoveryAction::CleanupResources,
        RecoveryAction::ReduceLoad,
        RecoveryAction::RestartComponent,
        RecoveryAction::RestartSystem,
        RecoveryAction::FallbackMode,
        RecoveryAction::EmergencyShutdown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryAction::CleanupResources => "cleanup_resources",
            RecoveryAction::ReduceLoad => "reduce_load",
            RecoveryAction::RestartComponent => "restart_component",
            RecoveryAction::RestartSystem => "restart_system",
            RecoveryAction::FallbackMode => "fallback_mode",
            RecoveryAction::EmergencyShutdown => "emergency_shutdown",
        }
    }

    /// Terminal actions may only appear last in a strategy list.
    pub fn is_terminal(self) -> bool {
        matches!(self, RecoveryAction::EmergencyShutdown)
    }
}

impl std::fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecoveryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecoveryAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown recovery action '{s}'"))
    }
}

/// Result of one `RecoveryEngine::execute` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecoveryOutcome {
    pub level: HealthLevel,
    /// First successful action, or the last one attempted
    pub action: RecoveryAction,
    pub success: bool,
    /// Every action attempted, in order
    pub attempted: Vec<RecoveryAction>,
    pub finished_at: DateTime<Utc>,
}
