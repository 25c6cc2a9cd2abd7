//! Read-only snapshots handed to callers of `status()` and the HTTP API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ComponentStatus, HealthLevel, MetricsSummary, OperationStatus, RecoveryOutcome};

/// Copy of one registered component's bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentSnapshot {
    pub name: String,
    pub status: ComponentStatus,
    pub failure_count: u32,
    pub max_failures: u32,
    pub critical: bool,
    pub last_health_check: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Plain serializable view of the supervisor, safe to ship to dashboards
/// and log collectors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationStatusSnapshot {
    pub status: OperationStatus,
    pub uptime_seconds: u64,
    pub health_level: HealthLevel,
    /// Keyed by component name; ordered for stable output
    pub components: BTreeMap<String, ComponentSnapshot>,
    pub metrics: Option<MetricsSummary>,
    pub fallback_mode: bool,
    pub monitoring_interval_secs: u64,
    pub ticks: u64,
    pub last_recovery: Option<RecoveryOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecoveryAction;
    use chrono::TimeZone;

    fn sample_snapshot() -> OperationStatusSnapshot {
        let checked = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        let mut components = BTreeMap::new();
        components.insert(
            "db".to_string(),
            ComponentSnapshot {
                name: "db".to_string(),
                status: ComponentStatus::Error,
                failure_count: 3,
                max_failures: 3,
                critical: true,
                last_health_check: Some(checked),
                last_error: Some("health check timed out after 5s".to_string()),
            },
        );
        components.insert(
            "cache".to_string(),
            ComponentSnapshot {
                name: "cache".to_string(),
                status: ComponentStatus::Running,
                failure_count: 0,
                max_failures: 5,
                critical: false,
                last_health_check: None,
                last_error: None,
            },
        );

        OperationStatusSnapshot {
            status: OperationStatus::Recovering,
            uptime_seconds: 7_260,
            health_level: HealthLevel::Critical,
            components,
            metrics: Some(MetricsSummary {
                cpu: 42.5,
                memory: 61.25,
                disk: 12.0,
                threads: 17,
            }),
            fallback_mode: false,
            monitoring_interval_secs: 60,
            ticks: 242,
            last_recovery: Some(RecoveryOutcome {
                level: HealthLevel::Critical,
                action: RecoveryAction::RestartComponent,
                success: true,
                attempted: vec![RecoveryAction::ReduceLoad, RecoveryAction::RestartComponent],
                finished_at: checked,
            }),
        }
    }

    #[test]
    fn test_status_snapshot_json_roundtrip() {
        let original = sample_snapshot();
        let json = serde_json::to_string(&original).unwrap();
        let back: OperationStatusSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(original, back);
    }

    #[test]
    fn test_status_snapshot_uses_snake_case_enums() {
        let json = serde_json::to_value(sample_snapshot()).unwrap();
        assert_eq!(json["status"], "recovering");
        assert_eq!(json["health_level"], "critical");
        assert_eq!(json["components"]["db"]["status"], "error");
        assert_eq!(json["metrics"]["threads"], 17);
    }
}
