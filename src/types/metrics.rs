//! Per-tick metrics snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{HealthLevel, OperationStatus};

/// Immutable snapshot produced once per monitoring tick.
///
/// Resource fields come from the [`MetricsCollector`](crate::metrics::MetricsCollector);
/// status, uptime and the rolling counters are stamped by the controller
/// before the snapshot is evaluated and appended to history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemMetrics {
    pub timestamp: DateTime<Utc>,
    /// Host CPU utilisation, 0-100
    pub cpu_usage: f64,
    /// Host memory utilisation, 0-100
    pub memory_usage: f64,
    /// Utilisation of the supervised filesystem, 0-100
    pub disk_usage: f64,
    /// Threads alive in this process
    pub active_task_count: u64,
    pub operation_status: OperationStatus,
    pub health_level: HealthLevel,
    pub uptime_seconds: u64,
    /// Health-check and restart failures inside the error window
    pub recent_error_count: u32,
    /// Recovery attempts inside the error window
    pub recent_recovery_count: u32,
    /// False when the OS query failed or timed out and the resource
    /// fields are a zeroed placeholder.
    #[serde(default = "default_sample_ok")]
    pub sample_ok: bool,
}

fn default_sample_ok() -> bool {
    true
}

impl SystemMetrics {
    /// A sample with the given resource readings and neutral status fields.
    pub fn from_resources(cpu: f64, memory: f64, disk: f64, tasks: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            cpu_usage: cpu,
            memory_usage: memory,
            disk_usage: disk,
            active_task_count: tasks,
            operation_status: OperationStatus::Starting,
            health_level: HealthLevel::Excellent,
            uptime_seconds: 0,
            recent_error_count: 0,
            recent_recovery_count: 0,
            sample_ok: true,
        }
    }

    /// Worst-case placeholder used when sampling fails.
    ///
    /// Resource readings are zero and the level is `Failure` so the
    /// monitoring loop fails toward safety instead of skipping the tick.
    pub fn degraded() -> Self {
        Self {
            health_level: HealthLevel::Failure,
            sample_ok: false,
            ..Self::from_resources(0.0, 0.0, 0.0, 0)
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            cpu: self.cpu_usage,
            memory: self.memory_usage,
            disk: self.disk_usage,
            threads: self.active_task_count,
        }
    }
}

/// Compact resource view embedded in status snapshots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct MetricsSummary {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
    pub threads: u64,
}
