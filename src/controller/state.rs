//! Mutable controller state guarded by the controller's status lock

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::{defaults, SupervisorConfig};
use crate::types::{HealthLevel, OperationStatus, RecoveryOutcome, SystemMetrics};

/// Everything the monitoring and recovery loops share.
///
/// Only ever touched for short, non-blocking sections; no component
/// callback runs while it is locked.
#[derive(Debug)]
pub(crate) struct ControllerState {
    pub status: OperationStatus,
    pub health_level: HealthLevel,
    pub started_at: Option<Instant>,
    pub latest: Option<SystemMetrics>,
    pub history: VecDeque<SystemMetrics>,
    pub history_capacity: usize,
    /// Set by CleanupResources; honoured by the next monitoring tick
    pub trim_requested: bool,
    pub base_interval: Duration,
    pub monitoring_interval: Duration,
    pub max_interval: Duration,
    pub fallback_mode: bool,
    pub error_window: Duration,
    error_events: VecDeque<Instant>,
    recovery_events: VecDeque<Instant>,
    pub ticks: u64,
    pub last_recovery: Option<RecoveryOutcome>,
}

impl ControllerState {
    pub fn new(config: &SupervisorConfig) -> Self {
        let s = &config.supervisor;
        let capacity = s.history_capacity();
        Self {
            status: OperationStatus::Starting,
            health_level: HealthLevel::Excellent,
            started_at: None,
            latest: None,
            history: VecDeque::with_capacity(capacity.min(4_096)),
            history_capacity: capacity,
            trim_requested: false,
            base_interval: s.health_check_interval(),
            monitoring_interval: s.health_check_interval(),
            max_interval: Duration::from_secs(s.max_monitoring_interval_secs),
            fallback_mode: false,
            error_window: s.error_window(),
            error_events: VecDeque::new(),
            recovery_events: VecDeque::new(),
            ticks: 0,
            last_recovery: None,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.map_or(0, |t| t.elapsed().as_secs())
    }

    pub fn record_errors(&mut self, count: usize) {
        let now = Instant::now();
        self.error_events.extend(std::iter::repeat(now).take(count));
    }

    pub fn record_recovery(&mut self) {
        self.recovery_events.push_back(Instant::now());
    }

    /// Drop events older than the error window and return
    /// `(recent_errors, recent_recoveries)`.
    pub fn recent_counts(&mut self) -> (u32, u32) {
        let now = Instant::now();
        let window = self.error_window;
        for events in [&mut self.error_events, &mut self.recovery_events] {
            while events.front().is_some_and(|t| now.duration_since(*t) > window) {
                events.pop_front();
            }
        }
        (
            u32::try_from(self.error_events.len()).unwrap_or(u32::MAX),
            u32::try_from(self.recovery_events.len()).unwrap_or(u32::MAX),
        )
    }

    /// Append a tick to history, honouring a pending trim request first.
    ///
    /// The monitoring tick is the only caller; nothing else evicts history.
    pub fn push_history(&mut self, metrics: SystemMetrics) {
        if self.trim_requested {
            self.trim_requested = false;
            let keep = (self.history.len() as f64 * defaults::CLEANUP_RETAIN_FRACTION).ceil() as usize;
            let drop = self.history.len().saturating_sub(keep);
            self.history.drain(..drop);
            self.history.shrink_to_fit();
            self.error_events.shrink_to_fit();
            self.recovery_events.shrink_to_fit();
        }

        while self.history.len() >= self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(metrics);
    }

    /// Double the monitoring interval, capped at the configured ceiling.
    pub fn slow_down(&mut self) -> Duration {
        self.monitoring_interval = (self.monitoring_interval * 2).min(self.max_interval);
        self.monitoring_interval
    }

    /// Clear load-shedding state. Returns whether fallback mode was active.
    pub fn restore_normal_operation(&mut self) -> bool {
        self.monitoring_interval = self.base_interval;
        std::mem::take(&mut self.fallback_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_capacity(capacity: usize) -> ControllerState {
        let mut s = ControllerState::new(&SupervisorConfig::default());
        s.history_capacity = capacity;
        s
    }

    #[test]
    fn test_history_is_fifo_bounded() {
        let mut s = state_with_capacity(3);
        for i in 0..5u64 {
            s.push_history(SystemMetrics::from_resources(i as f64, 0.0, 0.0, 0));
        }
        let cpus: Vec<f64> = s.history.iter().map(|m| m.cpu_usage).collect();
        assert_eq!(cpus, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_trim_request_applies_on_next_push() {
        let mut s = state_with_capacity(100);
        for i in 0..40u64 {
            s.push_history(SystemMetrics::from_resources(i as f64, 0.0, 0.0, 0));
        }
        s.trim_requested = true;
        s.push_history(SystemMetrics::from_resources(99.0, 0.0, 0.0, 0));
        // 25% of 40 kept, plus the new entry
        assert_eq!(s.history.len(), 11);
        assert_eq!(s.history.front().unwrap().cpu_usage, 30.0);
        assert!(!s.trim_requested);
    }

    #[test]
    fn test_slow_down_caps_at_ceiling() {
        let mut s = ControllerState::new(&SupervisorConfig::default());
        assert_eq!(s.slow_down(), Duration::from_secs(60));
        assert_eq!(s.slow_down(), Duration::from_secs(120));
        assert_eq!(s.slow_down(), Duration::from_secs(240));
        assert_eq!(s.slow_down(), Duration::from_secs(300));
        assert_eq!(s.slow_down(), Duration::from_secs(300));

        s.fallback_mode = true;
        assert!(s.restore_normal_operation());
        assert_eq!(s.monitoring_interval, Duration::from_secs(30));
        assert!(!s.fallback_mode);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recent_counts_expire_outside_window() {
        let mut s = ControllerState::new(&SupervisorConfig::default());
        s.record_errors(2);
        s.record_recovery();
        assert_eq!(s.recent_counts(), (2, 1));

        tokio::time::advance(Duration::from_secs(200)).await;
        s.record_errors(1);
        assert_eq!(s.recent_counts(), (3, 1));

        tokio::time::advance(Duration::from_secs(150)).await;
        assert_eq!(s.recent_counts(), (1, 0));
    }
}
