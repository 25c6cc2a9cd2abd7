//! Health Evaluator
//!
//! Deterministic, rule-based mapping from one metrics snapshot plus the
//! registry's worst component level to a single [`HealthLevel`].
//!
//! # Scoring Algorithm
//!
//! - CPU and memory: 2 points above the critical breakpoint, 1 above warning
//! - Disk: 3 points at or above critical, 1 above warning
//! - Errors: `min(recent_error_count * 2, 6)`
//!
//! The summed score maps to a level (`>= 8` Failure, `>= 5` Critical,
//! `>= 3` Warning, `>= 1` Good, else Excellent). A disk at its critical
//! breakpoint floors the result at `Critical`, and the component-derived
//! level is folded in last with `max`, so a critical component outage
//! always dominates transient resource pressure.
//!
//! No clock, no I/O: everything the evaluator needs is in its arguments.

use crate::config::HealthThresholds;
use crate::types::{HealthLevel, SystemMetrics};

#[derive(Debug, Clone, Default)]
pub struct HealthEvaluator {
    thresholds: HealthThresholds,
}

impl HealthEvaluator {
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &HealthThresholds {
        &self.thresholds
    }

    /// Combined level for one tick.
    pub fn evaluate(&self, metrics: &SystemMetrics, components_worst: HealthLevel) -> HealthLevel {
        // A failed sample carries no usable readings; fail toward safety.
        if !metrics.sample_ok {
            return HealthLevel::Failure;
        }

        let total = self.resource_score(metrics) + self.error_score(metrics.recent_error_count);
        let mut level = self.level_for_score(total);

        if metrics.disk_usage >= self.thresholds.disk_critical_percent {
            level = level.worst(HealthLevel::Critical);
        }

        level.worst(components_worst)
    }

    /// Sum of the per-resource breakpoint scores.
    pub fn resource_score(&self, metrics: &SystemMetrics) -> u32 {
        let t = &self.thresholds;

        let cpu = score_above(metrics.cpu_usage, t.cpu_warning_percent, t.cpu_critical_percent, 2);
        let memory = score_above(
            metrics.memory_usage,
            t.memory_warning_percent,
            t.memory_critical_percent,
            2,
        );
        let disk = if metrics.disk_usage >= t.disk_critical_percent {
            3
        } else if metrics.disk_usage > t.disk_warning_percent {
            1
        } else {
            0
        };

        cpu + memory + disk
    }

    pub fn error_score(&self, recent_error_count: u32) -> u32 {
        recent_error_count
            .saturating_mul(self.thresholds.error_score_per_error)
            .min(self.thresholds.error_score_cap)
    }

    pub fn level_for_score(&self, total: u32) -> HealthLevel {
        let t = &self.thresholds;
        if total >= t.failure_score {
            HealthLevel::Failure
        } else if total >= t.critical_score {
            HealthLevel::Critical
        } else if total >= t.warning_score {
            HealthLevel::Warning
        } else if total >= t.good_score {
            HealthLevel::Good
        } else {
            HealthLevel::Excellent
        }
    }
}

fn score_above(value: f64, warning: f64, critical: f64, critical_points: u32) -> u32 {
    if value > critical {
        critical_points
    } else if value > warning {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(cpu: f64, memory: f64, disk: f64, errors: u32) -> SystemMetrics {
        SystemMetrics {
            recent_error_count: errors,
            ..SystemMetrics::from_resources(cpu, memory, disk, 4)
        }
    }

    fn eval(cpu: f64, memory: f64, disk: f64, errors: u32) -> HealthLevel {
        HealthEvaluator::default().evaluate(&metrics(cpu, memory, disk, errors), HealthLevel::Excellent)
    }

    #[test]
    fn test_idle_host_is_excellent() {
        assert_eq!(eval(0.0, 0.0, 0.0, 0), HealthLevel::Excellent);
    }

    #[test]
    fn test_full_disk_is_at_least_critical() {
        for disk in [90.0, 93.5, 99.0, 100.0] {
            for cpu in [0.0, 50.0, 99.0] {
                for memory in [0.0, 75.0, 99.0] {
                    let level = eval(cpu, memory, disk, 0);
                    assert!(
                        level >= HealthLevel::Critical,
                        "disk={disk} cpu={cpu} mem={memory} gave {level}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_score_two_is_warning_band_boundary() {
        // cpu > 85 contributes 2; 2 sits in the >= 1 band
        let m = metrics(95.0, 50.0, 10.0, 0);
        let e = HealthEvaluator::default();
        assert_eq!(e.resource_score(&m), 2);
        assert_eq!(e.evaluate(&m, HealthLevel::Excellent), HealthLevel::Good);
    }

    #[test]
    fn test_level_cutoffs_are_pinned() {
        let e = HealthEvaluator::default();
        assert_eq!(e.level_for_score(0), HealthLevel::Excellent);
        assert_eq!(e.level_for_score(1), HealthLevel::Good);
        assert_eq!(e.level_for_score(2), HealthLevel::Good);
        assert_eq!(e.level_for_score(3), HealthLevel::Warning);
        assert_eq!(e.level_for_score(4), HealthLevel::Warning);
        assert_eq!(e.level_for_score(5), HealthLevel::Critical);
        assert_eq!(e.level_for_score(7), HealthLevel::Critical);
        assert_eq!(e.level_for_score(8), HealthLevel::Failure);
        assert_eq!(e.level_for_score(20), HealthLevel::Failure);
    }

    #[test]
    fn test_error_score_is_capped() {
        let e = HealthEvaluator::default();
        assert_eq!(e.error_score(0), 0);
        assert_eq!(e.error_score(1), 2);
        assert_eq!(e.error_score(3), 6);
        assert_eq!(e.error_score(50), 6);
        assert_eq!(e.error_score(u32::MAX), 6);
    }

    #[test]
    fn test_cpu_and_memory_pressure_with_errors_reaches_failure() {
        // 2 + 2 + 0 + min(2*2, 6) = 8
        assert_eq!(eval(90.0, 90.0, 10.0, 2), HealthLevel::Failure);
        // 2 + 2 + 1 = 5
        assert_eq!(eval(90.0, 90.0, 85.0, 0), HealthLevel::Critical);
        // 1 + 1 + 1 = 3
        assert_eq!(eval(75.0, 75.0, 85.0, 0), HealthLevel::Warning);
    }

    #[test]
    fn test_breakpoints_are_strict_for_cpu() {
        assert_eq!(eval(70.0, 0.0, 0.0, 0), HealthLevel::Excellent);
        assert_eq!(eval(70.1, 0.0, 0.0, 0), HealthLevel::Good);
    }

    #[test]
    fn test_component_level_dominates() {
        let e = HealthEvaluator::default();
        let m = metrics(0.0, 0.0, 0.0, 0);
        assert_eq!(e.evaluate(&m, HealthLevel::Critical), HealthLevel::Critical);
        assert_eq!(e.evaluate(&m, HealthLevel::Warning), HealthLevel::Warning);
        // resource level wins when it is worse: 2 + 2 + 3 = 7
        let busy = metrics(99.0, 99.0, 99.0, 0);
        assert_eq!(e.evaluate(&busy, HealthLevel::Warning), HealthLevel::Critical);
    }

    #[test]
    fn test_errors_push_saturated_host_to_failure() {
        let e = HealthEvaluator::default();
        // 7 from resources plus 2 for a single recent error
        let busy = metrics(99.0, 99.0, 99.0, 1);
        assert_eq!(e.resource_score(&busy) + e.error_score(1), 9);
        assert_eq!(e.evaluate(&busy, HealthLevel::Warning), HealthLevel::Failure);
        // error score alone caps at 6, still Critical
        assert_eq!(eval(0.0, 0.0, 0.0, 10), HealthLevel::Critical);
    }

    #[test]
    fn test_failed_sample_is_failure() {
        let e = HealthEvaluator::default();
        assert_eq!(
            e.evaluate(&SystemMetrics::degraded(), HealthLevel::Excellent),
            HealthLevel::Failure
        );
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = HealthThresholds {
            cpu_warning_percent: 20.0,
            cpu_critical_percent: 40.0,
            ..HealthThresholds::default()
        };
        let e = HealthEvaluator::new(thresholds);
        assert_eq!(e.resource_score(&metrics(50.0, 0.0, 0.0, 0)), 2);
        assert_eq!(e.resource_score(&metrics(30.0, 0.0, 0.0, 0)), 1);
    }
}
