//! Recovery Engine
//!
//! Maps a degraded [`HealthLevel`] to an ordered list of [`RecoveryAction`]s
//! and runs them until one reports success. The engine owns the strategy
//! table and the dispatch; the side effects live behind [`RecoveryTarget`],
//! which the operation controller implements.
//!
//! ## Policy
//!
//! First success wins. If nothing succeeds the whole list has been tried and
//! the outcome carries the last attempted action with `success = false`.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::RecoveryStrategies;
use crate::error::SupervisorError;
use crate::types::{HealthLevel, RecoveryAction, RecoveryOutcome};

/// Side effects available to recovery actions.
#[async_trait]
pub trait RecoveryTarget: Send + Sync {
    /// Trim history buffers and release spare capacity.
    async fn cleanup_resources(&self);

    /// Slow monitoring and throttle non-critical components.
    /// Returns true iff at least one component acknowledged.
    async fn reduce_load(&self) -> bool;

    /// Restart components in `Error`. Returns how many came back.
    async fn restart_failed_components(&self) -> usize;

    /// Stop and restart everything. Returns true iff every critical
    /// component is healthy afterwards.
    async fn restart_system(&self) -> bool;

    /// Pause non-critical components until health returns.
    async fn enter_fallback_mode(&self);

    /// Begin graceful shutdown.
    async fn emergency_shutdown(&self);
}

#[derive(Debug, Clone, Default)]
pub struct RecoveryEngine {
    strategies: RecoveryStrategies,
}

impl RecoveryEngine {
    pub fn new(strategies: RecoveryStrategies) -> Self {
        Self { strategies }
    }

    /// Ordered actions configured for `level`; empty when healthy.
    pub fn strategy(&self, level: HealthLevel) -> &[RecoveryAction] {
        self.strategies.for_level(level)
    }

    /// Run the strategy for `level` against `target`.
    ///
    /// Returns `None` when the level has no strategy (nothing to do).
    pub async fn execute(
        &self,
        level: HealthLevel,
        target: &dyn RecoveryTarget,
    ) -> Option<RecoveryOutcome> {
        let actions = self.strategy(level);
        let mut attempted = Vec::with_capacity(actions.len());

        for &action in actions {
            info!(target: "opwatch::recovery", level = %level, action = %action, "Attempting recovery action");
            attempted.push(action);

            if run_action(action, target).await {
                info!(target: "opwatch::recovery", level = %level, action = %action, "Recovery action succeeded");
                return Some(RecoveryOutcome {
                    level,
                    action,
                    success: true,
                    attempted,
                    finished_at: Utc::now(),
                });
            }

            warn!(target: "opwatch::recovery", level = %level, action = %action, "Recovery action did not succeed");
        }

        let last_action = *attempted.last()?;
        let err = SupervisorError::RecoveryExhausted { level, last_action };
        error!(target: "opwatch::recovery", level = %level, attempted = attempted.len(), error = %err, "Recovery exhausted");

        Some(RecoveryOutcome {
            level,
            action: last_action,
            success: false,
            attempted,
            finished_at: Utc::now(),
        })
    }
}

async fn run_action(action: RecoveryAction, target: &dyn RecoveryTarget) -> bool {
    match action {
        RecoveryAction::CleanupResources => {
            target.cleanup_resources().await;
            true
        }
        RecoveryAction::ReduceLoad => target.reduce_load().await,
        RecoveryAction::RestartComponent => target.restart_failed_components().await > 0,
        RecoveryAction::RestartSystem => target.restart_system().await,
        RecoveryAction::FallbackMode => {
            target.enter_fallback_mode().await;
            true
        }
        RecoveryAction::EmergencyShutdown => {
            target.emergency_shutdown().await;
            true
        }
    }
}
