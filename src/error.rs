//! Supervisor error taxonomy
//!
//! Health-check and restart failures are always handled locally by the
//! registry; these values exist so that they can be logged with structure
//! and returned from the few operations that can fail outright.

use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;
use crate::types::{HealthLevel, RecoveryAction};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Component '{name}' is already registered")]
    ComponentRegistration { name: String },

    #[error("Health check for '{component}' timed out after {timeout:?}")]
    HealthCheckTimeout { component: String, timeout: Duration },

    #[error("Health check for '{component}' failed: {reason}")]
    HealthCheckFailure { component: String, reason: String },

    #[error("Restart of '{component}' failed: {reason}")]
    RestartFailure { component: String, reason: String },

    #[error("Metrics sample failed: {0}")]
    MetricsSampleFailure(String),

    #[error("Recovery exhausted at level {level}: last action {last_action} did not succeed")]
    RecoveryExhausted {
        level: HealthLevel,
        last_action: RecoveryAction,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
