//! Shared data structures for the operation supervisor
//!
//! - `HealthLevel`, `OperationStatus`, `ComponentStatus`: ordered levels and
//!   the two lifecycle state machines
//! - `SystemMetrics`: one snapshot per monitoring tick
//! - `RecoveryAction`, `RecoveryOutcome`: remediation steps and their results
//! - `OperationStatusSnapshot`: the serializable status record

mod health;
mod metrics;
mod recovery;
mod status;

pub use health::*;
pub use metrics::*;
pub use recovery::*;
pub use status::*;
