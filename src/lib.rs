//! opwatch: continuous operation supervisor
//!
//! Registers operational components, measures host and component health on
//! a fixed tick, folds both into a single [`HealthLevel`], and runs an
//! escalating list of recovery actions while health is degraded.
//!
//! ## Architecture
//!
//! - **Component Registry**: components, failure counters, restarts
//! - **Metrics Collector**: host CPU, memory, disk and thread samples
//! - **Health Evaluator**: pure scoring of one tick into a level
//! - **Recovery Engine**: level to ordered strategy, first success wins
//! - **Operation Controller**: the monitoring and recovery loops, status
//!   state machine, bounded history and shutdown
//!
//! ```no_run
//! use opwatch::{OperationController, SupervisorConfig};
//!
//! # async fn demo() -> opwatch::Result<()> {
//! let controller = OperationController::new(SupervisorConfig::default());
//! controller.register_fn("cache", || true, || Ok(()), false, 3)?;
//! controller.start().await;
//! // ...
//! controller.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod probes;
pub mod recovery;
pub mod registry;
pub mod types;

pub use config::SupervisorConfig;
pub use controller::OperationController;
pub use error::{Result, SupervisorError};
pub use health::HealthEvaluator;
pub use metrics::{FixedMetrics, MetricsCollector, MetricsSource};
pub use recovery::{RecoveryEngine, RecoveryTarget};
pub use registry::{Component, ComponentRegistry, FnComponent};

pub use types::{
    ComponentSnapshot, ComponentStatus, HealthLevel, OperationStatus, OperationStatusSnapshot,
    RecoveryAction, RecoveryOutcome, SystemMetrics,
};
