//! Supervisor Configuration Module
//!
//! Intervals, health thresholds, recovery strategies and built-in probe
//! components, loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line
//! 2. `OPWATCH_CONFIG` environment variable (path to TOML file)
//! 3. `opwatch.toml` in the current working directory
//! 4. Built-in defaults
//!
//! ## Usage
//!
//! ```ignore
//! let config = SupervisorConfig::load();
//! let controller = OperationController::new(config);
//! ```

mod supervisor_config;
pub mod defaults;
pub mod validation;

pub use supervisor_config::*;
