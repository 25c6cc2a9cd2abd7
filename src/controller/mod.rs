//! Operation Controller
//!
//! Top-level orchestrator. Owns the component registry, the metrics source,
//! the health evaluator and the recovery engine, and runs two background
//! loops until shutdown:
//!
//! - **monitoring**: sample metrics, tick the registry, evaluate health,
//!   advance the operation status and append to history
//! - **recovery**: every poll interval, if the last evaluated level is
//!   degraded, run the matching recovery strategy
//!
//! The status lock is only held for short state updates, never across a
//! health check, a metrics sample or a recovery action, so a tick does not
//! wait on a recovery pass and `status()` never waits on a component
//! callback. Recovery effects on shared state (history trim, interval,
//! fallback) are picked up by the next tick. Both loops race their work
//! against the cancellation token and exit as soon as shutdown begins.

mod state;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SupervisorConfig;
use crate::error::Result;
use crate::health::HealthEvaluator;
use crate::metrics::{MetricsCollector, MetricsSource};
use crate::recovery::{RecoveryEngine, RecoveryTarget};
use crate::registry::{Component, ComponentRegistry};
use crate::types::{
    HealthLevel, OperationStatus, OperationStatusSnapshot, RecoveryOutcome, SystemMetrics,
};

use state::ControllerState;

/// Shared between the controller handle and its background loops.
struct Shared {
    config: SupervisorConfig,
    registry: ComponentRegistry,
    metrics: Arc<dyn MetricsSource>,
    evaluator: HealthEvaluator,
    engine: RecoveryEngine,
    state: Mutex<ControllerState>,
    /// At most one recovery pass in flight
    recovery_gate: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
}

/// Continuous operation supervisor.
pub struct OperationController {
    shared: Arc<Shared>,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl OperationController {
    /// Controller sampling the local host.
    pub fn new(config: SupervisorConfig) -> Self {
        let collector = MetricsCollector::new(
            config.health.disk_path.clone(),
            config.supervisor.metrics_timeout(),
        );
        Self::with_metrics_source(config, Arc::new(collector))
    }

    /// Controller with a caller-supplied metrics source.
    pub fn with_metrics_source(config: SupervisorConfig, metrics: Arc<dyn MetricsSource>) -> Self {
        let shared = Shared {
            registry: ComponentRegistry::new(config.supervisor.callback_timeout()),
            evaluator: HealthEvaluator::new(config.health.clone()),
            engine: RecoveryEngine::new(config.recovery.clone()),
            state: Mutex::new(ControllerState::new(&config)),
            recovery_gate: tokio::sync::Mutex::new(()),
            cancel: CancellationToken::new(),
            metrics,
            config,
        };
        Self {
            shared: Arc::new(shared),
            tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.shared.config
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.shared.registry
    }

    /// Register a component; safe while the loops are running.
    pub fn register_component(
        &self,
        name: impl Into<String>,
        component: Arc<dyn Component>,
        critical: bool,
        max_failures: u32,
    ) -> Result<()> {
        self.shared.registry.register(name, component, critical, max_failures)
    }

    /// Register a pair of blocking closures as a component.
    pub fn register_fn<C, R>(
        &self,
        name: impl Into<String>,
        health_check: C,
        restart: R,
        critical: bool,
        max_failures: u32,
    ) -> Result<()>
    where
        C: Fn() -> bool + Send + Sync + 'static,
        R: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.shared
            .registry
            .register_fn(name, health_check, restart, critical, max_failures)
    }

    pub fn deregister_component(&self, name: &str) -> bool {
        self.shared.registry.deregister(name)
    }

    /// Spawn the monitoring and recovery loops.
    ///
    /// The first monitoring tick runs immediately. Calling `start` twice, or
    /// after shutdown has begun, does nothing.
    pub async fn start(&self) {
        let mut tasks = self.tasks.lock().await;
        if !tasks.is_empty() || self.shared.cancel.is_cancelled() {
            warn!("Supervisor already started or shutting down, ignoring start");
            return;
        }

        {
            let mut st = self.shared.lock_state();
            st.started_at = Some(tokio::time::Instant::now());
        }

        info!(
            components = self.shared.registry.len(),
            interval_secs = self.shared.config.supervisor.health_check_interval_secs,
            recovery_poll_secs = self.shared.config.supervisor.recovery_poll_interval_secs,
            "Supervisor started"
        );

        tasks.push(tokio::spawn(monitoring_loop(Arc::clone(&self.shared))));
        tasks.push(tokio::spawn(recovery_loop(Arc::clone(&self.shared))));
    }

    /// Run one monitoring tick now and return the evaluated level.
    pub async fn tick_once(&self) -> HealthLevel {
        self.shared.tick().await
    }

    /// Run one recovery pass now.
    ///
    /// Returns `None` when health is not degraded, the supervisor is
    /// shutting down, or another pass is already in flight.
    pub async fn recover_once(&self) -> Option<RecoveryOutcome> {
        self.shared.recover().await
    }

    /// Consistent point-in-time view for callers and the HTTP API.
    pub fn status(&self) -> OperationStatusSnapshot {
        let components: BTreeMap<_, _> = self
            .shared
            .registry
            .snapshot()
            .into_iter()
            .map(|c| (c.name.clone(), c))
            .collect();

        let st = self.shared.lock_state();
        OperationStatusSnapshot {
            status: st.status,
            uptime_seconds: st.uptime_seconds(),
            health_level: st.health_level,
            components,
            metrics: st.latest.as_ref().map(SystemMetrics::summary),
            fallback_mode: st.fallback_mode,
            monitoring_interval_secs: st.monitoring_interval.as_secs(),
            ticks: st.ticks,
            last_recovery: st.last_recovery.clone(),
        }
    }

    /// Most recent `limit` history entries, oldest first.
    pub fn history(&self, limit: Option<usize>) -> Vec<SystemMetrics> {
        let st = self.shared.lock_state();
        let take = limit.unwrap_or(st.history.len()).min(st.history.len());
        st.history.iter().skip(st.history.len() - take).cloned().collect()
    }

    pub fn current_interval(&self) -> Duration {
        self.shared.lock_state().monitoring_interval
    }

    /// Token cancelled when shutdown begins, including emergency shutdown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Stop both loops and wait for them to exit.
    ///
    /// Idempotent; concurrent callers all return once the loops are joined.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;

        {
            let mut st = self.shared.lock_state();
            if st.status == OperationStatus::Stopped {
                return;
            }
            if st.status != OperationStatus::Stopping {
                info!(from = %st.status, "Supervisor shutting down");
                st.status = OperationStatus::Stopping;
            }
        }

        self.shared.cancel.cancel();

        for handle in tasks.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "Supervisor loop ended abnormally");
            }
        }

        self.shared.lock_state().status = OperationStatus::Stopped;
        info!("Supervisor stopped");
    }
}

impl std::fmt::Debug for OperationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationController")
            .field("status", &self.shared.lock_state().status)
            .field("components", &self.shared.registry.len())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(|e| {
            warn!("Controller state mutex poisoned, recovering");
            e.into_inner()
        })
    }

    /// Sample the metrics source, bounded by the callback timeout.
    async fn sample(&self) -> SystemMetrics {
        let limit = self.config.supervisor.callback_timeout();
        match tokio::time::timeout(limit, self.metrics.sample()).await {
            Ok(metrics) => metrics,
            Err(_) => {
                warn!(timeout = ?limit, "Metrics source did not answer, using degraded sample");
                SystemMetrics::degraded()
            }
        }
    }

    async fn tick(&self) -> HealthLevel {
        let mut metrics = self.sample().await;
        let report = self.registry.tick().await;

        let (level, exit_fallback) = {
            let mut st = self.lock_state();
            st.record_errors(report.scored_failures as usize);
            let (errors, recoveries) = st.recent_counts();

            metrics.uptime_seconds = st.uptime_seconds();
            metrics.recent_error_count = errors;
            metrics.recent_recovery_count = recoveries;

            let level = self.evaluator.evaluate(&metrics, report.worst);
            let previous = st.status;
            let next = previous.after_tick(level, report.all_running);

            let exit_fallback = next == OperationStatus::Running
                && previous != OperationStatus::Running
                && st.restore_normal_operation();
            if next == OperationStatus::Running && previous != OperationStatus::Running {
                debug!(interval_secs = st.base_interval.as_secs(), "Monitoring interval restored");
            }
            if next != previous {
                info!(from = %previous, to = %next, level = %level, "Operation status changed");
            }

            metrics.health_level = level;
            metrics.operation_status = next;

            st.status = next;
            st.health_level = level;
            st.ticks += 1;

            info!(
                target: "opwatch::tick",
                tick = st.ticks,
                status = %next,
                level = %level,
                cpu = metrics.cpu_usage,
                memory = metrics.memory_usage,
                disk = metrics.disk_usage,
                tasks = metrics.active_task_count,
                failed_checks = report.failed_checks,
                errors,
                recoveries,
                "Monitoring tick"
            );

            st.latest = Some(metrics.clone());
            st.push_history(metrics);
            (level, exit_fallback)
        };

        if exit_fallback {
            let resumed = self.registry.resume_paused().await;
            info!(resumed, "Health restored, leaving fallback mode");
        }

        level
    }

    async fn recover(&self) -> Option<RecoveryOutcome> {
        let Ok(_in_flight) = self.recovery_gate.try_lock() else {
            debug!("Recovery already in flight, skipping");
            return None;
        };

        let level = {
            let mut st = self.lock_state();
            if st.status.is_shutting_down() || !st.health_level.is_degraded() {
                return None;
            }
            let next = st.status.on_recovery_started();
            if next != st.status {
                info!(from = %st.status, to = %next, level = %st.health_level, "Operation status changed");
                st.status = next;
            }
            st.health_level
        };

        let outcome = self.engine.execute(level, self).await?;

        let mut st = self.lock_state();
        st.record_recovery();
        st.last_recovery = Some(outcome.clone());
        Some(outcome)
    }
}

#[async_trait]
impl RecoveryTarget for Shared {
    async fn cleanup_resources(&self) {
        let mut st = self.lock_state();
        st.trim_requested = true;
        info!(
            target: "opwatch::recovery",
            history = st.history.len(),
            "History trim scheduled for next tick"
        );
    }

    async fn reduce_load(&self) -> bool {
        let interval = self.lock_state().slow_down();
        let acked = self.registry.throttle_non_critical().await;
        info!(
            target: "opwatch::recovery",
            interval_secs = interval.as_secs(),
            throttled = acked,
            "Load reduced"
        );
        acked > 0
    }

    async fn restart_failed_components(&self) -> usize {
        let summary = self.registry.restart_failed_detailed().await;
        if summary.failed_critical > 0 {
            self.lock_state().record_errors(summary.failed_critical);
        }
        info!(
            target: "opwatch::recovery",
            attempted = summary.attempted,
            restarted = summary.restarted,
            "Failed components restarted"
        );
        summary.restarted
    }

    async fn restart_system(&self) -> bool {
        let healthy = self.registry.restart_all().await;
        if healthy {
            self.lock_state().restore_normal_operation();
        }
        info!(target: "opwatch::recovery", critical_healthy = healthy, "System restarted");
        healthy
    }

    async fn enter_fallback_mode(&self) {
        self.lock_state().fallback_mode = true;
        let paused = self.registry.pause_non_critical().await;
        warn!(target: "opwatch::recovery", paused, "Entered fallback mode");
    }

    async fn emergency_shutdown(&self) {
        {
            let mut st = self.lock_state();
            error!(target: "opwatch::recovery", from = %st.status, "Emergency shutdown");
            st.status = OperationStatus::Stopping;
        }
        self.cancel.cancel();
    }
}

async fn monitoring_loop(shared: Arc<Shared>) {
    debug!("Monitoring loop started");
    while !shared.cancel.is_cancelled() {
        tokio::select! {
            () = shared.cancel.cancelled() => break,
            _ = shared.tick() => {}
        }

        let interval = shared.lock_state().monitoring_interval;
        tokio::select! {
            () = shared.cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }
    debug!("Monitoring loop stopped");
}

async fn recovery_loop(shared: Arc<Shared>) {
    debug!("Recovery loop started");
    let poll = shared.config.supervisor.recovery_poll_interval();
    loop {
        tokio::select! {
            () = shared.cancel.cancelled() => break,
            () = tokio::time::sleep(poll) => {}
        }
        tokio::select! {
            biased;
            _ = shared.recover() => {}
            () = shared.cancel.cancelled() => break,
        }
    }
    debug!("Recovery loop stopped");
}
