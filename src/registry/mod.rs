//! Component Registry
//!
//! Owns the set of registered components and their failure bookkeeping.
//! All mutation happens under the registry's own lock, which is never held
//! while a component callback runs: a tick snapshots the components, releases
//! the lock, probes them, then re-acquires the lock to apply the results.

mod component;

pub use component::{Component, FnComponent};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SupervisorError};
use crate::types::{ComponentSnapshot, ComponentStatus, HealthLevel};

/// Upper bound on health checks in flight during one tick.
const MAX_PARALLEL_CHECKS: usize = 8;

type CheckResult = (String, std::result::Result<(), SupervisorError>);

struct Entry {
    component: Arc<dyn Component>,
    status: ComponentStatus,
    critical: bool,
    failure_count: u32,
    max_failures: u32,
    last_health_check: Option<DateTime<Utc>>,
    last_error: Option<String>,
    /// Tick sequence of the last restart attempt
    last_restart_tick: Option<u64>,
}

impl Entry {
    fn snapshot(&self, name: &str) -> ComponentSnapshot {
        ComponentSnapshot {
            name: name.to_string(),
            status: self.status,
            failure_count: self.failure_count,
            max_failures: self.max_failures,
            critical: self.critical,
            last_health_check: self.last_health_check,
            last_error: self.last_error.clone(),
        }
    }

    /// Level this component contributes to the aggregate.
    fn contribution(&self) -> HealthLevel {
        match (self.status, self.critical) {
            (ComponentStatus::Error, true) => HealthLevel::Critical,
            (ComponentStatus::Error, false) => HealthLevel::Warning,
            _ => HealthLevel::Excellent,
        }
    }

    fn record_success(&mut self, at: DateTime<Utc>) {
        self.failure_count = 0;
        self.status = ComponentStatus::Running;
        self.last_error = None;
        self.last_health_check = Some(at);
    }

    /// Count one failed check. Once in `Error` the counter holds at the
    /// threshold until a restart or a passing check resets it.
    fn record_failure(&mut self, at: DateTime<Utc>, reason: String) {
        if self.status != ComponentStatus::Error {
            self.failure_count += 1;
            self.status = if self.failure_count >= self.max_failures {
                ComponentStatus::Error
            } else {
                ComponentStatus::Failing
            };
        }
        self.last_error = Some(reason);
        self.last_health_check = Some(at);
    }
}

#[derive(Default)]
struct RegistryInner {
    entries: BTreeMap<String, Entry>,
    tick_seq: u64,
}

/// Outcome of one registry tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// Worst level contributed by any component in `Error`
    pub worst: HealthLevel,
    pub components: Vec<ComponentSnapshot>,
    /// Health checks that failed, timed out or panicked during this tick
    pub failed_checks: u32,
    /// Failed checks that feed the error score: critical components that
    /// were not already in `Error`. A non-critical outage is expressed only
    /// through its `Warning` contribution.
    pub scored_failures: u32,
    /// Every non-paused component passed its latest check
    pub all_running: bool,
}

/// Outcome of one `restart_failed` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestartSummary {
    pub attempted: usize,
    pub restarted: usize,
    /// Failed restarts of critical components
    pub failed_critical: usize,
}

/// Thread-safe set of supervised components.
pub struct ComponentRegistry {
    inner: Mutex<RegistryInner>,
    callback_timeout: Duration,
}

impl ComponentRegistry {
    pub fn new(callback_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            callback_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|e| {
            warn!("Registry mutex poisoned, recovering");
            e.into_inner()
        })
    }

    /// Register a component under a unique name.
    ///
    /// Safe to call while the monitoring loop is ticking; the new component
    /// is picked up by the next tick. A `max_failures` of 0 is treated as 1.
    pub fn register(
        &self,
        name: impl Into<String>,
        component: Arc<dyn Component>,
        critical: bool,
        max_failures: u32,
    ) -> Result<()> {
        let name = name.into();
        let mut inner = self.lock();
        if inner.entries.contains_key(&name) {
            return Err(SupervisorError::ComponentRegistration { name });
        }

        info!(component = %name, critical, max_failures, "Component registered");
        inner.entries.insert(
            name,
            Entry {
                component,
                status: ComponentStatus::Starting,
                critical,
                failure_count: 0,
                max_failures: max_failures.max(1),
                last_health_check: None,
                last_error: None,
                last_restart_tick: None,
            },
        );
        Ok(())
    }

    /// Register a pair of blocking closures.
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
        self.register(
            name,
            Arc::new(FnComponent::new(health_check, restart)),
            critical,
            max_failures,
        )
    }

    /// Remove a component. Returns whether it was registered.
    pub fn deregister(&self, name: &str) -> bool {
        let removed = self.lock().entries.remove(name).is_some();
        if removed {
            info!(component = %name, "Component deregistered");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every component's bookkeeping, ordered by name.
    pub fn snapshot(&self) -> Vec<ComponentSnapshot> {
        self.lock()
            .entries
            .iter()
            .map(|(name, e)| e.snapshot(name))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<ComponentSnapshot> {
        self.lock().entries.get(name).map(|e| e.snapshot(name))
    }

    /// Worst level currently contributed by components in `Error`.
    pub fn worst_level(&self) -> HealthLevel {
        self.lock()
            .entries
            .values()
            .map(Entry::contribution)
            .max()
            .unwrap_or_default()
    }

    /// Probe every non-paused component exactly once.
    pub async fn tick(&self) -> TickReport {
        let targets: Vec<(String, Arc<dyn Component>)> = {
            let mut inner = self.lock();
            inner.tick_seq += 1;
            inner
                .entries
                .iter()
                .filter(|(_, e)| e.status != ComponentStatus::Paused)
                .map(|(name, e)| (name.clone(), Arc::clone(&e.component)))
                .collect()
        };

        let timeout = self.callback_timeout;
        let checks: Vec<BoxFuture<'static, CheckResult>> = targets
            .into_iter()
            .map(|(name, component)| {
                async move {
                    let outcome = probe(&name, component, timeout).await;
                    (name, outcome)
                }
                .boxed()
            })
            .collect();
        let results: Vec<CheckResult> = stream::iter(checks)
            .buffer_unordered(MAX_PARALLEL_CHECKS)
            .collect()
            .await;

        let now = Utc::now();
        let mut failed_checks = 0;
        let mut scored_failures = 0;
        let mut inner = self.lock();

        for (name, outcome) in results {
            // Deregistered or paused while the probe was in flight
            let Some(entry) = inner.entries.get_mut(&name) else {
                continue;
            };
            if entry.status == ComponentStatus::Paused {
                continue;
            }

            match outcome {
                Ok(()) => {
                    if entry.failure_count > 0 || entry.status != ComponentStatus::Running {
                        info!(component = %name, previous = %entry.status, "Component healthy");
                    }
                    entry.record_success(now);
                }
                Err(e) => {
                    failed_checks += 1;
                    let was_error = entry.status == ComponentStatus::Error;
                    if entry.critical && !was_error {
                        scored_failures += 1;
                    }
                    entry.record_failure(now, e.to_string());
                    if entry.status == ComponentStatus::Error && !was_error {
                        error!(
                            component = %name,
                            critical = entry.critical,
                            failures = entry.failure_count,
                            error = %e,
                            "Component reached failure threshold"
                        );
                    } else {
                        warn!(
                            component = %name,
                            failures = entry.failure_count,
                            max_failures = entry.max_failures,
                            error = %e,
                            "Component health check failed"
                        );
                    }
                }
            }
        }

        let worst = inner
            .entries
            .values()
            .map(Entry::contribution)
            .max()
            .unwrap_or_default();
        let all_running = inner
            .entries
            .values()
            .filter(|e| e.status != ComponentStatus::Paused)
            .all(|e| e.status == ComponentStatus::Running);
        let components = inner
            .entries
            .iter()
            .map(|(name, e)| e.snapshot(name))
            .collect();

        TickReport {
            worst,
            components,
            failed_checks,
            scored_failures,
            all_running,
        }
    }

    /// Restart every component in `Error`; returns how many came back.
    pub async fn restart_failed(&self) -> usize {
        self.restart_failed_detailed().await.restarted
    }

    /// Like [`restart_failed`](Self::restart_failed) but also reports attempts.
    ///
    /// A component is attempted at most once per monitoring tick; a second
    /// call before the next tick skips it.
    pub async fn restart_failed_detailed(&self) -> RestartSummary {
        let targets: Vec<(String, Arc<dyn Component>, bool)> = {
            let mut inner = self.lock();
            let seq = inner.tick_seq;
            inner
                .entries
                .iter_mut()
                .filter(|(_, e)| e.status == ComponentStatus::Error)
                .filter(|(_, e)| e.last_restart_tick != Some(seq))
                .map(|(name, e)| {
                    e.last_restart_tick = Some(seq);
                    (name.clone(), Arc::clone(&e.component), e.critical)
                })
                .collect()
        };

        let mut summary = RestartSummary {
            attempted: targets.len(),
            ..RestartSummary::default()
        };

        for (name, component, critical) in targets {
            let outcome = guarded(&name, self.callback_timeout, async move {
                component.restart().await
            })
            .await;

            let mut inner = self.lock();
            let Some(entry) = inner.entries.get_mut(&name) else {
                continue;
            };
            match outcome {
                Ok(()) => {
                    entry.failure_count = 0;
                    entry.status = ComponentStatus::Running;
                    entry.last_error = None;
                    summary.restarted += 1;
                    info!(component = %name, "Component restarted");
                }
                Err(reason) => {
                    let err = SupervisorError::RestartFailure {
                        component: name.clone(),
                        reason,
                    };
                    error!(component = %name, error = %err, "Restart failed, leaving component in error");
                    entry.last_error = Some(err.to_string());
                    if critical {
                        summary.failed_critical += 1;
                    }
                }
            }
        }

        summary
    }

    /// Stop and restart every component, then re-probe the critical ones.
    ///
    /// Returns true iff every critical component is healthy afterwards.
    pub async fn restart_all(&self) -> bool {
        let targets: Vec<(String, Arc<dyn Component>, bool)> = self
            .lock()
            .entries
            .iter()
            .map(|(name, e)| (name.clone(), Arc::clone(&e.component), e.critical))
            .collect();

        let mut all_critical_healthy = true;
        let timeout = self.callback_timeout;

        for (name, component, critical) in targets {
            let c = Arc::clone(&component);
            if let Err(reason) = guarded(&name, timeout, async move { c.stop().await }).await {
                warn!(component = %name, reason = %reason, "Stop failed during system restart");
            }

            let c = Arc::clone(&component);
            let restarted = guarded(&name, timeout, async move { c.restart().await }).await;

            let healthy = match &restarted {
                Ok(()) if critical => probe(&name, component, timeout).await.is_ok(),
                Ok(()) => true,
                Err(_) => false,
            };

            let mut inner = self.lock();
            let Some(entry) = inner.entries.get_mut(&name) else {
                continue;
            };
            match restarted {
                Ok(()) => {
                    entry.failure_count = 0;
                    entry.last_error = None;
                    // Critical components were just probed; others wait for the next tick
                    entry.status = if critical && healthy {
                        ComponentStatus::Running
                    } else {
                        ComponentStatus::Starting
                    };
                }
                Err(reason) => {
                    error!(component = %name, reason = %reason, "Restart failed during system restart");
                    entry.status = ComponentStatus::Error;
                    entry.last_error = Some(reason);
                }
            }

            if critical && !healthy {
                all_critical_healthy = false;
            }
        }

        all_critical_healthy
    }

    /// Ask every active non-critical component to shed load.
    /// Returns the number that acknowledged.
    pub async fn throttle_non_critical(&self) -> usize {
        let targets = self.non_critical_where(|s| s != ComponentStatus::Paused);
        let mut acked = 0;
        for (name, component) in targets {
            let outcome = tokio::time::timeout(self.callback_timeout, component.throttle()).await;
            match outcome {
                Ok(true) => {
                    debug!(component = %name, "Component acknowledged throttling");
                    acked += 1;
                }
                Ok(false) => {}
                Err(_) => warn!(component = %name, "Throttle request timed out"),
            }
        }
        acked
    }

    /// Pause every non-critical component. Returns how many were paused.
    pub async fn pause_non_critical(&self) -> usize {
        let targets: Vec<(String, Arc<dyn Component>)> = {
            let mut inner = self.lock();
            inner
                .entries
                .iter_mut()
                .filter(|(_, e)| !e.critical && e.status != ComponentStatus::Paused)
                .map(|(name, e)| {
                    e.status = ComponentStatus::Paused;
                    (name.clone(), Arc::clone(&e.component))
                })
                .collect()
        };

        for (name, component) in &targets {
            if tokio::time::timeout(self.callback_timeout, component.pause()).await.is_err() {
                warn!(component = %name, "Pause request timed out");
            }
        }
        targets.len()
    }

    /// Resume paused components; they re-enter as `Starting` with a clean counter.
    pub async fn resume_paused(&self) -> usize {
        let targets: Vec<(String, Arc<dyn Component>)> = {
            let mut inner = self.lock();
            inner
                .entries
                .iter_mut()
                .filter(|(_, e)| e.status == ComponentStatus::Paused)
                .map(|(name, e)| {
                    e.status = ComponentStatus::Starting;
                    e.failure_count = 0;
                    (name.clone(), Arc::clone(&e.component))
                })
                .collect()
        };

        for (name, component) in &targets {
            if tokio::time::timeout(self.callback_timeout, component.resume()).await.is_err() {
                warn!(component = %name, "Resume request timed out");
            }
        }
        targets.len()
    }

    fn non_critical_where(
        &self,
        pred: impl Fn(ComponentStatus) -> bool,
    ) -> Vec<(String, Arc<dyn Component>)> {
        self.lock()
            .entries
            .iter()
            .filter(|(_, e)| !e.critical && pred(e.status))
            .map(|(name, e)| (name.clone(), Arc::clone(&e.component)))
            .collect()
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("components", &self.len())
            .field("callback_timeout", &self.callback_timeout)
            .finish()
    }
}

/// Run one health check with timeout and panic isolation.
async fn probe(
    name: &str,
    component: Arc<dyn Component>,
    timeout: Duration,
) -> std::result::Result<(), SupervisorError> {
    let handle = tokio::spawn(async move {
        tokio::time::timeout(timeout, component.health_check()).await
    });

    match handle.await {
        Ok(Ok(Ok(true))) => Ok(()),
        Ok(Ok(Ok(false))) => Err(SupervisorError::HealthCheckFailure {
            component: name.to_string(),
            reason: "check returned false".to_string(),
        }),
        Ok(Ok(Err(e))) => Err(SupervisorError::HealthCheckFailure {
            component: name.to_string(),
            reason: format!("{e:#}"),
        }),
        Ok(Err(_)) => Err(SupervisorError::HealthCheckTimeout {
            component: name.to_string(),
            timeout,
        }),
        Err(join) => Err(SupervisorError::HealthCheckFailure {
            component: name.to_string(),
            reason: format!("check panicked: {join}"),
        }),
    }
}

/// Run a fallible lifecycle callback with timeout and panic isolation.
async fn guarded<F>(name: &str, timeout: Duration, fut: F) -> std::result::Result<(), String>
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    match tokio::spawn(tokio::time::timeout(timeout, fut)).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(e))) => Err(format!("{e:#}")),
        Ok(Err(_)) => Err(format!("{name}: timed out after {timeout:?}")),
        Err(join) => Err(format!("{name}: panicked: {join}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Plays back a fixed script of check results, then repeats the last one.
    struct Scripted {
        results: Mutex<VecDeque<bool>>,
        last: AtomicBool,
        restarts: AtomicUsize,
        restart_ok: bool,
        throttles: bool,
    }

    impl Scripted {
        fn new(script: &[bool]) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(script.iter().copied().collect()),
                last: AtomicBool::new(*script.last().unwrap_or(&true)),
                restarts: AtomicUsize::new(0),
                restart_ok: true,
                throttles: false,
            })
        }

        fn with(script: &[bool], restart_ok: bool, throttles: bool) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(script.iter().copied().collect()),
                last: AtomicBool::new(*script.last().unwrap_or(&true)),
                restarts: AtomicUsize::new(0),
                restart_ok,
                throttles,
            })
        }
    }

    #[async_trait::async_trait]
    impl Component for Scripted {
        async fn health_check(&self) -> anyhow::Result<bool> {
            let next = self.results.lock().unwrap().pop_front();
            Ok(next.unwrap_or_else(|| self.last.load(Ordering::SeqCst)))
        }

        async fn restart(&self) -> anyhow::Result<()> {
            self.restarts.fetch_add(1, Ordering::SeqCst);
            if self.restart_ok {
                Ok(())
            } else {
                anyhow::bail!("restart refused")
            }
        }

        async fn throttle(&self) -> bool {
            self.throttles
        }
    }

    struct Hangs;

    #[async_trait::async_trait]
    impl Component for Hangs {
        async fn health_check(&self) -> anyhow::Result<bool> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(true)
        }

        async fn restart(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct Panics;

    #[async_trait::async_trait]
    impl Component for Panics {
        async fn health_check(&self) -> anyhow::Result<bool> {
            panic!("probe blew up")
        }

        async fn restart(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn registry() -> ComponentRegistry {
        ComponentRegistry::new(Duration::from_millis(200))
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let reg = registry();
        reg.register("db", Scripted::new(&[true]), true, 3).unwrap();
        let err = reg.register("db", Scripted::new(&[true]), false, 3).unwrap_err();
        assert!(matches!(err, SupervisorError::ComponentRegistration { name } if name == "db"));
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_count_caps_at_threshold() {
        let reg = registry();
        reg.register("db", Scripted::new(&[false]), false, 3).unwrap();

        for _ in 0..6 {
            reg.tick().await;
        }

        let snap = reg.get("db").unwrap();
        assert_eq!(snap.status, ComponentStatus::Error);
        assert_eq!(snap.failure_count, 3);
    }

    #[tokio::test]
    async fn test_success_resets_counter() {
        let reg = registry();
        reg.register("db", Scripted::new(&[false, false, true]), false, 5).unwrap();

        reg.tick().await;
        reg.tick().await;
        assert_eq!(reg.get("db").unwrap().failure_count, 2);
        assert_eq!(reg.get("db").unwrap().status, ComponentStatus::Failing);

        reg.tick().await;
        let snap = reg.get("db").unwrap();
        assert_eq!(snap.failure_count, 0);
        assert_eq!(snap.status, ComponentStatus::Running);
        assert!(snap.last_error.is_none());
    }

    #[tokio::test]
    async fn test_non_critical_error_contributes_warning() {
        let reg = registry();
        reg.register("cache", Scripted::new(&[false]), false, 1).unwrap();
        let report = reg.tick().await;
        assert_eq!(report.worst, HealthLevel::Warning);
        assert_eq!(report.failed_checks, 1);
        assert_eq!(report.scored_failures, 0);
        assert!(!report.all_running);
    }

    #[tokio::test]
    async fn test_only_fresh_critical_failures_are_scored() {
        let reg = registry();
        reg.register("db", Scripted::new(&[false]), true, 2).unwrap();
        reg.register("cache", Scripted::new(&[false]), false, 2).unwrap();

        // Failing, then Error: both counted for db only
        assert_eq!(reg.tick().await.scored_failures, 1);
        assert_eq!(reg.tick().await.scored_failures, 1);

        // Already in Error: still a failed check, no longer scored
        let report = reg.tick().await;
        assert_eq!(report.failed_checks, 2);
        assert_eq!(report.scored_failures, 0);
    }

    #[tokio::test]
    async fn test_critical_error_contributes_critical() {
        let reg = registry();
        reg.register("db", Scripted::new(&[false]), true, 1).unwrap();
        reg.register("cache", Scripted::new(&[false]), false, 1).unwrap();
        let report = reg.tick().await;
        assert_eq!(report.worst, HealthLevel::Critical);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let reg = registry();
        reg.register("slow", Arc::new(Hangs), false, 2).unwrap();
        let report = reg.tick().await;
        assert_eq!(report.failed_checks, 1);
        let snap = reg.get("slow").unwrap();
        assert_eq!(snap.failure_count, 1);
        assert!(snap.last_error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_panicking_check_counts_as_failure() {
        let reg = registry();
        reg.register("bad", Arc::new(Panics), false, 2).unwrap();
        let report = reg.tick().await;
        assert_eq!(report.failed_checks, 1);
        assert_eq!(reg.get("bad").unwrap().failure_count, 1);
    }

    #[tokio::test]
    async fn test_restart_failed_resets_errored_components() {
        let reg = registry();
        let db = Scripted::new(&[false]);
        reg.register("db", db.clone(), true, 1).unwrap();
        reg.register("ok", Scripted::new(&[true]), false, 1).unwrap();
        reg.tick().await;

        assert_eq!(reg.restart_failed().await, 1);
        assert_eq!(db.restarts.load(Ordering::SeqCst), 1);
        let snap = reg.get("db").unwrap();
        assert_eq!(snap.status, ComponentStatus::Running);
        assert_eq!(snap.failure_count, 0);
    }

    #[tokio::test]
    async fn test_restart_failure_leaves_error_and_is_rate_limited() {
        let reg = registry();
        let db = Scripted::with(&[false], false, false);
        reg.register("db", db.clone(), true, 1).unwrap();
        reg.tick().await;

        let summary = reg.restart_failed_detailed().await;
        assert_eq!(
            summary,
            RestartSummary {
                attempted: 1,
                restarted: 0,
                failed_critical: 1,
            }
        );
        assert_eq!(reg.get("db").unwrap().status, ComponentStatus::Error);

        // Same tick: no second attempt
        assert_eq!(reg.restart_failed_detailed().await.attempted, 0);
        assert_eq!(db.restarts.load(Ordering::SeqCst), 1);

        // Next tick re-opens the slot
        reg.tick().await;
        assert_eq!(reg.restart_failed_detailed().await.attempted, 1);
        assert_eq!(db.restarts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_restart_all_reports_critical_health() {
        let reg = registry();
        reg.register("db", Scripted::new(&[false, false, true]), true, 1).unwrap();
        reg.register("cache", Scripted::new(&[false]), false, 1).unwrap();
        reg.tick().await;
        reg.tick().await;

        // Critical component's post-restart probe returns true
        assert!(reg.restart_all().await);
        assert_eq!(reg.get("db").unwrap().status, ComponentStatus::Running);
        assert_eq!(reg.get("cache").unwrap().status, ComponentStatus::Starting);
        assert_eq!(reg.get("cache").unwrap().failure_count, 0);
    }

    #[tokio::test]
    async fn test_restart_all_fails_when_critical_stays_down() {
        let reg = registry();
        reg.register("db", Scripted::new(&[false]), true, 1).unwrap();
        assert!(!reg.restart_all().await);
    }

    #[tokio::test]
    async fn test_throttle_counts_acknowledgements() {
        let reg = registry();
        reg.register("batch", Scripted::with(&[true], true, true), false, 3).unwrap();
        reg.register("reports", Scripted::with(&[true], true, false), false, 3).unwrap();
        // Critical components are never asked to throttle
        reg.register("db", Scripted::with(&[true], true, true), true, 3).unwrap();
        assert_eq!(reg.throttle_non_critical().await, 1);
    }

    #[tokio::test]
    async fn test_pause_skips_checks_until_resumed() {
        let reg = registry();
        let batch = Scripted::new(&[false]);
        reg.register("batch", batch, false, 1).unwrap();
        reg.register("db", Scripted::new(&[true]), true, 1).unwrap();

        assert_eq!(reg.pause_non_critical().await, 1);
        let report = reg.tick().await;
        assert_eq!(report.failed_checks, 0);
        assert!(report.all_running);
        assert_eq!(reg.get("batch").unwrap().status, ComponentStatus::Paused);

        assert_eq!(reg.resume_paused().await, 1);
        assert_eq!(reg.get("batch").unwrap().status, ComponentStatus::Starting);
        let report = reg.tick().await;
        assert_eq!(report.failed_checks, 1);
    }

    #[tokio::test]
    async fn test_deregister_removes_component() {
        let reg = registry();
        reg.register_fn("x", || true, || Ok(()), false, 1).unwrap();
        assert!(reg.deregister("x"));
        assert!(!reg.deregister("x"));
        assert!(reg.is_empty());
        assert!(reg.tick().await.all_running);
    }
}
