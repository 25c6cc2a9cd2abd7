//! Metrics Collector
//!
//! Samples host CPU and memory utilisation (via `sysinfo`), usage of the
//! supervised filesystem (via `statvfs`), and the process thread count.
//! Sampling runs on the blocking pool under a timeout; any failure yields
//! [`SystemMetrics::degraded`] instead of an error. At most one sampler
//! thread exists at a time: while an overdue read is still running, new
//! samples fail fast instead of queueing another thread behind it.

pub mod disk;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::System;
use tracing::{debug, warn};

use crate::error::SupervisorError;
use crate::types::SystemMetrics;

/// Anything that can produce a metrics snapshot for a monitoring tick.
///
/// Must never block indefinitely and never fail: implementations return a
/// degraded sample when the underlying source is unavailable.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn sample(&self) -> SystemMetrics;
}

/// Host resource sampler.
pub struct MetricsCollector {
    system: Arc<Mutex<System>>,
    disk_path: PathBuf,
    timeout: Duration,
    /// Set while a sampler thread is running
    in_flight: Arc<AtomicBool>,
}

/// Clears the in-flight flag when the sampler thread finishes or unwinds.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl MetricsCollector {
    pub fn new(disk_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        let mut system = System::new();
        // Prime the CPU counters; usage is a delta between two refreshes.
        system.refresh_cpu();
        system.refresh_memory();

        Self {
            system: Arc::new(Mutex::new(system)),
            disk_path: disk_path.into(),
            timeout,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Take one sample, returning an error instead of degrading.
    pub async fn try_sample(&self) -> Result<SystemMetrics, SupervisorError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SupervisorError::MetricsSampleFailure(
                "previous sample still running".to_string(),
            ));
        }
        let guard = InFlight(Arc::clone(&self.in_flight));

        let system = Arc::clone(&self.system);
        let disk_path = self.disk_path.clone();

        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            read_host(&system, &disk_path)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(SupervisorError::MetricsSampleFailure(format!(
                "sampler task failed: {join}"
            ))),
            Err(_) => Err(SupervisorError::MetricsSampleFailure(format!(
                "sample exceeded {:?}",
                self.timeout
            ))),
        }
    }
}

#[async_trait]
impl MetricsSource for MetricsCollector {
    async fn sample(&self) -> SystemMetrics {
        match self.try_sample().await {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(error = %e, "Metrics sample failed, using degraded sample");
                SystemMetrics::degraded()
            }
        }
    }
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("disk_path", &self.disk_path)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn read_host(system: &Mutex<System>, disk_path: &std::path::Path) -> Result<SystemMetrics, SupervisorError> {
    let (cpu, memory) = {
        let mut sys = system.lock().unwrap_or_else(|e| e.into_inner());
        sys.refresh_cpu();
        sys.refresh_memory();

        let cpu = f64::from(sys.global_cpu_info().cpu_usage());
        let total = sys.total_memory();
        if total == 0 {
            return Err(SupervisorError::MetricsSampleFailure(
                "host reported zero total memory".to_string(),
            ));
        }
        let memory = sys.used_memory() as f64 / total as f64 * 100.0;
        (cpu, memory)
    };

    let disk = disk::disk_usage(disk_path)
        .map_err(SupervisorError::MetricsSampleFailure)?
        .used_percent();

    let threads = thread_count();
    debug!(cpu, memory, disk, threads, "Host sample");

    Ok(SystemMetrics::from_resources(
        cpu.clamp(0.0, 100.0),
        memory.clamp(0.0, 100.0),
        disk.clamp(0.0, 100.0),
        threads,
    ))
}

/// Threads alive in this process.
#[cfg(target_os = "linux")]
fn thread_count() -> u64 {
    std::fs::read_dir("/proc/self/task")
        .map(|entries| entries.count() as u64)
        .unwrap_or(0)
}

#[cfg(not(target_os = "linux"))]
fn thread_count() -> u64 {
    0
}

/// A source that always returns the same readings.
///
/// Drives the controller without touching the host; used by tests and by
/// embedders that feed readings from their own telemetry.
#[derive(Debug, Clone)]
pub struct FixedMetrics {
    metrics: Arc<Mutex<SystemMetrics>>,
}

impl FixedMetrics {
    pub fn new(cpu: f64, memory: f64, disk: f64) -> Self {
        Self {
            metrics: Arc::new(Mutex::new(SystemMetrics::from_resources(cpu, memory, disk, 1))),
        }
    }

    /// Replace the readings returned by subsequent samples.
    pub fn set(&self, cpu: f64, memory: f64, disk: f64) {
        let mut m = self.metrics.lock().unwrap_or_else(|e| e.into_inner());
        *m = SystemMetrics::from_resources(cpu, memory, disk, m.active_task_count);
    }

    /// Make subsequent samples fail.
    pub fn fail(&self) {
        let mut m = self.metrics.lock().unwrap_or_else(|e| e.into_inner());
        *m = SystemMetrics::degraded();
    }
}

#[async_trait]
impl MetricsSource for FixedMetrics {
    async fn sample(&self) -> SystemMetrics {
        let template = self.metrics.lock().unwrap_or_else(|e| e.into_inner()).clone();
        SystemMetrics {
            timestamp: chrono::Utc::now(),
            ..template
        }
    }
}
