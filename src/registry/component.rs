//! The contract every supervised component implements

use async_trait::async_trait;
use std::sync::Arc;

/// An operational component the supervisor probes and restarts.
///
/// Implementations are untrusted from the supervisor's point of view: every
/// call is wrapped in a timeout and run on its own task, so a hang or a
/// panic counts as a failed check rather than stalling the monitoring loop.
///
/// Only `health_check` and `restart` are required. The remaining hooks are
/// used by the recovery actions and default to no-ops.
#[async_trait]
pub trait Component: Send + Sync {
    /// Side-effect-free probe. `Ok(false)` and `Err(_)` are treated alike.
    async fn health_check(&self) -> anyhow::Result<bool>;

    /// Bring the component back after it reached its failure threshold.
    async fn restart(&self) -> anyhow::Result<()>;

    /// Stop before a full system restart.
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Ask the component to shed load. Returns whether it complied.
    async fn throttle(&self) -> bool {
        false
    }

    /// Suspend work while the supervisor is in fallback mode.
    async fn pause(&self) {}

    /// Resume after fallback mode ends.
    async fn resume(&self) {}
}

type CheckFn = dyn Fn() -> bool + Send + Sync;
type RestartFn = dyn Fn() -> anyhow::Result<()> + Send + Sync;

/// Adapter for plain blocking closures.
///
/// Both closures run on the blocking thread pool so a slow probe cannot
/// starve the async workers and the supervisor's timeout still applies.
#[derive(Clone)]
pub struct FnComponent {
    check: Arc<CheckFn>,
    restart: Arc<RestartFn>,
}

impl FnComponent {
    pub fn new<C, R>(check: C, restart: R) -> Self
    where
        C: Fn() -> bool + Send + Sync + 'static,
        R: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            check: Arc::new(check),
            restart: Arc::new(restart),
        }
    }
}

impl std::fmt::Debug for FnComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnComponent").finish_non_exhaustive()
    }
}

#[async_trait]
impl Component for FnComponent {
    async fn health_check(&self) -> anyhow::Result<bool> {
        let check = Arc::clone(&self.check);
        Ok(tokio::task::spawn_blocking(move || check()).await?)
    }

    async fn restart(&self) -> anyhow::Result<()> {
        let restart = Arc::clone(&self.restart);
        tokio::task::spawn_blocking(move || restart()).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_fn_component_forwards_calls() {
        let restarts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&restarts);
        let component = FnComponent::new(
            || true,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );

        assert!(component.health_check().await.unwrap());
        component.restart().await.unwrap();
        assert_eq!(restarts.load(Ordering::SeqCst), 1);
        // Default hooks
        assert!(!component.throttle().await);
        assert!(component.stop().await.is_ok());
    }

    #[tokio::test]
    async fn test_fn_component_restart_error_propagates() {
        let component = FnComponent::new(|| false, || anyhow::bail!("unit not found"));
        assert!(!component.health_check().await.unwrap());
        let err = component.restart().await.unwrap_err();
        assert!(err.to_string().contains("unit not found"));
    }
}
