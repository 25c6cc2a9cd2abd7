//! `kind = "disk"`: free space floor on a filesystem

use async_trait::async_trait;
use std::path::PathBuf;

use crate::metrics::disk::disk_usage;
use crate::registry::Component;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Healthy while the filesystem holding `path` has `min_free_mb` available.
#[derive(Debug, Clone)]
pub struct DiskProbe {
    path: PathBuf,
    min_free_bytes: u64,
}

impl DiskProbe {
    pub fn new(path: impl Into<PathBuf>, min_free_mb: u64) -> Self {
        Self {
            path: path.into(),
            min_free_bytes: min_free_mb.saturating_mul(BYTES_PER_MB),
        }
    }

    async fn available_bytes(&self) -> anyhow::Result<u64> {
        let path = self.path.clone();
        let usage = tokio::task::spawn_blocking(move || disk_usage(&path))
            .await?
            .map_err(anyhow::Error::msg)?;
        Ok(usage.available_bytes)
    }
}

#[async_trait]
impl Component for DiskProbe {
    async fn health_check(&self) -> anyhow::Result<bool> {
        Ok(self.available_bytes().await? >= self.min_free_bytes)
    }

    /// Free space cannot be restarted; succeeds once enough is available again.
    async fn restart(&self) -> anyhow::Result<()> {
        let available = self.available_bytes().await?;
        if available < self.min_free_bytes {
            anyhow::bail!(
                "{} has {} MB free, need {} MB",
                self.path.display(),
                available / BYTES_PER_MB,
                self.min_free_bytes / BYTES_PER_MB
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_threshold_decides_health() {
        assert!(DiskProbe::new("/", 0).health_check().await.unwrap());
        assert!(!DiskProbe::new("/", u64::MAX / BYTES_PER_MB).health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_path_errors() {
        let probe = DiskProbe::new("/no/such/mount", 1);
        assert!(probe.health_check().await.is_err());
        assert!(probe.restart().await.is_err());
    }
}
