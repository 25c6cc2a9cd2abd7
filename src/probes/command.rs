//! `kind = "command"`: shell check and optional restart command
//!
//! Both commands run through `sh -c`; a non-zero exit is a failed check or a
//! failed restart.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::registry::Component;

/// Shell commands for check and restart.
///
/// The check passes iff it exits 0. Children are killed if the supervisor's
/// timeout drops the future.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    check: String,
    restart: Option<String>,
}

impl CommandProbe {
    pub fn new(check: impl Into<String>, restart: Option<String>) -> Self {
        Self {
            check: check.into(),
            restart,
        }
    }
}

async fn run_shell(command: &str) -> anyhow::Result<std::process::ExitStatus> {
    let status = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|e| anyhow::anyhow!("failed to spawn '{command}': {e}"))?;
    Ok(status)
}

#[async_trait]
impl Component for CommandProbe {
    async fn health_check(&self) -> anyhow::Result<bool> {
        let status = run_shell(&self.check).await?;
        debug!(command = %self.check, code = ?status.code(), "Check command finished");
        Ok(status.success())
    }

    async fn restart(&self) -> anyhow::Result<()> {
        let Some(restart) = &self.restart else {
            anyhow::bail!("no restart command configured");
        };

        info!(command = %restart, "Running restart command");
        let status = run_shell(restart).await?;
        if !status.success() {
            anyhow::bail!("restart command exited with {status}");
        }
        Ok(())
    }
}
