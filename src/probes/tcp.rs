//! `kind = "tcp"`: reachability of a TCP endpoint

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use crate::registry::Component;

/// Healthy while a TCP connection to `addr` can be opened.
///
/// There is nothing to restart on the remote side, so `restart` succeeds
/// only if the endpoint is reachable again.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    async fn connect(&self) -> anyhow::Result<()> {
        let stream = TcpStream::connect(&self.addr).await?;
        debug!(addr = %self.addr, peer = ?stream.peer_addr().ok(), "TCP probe connected");
        Ok(())
    }
}

#[async_trait]
impl Component for TcpProbe {
    async fn health_check(&self) -> anyhow::Result<bool> {
        self.connect().await?;
        Ok(true)
    }

    async fn restart(&self) -> anyhow::Result<()> {
        self.connect().await
    }
}
