//! Built-in components declared under `[[components]]`
//!
//! Each probe kind implements [`Component`] so config-declared checks go
//! through the same registry path as components registered from code.

mod command;
mod disk;
mod tcp;

pub use command::CommandProbe;
pub use disk::DiskProbe;
pub use tcp::TcpProbe;

use std::sync::Arc;

use crate::config::{ComponentConfig, ProbeKind};
use crate::registry::Component;

/// Build the component described by one `[[components]]` entry.
pub fn build_component(config: &ComponentConfig) -> Arc<dyn Component> {
    match &config.probe {
        ProbeKind::Tcp { addr } => Arc::new(TcpProbe::new(addr.clone())),
        ProbeKind::Command { check, restart } => {
            Arc::new(CommandProbe::new(check.clone(), restart.clone()))
        }
        ProbeKind::Disk { path, min_free_mb } => Arc::new(DiskProbe::new(path, *min_free_mb)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_component_from_config() {
        let config = ComponentConfig {
            name: "root".to_string(),
            critical: false,
            max_failures: 3,
            probe: ProbeKind::Disk {
                path: "/".to_string(),
                min_free_mb: 0,
            },
        };
        let component = build_component(&config);
        assert!(component.health_check().await.unwrap());
    }
}
