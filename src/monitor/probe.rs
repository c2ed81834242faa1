use async_trait::async_trait;
use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tokio::sync::Mutex;

use super::types::ResourceSample;

#[async_trait]
pub trait SystemProbe: Send + Sync {
    async fn sample(&self) -> anyhow::Result<ResourceSample>;
}

/// Host probe backed by `sysinfo`.
pub struct SysinfoProbe {
    system: Mutex<System>,
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}

#[async_trait]
impl SystemProbe for SysinfoProbe {
    async fn sample(&self) -> anyhow::Result<ResourceSample> {
        let mut system = self.system.lock().await;

        // CPU usage is a delta between two refreshes.
        system.refresh_cpu();
        tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
        system.refresh_cpu();
        system.refresh_memory();

        let cpu = system.global_cpu_info().cpu_usage() as f64;
        let memory = percent(system.used_memory(), system.total_memory());

        let disks = Disks::new_with_refreshed_list();
        let root = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == std::path::Path::new("/"))
            .or_else(|| disks.list().iter().max_by_key(|d| d.total_space()));
        let disk = root.map_or(0.0, |d| {
            percent(d.total_space().saturating_sub(d.available_space()), d.total_space())
        });

        Ok(ResourceSample { cpu, memory, disk })
    }
}
