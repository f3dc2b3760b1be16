//! Doctor command for system diagnostics
//!
//! Checks the local tools modules rely on, the registry, and the
//! directories modules and logs are written to.

use colored::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::Disks;

use crate::cli::Config;
use crate::deps::find_on_path;
use crate::modules::RegistryClient;

const MB: u64 = 1024 * 1024;

/// Health check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Pass,
    Warn(String),
    Fail(String),
}

/// Individual health check
#[derive(Debug)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
}

impl HealthCheck {
    fn new(name: &str, status: HealthStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
        }
    }
}

/// Doctor diagnostics system
pub struct Doctor {
    registry_url: String,
    registry_timeout: Duration,
    modules_dir: PathBuf,
    logs_dir: PathBuf,
}

impl Doctor {
    pub fn new(config: &Config) -> Self {
        Self {
            registry_url: config.registry.url.clone(),
            registry_timeout: Duration::from_secs(config.registry.timeout_secs),
            modules_dir: config.modules_dir(),
            logs_dir: config.logs_dir(),
        }
    }

    /// Run all health checks
    pub async fn run_diagnostics(&self) -> Vec<HealthCheck> {
        vec![
            check_binary("bash", true, "bash modules cannot run"),
            check_binary("python3", false, "python modules cannot run"),
            check_binary("tmux", false, "Follow_log windows are unavailable"),
            self.check_registry().await,
            check_writable("Modules Directory", &self.modules_dir),
            check_writable("Logs Directory", &self.logs_dir),
            self.check_disk_space(),
        ]
    }

    async fn check_registry(&self) -> HealthCheck {
        let mut client = match RegistryClient::new(self.registry_url.clone(), self.registry_timeout) {
            Ok(client) => client,
            Err(e) => return HealthCheck::new("Registry", HealthStatus::Fail(e.to_string())),
        };

        match client.fetch_modules().await {
            Ok(modules) if modules.is_empty() => HealthCheck::new(
                "Registry",
                HealthStatus::Warn("Registry lists no modules".to_string()),
            ),
            Ok(_) => HealthCheck::new("Registry", HealthStatus::Pass),
            Err(e) => HealthCheck::new(
                "Registry",
                HealthStatus::Fail(format!("Cannot reach registry: {}", e)),
            ),
        }
    }

    fn check_disk_space(&self) -> HealthCheck {
        let disks = Disks::new_with_refreshed_list();
        let target = absolute(&self.modules_dir);

        // longest mount point containing the modules directory
        let disk = disks
            .list()
            .iter()
            .filter(|disk| target.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len());

        match disk {
            Some(disk) => {
                let available_mb = disk.available_space() / MB;
                if available_mb < 100 {
                    HealthCheck::new(
                        "Disk Space",
                        HealthStatus::Fail(format!("Less than 100MB available ({} MB)", available_mb)),
                    )
                } else if available_mb < 1024 {
                    HealthCheck::new(
                        "Disk Space",
                        HealthStatus::Warn(format!("Low disk space ({} MB available)", available_mb)),
                    )
                } else {
                    HealthCheck::new("Disk Space", HealthStatus::Pass)
                }
            }
            None => HealthCheck::new(
                "Disk Space",
                HealthStatus::Warn("Could not determine disk space".to_string()),
            ),
        }
    }

    /// Display diagnostics results
    pub fn display_results(checks: &[HealthCheck]) {
        println!("\n{}\n", "NMB-cli System Diagnostics".bold().cyan());
        println!("{:<20} {}", "Check", "Status");
        println!("{}", "=".repeat(50));

        for check in checks {
            let line = match &check.status {
                HealthStatus::Pass => format!("{} PASS", "✓").green(),
                HealthStatus::Warn(msg) => format!("! WARN: {}", msg).yellow(),
                HealthStatus::Fail(msg) => format!("✗ FAIL: {}", msg).red(),
            };
            println!("{:<20} {}", check.name, line);
        }

        println!();
    }

    /// False when any check failed
    pub fn overall_status(checks: &[HealthCheck]) -> bool {
        !checks.iter().any(|c| matches!(c.status, HealthStatus::Fail(_)))
    }
}

fn check_binary(binary: &str, required: bool, consequence: &str) -> HealthCheck {
    match find_on_path(binary) {
        Some(_) => HealthCheck::new(binary, HealthStatus::Pass),
        None => {
            let msg = format!("{} not found on PATH, {}", binary, consequence);
            let status = if required {
                HealthStatus::Fail(msg)
            } else {
                HealthStatus::Warn(msg)
            };
            HealthCheck::new(binary, status)
        }
    }
}

fn check_writable(name: &str, dir: &Path) -> HealthCheck {
    if let Err(e) = std::fs::create_dir_all(dir) {
        return HealthCheck::new(
            name,
            HealthStatus::Fail(format!("Cannot create {}: {}", dir.display(), e)),
        );
    }

    let marker = dir.join(".nmb_write_test");
    match std::fs::write(&marker, "test") {
        Ok(_) => {
            let _ = std::fs::remove_file(&marker);
            HealthCheck::new(name, HealthStatus::Pass)
        }
        Err(e) => HealthCheck::new(
            name,
            HealthStatus::Fail(format!("No write permission in {}: {}", dir.display(), e)),
        ),
    }
}

fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
