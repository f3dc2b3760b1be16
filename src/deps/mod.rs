//! Dependency installation for modules
//!
//! Modules list the OS packages they need in their `# Dependencies:` header.
//! Locally, packages whose binary is already on `PATH` are skipped. Remotely
//! the install command always runs, since the remote `PATH` is not known.

use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{NmbError, Result};
use crate::remote::{quote, RemoteOutput, RemoteSession};

/// Outcome for one local dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyStatus {
    AlreadyInstalled(String),
    Installed(String),
}

/// Check whether an executable with this name is reachable through `PATH`
pub fn is_on_path(binary: &str) -> bool {
    find_on_path(binary).is_some()
}

/// Full path of an executable found through `PATH`
pub fn find_on_path(binary: &str) -> Option<PathBuf> {
    if binary.is_empty() {
        return None;
    }
    if binary.contains('/') {
        let path = PathBuf::from(binary);
        return is_executable(&path).then_some(path);
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(binary))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Runs the configured package install command per dependency
#[derive(Debug, Clone)]
pub struct DependencyInstaller {
    command: Vec<String>,
}

impl DependencyInstaller {
    /// `command` is the argv prefix, e.g. `["sudo", "apt", "install", "-y"]`
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    /// Install missing dependencies on this machine
    pub async fn install_local(&self, dependencies: &[String]) -> Result<Vec<DependencyStatus>> {
        let (program, prefix) = self
            .command
            .split_first()
            .ok_or_else(|| NmbError::Config("install command is empty".to_string()))?;

        let mut statuses = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            if is_on_path(dep) {
                debug!(dependency = %dep, "already on PATH");
                statuses.push(DependencyStatus::AlreadyInstalled(dep.clone()));
                continue;
            }

            info!(dependency = %dep, "installing dependency");
            let status = Command::new(program)
                .args(prefix)
                .arg(dep)
                .status()
                .await
                .map_err(|e| NmbError::DependencyInstall {
                    name: dep.clone(),
                    reason: e.to_string(),
                })?;

            if !status.success() {
                return Err(NmbError::DependencyInstall {
                    name: dep.clone(),
                    reason: status.to_string(),
                });
            }
            statuses.push(DependencyStatus::Installed(dep.clone()));
        }
        Ok(statuses)
    }

    /// Shell command line installing one dependency on a remote host
    pub fn remote_command(&self, dependency: &str) -> String {
        self.command
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(dependency))
            .map(quote)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the install command for every dependency over SSH
    pub async fn install_remote(
        &self,
        session: &dyn RemoteSession,
        dependencies: &[String],
    ) -> Result<Vec<(String, RemoteOutput)>> {
        let mut outputs = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            info!(dependency = %dep, host = %session.target(), "installing remote dependency");
            let output = session.exec(&self.remote_command(dep)).await?;
            outputs.push((dep.clone(), output));
        }
        Ok(outputs)
    }
}
