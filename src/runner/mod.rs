//! Local module execution
//!
//! Launched modules are tracked by name until they are stopped or reaped.
//! Silent modules with a logfile write stdout and stderr to that file;
//! modules that ask to follow their log get a tmux window tailing it.

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use sysinfo::{Pid, Signal, System};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::errors::{NmbError, Result};
use crate::modules::{ModuleHeader, ModuleStore, ScriptKind};
use crate::remote::quote;

/// How long a module gets to exit after SIGTERM before it is killed
pub const STOP_GRACE: Duration = Duration::from_secs(5);

/// Everything needed to start one module
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub name: String,
    pub path: PathBuf,
    pub kind: ScriptKind,
    pub header: ModuleHeader,
    pub args: Vec<String>,
}

impl LaunchPlan {
    /// Resolve an installed module and read its header
    pub fn new(store: &ModuleStore, name: &str, args: Vec<String>) -> Result<Self> {
        let path = store.path_of(name)?;
        if !path.is_file() {
            return Err(NmbError::ModuleNotFound(name.to_string()));
        }
        let kind = ScriptKind::from_name(name)?;
        let header = store.read_header(name)?;

        Ok(Self {
            name: name.to_string(),
            path,
            kind,
            header,
            args,
        })
    }

    /// `[interpreter, path, args...]`
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![
            self.kind.interpreter().to_string(),
            self.path.to_string_lossy().into_owned(),
        ];
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Logfile output is redirected to, only for silent modules
    pub fn output_log(&self) -> Option<&str> {
        if self.header.silent {
            self.header.logfile.as_deref()
        } else {
            None
        }
    }

    /// Logfile to tail in a tmux window
    pub fn followed_log(&self) -> Option<&str> {
        if self.header.follow_log {
            self.header.logfile.as_deref()
        } else {
            None
        }
    }
}

/// What happened when a module was launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    pub name: String,
    pub pid: Option<u32>,
    pub logfile: Option<PathBuf>,
    pub following: bool,
}

/// A tracked child process
#[derive(Debug)]
pub struct RunningModule {
    pub name: String,
    pub pid: Option<u32>,
    pub started_at: DateTime<Local>,
    pub logfile: Option<PathBuf>,
    child: Child,
}

/// Result of stopping a module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Exited after SIGTERM
    Terminated,
    /// Ignored SIGTERM for the grace period and was killed
    Killed,
    AlreadyExited(ExitStatus),
}

/// Processes started from this session, keyed by module name
#[derive(Debug, Default)]
pub struct ProcessTable {
    processes: HashMap<String, RunningModule>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a module as a local child process
    pub fn launch(&mut self, plan: &LaunchPlan) -> Result<LaunchReport> {
        if let Some(existing) = self.processes.get_mut(&plan.name) {
            if existing.child.try_wait()?.is_none() {
                return Err(NmbError::AlreadyRunning(plan.name.clone()));
            }
            self.processes.remove(&plan.name);
        }

        let argv = plan.argv();
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| NmbError::Generic(format!("Nothing to run for {}", plan.name)))?;
        let mut command = Command::new(program);
        command.args(args);

        let logfile = match plan.output_log() {
            Some(log) => {
                let path = PathBuf::from(log);
                let file = open_log(&path)?;
                command.stdout(Stdio::from(file.try_clone()?));
                command.stderr(Stdio::from(file));
                Some(path)
            }
            None => None,
        };

        let child = command.spawn()?;
        let pid = child.id();
        info!(module = %plan.name, pid = ?pid, "module launched");

        let following = match plan.followed_log() {
            Some(log) => follow_in_tmux(Path::new(log)),
            None => false,
        };

        self.processes.insert(
            plan.name.clone(),
            RunningModule {
                name: plan.name.clone(),
                pid,
                started_at: Local::now(),
                logfile: logfile.clone(),
                child,
            },
        );

        Ok(LaunchReport {
            name: plan.name.clone(),
            pid,
            logfile,
            following,
        })
    }

    /// Stop a tracked module and forget it
    ///
    /// Sends SIGTERM and waits up to [`STOP_GRACE`] before killing.
    pub async fn stop(&mut self, name: &str) -> Result<StopOutcome> {
        self.stop_within(name, STOP_GRACE).await
    }

    pub async fn stop_within(&mut self, name: &str, grace: Duration) -> Result<StopOutcome> {
        let mut running = self
            .processes
            .remove(name)
            .ok_or_else(|| NmbError::NotRunning(name.to_string()))?;

        if let Some(status) = running.child.try_wait()? {
            debug!(module = name, %status, "module had already exited");
            return Ok(StopOutcome::AlreadyExited(status));
        }

        if let Some(pid) = running.child.id() {
            if send_term(pid) {
                match tokio::time::timeout(grace, running.child.wait()).await {
                    Ok(status) => {
                        let status = status?;
                        info!(module = name, %status, "module terminated");
                        return Ok(StopOutcome::Terminated);
                    }
                    Err(_) => warn!(module = name, "module ignored SIGTERM, killing"),
                }
            }
        }

        running.child.kill().await?;
        info!(module = name, "module killed");
        Ok(StopOutcome::Killed)
    }

    /// Stop every tracked module
    pub async fn stop_all(&mut self) -> Vec<(String, Result<StopOutcome>)> {
        let mut results = Vec::new();
        for name in self.names() {
            let outcome = self.stop(&name).await;
            results.push((name, outcome));
        }
        results
    }

    /// Wait for a tracked module to exit and forget it
    pub async fn wait(&mut self, name: &str) -> Result<ExitStatus> {
        let mut running = self
            .processes
            .remove(name)
            .ok_or_else(|| NmbError::NotRunning(name.to_string()))?;
        Ok(running.child.wait().await?)
    }

    /// Forget modules whose process has exited
    pub fn reap(&mut self) -> Vec<(String, ExitStatus)> {
        let mut finished = Vec::new();
        for (name, running) in self.processes.iter_mut() {
            match running.child.try_wait() {
                Ok(Some(status)) => finished.push((name.clone(), status)),
                Ok(None) => {}
                Err(e) => warn!(module = %name, error = %e, "could not poll module process"),
            }
        }
        for (name, _) in &finished {
            self.processes.remove(name);
        }
        finished.sort_by(|a, b| a.0.cmp(&b.0));
        finished
    }

    /// Tracked module names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.processes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Tracked modules, sorted by name
    pub fn running(&self) -> Vec<&RunningModule> {
        let mut running: Vec<&RunningModule> = self.processes.values().collect();
        running.sort_by(|a, b| a.name.cmp(&b.name));
        running
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.processes.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }
}

fn send_term(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    if !system.refresh_process(pid) {
        return false;
    }
    system
        .process(pid)
        .and_then(|process| process.kill_with(Signal::Term))
        .unwrap_or(false)
}

fn open_log(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// `tmux new-window` arguments tailing a logfile
pub fn follow_log_args(logfile: &Path) -> Vec<String> {
    vec![
        "new-window".to_string(),
        format!("tail -f {}", quote(&logfile.to_string_lossy())),
    ]
}

fn follow_in_tmux(logfile: &Path) -> bool {
    match Command::new("tmux").args(follow_log_args(logfile)).spawn() {
        Ok(_) => true,
        Err(e) => {
            warn!(logfile = %logfile.display(), error = %e, "could not open tmux window");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with(modules: &[(&str, &str)]) -> (TempDir, ModuleStore) {
        let dir = TempDir::new().unwrap();
        let store = ModuleStore::new(dir.path().join("modules"));
        for (name, content) in modules {
            store.write(name, content).unwrap();
        }
        (dir, store)
    }

    #[test]
    fn test_plan_missing_module() {
        let (_dir, store) = store_with(&[]);
        let err = LaunchPlan::new(&store, "ghost.sh", vec![]).unwrap_err();
        assert!(matches!(err, NmbError::ModuleNotFound(_)));
    }

    #[test]
    fn test_plan_unsupported_type() {
        let (_dir, store) = store_with(&[("notes.txt", "hello")]);
        let err = LaunchPlan::new(&store, "notes.txt", vec![]).unwrap_err();
        assert!(matches!(err, NmbError::UnsupportedModuleType(_)));
    }

    #[test]
    fn test_plan_argv() {
        let (_dir, store) = store_with(&[("recon.py", "print(1)")]);
        let plan = LaunchPlan::new(&store, "recon.py", vec!["10.0.0.1".to_string()]).unwrap();
        let argv = plan.argv();
        assert_eq!(argv[0], "python3");
        assert!(argv[1].ends_with("recon.py"));
        assert_eq!(argv[2], "10.0.0.1");
    }

    #[test]
    fn test_output_log_requires_silent() {
        let (_dir, store) = store_with(&[
            ("loud.sh", "# Logfile: logs/loud.log\n"),
            ("quiet.sh", "# Silent: true\n# Logfile: logs/quiet.log\n# Follow_log: true\n"),
        ]);
        let loud = LaunchPlan::new(&store, "loud.sh", vec![]).unwrap();
        assert!(loud.output_log().is_none());
        assert!(loud.followed_log().is_none());

        let quiet = LaunchPlan::new(&store, "quiet.sh", vec![]).unwrap();
        assert_eq!(quiet.output_log(), Some("logs/quiet.log"));
        assert_eq!(quiet.followed_log(), Some("logs/quiet.log"));
    }

    #[test]
    fn test_follow_log_args() {
        let args = follow_log_args(Path::new("logs/scan.log"));
        assert_eq!(args[0], "new-window");
        assert!(args[1].starts_with("tail -f "));
        assert!(args[1].contains("logs/scan.log"));
    }

    #[tokio::test]
    async fn test_launch_and_stop() {
        let (_dir, store) = store_with(&[("sleeper.sh", "sleep 30\n")]);
        let plan = LaunchPlan::new(&store, "sleeper.sh", vec![]).unwrap();
        let mut table = ProcessTable::new();

        let report = table.launch(&plan).unwrap();
        assert!(report.pid.is_some());
        assert!(!report.following);
        assert_eq!(table.names(), vec!["sleeper.sh"]);

        let err = table.launch(&plan).unwrap_err();
        assert!(matches!(err, NmbError::AlreadyRunning(_)));

        assert_eq!(table.stop("sleeper.sh").await.unwrap(), StopOutcome::Terminated);
        assert!(table.is_empty());

        let err = table.stop("sleeper.sh").await.unwrap_err();
        assert_eq!(err.to_string(), "No running module named sleeper.sh.");
    }

    #[tokio::test]
    async fn test_stop_lets_module_clean_up() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("cleaned");
        let store = ModuleStore::new(dir.path().join("modules"));
        store
            .write(
                "trap.sh",
                &format!(
                    "trap 'echo done > \"{}\"; exit 0' TERM\nwhile true; do sleep 0.1; done\n",
                    marker.display()
                ),
            )
            .unwrap();

        let plan = LaunchPlan::new(&store, "trap.sh", vec![]).unwrap();
        let mut table = ProcessTable::new();
        table.launch(&plan).unwrap();
        // let bash install the trap
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(table.stop("trap.sh").await.unwrap(), StopOutcome::Terminated);
        assert_eq!(std::fs::read_to_string(&marker).unwrap().trim(), "done");
    }

    #[tokio::test]
    async fn test_stop_kills_after_grace() {
        let (_dir, store) = store_with(&[(
            "stubborn.sh",
            "trap '' TERM\nwhile true; do sleep 0.1; done\n",
        )]);
        let plan = LaunchPlan::new(&store, "stubborn.sh", vec![]).unwrap();
        let mut table = ProcessTable::new();
        table.launch(&plan).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let outcome = table
            .stop_within("stubborn.sh", Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(outcome, StopOutcome::Killed);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_silent_module_writes_logfile() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("logs").join("echo.log");
        let store = ModuleStore::new(dir.path().join("modules"));
        store
            .write(
                "echo.sh",
                &format!("# Silent: true\n# Logfile: {}\necho \"hello $1\"\necho oops >&2\n", log.display()),
            )
            .unwrap();

        let plan = LaunchPlan::new(&store, "echo.sh", vec!["world".to_string()]).unwrap();
        let mut table = ProcessTable::new();
        let report = table.launch(&plan).unwrap();
        assert_eq!(report.logfile.as_deref(), Some(log.as_path()));

        let status = table.wait("echo.sh").await.unwrap();
        assert!(status.success());

        let written = std::fs::read_to_string(&log).unwrap();
        assert!(written.contains("hello world"));
        assert!(written.contains("oops"));
    }

    #[tokio::test]
    async fn test_relaunch_after_exit() {
        let (_dir, store) = store_with(&[("quick.sh", "exit 0\n")]);
        let plan = LaunchPlan::new(&store, "quick.sh", vec![]).unwrap();
        let mut table = ProcessTable::new();

        table.launch(&plan).unwrap();
        // poll until the first run is gone
        for _ in 0..50 {
            if !table.reap().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(table.is_empty());

        table.launch(&plan).unwrap();
        assert_eq!(table.len(), 1);
        table.stop_all().await;
        assert!(table.is_empty());
    }
}
