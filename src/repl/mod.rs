//! Interactive engine
//!
//! Reads one command per line, dispatches it against the module store,
//! the registry, local processes and the optional SSH session, and prints
//! the outcome. A failing command prints `[error] ...` and the loop goes on.

pub mod commands;
pub mod display;
pub mod input;
pub mod selection;

use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cli::Config;
use crate::deps::{DependencyInstaller, DependencyStatus};
use crate::errors::{NmbError, Result};
use crate::modules::{ModuleStore, RegistryClient};
use crate::remote::{remote_command, RemoteSession, RemoteTarget, SshSession};
use crate::runner::{LaunchPlan, ProcessTable, StopOutcome};

pub use crate::repl::commands::Command;
pub use crate::repl::display::DisplayManager;
pub use crate::repl::input::{CommandHelper, InputHandler, Prompter, ReadEvent};
use crate::repl::display::prompt_text;
use crate::repl::selection::{parse_selection, parse_single};

/// REPL engine owning every piece of session state
pub struct Engine {
    config: Config,
    store: ModuleStore,
    registry: RegistryClient,
    installer: DependencyInstaller,
    processes: ProcessTable,
    remote: Option<Box<dyn RemoteSession>>,
    logs_dir: PathBuf,
    prompter: Box<dyn Prompter>,
    display: DisplayManager,
}

impl Engine {
    pub fn new(config: Config, prompter: Box<dyn Prompter>) -> Result<Self> {
        let registry = RegistryClient::new(
            config.registry.url.clone(),
            Duration::from_secs(config.registry.timeout_secs),
        )?;

        Ok(Engine {
            store: ModuleStore::new(config.modules_dir()),
            installer: DependencyInstaller::new(config.install.command.clone()),
            logs_dir: config.logs_dir(),
            processes: ProcessTable::new(),
            remote: None,
            registry,
            prompter,
            display: DisplayManager::new(),
            config,
        })
    }

    /// Engine reading from the terminal with completion and persistent history
    pub fn interactive(config: Config) -> Result<Self> {
        let helper = CommandHelper::new(config.modules_dir(), config.logs_dir());
        let input = InputHandler::with_history(helper, config.history_file())?;
        Self::new(config, Box::new(input))
    }

    /// Create the modules and logs directories
    pub fn setup_directories(&self) -> Result<()> {
        self.store.ensure_dir()?;
        std::fs::create_dir_all(&self.logs_dir)?;
        Ok(())
    }

    pub fn set_remote(&mut self, session: Box<dyn RemoteSession>) {
        self.remote = Some(session);
    }

    pub fn remote_target(&self) -> Option<&RemoteTarget> {
        self.remote.as_deref().map(|session| session.target())
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.processes
    }

    pub fn store(&self) -> &ModuleStore {
        &self.store
    }

    /// Run until `exit` or end of input, then clean up
    pub async fn run(&mut self) -> Result<()> {
        self.setup_directories()?;
        self.display.show_banner(env!("CARGO_PKG_VERSION"));

        let outcome = loop {
            let prompt = prompt_text(self.remote_target());
            let event = match self.prompter.read_command(&prompt) {
                Ok(event) => event,
                Err(e) => break Err(NmbError::from(e)),
            };
            match event {
                ReadEvent::Line(line) => match self.execute(Command::parse(&line)).await {
                    Ok(true) => {}
                    Ok(false) => break Ok(()),
                    Err(e) => self.display.error(&e.to_string()),
                },
                ReadEvent::Interrupted => {
                    self.display.error("Ctrl+C detected! use 'exit' to quit.");
                }
                ReadEvent::Eof => break Ok(()),
            }
        };

        // clean up even when the terminal failed
        self.shutdown().await;
        outcome
    }

    /// Stop tracked modules, close SSH and save history
    pub async fn shutdown(&mut self) {
        for (name, outcome) in self.processes.stop_all().await {
            match outcome {
                Ok(_) => debug!(module = %name, "stopped on exit"),
                Err(e) => warn!(module = %name, error = %e, "could not stop module on exit"),
            }
        }
        if let Some(session) = self.remote.take() {
            if let Err(e) = session.disconnect().await {
                warn!(error = %e, "ssh disconnect failed");
            }
        }
        if let Err(e) = self.prompter.save_history() {
            warn!(error = %e, "could not save history");
        }
    }

    /// Execute one command; `Ok(false)` ends the session
    pub async fn execute(&mut self, command: Command) -> Result<bool> {
        debug!(?command, "executing command");
        match command {
            Command::Empty => {}
            Command::Help => self.display.show_help(),
            Command::Update => self.update().await?,
            Command::Install { names } => self.install(names).await?,
            Command::List => self.display.show_installed(&self.store.list()?),
            Command::Launch { name } => self.launch(name).await?,
            Command::Stop { name } => self.stop(name).await?,
            Command::Remove { name } => self.remove(name)?,
            Command::Read { log } => self.read(log)?,
            Command::Connect { target } => self.connect(target).await?,
            Command::Disconnect => self.disconnect().await?,
            Command::Pull { remote, local } => self.pull(remote, local).await?,
            Command::Status => {
                self.processes.reap();
                self.display
                    .show_status(&self.processes.running(), self.remote_target());
            }
            Command::Clear => self.display.clear_screen()?,
            Command::Exit => return Ok(false),
            Command::Unknown { input } => {
                self.display.error(&format!("Command '{}' not found", input));
            }
        }
        Ok(true)
    }

    /// Read an answer; `None` when the user backs out with Ctrl-C or Ctrl-D
    fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.prompter.read_answer(prompt)? {
            ReadEvent::Line(line) => Ok(Some(line)),
            ReadEvent::Interrupted | ReadEvent::Eof => Ok(None),
        }
    }

    /// Numbered menu with a single choice
    fn choose_one(&mut self, title: &str, items: &[String]) -> Result<Option<String>> {
        self.display.show_menu(title, items);
        let Some(answer) = self.ask("Select a number: ")? else {
            return Ok(None);
        };
        parse_single(&answer, items).map_err(|e| NmbError::Generic(e.to_string()))
    }

    async fn update(&mut self) -> Result<()> {
        let spinner = self.display.spinner("Fetching modules");
        let fetched = self.registry.fetch_modules().await;
        spinner.finish_and_clear();

        let modules = fetched?;
        if modules.is_empty() {
            self.display.output("No modules available.");
        } else {
            self.display
                .output(&format!("Modules fetched: {}", modules.join(", ")));
        }
        Ok(())
    }

    async fn install(&mut self, names: Vec<String>) -> Result<()> {
        let selected = if names.is_empty() {
            let spinner = self.display.spinner("Fetching modules");
            let fetched = self.registry.fetch_modules().await;
            spinner.finish_and_clear();
            let available = fetched?;

            if available.is_empty() {
                self.display.output("No modules available.");
                return Ok(());
            }
            self.display.show_menu("Available Modules:", &available);
            let Some(answer) = self.ask("Select modules (e.g. 1,3 or all): ")? else {
                return Ok(());
            };
            parse_selection(&answer, &available).map_err(|e| NmbError::Generic(e.to_string()))?
        } else {
            names
        };

        for name in selected {
            if let Err(e) = self.install_one(&name).await {
                self.display.error(&e.to_string());
            }
        }
        Ok(())
    }

    async fn install_one(&mut self, name: &str) -> Result<()> {
        let spinner = self.display.spinner(&format!("Downloading {}", name));
        let downloaded = self.registry.download_module(name).await;
        spinner.finish_and_clear();

        self.store.write(name, &downloaded?)?;
        let header = self.store.read_header(name)?;

        if !header.dependencies.is_empty() {
            match self.remote.as_deref() {
                Some(session) => {
                    for (dep, output) in self
                        .installer
                        .install_remote(session, &header.dependencies)
                        .await?
                    {
                        self.display.output(&format!(
                            "Installing dependency on remote machine: {}",
                            dep
                        ));
                        let text = output.combined();
                        if !text.is_empty() {
                            self.display.raw(&text);
                        }
                    }
                }
                None => {
                    for status in self.installer.install_local(&header.dependencies).await? {
                        match status {
                            DependencyStatus::AlreadyInstalled(dep) => self
                                .display
                                .output(&format!("Dependency '{}' is already installed.", dep)),
                            DependencyStatus::Installed(dep) => self
                                .display
                                .output(&format!("Installed dependency: {}", dep)),
                        }
                    }
                }
            }
        }

        info!(module = name, "module installed");
        self.display
            .success(&format!("Module {} installed successfully.", name));
        Ok(())
    }

    async fn launch(&mut self, name: Option<String>) -> Result<()> {
        let name = match name {
            Some(name) => name,
            None => {
                let installed = self.store.list()?;
                if installed.is_empty() {
                    self.display.output("No installed modules found.");
                    return Ok(());
                }
                match self.choose_one("Installed Modules:", &installed)? {
                    Some(name) => name,
                    None => return Ok(()),
                }
            }
        };

        let mut plan = LaunchPlan::new(&self.store, &name, Vec::new())?;
        if plan.header.inputs.is_empty() {
            self.display
                .output(&format!("No inputs required for {}.", name));
        }
        for input in plan.header.inputs.clone() {
            let prompt = plan.header.input_prompt(&input);
            match self.ask(&prompt)? {
                Some(value) => plan.args.push(value),
                None => {
                    self.display.output("Launch cancelled.");
                    return Ok(());
                }
            }
        }

        if self.remote.is_some() {
            self.launch_remote(&plan).await
        } else {
            self.launch_local(&plan)
        }
    }

    fn launch_local(&mut self, plan: &LaunchPlan) -> Result<()> {
        let report = self.processes.launch(plan)?;
        self.display
            .success(&format!("Module {} launched.", report.name));
        if let Some(ref log) = report.logfile {
            self.display
                .output(&format!("Logging output to {}", log.display()));
        }
        if report.following {
            if let Some(log) = plan.followed_log() {
                self.display
                    .output(&format!("Following log in new tmux window: {}", log));
            }
        }
        Ok(())
    }

    async fn launch_remote(&mut self, plan: &LaunchPlan) -> Result<()> {
        let session = self.remote.as_deref().ok_or(NmbError::NotConnected)?;
        let content = self.store.read(&plan.name)?;
        session.upload(&plan.name, content.as_bytes()).await?;

        let command = remote_command(plan.kind, session.remote_dir(), &plan.name, &plan.args);
        info!(module = %plan.name, host = %session.target(), "running module remotely");

        let spinner = self
            .display
            .spinner(&format!("Running {} on {}", plan.name, session.target()));
        let output = session.exec(&command).await;
        spinner.finish_and_clear();
        let output = output?;

        match plan.header.logfile.as_deref() {
            Some(log) => {
                self.display.output(&format!("Saving results to {}", log));
                let path = Path::new(log);
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                std::fs::write(path, output.combined())?;
            }
            None => self.display.raw(&output.combined()),
        }
        if !output.success() {
            self.display.error(&format!(
                "Module {} exited with status {}",
                plan.name, output.exit_status
            ));
        }
        Ok(())
    }

    async fn stop(&mut self, name: Option<String>) -> Result<()> {
        for (finished, status) in self.processes.reap() {
            debug!(module = %finished, %status, "reaped module");
        }

        let name = match name {
            Some(name) => name,
            None => {
                let running = self.processes.names();
                if running.is_empty() {
                    self.display.output("No active modules to stop.");
                    return Ok(());
                }
                match self.choose_one("Running Modules:", &running)? {
                    Some(name) => name,
                    None => return Ok(()),
                }
            }
        };

        match self.processes.stop(&name).await? {
            StopOutcome::Terminated => self.display.success(&format!("Module {} stopped.", name)),
            StopOutcome::Killed => self
                .display
                .success(&format!("Module {} did not exit on SIGTERM and was killed.", name)),
            StopOutcome::AlreadyExited(status) => self
                .display
                .output(&format!("Module {} had already exited ({}).", name, status)),
        }
        Ok(())
    }

    fn remove(&mut self, name: Option<String>) -> Result<()> {
        let name = match name {
            Some(name) => name,
            None => {
                let installed = self.store.list()?;
                if installed.is_empty() {
                    self.display.output("No installed modules found.");
                    return Ok(());
                }
                match self.choose_one("Remove Module:", &installed)? {
                    Some(name) => name,
                    None => return Ok(()),
                }
            }
        };

        self.store.remove(&name)?;
        self.display
            .success(&format!("Module {} has been removed.", name));
        Ok(())
    }

    fn read(&mut self, log: Option<String>) -> Result<()> {
        let Some(log) = log else {
            self.display.output("Usage: read <log_file>");
            return Ok(());
        };

        let path = resolve_log_path(&self.logs_dir, &log)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => self.display.raw(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.display.output(&format!("Log file {} not found.", log));
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn connect(&mut self, target: Option<String>) -> Result<()> {
        let Some(target) = target else {
            self.display.output("Usage: connect username@hostname");
            return Ok(());
        };
        let target = match RemoteTarget::parse_with_default_port(&target, self.config.remote.port) {
            Ok(target) => target,
            Err(e) => {
                debug!(error = %e, "malformed connect target");
                self.display.output("Usage: connect username@hostname");
                return Ok(());
            }
        };

        if self.remote.is_some() {
            self.disconnect().await?;
        }

        let password = self
            .prompter
            .read_password(&format!("Password for {}: ", target))?;

        let spinner = self.display.spinner(&format!("Connecting to {}", target));
        let session = SshSession::connect(
            target.clone(),
            password,
            self.config.remote.remote_dir.clone(),
            Duration::from_secs(self.config.remote.connect_timeout_secs),
        )
        .await;
        spinner.finish_and_clear();

        self.remote = Some(Box::new(session?));
        info!(host = %target, "ssh connected");
        self.display.success(&format!(
            "Connected to {} as {}",
            target.hostname, target.username
        ));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        match self.remote.take() {
            Some(session) => {
                session.disconnect().await?;
                self.display.output("Disconnected from SSH session.");
            }
            None => self.display.output("No active SSH session to disconnect."),
        }
        Ok(())
    }

    async fn pull(&mut self, remote: Option<String>, local: Option<String>) -> Result<()> {
        let Some(remote) = remote else {
            self.display.output("Usage: pull <remote_path> [local_name]");
            return Ok(());
        };
        let session = self.remote.as_deref().ok_or(NmbError::NotConnected)?;

        let local = match local {
            Some(local) => local,
            None => Path::new(&remote)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| NmbError::Generic(format!("Cannot name a local copy of '{}'", remote)))?,
        };
        let destination = resolve_log_path(&self.logs_dir, &local)?;
        std::fs::create_dir_all(&self.logs_dir)?;

        session.download(&remote, &destination).await?;
        self.display
            .success(&format!("Saved {} to {}", remote, destination.display()));
        Ok(())
    }
}

/// Path of a file inside the logs directory
///
/// Only plain relative names are accepted.
pub fn resolve_log_path(logs_dir: &Path, name: &str) -> Result<PathBuf> {
    let relative = Path::new(name);
    let plain = !name.is_empty()
        && relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if !plain {
        return Err(NmbError::Generic(format!("Invalid log file name '{}'", name)));
    }
    Ok(logs_dir.join(relative))
}
