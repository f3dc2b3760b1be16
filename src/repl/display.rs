//! Display manager for REPL terminal output
//!
//! `[output]` and `[error]` tagged lines, numbered lists, spinners for
//! network calls.

use colored::*;
use crossterm::{
    cursor,
    execute,
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::time::Duration;

use crate::remote::RemoteTarget;
use crate::repl::commands::HELP_ENTRIES;
use crate::runner::RunningModule;

/// Display manager for REPL UI
#[derive(Debug, Default, Clone)]
pub struct DisplayManager;

impl DisplayManager {
    pub fn new() -> Self {
        DisplayManager
    }

    /// Show welcome banner
    pub fn show_banner(&self, version: &str) {
        let rule = "=".repeat(48);
        println!("\n{}", rule.cyan());
        println!("{}", format!("  NMB-cli {} - module manager", version).bold().cyan());
        println!("{}\n", rule.cyan());
        println!("Type {} for commands, {} to quit\n", "help".green(), "exit".green());
    }

    pub fn output(&self, message: &str) {
        println!("{}", format_output(message));
    }

    pub fn error(&self, message: &str) {
        println!("{}", format_error(message));
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Plain text, e.g. log file contents
    pub fn raw(&self, text: &str) {
        println!("{}", text);
    }

    pub fn show_help(&self) {
        println!("{}", "NMB-cli Help:".bold().cyan());
        for (usage, description) in HELP_ENTRIES {
            println!("  {:<30} {}", usage.green(), description);
        }
        println!("{}", "Usage examples:".bold());
        println!("  connect user@example.com");
        println!("  update");
        println!("  install");
        println!("  launch");
    }

    /// Numbered list of installed modules
    pub fn show_installed(&self, modules: &[String]) {
        if modules.is_empty() {
            println!("No modules are currently installed.");
            return;
        }
        println!("{}", "Installed Modules:".bold());
        for (index, module) in modules.iter().enumerate() {
            println!("  {}. {}", (index + 1).to_string().cyan(), module);
        }
    }

    /// Numbered selection menu
    pub fn show_menu(&self, title: &str, items: &[String]) {
        println!("{}", title.bold().cyan());
        for (index, item) in items.iter().enumerate() {
            println!("  {}: {}", (index + 1).to_string().cyan(), item);
        }
    }

    pub fn show_status(&self, running: &[&RunningModule], remote: Option<&RemoteTarget>) {
        match remote {
            Some(target) => println!("{} {}", "SSH:".bold(), format!("Connected to {}", target).green()),
            None => println!("{} {}", "SSH:".bold(), "No Active SSH Connection".dimmed()),
        }

        if running.is_empty() {
            println!("No modules running.");
            return;
        }

        println!("{}", "Running Modules:".bold());
        for module in running {
            let pid = module
                .pid
                .map(|pid| pid.to_string())
                .unwrap_or_else(|| "-".to_string());
            let log = module
                .logfile
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "terminal".to_string());
            println!(
                "  {:<24} pid {:<8} since {}  -> {}",
                module.name.green(),
                pid,
                module.started_at.format("%H:%M:%S"),
                log.dimmed()
            );
        }
    }

    /// Spinner for a network operation; finish it with `finish_and_clear`
    pub fn spinner(&self, message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn clear_screen(&self) -> io::Result<()> {
        execute!(io::stdout(), Clear(ClearType::All), cursor::MoveTo(0, 0))
    }
}

/// `[output] message` with the tag in blue
pub fn format_output(message: &str) -> String {
    format!("[{}] {}", "output".blue(), message)
}

/// `[error] message` with the tag in red
pub fn format_error(message: &str) -> String {
    format!("[{}] {}", "error".red(), message)
}

/// Prompt text, showing the SSH target when connected
pub fn prompt_text(remote: Option<&RemoteTarget>) -> String {
    match remote {
        Some(target) => format!("NMB-cli ({}) > ", target),
        None => "NMB-cli > ".to_string(),
    }
}
