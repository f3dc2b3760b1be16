//! Command-line argument parsing for nmb
//!
//! Provides clap-based CLI with subcommands and verbosity control.
//! Running without a subcommand starts the interactive REPL.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::config::Config;

/// nmb - fetch, install and launch modules locally or over SSH
#[derive(Parser, Debug)]
#[command(name = "nmb")]
#[command(version)]
#[command(about = "Interactive module manager for bash and python modules", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Module repository (GitHub contents API URL)
    #[arg(long)]
    pub repo: Option<String>,

    /// Directory holding installed modules
    #[arg(long)]
    pub modules_dir: Option<PathBuf>,

    /// Directory searched by `read`
    #[arg(long)]
    pub logs_dir: Option<PathBuf>,

    /// Verbosity level: -v (debug), -vv (trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start interactive REPL mode (default)
    Start,

    /// List installed modules
    List,

    /// Fetch the list of available modules
    Update,

    /// Download modules and install their dependencies
    Install {
        /// Module file names, e.g. scan.sh
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Delete an installed module
    Remove {
        name: String,
    },

    /// Print a log file from the logs directory
    Read {
        log: String,
    },

    /// Run environment health checks
    Doctor,

    /// Display current configuration
    Config,
}

impl Args {
    /// Log level requested on the command line, if any
    pub fn log_level(&self) -> Option<&'static str> {
        if self.quiet {
            Some("error")
        } else {
            match self.verbose {
                0 => None,
                1 => Some("debug"),
                _ => Some("trace"),
            }
        }
    }

    /// Apply command-line overrides on top of a loaded config
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(repo) = &self.repo {
            config.registry.url = repo.clone();
        }
        if let Some(dir) = &self.modules_dir {
            config.paths.modules_dir = dir.to_string_lossy().into_owned();
        }
        if let Some(dir) = &self.logs_dir {
            config.paths.logs_dir = dir.to_string_lossy().into_owned();
        }
    }

    /// Subcommand to run; no subcommand means the REPL
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Start)
    }
}
