//! Error types for nmb
//!
//! One error enum shared by the module store, registry client, process
//! runner and SSH layer. The REPL prints these and keeps going.

use thiserror::Error;

/// Main error type for module management operations
#[derive(Error, Debug)]
pub enum NmbError {
    /// Module name would escape the modules directory or is empty
    #[error("Invalid module name: '{0}'")]
    InvalidModuleName(String),

    /// Module is not present in the modules directory
    #[error("Module {0} not found.")]
    ModuleNotFound(String),

    /// Module extension has no known interpreter
    #[error("Unsupported module type: {0}")]
    UnsupportedModuleType(String),

    /// Module is already tracked as a running process
    #[error("Module {0} is already running")]
    AlreadyRunning(String),

    /// No tracked process for this module
    #[error("No running module named {0}.")]
    NotRunning(String),

    /// Registry listing or download failed
    #[error("Registry error: {0}")]
    Registry(String),

    /// Dependency installation command failed
    #[error("Failed to install dependency '{name}': {reason}")]
    DependencyInstall { name: String, reason: String },

    /// Remote target could not be parsed
    #[error("Invalid remote target '{0}'. Use 'connect user@hostname'.")]
    InvalidTarget(String),

    /// A remote operation was requested without an SSH session
    #[error("No active SSH connection")]
    NotConnected,

    /// Remote command or transfer failed
    #[error("Remote error: {0}")]
    Remote(String),

    /// SSH protocol errors
    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String),
}

/// Result type alias for nmb operations
pub type Result<T> = std::result::Result<T, NmbError>;

/// Convert anyhow errors to NmbError
impl From<anyhow::Error> for NmbError {
    fn from(err: anyhow::Error) -> Self {
        NmbError::Generic(err.to_string())
    }
}
