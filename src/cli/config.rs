//! Configuration management for nmb
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.nmb/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::errors::{NmbError, Result};

/// Default GitHub contents URL modules are fetched from
pub const DEFAULT_REPO_URL: &str =
    "https://api.github.com/repos/mavedirra-01/pi-turtle/contents/modules";

/// Complete configuration for nmb
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub paths: PathsConfig,
    pub remote: RemoteConfig,
    pub install: InstallConfig,
    pub logging: LoggingConfig,
}

/// Module registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub url: String,
    pub timeout_secs: u64,
}

/// Local file system paths
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub modules_dir: String,
    pub logs_dir: String,
    pub history_file: String,
}

/// SSH session defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub remote_dir: String,
    pub port: u16,
    pub connect_timeout_secs: u64,
}

/// Dependency installation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Command prefix; the dependency name is appended as the last argument
    pub command: Vec<String>,
}

/// Log filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REPO_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            modules_dir: "modules".to_string(),
            logs_dir: "logs".to_string(),
            history_file: ".hist.txt".to_string(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            remote_dir: "/tmp".to_string(),
            port: 22,
            connect_timeout_secs: 15,
        }
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "sudo".to_string(),
                "apt".to_string(),
                "install".to_string(),
                "-y".to_string(),
            ],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| NmbError::Config(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| NmbError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Config::default())
    }

    /// Standard config location, if a home directory is known
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".nmb").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.registry.url.trim().is_empty() {
            return Err(NmbError::Config("registry.url must not be empty".to_string()));
        }

        if self.registry.timeout_secs == 0 {
            return Err(NmbError::Config(
                "registry.timeout_secs must be greater than 0".to_string()
            ));
        }

        if self.remote.connect_timeout_secs == 0 {
            return Err(NmbError::Config(
                "remote.connect_timeout_secs must be greater than 0".to_string()
            ));
        }

        if self.install.command.is_empty() {
            return Err(NmbError::Config("install.command must not be empty".to_string()));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" | "off" => {}
            _ => return Err(NmbError::Config(
                format!("Invalid log level: {}", self.logging.level)
            )),
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| NmbError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| NmbError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, contents)
            .map_err(|e| NmbError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    pub fn modules_dir(&self) -> PathBuf {
        Self::expand_path(&self.paths.modules_dir)
    }

    pub fn logs_dir(&self) -> PathBuf {
        Self::expand_path(&self.paths.logs_dir)
    }

    pub fn history_file(&self) -> PathBuf {
        Self::expand_path(&self.paths.history_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.registry.url, DEFAULT_REPO_URL);
        assert_eq!(config.paths.modules_dir, "modules");
        assert_eq!(config.paths.logs_dir, "logs");
        assert_eq!(config.paths.history_file, ".hist.txt");
        assert_eq!(config.remote.remote_dir, "/tmp");
        assert_eq!(config.install.command, vec!["sudo", "apt", "install", "-y"]);
    }

    #[test]
    fn test_config_validation_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_url() {
        let mut config = Config::default();
        config.registry.url = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = Config::default();
        config.registry.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_install_command() {
        let mut config = Config::default();
        config.install.command.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[paths]\nmodules_dir = \"mods\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.paths.modules_dir, "mods");
        assert_eq!(config.paths.logs_dir, "logs");
        assert_eq!(config.registry.url, DEFAULT_REPO_URL);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.remote.port = 2222;
        config.save(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.remote.port, 2222);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::load(Some(Path::new("/nonexistent/nmb.toml"))).unwrap_err();
        assert!(matches!(err, NmbError::Config(_)));
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = Config::expand_path("~/.nmb");
        assert!(!expanded.to_string_lossy().contains('~'));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let expanded = Config::expand_path("/absolute/path");
        assert_eq!(expanded.to_string_lossy(), "/absolute/path");
    }
}
