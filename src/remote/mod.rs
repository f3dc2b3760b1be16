//! Remote execution over SSH
//!
//! The engine talks to a [`RemoteSession`] so module launches and
//! dependency installs can run against a remote host the same way they
//! run locally.

pub mod ssh;

use async_trait::async_trait;
use shell_quote::Sh;
use std::fmt;
use std::path::Path;

use crate::errors::{NmbError, Result};
use crate::modules::ScriptKind;

pub use ssh::SshSession;

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;

/// `user@host[:port]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub username: String,
    pub hostname: String,
    pub port: u16,
}

impl RemoteTarget {
    /// Parse `user@host` or `user@host:port`
    pub fn parse(input: &str) -> Result<Self> {
        Self::parse_with_default_port(input, DEFAULT_PORT)
    }

    pub fn parse_with_default_port(input: &str, default_port: u16) -> Result<Self> {
        let invalid = || NmbError::InvalidTarget(input.to_string());
        let (username, host_part) = input.trim().split_once('@').ok_or_else(invalid)?;

        let (hostname, port) = match host_part.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
            None => (host_part, default_port),
        };

        if username.is_empty() || hostname.is_empty() || hostname.contains('@') {
            return Err(invalid());
        }

        Ok(Self {
            username: username.to_string(),
            hostname: hostname.to_string(),
            port,
        })
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.port == DEFAULT_PORT {
            write!(f, "{}@{}", self.username, self.hostname)
        } else {
            write!(f, "{}@{}:{}", self.username, self.hostname, self.port)
        }
    }
}

/// Captured result of a remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

impl RemoteOutput {
    /// Trimmed stdout followed by trimmed stderr on its own line when present
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            stdout.to_string()
        } else {
            format!("{}\n{}", stdout, stderr)
        }
    }

    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// An open connection to a remote host
#[async_trait]
pub trait RemoteSession: Send + Sync {
    fn target(&self) -> &RemoteTarget;

    /// Directory modules are uploaded into
    fn remote_dir(&self) -> &str;

    /// Upload file content as `<remote_dir>/<name>`, returning the remote path
    async fn upload(&self, name: &str, content: &[u8]) -> Result<String>;

    async fn exec(&self, command: &str) -> Result<RemoteOutput>;

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;
}

/// Quote one word for a POSIX shell
pub fn quote(word: &str) -> String {
    String::from_utf8_lossy(&Sh::quote_vec(word)).into_owned()
}

/// Join a directory and file name without doubling the separator
pub fn remote_path(remote_dir: &str, name: &str) -> String {
    let dir = remote_dir.trim_end_matches('/');
    format!("{}/{}", dir, name)
}

/// Command line that runs an uploaded module on the remote host
pub fn remote_command(kind: ScriptKind, remote_dir: &str, name: &str, args: &[String]) -> String {
    let mut command = format!("{} {}", kind.interpreter(), quote(&remote_path(remote_dir, name)));
    for arg in args {
        command.push(' ');
        command.push_str(&quote(arg));
    }
    command
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target() {
        let target = RemoteTarget::parse("pi@10.0.0.5").unwrap();
        assert_eq!(target.username, "pi");
        assert_eq!(target.hostname, "10.0.0.5");
        assert_eq!(target.port, 22);
        assert_eq!(target.to_string(), "pi@10.0.0.5");
    }

    #[test]
    fn test_parse_target_with_port() {
        let target = RemoteTarget::parse("root@box.lan:2222").unwrap();
        assert_eq!(target.hostname, "box.lan");
        assert_eq!(target.port, 2222);
        assert_eq!(target.to_string(), "root@box.lan:2222");
    }

    #[test]
    fn test_parse_target_invalid() {
        assert!(RemoteTarget::parse("hostonly").is_err());
        assert!(RemoteTarget::parse("@host").is_err());
        assert!(RemoteTarget::parse("user@").is_err());
        assert!(RemoteTarget::parse("user@host:notaport").is_err());
        assert!(RemoteTarget::parse("a@b@c").is_err());
    }

    #[test]
    fn test_default_port_override() {
        let target = RemoteTarget::parse_with_default_port("pi@host", 2200).unwrap();
        assert_eq!(target.port, 2200);
    }

    #[test]
    fn test_combined_output() {
        let out = RemoteOutput {
            stdout: "  done\n".to_string(),
            stderr: String::new(),
            exit_status: 0,
        };
        assert_eq!(out.combined(), "done");
        assert!(out.success());

        let out = RemoteOutput {
            stdout: "partial\n".to_string(),
            stderr: "warning: x\n".to_string(),
            exit_status: 1,
        };
        assert_eq!(out.combined(), "partial\nwarning: x");
        assert!(!out.success());
    }

    #[test]
    fn test_remote_path() {
        assert_eq!(remote_path("/tmp/", "a.sh"), "/tmp/a.sh");
        assert_eq!(remote_path("/tmp", "a.sh"), "/tmp/a.sh");
    }

    #[test]
    fn test_remote_command_prefix() {
        let cmd = remote_command(ScriptKind::Python, "/tmp/", "recon.py", &[]);
        assert!(cmd.starts_with("python3 "));
        assert!(cmd.contains("/tmp/recon.py"));
        assert!(!cmd.contains("//"));
    }

    #[test]
    fn test_quoted_args_survive_shell() {
        let args = vec!["two words".to_string(), "$(id)".to_string(), "it's".to_string()];
        let cmd = remote_command(ScriptKind::Bash, "/tmp", "a b.sh", &args);

        assert_eq!(
            testing::shell_words(&cmd),
            vec!["bash", "/tmp/a b.sh", "two words", "$(id)", "it's"]
        );
    }
}
