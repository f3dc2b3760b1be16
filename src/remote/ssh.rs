//! SSH session backed by libssh2
//!
//! libssh2 calls block, so every operation runs on the blocking pool.
//! Unknown host keys are accepted.

use async_trait::async_trait;
use ssh2::Session;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{NmbError, Result};
use crate::remote::{remote_path, RemoteOutput, RemoteSession, RemoteTarget};

/// Password-authenticated SSH connection
pub struct SshSession {
    target: RemoteTarget,
    remote_dir: String,
    session: Arc<Mutex<Session>>,
}

impl SshSession {
    /// Open a TCP connection, handshake and authenticate with a password
    pub async fn connect(
        target: RemoteTarget,
        password: String,
        remote_dir: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let connect_target = target.clone();
        let session = run_blocking(move || {
            let addr = (connect_target.hostname.as_str(), connect_target.port)
                .to_socket_addrs()?
                .next()
                .ok_or_else(|| {
                    NmbError::Remote(format!("Could not resolve {}", connect_target.hostname))
                })?;

            let tcp = TcpStream::connect_timeout(&addr, timeout)?;
            let mut session = Session::new()?;
            session.set_tcp_stream(tcp);
            session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);
            session.handshake()?;
            session.userauth_password(&connect_target.username, &password)?;

            if !session.authenticated() {
                return Err(NmbError::Remote(format!(
                    "Authentication failed for {}",
                    connect_target
                )));
            }
            // commands may run for a long time once connected
            session.set_timeout(0);
            Ok(session)
        })
        .await?;

        info!(host = %target, "ssh session established");
        Ok(Self {
            target,
            remote_dir: remote_dir.into(),
            session: Arc::new(Mutex::new(session)),
        })
    }

    async fn with_session<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Session) -> Result<T> + Send + 'static,
    {
        let session = Arc::clone(&self.session);
        run_blocking(move || {
            let guard = session
                .lock()
                .map_err(|_| NmbError::Remote("SSH session lock poisoned".to_string()))?;
            op(&*guard)
        })
        .await
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    fn target(&self) -> &RemoteTarget {
        &self.target
    }

    fn remote_dir(&self) -> &str {
        &self.remote_dir
    }

    async fn upload(&self, name: &str, content: &[u8]) -> Result<String> {
        let path = remote_path(&self.remote_dir, name);
        let content = content.to_vec();
        let dest = path.clone();

        self.with_session(move |session| {
            let mut channel = session.scp_send(Path::new(&dest), 0o755, content.len() as u64, None)?;
            channel.write_all(&content)?;
            channel.send_eof()?;
            channel.wait_eof()?;
            channel.close()?;
            channel.wait_close()?;
            Ok(())
        })
        .await?;

        debug!(path = %path, "uploaded file");
        Ok(path)
    }

    async fn exec(&self, command: &str) -> Result<RemoteOutput> {
        let command = command.to_string();
        debug!(command = %command, "remote exec");

        self.with_session(move |session| {
            let mut channel = session.channel_session()?;
            channel.exec(&command)?;

            // a full stderr window would stall a stdout-only reader
            session.set_blocking(false);
            let drained = drain_streams(channel.stream(0), channel.stderr(), || channel.eof());
            session.set_blocking(true);
            let (stdout, stderr) = drained?;

            channel.wait_close()?;
            let exit_status = channel.exit_status()?;

            Ok(RemoteOutput {
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                exit_status,
            })
        })
        .await
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        let source = remote_path.to_string();
        let content = self
            .with_session(move |session| {
                let (mut channel, _stat) = session.scp_recv(Path::new(&source))?;
                let mut content = Vec::new();
                channel.read_to_end(&mut content)?;
                channel.send_eof()?;
                channel.wait_eof()?;
                channel.close()?;
                channel.wait_close()?;
                Ok(content)
            })
            .await?;

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local_path, content).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.with_session(|session| {
            session.disconnect(None, "closing session", None)?;
            Ok(())
        })
        .await?;
        info!(host = %self.target, "ssh session closed");
        Ok(())
    }
}

/// Read two non-blocking streams side by side until both are exhausted
/// and `finished` reports end of input
pub(crate) fn drain_streams<O, E, F>(
    mut stdout: O,
    mut stderr: E,
    finished: F,
) -> std::io::Result<(Vec<u8>, Vec<u8>)>
where
    O: Read,
    E: Read,
    F: Fn() -> bool,
{
    let mut out = Vec::new();
    let mut err = Vec::new();
    let mut buf = [0u8; 8192];

    loop {
        let read_out = read_available(&mut stdout, &mut buf, &mut out)?;
        let read_err = read_available(&mut stderr, &mut buf, &mut err)?;
        if read_out || read_err {
            continue;
        }
        if finished() {
            return Ok((out, err));
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// Append whatever is ready; false when nothing was
fn read_available<R: Read>(reader: &mut R, buf: &mut [u8], into: &mut Vec<u8>) -> std::io::Result<bool> {
    match reader.read(buf) {
        Ok(0) => Ok(false),
        Ok(n) => {
            into.extend_from_slice(&buf[..n]);
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(true),
        Err(e) => Err(e),
    }
}

async fn run_blocking<T, F>(op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| NmbError::Remote(format!("SSH task failed: {}", e)))?
}
