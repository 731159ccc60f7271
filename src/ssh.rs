//! SSH subprocess implementation of [`RemoteExecutor`].
//!
//! Each command runs through one `ssh` invocation; the session is scoped to
//! the command and released on every exit path. The per-host timeout is
//! enforced locally by polling the child against a deadline, so one
//! unreachable host cannot stall the whole batch.

use crate::collector::RemoteExecutor;
use crate::config::HostConfig;
use crate::error::CollectionError;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Remote executor shelling out to the system `ssh` binary.
///
/// Public-key authentication is tried first when a key file is configured;
/// password authentication requires the `sshpass` helper and is refused
/// with a clear error when it is not installed.
#[derive(Debug)]
pub struct SshExecutor {
    ssh_bin: PathBuf,
    sshpass_bin: Option<PathBuf>,
    hostname: String,
    username: String,
    key_file: Option<PathBuf>,
    password: Option<String>,
    timeout: Duration,
}

impl SshExecutor {
    /// Prepares an executor for one host. No connection is opened until the
    /// first command runs.
    ///
    /// # Errors
    /// Returns a [`CollectionError`] when the `ssh` binary is missing or
    /// password auth is configured without `sshpass`.
    pub fn connect(host: &HostConfig) -> Result<Self, CollectionError> {
        let ssh_bin = which::which("ssh")
            .map_err(|e| CollectionError::Auth(format!("ssh binary not found: {e}")))?;
        // Config validation already rejected malformed timeouts.
        let timeout = host.parsed_timeout().unwrap_or(crate::config::DEFAULT_HOST_TIMEOUT);

        let sshpass_bin = if host.password.is_some() && host.key_file.is_none() {
            Some(which::which("sshpass").map_err(|_| {
                CollectionError::Auth(
                    "password authentication requires sshpass; install it or configure key_file"
                        .to_string(),
                )
            })?)
        } else {
            None
        };

        debug!(host = %host.hostname, user = %host.username, "connecting via SSH");
        Ok(Self {
            ssh_bin,
            sshpass_bin,
            hostname: host.hostname.clone(),
            username: host.username.clone(),
            key_file: host.expanded_key_file(),
            password: host.password.clone(),
            timeout,
        })
    }

    fn build_command(&self, remote_command: &str) -> Command {
        let mut cmd = match (&self.sshpass_bin, &self.password) {
            (Some(sshpass), Some(password)) => {
                let mut cmd = Command::new(sshpass);
                cmd.arg("-p").arg(password).arg(&self.ssh_bin);
                cmd
            }
            _ => {
                let mut cmd = Command::new(&self.ssh_bin);
                cmd.arg("-o").arg("BatchMode=yes");
                cmd
            }
        };
        cmd.arg("-o")
            .arg(format!("ConnectTimeout={}", self.timeout.as_secs().max(1)));
        if let Some(key_file) = &self.key_file {
            cmd.arg("-i").arg(key_file);
        }
        cmd.arg(format!("{}@{}", self.username, self.hostname))
            .arg(remote_command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl RemoteExecutor for SshExecutor {
    fn execute(&mut self, command: &str) -> Result<String, CollectionError> {
        let mut child = self.build_command(command).spawn()?;

        // Drain both pipes off-thread so a chatty command cannot deadlock
        // the deadline loop on a full pipe buffer.
        let stdout_reader = spawn_pipe_reader(child.stdout.take());
        let stderr_reader = spawn_pipe_reader(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    drain(stdout_reader);
                    drain(stderr_reader);
                    return Err(CollectionError::Timeout(self.timeout));
                }
                None => std::thread::sleep(POLL_INTERVAL),
            }
        };

        let stdout = drain(stdout_reader);
        let stderr = drain(stderr_reader);

        if status.success() {
            Ok(String::from_utf8_lossy(&stdout).into_owned())
        } else {
            Err(CollectionError::CommandFailed(format!(
                "{command:?} on {}@{}: {}",
                self.username,
                self.hostname,
                String::from_utf8_lossy(&stderr).trim()
            )))
        }
    }
}

fn spawn_pipe_reader<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> Option<std::thread::JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn drain(reader: Option<std::thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(password: Option<&str>, key_file: Option<&str>) -> HostConfig {
        HostConfig {
            hostname: "web01.example.com".to_string(),
            name: None,
            category: "freebsd".to_string(),
            command: "sysctl -a".to_string(),
            username: "drift".to_string(),
            key_file: key_file.map(PathBuf::from),
            password: password.map(String::from),
            timeout: Some("5s".to_string()),
        }
    }

    #[test]
    fn test_key_auth_builds_batch_mode_command() {
        if which::which("ssh").is_err() {
            return;
        }
        let executor = SshExecutor::connect(&host(None, Some("/key"))).unwrap();
        let cmd = executor.build_command("sysctl -a");
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"-i".to_string()));
        assert!(args.contains(&"drift@web01.example.com".to_string()));
        assert_eq!(args.last().unwrap(), "sysctl -a");
    }

    #[test]
    fn test_password_without_sshpass_is_refused() {
        if which::which("ssh").is_err() || which::which("sshpass").is_ok() {
            return;
        }
        let err = SshExecutor::connect(&host(Some("secret"), None)).unwrap_err();
        assert!(matches!(err, CollectionError::Auth(_)));
    }
}
