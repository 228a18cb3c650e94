use std::{
    io::Read,
    path::PathBuf,
    process::{Child, Command, Stdio},
    time::Duration,
};
use thiserror::Error;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Failed to spawn remote shell")]
    Spawn(#[source] std::io::Error),
    #[error("Failed to wait for remote shell")]
    Wait(#[source] std::io::Error),
    #[error("Remote shell did not finish within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// container for everything a remote command left behind
pub struct RemoteOutput {
    /// `None` if the shell was terminated by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RemoteOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Anything that can run a command on another host and report how it went
pub trait RemoteShell {
    fn execute(&self, host: &str, command: &[String]) -> Result<RemoteOutput, RemoteError>;
}

/// Remote shell over the `ssh` client of the local host
#[derive(Debug, Clone)]
pub struct Ssh {
    program: PathBuf,
    options: Vec<String>,
    timeout: Option<Duration>,
}

impl Default for Ssh {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ssh"),
            options: Vec::new(),
            timeout: None,
        }
    }
}

impl Ssh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// options placed between the program and the host, e.g., `-o BatchMode=yes`
    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl RemoteShell for Ssh {
    #[tracing::instrument(skip(self), level = "debug")]
    fn execute(&self, host: &str, command: &[String]) -> Result<RemoteOutput, RemoteError> {
        // ssh hands the command to the remote login shell as a single string
        let remote_command = shell_words::join(command);

        let mut child = Command::new(&self.program)
            .args(&self.options)
            // a host starting with `-` must not be read as an option
            .arg("--")
            .arg(host)
            .arg(&remote_command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(RemoteError::Spawn)?;

        debug!("Remote shell waiting on {}", child.id());

        let status = match self.timeout {
            Some(timeout) => match child.wait_timeout(timeout).map_err(RemoteError::Wait)? {
                Some(status) => status,
                None => {
                    warn!("Remote shell to {host} ran into timeout, killing it");

                    if let Err(error) = child.kill() {
                        warn!(error = ?error, "Failed to kill remote shell");
                    }
                    let _ = child.wait();

                    return Err(RemoteError::Timeout(timeout));
                }
            },
            None => child.wait().map_err(RemoteError::Wait)?,
        };

        let (stdout, stderr) = read_output(&mut child);

        Ok(RemoteOutput {
            status: status.code(),
            stdout,
            stderr,
        })
    }
}

fn read_output(child: &mut Child) -> (String, String) {
    let mut stdout = String::new();
    let mut stderr = String::new();

    if let Some(mut pipe) = child.stdout.take() {
        if let Err(error) = pipe.read_to_string(&mut stdout) {
            warn!(error = ?error, "Failed to read stdout of remote shell");
        }
    }

    if let Some(mut pipe) = child.stderr.take() {
        if let Err(error) = pipe.read_to_string(&mut stderr) {
            warn!(error = ?error, "Failed to read stderr of remote shell");
        }
    }

    (stdout, stderr)
}
