pub mod ssh;

pub use ssh::{RemoteError, RemoteOutput, RemoteShell, Ssh};

use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// One try at publishing completion to a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionAttempt {
    pub host: String,
    pub sentinel: PathBuf,
    pub success: bool,
    /// missing if the remote shell never produced an exit status
    pub output: Option<RemoteOutput>,
}

/// Publishes job completion by touching a sentinel file on peer hosts.
///
/// Every call is a single attempt, retrying is up to the caller.
#[derive(Debug)]
pub struct CompletionPublisher<S: RemoteShell> {
    shell: S,
    source: String,
}

impl<S: RemoteShell> CompletionPublisher<S> {
    pub fn new(shell: S) -> Self {
        Self {
            shell,
            source: local_hostname(),
        }
    }

    /// returns true only if the sentinel was touched on `host`
    pub fn signal_completion(&self, host: &str, sentinel: &Path) -> bool {
        self.publish(host, sentinel).success
    }

    #[tracing::instrument(skip(self), fields(source = %self.source), level = "info")]
    pub fn publish(&self, host: &str, sentinel: &Path) -> CompletionAttempt {
        info!("Start writing mpirun finished status to {host}");

        // a lossy conversion would touch a different file
        let Some(sentinel_str) = sentinel.to_str() else {
            error!(sentinel = ?sentinel, "Sentinel path is not valid UTF-8, cannot signal {host}");

            return CompletionAttempt {
                host: host.to_owned(),
                sentinel: sentinel.to_path_buf(),
                success: false,
                output: None,
            };
        };

        let command = vec!["touch".to_owned(), sentinel_str.to_owned()];

        let (success, output) = match self.shell.execute(host, &command) {
            Ok(output) if output.success() => {
                info!(stdout = %output.stdout.trim(), "Finished writing status file");
                (true, Some(output))
            }
            Ok(output) => {
                warn!(
                    status = ?output.status,
                    stderr = %output.stderr.trim(),
                    "Cannot write status file to {host}"
                );
                (false, Some(output))
            }
            Err(error) => {
                error!(error = ?error, "Cannot connect to {host}: {error}");
                (false, None)
            }
        };

        CompletionAttempt {
            host: host.to_owned(),
            sentinel: sentinel.to_path_buf(),
            success,
            output,
        }
    }

    /// publish to every host once, in order, failures do not stop the remaining hosts
    pub fn broadcast<'a, I>(&self, hosts: I, sentinel: &Path) -> Vec<CompletionAttempt>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let attempts: Vec<_> = hosts
            .into_iter()
            .map(|host| self.publish(host, sentinel))
            .collect();

        let failed = attempts.iter().filter(|attempt| !attempt.success).count();
        if failed > 0 {
            warn!("Failed to signal {failed}/{} hosts", attempts.len());
        }

        attempts
    }
}

/// name of this host, used to tell the origin of a signal apart in the logs
pub fn local_hostname() -> String {
    match nix::unistd::gethostname() {
        Ok(hostname) => hostname.to_string_lossy().into_owned(),
        Err(error) => {
            error!(error = ?error, "Failed to retrieve hostname: {error}");

            String::from("unknown")
        }
    }
}
