pub mod table;

pub use table::{Liveness, ProcessHandle, ProcessTable, SystemProcessTable};

use std::{
    thread,
    time::{Duration, Instant},
};
use thiserror::Error;
use tracing::{debug, error, info, instrument, trace, warn};

/// name of the Open MPI daemon started on every host of a job
pub const LAUNCHER_PROCESS_NAME: &str = "orted";
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_millis(250);

/// processes matching the launcher name at the time of a scan
pub type ProcessSet = Vec<ProcessHandle>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("No {name} process appeared within {timeout:?}")]
    Timeout { name: String, timeout: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitedProcess {
    pub handle: ProcessHandle,
    pub code: Option<i32>,
}

/// Result of waiting on a process set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitOutcome {
    pub exited: Vec<ExitedProcess>,
    /// only non-empty if the wait was bounded and ran out
    pub still_alive: Vec<ProcessHandle>,
}

impl WaitOutcome {
    pub fn is_complete(&self) -> bool {
        self.still_alive.is_empty()
    }
}

/// Watches the launcher daemon of the local host.
///
/// The daemon has no way to report that communication is up or that the job is done, its
/// lifetime is the only signal. Finding it and waiting for it are separate steps so callers
/// can act in between, e.g., log the discovered set or bail out on a timeout.
#[derive(Debug)]
pub struct OrtedWatcher<T: ProcessTable> {
    table: T,
    process_name: String,
    discovery_timeout: Duration,
    poll_interval: Duration,
    wait_interval: Duration,
    wait_timeout: Option<Duration>,
}

impl<T: ProcessTable> OrtedWatcher<T> {
    pub fn new(table: T) -> Self {
        Self {
            table,
            process_name: LAUNCHER_PROCESS_NAME.to_owned(),
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            wait_interval: DEFAULT_WAIT_INTERVAL,
            wait_timeout: None,
        }
    }

    pub fn with_process_name(mut self, name: impl Into<String>) -> Self {
        self.process_name = name.into();
        self
    }

    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_wait_interval(mut self, interval: Duration) -> Self {
        self.wait_interval = interval;
        self
    }

    /// bound `await_exit`, without a bound it blocks until every process is gone
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    /// Scan the process table until at least one launcher process shows up.
    #[instrument(skip(self), fields(name = %self.process_name), level = "info")]
    pub fn discover(&mut self) -> Result<ProcessSet, DiscoveryError> {
        let start = Instant::now();
        let mut scans = 0_u64;

        loop {
            scans += 1;

            let processes: ProcessSet = self
                .table
                .snapshot()
                .into_iter()
                .filter(|process| process.name == self.process_name)
                .collect();

            if !processes.is_empty() {
                info!(
                    scans,
                    "Process[es] found: {}",
                    itertools::join(processes.iter(), ", ")
                );

                return Ok(processes);
            }

            let elapsed = start.elapsed();

            if elapsed >= self.discovery_timeout {
                error!(
                    scans,
                    "No {} process started within {:?}", self.process_name, self.discovery_timeout
                );

                return Err(DiscoveryError::Timeout {
                    name: self.process_name.clone(),
                    timeout: self.discovery_timeout,
                });
            }

            trace!(scans, "No {} process yet", self.process_name);
            thread::sleep(self.poll_interval.min(self.discovery_timeout - elapsed));
        }
    }

    /// Wait until every process in `processes` has exited.
    ///
    /// Liveness is checked against the process table on every round, a process that exited
    /// before this call is reported on the first round. `on_exit` is called exactly once for
    /// every process that exits.
    pub fn await_exit<F>(&mut self, processes: ProcessSet, mut on_exit: F) -> WaitOutcome
    where
        F: FnMut(&ProcessHandle, Option<i32>),
    {
        let deadline = self.wait_timeout.and_then(|timeout| {
            let deadline = Instant::now().checked_add(timeout);

            if deadline.is_none() {
                warn!("Wait timeout of {timeout:?} is out of range, waiting without a bound");
            }

            deadline
        });
        let mut outcome = WaitOutcome::default();
        let mut alive = processes;

        loop {
            let mut remaining = Vec::with_capacity(alive.len());

            for handle in alive.drain(..) {
                match self.table.status(&handle) {
                    Liveness::Alive => remaining.push(handle),
                    Liveness::Exited { code } => {
                        on_exit(&handle, code);
                        outcome.exited.push(ExitedProcess { handle, code });
                    }
                }
            }

            alive = remaining;

            if alive.is_empty() {
                debug!(exited = outcome.exited.len(), "All processes exited");
                return outcome;
            }

            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();

                    if now >= deadline {
                        warn!(
                            still_alive = alive.len(),
                            "Stopped waiting, process[es] still running: {}",
                            itertools::join(alive.iter(), ", ")
                        );

                        outcome.still_alive = alive;
                        return outcome;
                    }

                    self.wait_interval.min(deadline - now)
                }
                None => self.wait_interval,
            };

            thread::sleep(pause);
        }
    }

    /// Discover the launcher and block until all of its processes are gone.
    pub fn wait_for_completion(&mut self) -> Result<WaitOutcome, DiscoveryError> {
        let processes = self.discover()?;

        info!(
            "Waiting for {} process[es]: {}",
            self.process_name,
            itertools::join(processes.iter(), ", ")
        );

        let outcome = self.await_exit(processes, log_exit);

        if outcome.is_complete() {
            info!("All {} process[es] finished", self.process_name);
        }

        Ok(outcome)
    }
}

/// default exit observer
pub fn log_exit(handle: &ProcessHandle, code: Option<i32>) {
    match code {
        Some(code) => info!(pid = handle.pid, "Process {handle} terminated with exit code {code}"),
        None => info!(pid = handle.pid, "Process {handle} terminated"),
    }
}
