use std::fmt;
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};

/// Reference to an OS process we do not own
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessHandle {
    pub pid: u32,
    pub name: String,
    /// seconds since the epoch, distinguishes a reused pid from the original process
    pub start_time: u64,
}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (pid {})", self.name, self.pid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    /// the exit code is only observable for some processes, e.g., our own children
    Exited { code: Option<i32> },
}

/// Read access to the process table of the local host
pub trait ProcessTable {
    /// all processes currently in the table
    fn snapshot(&mut self) -> Vec<ProcessHandle>;

    /// re-check whether the process behind `handle` is still running
    fn status(&mut self, handle: &ProcessHandle) -> Liveness;
}

/// `ProcessTable` backed by the live OS process list
pub struct SystemProcessTable {
    system: System,
}

impl SystemProcessTable {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SystemProcessTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemProcessTable").finish_non_exhaustive()
    }
}

impl ProcessTable for SystemProcessTable {
    fn snapshot(&mut self) -> Vec<ProcessHandle> {
        self.system.refresh_processes(ProcessesToUpdate::All, true);

        self.system
            .processes()
            .values()
            // threads share the name of their process
            .filter(|process| process.thread_kind().is_none())
            .filter(|process| !is_terminated(process.status()))
            .map(|process| ProcessHandle {
                pid: process.pid().as_u32(),
                name: process.name().to_string_lossy().into_owned(),
                start_time: process.start_time(),
            })
            .collect()
    }

    fn status(&mut self, handle: &ProcessHandle) -> Liveness {
        let pid = Pid::from_u32(handle.pid);
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        match self.system.process(pid) {
            Some(process)
                if process.start_time() == handle.start_time
                    && !is_terminated(process.status()) =>
            {
                Liveness::Alive
            }
            _ => Liveness::Exited { code: None },
        }
    }
}

// zombies already exited, they only wait for their parent to reap them
fn is_terminated(status: ProcessStatus) -> bool {
    matches!(status, ProcessStatus::Zombie | ProcessStatus::Dead)
}
