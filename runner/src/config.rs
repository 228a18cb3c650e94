#[cfg(test)]
mod config_test;

use crate::{
    environment::DEFAULT_ENVIRONMENT_FILE,
    options::{DefaultOptions, OptionResolver},
    process::{OrtedWatcher, ProcessTable, LAUNCHER_PROCESS_NAME},
    signal::Ssh,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::Error,
    os::unix::fs::MetadataExt,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tracing::{error, warn};

// check if a file is executable
pub fn check_executable(path: &Path) -> Result<bool, ConfigErrors> {
    if !path.is_file() {
        Err(ConfigErrors::FileNotFound)
    } else {
        match File::open(path).map(|file| file.metadata()) {
            Ok(Ok(metadata)) => Ok((metadata.mode() & 0o111) != 0),
            Ok(Err(e)) | Err(e) => Err(ConfigErrors::MetadataNotFound(e)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("Failed to read config file")]
    Read(#[source] Error),
    #[error("Config file is invalid")]
    Parse(#[from] serde_yaml::Error),
    #[error("File not found")]
    FileNotFound,
    #[error("Metadata not found")]
    MetadataNotFound(#[from] Error),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LauncherConfig {
    // interface used for out of band and NCCL socket traffic, e.g., eth0
    #[serde(default = "default_network_interface")]
    pub network_interface: String,
    #[serde(default)]
    pub preload_library: Option<PathBuf>,
    // user overrides for the launcher options, as passed on the mpirun command line
    #[serde(default)]
    pub custom_mpi_options: String,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default = "default_environment_file")]
    pub environment_file: PathBuf,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    #[serde(default = "default_process_name")]
    pub process_name: String,
    /// seconds
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout: u64,
    /// milliseconds between two scans of the process table
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// milliseconds between two liveness checks while waiting
    #[serde(default = "default_wait_interval")]
    pub wait_interval: u64,
    /// seconds, waits forever if unset
    #[serde(default)]
    pub wait_timeout: Option<u64>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CompletionConfig {
    pub sentinel: Option<PathBuf>,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub ssh: SshConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SshConfig {
    #[serde(default = "default_ssh_program")]
    pub program: PathBuf,
    #[serde(default)]
    pub options: Vec<String>,
    /// seconds, relies on the timeouts of ssh itself if unset
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            network_interface: default_network_interface(),
            preload_library: None,
            custom_mpi_options: String::new(),
            watch: WatchConfig::default(),
            completion: CompletionConfig::default(),
            environment_file: default_environment_file(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            process_name: default_process_name(),
            discovery_timeout: default_discovery_timeout(),
            poll_interval: default_poll_interval(),
            wait_interval: default_wait_interval(),
            wait_timeout: None,
        }
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            program: default_ssh_program(),
            options: Vec::new(),
            timeout: None,
        }
    }
}

impl LauncherConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigErrors> {
        let content = fs::read_to_string(path).map_err(ConfigErrors::Read)?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigErrors> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn default_options(&self) -> DefaultOptions {
        DefaultOptions::new(&self.network_interface).with_preload(self.preload_library.clone())
    }

    pub fn resolver(&self) -> OptionResolver {
        OptionResolver::new(&self.default_options())
    }

    /// returns true if any problem was found, every problem is logged
    pub fn preflight_checks(&self) -> bool {
        // attempt to catch all errors instead of piece-by-piece to make debugging easier for users
        let mut contains_error = false;

        if self.network_interface.trim().is_empty() {
            error!("network_interface must not be empty");
            contains_error = true;
        }

        if self.watch.process_name.is_empty() {
            error!("watch.process_name must not be empty");
            contains_error = true;
        }

        if self.watch.poll_interval == 0 || self.watch.wait_interval == 0 {
            error!("watch.poll_interval and watch.wait_interval must be larger than 0");
            contains_error = true;
        }

        if self.watch.discovery_timeout == 0 {
            warn!("watch.discovery_timeout is 0, the process table is only scanned once");
        }

        match &self.completion.sentinel {
            None if !self.completion.hosts.is_empty() => {
                error!("completion.hosts is set but completion.sentinel is missing");
                contains_error = true;
            }
            Some(sentinel) if sentinel.is_relative() => {
                warn!(
                    "completion.sentinel ({}) is relative, it resolves against the home directory on the remote host",
                    sentinel.to_string_lossy()
                );
            }
            _ => (),
        }

        for host in self.completion.hosts.iter().filter(|host| host.starts_with('-')) {
            error!("completion.hosts entry {host} starts with '-', which is not a valid host");
            contains_error = true;
        }

        for host in self.completion.hosts.iter().duplicates() {
            warn!("completion.hosts contains {host} more than once, it will be signaled repeatedly");
        }

        let program = &self.completion.ssh.program;
        // bare program names are looked up in PATH when spawning
        if program.components().count() > 1 {
            match check_executable(program) {
                Ok(true) => (),
                Ok(false) => {
                    error!(
                        "completion.ssh.program {} is not executable",
                        program.to_string_lossy()
                    );
                    contains_error = true;
                }
                Err(e) => {
                    error!(
                        "Failed to determine if completion.ssh.program ({}) is an executable: {e}",
                        program.to_string_lossy()
                    );
                    contains_error = true;
                }
            }
        }

        contains_error
    }
}

impl WatchConfig {
    pub fn watcher<T: ProcessTable>(&self, table: T) -> OrtedWatcher<T> {
        OrtedWatcher::new(table)
            .with_process_name(self.process_name.clone())
            .with_discovery_timeout(Duration::from_secs(self.discovery_timeout))
            .with_poll_interval(Duration::from_millis(self.poll_interval))
            .with_wait_interval(Duration::from_millis(self.wait_interval))
            .with_wait_timeout(self.wait_timeout.map(Duration::from_secs))
    }
}

impl SshConfig {
    pub fn shell(&self) -> Ssh {
        Ssh::new()
            .with_program(self.program.clone())
            .with_options(self.options.clone())
            .with_timeout(self.timeout.map(Duration::from_secs))
    }
}

fn default_network_interface() -> String {
    String::from("eth0")
}

fn default_environment_file() -> PathBuf {
    PathBuf::from(DEFAULT_ENVIRONMENT_FILE)
}

fn default_process_name() -> String {
    String::from(LAUNCHER_PROCESS_NAME)
}

fn default_discovery_timeout() -> u64 {
    5 * 60
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_wait_interval() -> u64 {
    250
}

fn default_ssh_program() -> PathBuf {
    PathBuf::from("ssh")
}
