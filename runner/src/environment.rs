#[cfg(test)]
mod environment_test;

use std::{
    env,
    fs::OpenOptions,
    io::{BufWriter, Write},
    path::Path,
};
use thiserror::Error;
use tracing::{debug, info};

/// system wide environment file read by login sessions, including the ones opened by ssh
pub const DEFAULT_ENVIRONMENT_FILE: &str = "/etc/environment";

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("Failed to write environment file")]
    Io(#[from] std::io::Error),
}

/// Append every variable of the current process environment to `path` as `NAME=VALUE`.
///
/// Processes the launcher starts on other hosts go through a fresh ssh login and only see
/// what is in this file.
pub fn write_env_vars(path: &Path) -> Result<usize, EnvironmentError> {
    write_vars(path, env::vars_os())
}

fn write_vars<I, K, V>(path: &Path, vars: I) -> Result<usize, EnvironmentError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<std::ffi::OsStr>,
    V: AsRef<std::ffi::OsStr>,
{
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    let mut written = 0;

    for (name, value) in vars {
        let (name, value) = (name.as_ref().to_string_lossy(), value.as_ref().to_string_lossy());
        debug!("Persisting {name}");

        writeln!(writer, "{name}={value}")?;
        written += 1;
    }

    writer.flush()?;
    info!(path = ?path, "Wrote {written} environment variables");

    Ok(written)
}
