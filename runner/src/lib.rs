//! Cluster synchronization for multi-host MPI jobs: resolve the launcher options, wait for
//! the local launcher daemon to come and go, and tell peer hosts once the job is done.

pub mod config;
pub mod environment;
pub mod options;
pub mod process;
pub mod signal;
