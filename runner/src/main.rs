use clap::{Parser, Subcommand};
use mpisync::{
    config::LauncherConfig,
    environment::write_env_vars,
    process::{DiscoveryError, SystemProcessTable, WaitOutcome},
    signal::CompletionPublisher,
};
use std::{path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_unwrap::ResultExt;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// YAML config file, defaults are used if omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve the launcher options and print known and unknown options
    Options {
        /// overrides, e.g., "--map-by node --NCCL_DEBUG WARN"
        #[arg(long, allow_hyphen_values = true)]
        overrides: Option<String>,
        #[arg(long)]
        network_interface: Option<String>,
    },
    /// Wait for the launcher daemon to start and for all of its processes to exit
    Wait {
        /// seconds to wait for the daemon to appear
        #[arg(long)]
        discovery_timeout: Option<u64>,
    },
    /// Touch the sentinel file on a single host
    Signal {
        #[arg(long)]
        host: String,
        #[arg(long)]
        sentinel: Option<PathBuf>,
    },
    /// Append the current environment to the environment file
    DumpEnv {
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Wait for the launcher daemon, then signal every configured host
    Finish,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match LauncherConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load config {}: {e}", path.to_string_lossy());
                exit(1)
            }
        },
        None => LauncherConfig::default(),
    };

    // command line values take precedence over the config file
    match &cli.command {
        Commands::Options {
            overrides,
            network_interface,
        } => {
            if let Some(overrides) = overrides {
                config.custom_mpi_options = overrides.clone();
            }
            if let Some(network_interface) = network_interface {
                config.network_interface = network_interface.clone();
            }
        }
        Commands::Wait { discovery_timeout } => {
            if let Some(timeout) = discovery_timeout {
                config.watch.discovery_timeout = *timeout;
            }
        }
        Commands::Signal {
            sentinel: Some(sentinel),
            ..
        } => config.completion.sentinel = Some(sentinel.clone()),
        Commands::DumpEnv { path: Some(path) } => config.environment_file = path.clone(),
        _ => (),
    }

    if config.preflight_checks() {
        error!("Config contains errors, aborting");
        exit(1)
    }

    exit(match cli.command {
        Commands::Options { .. } => resolve_options(&config),
        Commands::Wait { .. } => match wait(&config) {
            Ok(outcome) if outcome.is_complete() => 0,
            _ => 1,
        },
        Commands::Signal { host, .. } => signal(&config, &host),
        Commands::DumpEnv { .. } => match write_env_vars(&config.environment_file) {
            Ok(_) => 0,
            Err(e) => {
                error!(
                    "Failed to write {}: {e}",
                    config.environment_file.to_string_lossy()
                );
                1
            }
        },
        Commands::Finish => finish(&config),
    })
}

fn resolve_options(config: &LauncherConfig) -> i32 {
    match config.resolver().resolve(&config.custom_mpi_options) {
        Ok(resolved) => {
            print!("{}", serde_yaml::to_string(&resolved).unwrap_or_log());
            0
        }
        Err(errors) => {
            for e in errors {
                error!("{e}");
            }
            2
        }
    }
}

fn wait(config: &LauncherConfig) -> Result<WaitOutcome, DiscoveryError> {
    let mut watcher = config.watch.watcher(SystemProcessTable::new());

    match watcher.wait_for_completion() {
        Ok(outcome) => {
            if !outcome.is_complete() {
                // a partial exit is not a finished job
                error!(
                    "{} process[es] still running after the wait timeout",
                    outcome.still_alive.len()
                );
            }
            Ok(outcome)
        }
        Err(e) => {
            error!("{e}, the launcher never started");
            Err(e)
        }
    }
}

fn signal(config: &LauncherConfig, host: &str) -> i32 {
    let Some(sentinel) = &config.completion.sentinel else {
        error!("No sentinel path given, use --sentinel or completion.sentinel");
        return 1;
    };

    let publisher = CompletionPublisher::new(config.completion.ssh.shell());

    if publisher.signal_completion(host, sentinel) {
        0
    } else {
        1
    }
}

fn finish(config: &LauncherConfig) -> i32 {
    match wait(config) {
        Ok(outcome) if outcome.is_complete() => (),
        _ => return 1,
    }

    let Some(sentinel) = &config.completion.sentinel else {
        info!("No sentinel configured, nothing to signal");
        return 0;
    };

    let publisher = CompletionPublisher::new(config.completion.ssh.shell());
    let attempts = publisher.broadcast(
        config.completion.hosts.iter().map(String::as_str),
        sentinel,
    );

    if attempts.iter().all(|attempt| attempt.success) {
        info!("Signaled completion to {} host[s]", attempts.len());
        0
    } else {
        1
    }
}
