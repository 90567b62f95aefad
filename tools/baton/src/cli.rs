//! Command-line interface definitions for baton.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Boots the Baton kernel and runs a workload on it.
#[derive(Parser)]
#[command(name = "baton", version, about)]
pub struct Cli {
    /// Workload to run.
    #[command(subcommand)]
    pub command: Command,

    /// Kernel configuration file (TOML).
    #[arg(long, short = 'c', global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Debug flag letters: t processes, i interrupts, s synchronization,
    /// a system calls, m machine, + everything.
    #[arg(long, short = 'd', global = true, value_name = "FLAGS")]
    pub debug: Option<String>,

    /// Attach a timer that fires at pseudo-random intervals from this seed.
    #[arg(long = "rs", global = true, value_name = "SEED")]
    pub random_seed: Option<u64>,

    /// Print the final statistics as JSON on stdout. Kernel output moves
    /// to stderr.
    #[arg(long, global = true)]
    pub json: bool,

    /// Only log errors.
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log informational and debug messages.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

/// Available workloads.
#[derive(Subcommand)]
pub enum Command {
    /// Processes that take turns through `yield`.
    Processes(ProcessesArgs),
    /// Hydrogen and oxygen atoms that bond through semaphores.
    Water(WaterArgs),
    /// A parent that joins on a child and collects its exit code.
    Join(JoinArgs),
}

/// Arguments for the `processes` subcommand.
#[derive(Args)]
pub struct ProcessesArgs {
    /// Number of processes to fork.
    #[arg(long, short = 'n', default_value_t = 5)]
    pub count: u32,

    /// Times each process loops before finishing.
    #[arg(long, default_value_t = 5)]
    pub loops: u32,
}

/// Arguments for the `water` subcommand.
#[derive(Args)]
pub struct WaterArgs {
    /// Hydrogen atoms to create.
    #[arg(long = "hydrogen", short = 'H', default_value_t = 4)]
    pub hydrogen: u32,

    /// Oxygen atoms to create.
    #[arg(long = "oxygen", short = 'O', default_value_t = 2)]
    pub oxygen: u32,
}

/// Arguments for the `join` subcommand.
#[derive(Args)]
pub struct JoinArgs {
    /// Exit code the child hands back.
    #[arg(long, default_value_t = 42, allow_negative_numbers = true)]
    pub code: i32,

    /// Times the child yields before exiting.
    #[arg(long, default_value_t = 3)]
    pub steps: u32,
}
