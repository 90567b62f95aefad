//! Baton bootstrap tool.
//!
//! Loads a kernel configuration, overlays the command-line flags, boots a
//! kernel on the main thread and runs the chosen workload until the machine
//! halts.
//!
//! Pipeline: read config → overlay flags → install log sink → boot →
//!           run workload → report statistics.

mod cli;
mod demos;

use anyhow::{Context, Result};
use baton_core::stats::Statistics;
use baton_kernel::log::{self, LogLevel, StderrSink, StdoutSink};
use baton_kernel::{Kernel, KernelConfig, kinfo};
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let config = resolve_config(&cli)?;
    install_logger(&cli, &config);

    let kernel = Kernel::new(config);
    kinfo!("Booting kernel");
    let stats = match &cli.command {
        cli::Command::Processes(args) => kernel.run(|k| demos::processes(k, args)),
        cli::Command::Water(args) => kernel.run(|k| demos::water(k, args)),
        cli::Command::Join(args) => kernel.run(|k| demos::join(k, args)),
    };

    report(&cli, &stats)
}

// ===========================================================================
// Configuration
// ===========================================================================

/// Reads the configuration file, if any, and applies command-line overrides.
fn resolve_config(cli: &cli::Cli) -> Result<KernelConfig> {
    let mut config = match &cli.config {
        Some(path) => KernelConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => KernelConfig::default(),
    };

    if let Some(debug) = &cli.debug {
        config.debug.clone_from(debug);
    }
    if let Some(seed) = cli.random_seed {
        config.timer.random_seed = Some(seed);
    }
    if cli.quiet {
        config.log_level = LogLevel::Error;
    } else if cli.verbose || !config.debug_flags().is_empty() {
        config.log_level = config.log_level.max(LogLevel::Debug);
    }

    config.validate().context("command-line overrides")?;
    Ok(config)
}

// ===========================================================================
// Output
// ===========================================================================

/// Routes kernel output to stdout, or to stderr when stdout carries JSON.
fn install_logger(cli: &cli::Cli, config: &KernelConfig) {
    log::set_debug_flags(config.debug_flags());
    if cli.json {
        log::init_logger(Box::new(StderrSink::new(config.log_level)));
    } else {
        log::init_logger(Box::new(StdoutSink::new(config.log_level)));
    }
}

/// The halting machine prints the text report itself; JSON goes to stdout
/// on request.
fn report(cli: &cli::Cli, stats: &Statistics) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(stats).context("serializing statistics")?;
        println!("{json}");
    }
    Ok(())
}
