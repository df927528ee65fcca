//! entrypoint for edgescan-cli

#![cfg_attr(not(test), warn(clippy::print_stdout, clippy::dbg_macro))]

use clap::{Parser, Subcommand};

pub mod cmd;
use self::cmd::{probe, ranges, scan};

pub mod trace;
pub mod utils;

#[derive(Debug, Parser)]
#[command(name = "edgescan")]
#[command(bin_name = "edgescan")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmds: CliCommands,
}

#[derive(Debug, Subcommand)]
enum CliCommands {
    Scan(scan::CliCommandScan),
    Probe(probe::CliCommandProbe),
    Ranges(ranges::CliCommandRanges),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    #[allow(clippy::exit)]
    if let Err(err) = match cli.cmds {
        CliCommands::Scan(cfg) => scan::run(cfg).await,
        CliCommands::Probe(cfg) => probe::run(cfg).await,
        CliCommands::Ranges(cfg) => ranges::run(cfg),
    } {
        eprintln!("🚩 exit with error: {err}");
        std::process::exit(1);
    }
}
