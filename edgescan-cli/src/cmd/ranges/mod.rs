#![allow(clippy::print_stdout)]

use clap::Args;
use edgescan::{
    error::{BoxError, ErrorContext as _},
    range::EDGE_RANGES,
};

#[derive(Debug, Clone, Args)]
/// list the built-in edge address ranges
pub struct CliCommandRanges {
    #[arg(long)]
    /// print the ranges as a json array
    json: bool,
}

/// Run the ranges command.
pub fn run(cfg: CliCommandRanges) -> Result<(), BoxError> {
    if cfg.json {
        let output = serde_json::to_string_pretty(EDGE_RANGES).context("format ranges")?;
        println!("{output}");
        return Ok(());
    }

    for range in EDGE_RANGES {
        println!("{range}");
    }
    Ok(())
}
