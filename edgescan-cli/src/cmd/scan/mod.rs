use clap::Args;
use edgescan::{
    descriptor::ConnectionDescriptor,
    error::{BoxError, ErrorContext as _, OpaqueError},
    scan::{DEFAULT_TRIALS, Scanner},
};
use terminal_prompt::Terminal;

use crate::utils::{
    probe::{ProbeArgs, cancel_on_ctrl_c},
    report,
};

#[derive(Debug, Clone, Args)]
/// sample edge candidates and rewrite a vless descriptor to the fastest one
pub struct CliCommandScan {
    /// the vless descriptor to rewrite,
    /// prompted for when not given
    descriptor: Option<String>,

    #[arg(long, short = 'n', default_value_t = DEFAULT_TRIALS)]
    /// number of candidates to sample and probe
    trials: usize,

    #[arg(long)]
    /// seed making candidate selection reproducible
    seed: Option<u64>,

    #[command(flatten)]
    probe: ProbeArgs,
}

/// Run the scan command.
pub async fn run(cfg: CliCommandScan) -> Result<(), BoxError> {
    cfg.probe.init_tracing()?;

    let raw = match cfg.descriptor {
        Some(raw) => raw,
        None => prompt_descriptor()?,
    };
    let descriptor =
        ConnectionDescriptor::parse(&raw).context("parse connection descriptor")?;

    let config = cfg
        .probe
        .scan_config()?
        .with_trials(cfg.trials)
        .with_seed(cfg.seed);
    let scanner = Scanner::new(cfg.probe.probe()?).with_config(config);

    let target = descriptor.probe_target();
    tracing::info!(
        tls.server_name = target.virtual_host(),
        url.path = target.path(),
        trials = cfg.trials,
        "scanning edge candidates",
    );

    let report = scanner
        .run(
            &target,
            report::progress(cfg.probe.json),
            cancel_on_ctrl_c(),
        )
        .await;

    report::print_report(&report, Some(&descriptor), cfg.probe.json)?;
    Ok(())
}

fn prompt_descriptor() -> Result<String, OpaqueError> {
    let mut terminal = Terminal::open().context("open terminal for descriptor prompting")?;
    terminal
        .prompt("🔗 vless descriptor: ")
        .context("prompt descriptor from terminal")
}
