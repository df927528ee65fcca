use std::net::IpAddr;

use clap::Args;
use edgescan::{error::BoxError, probe::ProbeTarget, scan::Scanner};

use crate::utils::{
    probe::{ProbeArgs, cancel_on_ctrl_c},
    report,
};

#[derive(Debug, Clone, Args)]
/// probe explicit addresses for a virtual host and rank them
pub struct CliCommandProbe {
    #[arg(required = true)]
    /// addresses to probe, e.g. "104.16.12.34"
    addresses: Vec<IpAddr>,

    #[arg(long)]
    /// virtual host presented as tls server name and http host
    sni: String,

    #[arg(long, default_value = "/")]
    /// resource path requested during the upgrade
    path: String,

    #[command(flatten)]
    probe: ProbeArgs,
}

/// Run the probe command.
pub async fn run(cfg: CliCommandProbe) -> Result<(), BoxError> {
    cfg.probe.init_tracing()?;

    let scanner = Scanner::new(cfg.probe.probe()?).with_config(cfg.probe.scan_config()?);
    let target = ProbeTarget::new(cfg.sni.trim(), &cfg.path);

    tracing::info!(
        tls.server_name = target.virtual_host(),
        url.path = target.path(),
        addresses = cfg.addresses.len(),
        "probing addresses",
    );

    let report = scanner
        .run_addresses(
            cfg.addresses,
            &target,
            report::progress(cfg.probe.json),
            cancel_on_ctrl_c(),
        )
        .await;

    report::print_report(&report, None, cfg.probe.json)?;
    Ok(())
}
