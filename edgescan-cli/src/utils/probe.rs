use std::time::Duration;

use clap::Args;
use edgescan::{
    error::OpaqueError,
    probe::{DEFAULT_EDGE_PORT, DEFAULT_EDGE_SIGNATURE, ProbeTimeouts, UpgradeProbe},
    scan::ScanConfig,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, Clone, Args)]
/// probe options shared by all probing commands
pub struct ProbeArgs {
    #[arg(long, short = 'c', value_name = "N")]
    /// probe at most N candidates at once (default: all at once),
    /// a scan then takes up to ceil(trials / N) times the timeout
    pub concurrency: Option<usize>,

    #[arg(long, value_name = "MS", default_value_t = 2000)]
    /// timeout (in milliseconds) for the tcp connect and tls handshake
    pub connect_timeout: u64,

    #[arg(long, value_name = "MS", default_value_t = 5000)]
    /// timeout (in milliseconds) for an entire probe
    pub timeout: u64,

    #[arg(long, default_value_t = DEFAULT_EDGE_PORT)]
    /// port to which candidates are dialed
    pub port: u16,

    #[arg(long, short = 'k')]
    /// skip verification of the certificate presented by candidates
    pub insecure: bool,

    #[arg(long, default_value = DEFAULT_EDGE_SIGNATURE)]
    /// provider signature accepted in the `server` response header,
    /// use an empty value to only accept protocol upgrades
    pub signature: String,

    #[arg(long)]
    /// offer h2 during the tls handshake, an edge negotiating it
    /// has to answer the h2 connection preface to be usable
    pub h2: bool,

    #[arg(long)]
    /// print the report as json instead of human readable progress
    pub json: bool,

    #[arg(long, short = 'v')]
    /// enable debug logs for tracing (possible via RUST_LOG env as well)
    pub verbose: bool,
}

impl ProbeArgs {
    /// Init tracing at the level selected by these args.
    pub fn init_tracing(&self) -> Result<(), edgescan::error::BoxError> {
        crate::trace::init_tracing(if self.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        })
    }

    /// Build the [`UpgradeProbe`] described by these args.
    pub fn probe(&self) -> Result<UpgradeProbe, OpaqueError> {
        let signature = Some(self.signature.trim()).filter(|s| !s.is_empty());
        UpgradeProbe::builder()
            .with_port(self.port)
            .with_insecure(self.insecure)
            .with_http2(self.h2)
            .with_signature(signature)
            .build()
    }

    /// The [`ScanConfig`] described by these args.
    pub fn scan_config(&self) -> Result<ScanConfig, OpaqueError> {
        let timeouts = ProbeTimeouts::try_new(
            Duration::from_millis(self.connect_timeout),
            Duration::from_millis(self.timeout),
        )?;
        Ok(ScanConfig::default()
            .with_concurrency(self.concurrency)
            .with_timeouts(timeouts))
    }
}

/// A token cancelled on the first ctrl-c.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let guard = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, finishing with the results collected so far");
            guard.cancel();
        }
    });
    cancel
}
