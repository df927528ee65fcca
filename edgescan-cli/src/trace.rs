use edgescan::error::{BoxError, ErrorContext as _};
use tracing_subscriber::{
    EnvFilter, filter::Directive, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use std::io::IsTerminal as _;

/// Initialise tracing, writing to stderr so stdout only carries results.
///
/// `RUST_LOG` takes precedence over the given default directive.
pub fn init_tracing(default_directive: impl Into<Directive>) -> Result<(), BoxError> {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr),
        )
        .with(
            EnvFilter::builder()
                .with_default_directive(default_directive.into())
                .from_env_lossy(),
        )
        .try_init()
        .context("try init tracing subscriber")?;

    Ok(())
}
