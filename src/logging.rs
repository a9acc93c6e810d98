use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Install the diagnostic log subscriber on stderr.
///
/// `RUST_LOG` wins when set. Otherwise only warnings are shown, or
/// everything from this crate at debug level when `verbose` is on.
pub fn init_logging(verbose: bool) -> Result<()> {
    let default_directive = if verbose { "site_mirror=debug,warn" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|e| anyhow!("Failed to create log filter: {}", e))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow!("Failed to initialise logging: {}", e))
}
