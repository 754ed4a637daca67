//!
//! Initialize tracing logs from the `[logging]` section of a [Config].
//!
//! Call it before building the name system so config and startup logs are not lost.
//!

use tracing_subscriber::EnvFilter;

use crate::Config;

/// Install a `fmt` subscriber if the config has a `[logging]` section.
///
/// `RUST_LOG` takes precedence over the configured levels.
pub fn init_tracing_logs_with_config_if_set(config: &Config) -> anyhow::Result<()> {
    let Some(logging) = &config.logging else {
        return Ok(());
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| logging.env_filter());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    Ok(())
}
