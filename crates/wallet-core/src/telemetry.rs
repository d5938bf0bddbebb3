use tracing_subscriber::EnvFilter;

use crate::error::WalletError;

/// Installs a global fmt subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(default_filter: &str) -> Result<(), WalletError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|err| WalletError::Config(format!("invalid log filter: {err}")))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|err| WalletError::Config(format!("tracing already initialized: {err}")))
}
