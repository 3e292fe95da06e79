use rst_common::with_tracing::tracing_subscriber::{
    self, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::common::types::CommonError;

fn default_filter() -> String {
    format!("{}=debug,prople_peer_core=debug", env!("CARGO_CRATE_NAME"))
}

/// Builds the filter from `RUST_LOG` first, then from the configured filter
pub fn build_filter(configured: Option<&str>) -> Result<EnvFilter, CommonError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directives = configured
        .map(str::to_string)
        .unwrap_or_else(default_filter);

    EnvFilter::try_new(directives).map_err(|err| CommonError::LoggingError(err.to_string()))
}

/// Installs the global subscriber, records of the `log` facade used by the core crate
/// are forwarded to it
pub fn init(configured: Option<&str>) -> Result<(), CommonError> {
    tracing_subscriber::registry()
        .with(build_filter(configured)?)
        .with(tracing_subscriber::fmt::layer().without_time())
        .try_init()
        .map_err(|err| CommonError::LoggingError(err.to_string()))
}
