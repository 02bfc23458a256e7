use cdr_config::load_config;
use cdr_config::shared::IngesterConfig;

use crate::error::{IngesterError, IngesterResult};

/// Loads and validates the ingester configuration.
///
/// Uses the layered loader from [`cdr_config`] and validates the resulting
/// [`IngesterConfig`] before returning it.
pub fn load_ingester_config() -> IngesterResult<IngesterConfig> {
    let config = load_config::<IngesterConfig>().map_err(IngesterError::config)?;
    config.validate().map_err(IngesterError::config)?;

    Ok(config)
}
