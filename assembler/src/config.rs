use config::load_config;
use config::shared::AssemblerConfig;

use crate::error::{AssemblerError, AssemblerResult};

/// Loads and validates the assembler configuration.
pub fn load_assembler_config() -> AssemblerResult<AssemblerConfig> {
    let config = load_config::<AssemblerConfig>().map_err(AssemblerError::config)?;
    config.validate().map_err(AssemblerError::config)?;

    Ok(config)
}
