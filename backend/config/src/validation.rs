//! Config validation: reject values that cannot drive a session.

use anyhow::{bail, Result};

use crate::schema::CapforgeConfig;

pub fn validate(config: &CapforgeConfig) -> Result<()> {
    if config.auth.mode.trim().is_empty() {
        bail!("auth.mode must not be empty");
    }
    if config.logging.level.trim().is_empty() {
        bail!("logging.level must not be empty");
    }
    if config.tools.max_read_bytes == 0 {
        bail!("tools.maxReadBytes must be positive");
    }
    Ok(())
}
