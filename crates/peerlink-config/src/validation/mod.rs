//! Full configuration validation.
//!
//! Each section has its own submodule; this orchestrator calls them all
//! and collects errors into a single `ConfigError`.

mod helpers;
mod ice;
mod misc;
mod relay;


use crate::schema::PeerlinkConfig;
use peerlink_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &PeerlinkConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    relay::validate_relay(&mut errors, config);
    ice::validate_ice(&mut errors, config);
    misc::validate_identity(&mut errors, config);
    misc::validate_media(&mut errors, config);
    misc::validate_call(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
