//! Validation for the smaller sections: identity, media, and call.

use crate::schema::PeerlinkConfig;

use super::helpers::validate_range;

pub(crate) fn validate_identity(errors: &mut Vec<String>, config: &PeerlinkConfig) {
    if config.identity.display_name.trim().is_empty() {
        errors.push("identity.display_name must not be empty".into());
    }
}

pub(crate) fn validate_media(errors: &mut Vec<String>, config: &PeerlinkConfig) {
    validate_range(errors, "media.width", config.media.width, 160, 3840);
    validate_range(errors, "media.height", config.media.height, 120, 2160);
    validate_range(errors, "media.frame_rate", config.media.frame_rate, 1, 60);
}

pub(crate) fn validate_call(errors: &mut Vec<String>, config: &PeerlinkConfig) {
    validate_range(
        errors,
        "call.event_buffer",
        config.call.event_buffer,
        16,
        65536,
    );
}
