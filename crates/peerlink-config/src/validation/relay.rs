//! Relay endpoint validation.

use crate::schema::PeerlinkConfig;

use super::helpers::validate_range;

const RELAY_SCHEMES: [&str; 4] = ["http://", "https://", "ws://", "wss://"];

pub(crate) fn validate_relay(errors: &mut Vec<String>, config: &PeerlinkConfig) {
    let relay = &config.relay;

    if relay.url.trim().is_empty() {
        errors.push("relay.url must not be empty".into());
    } else if !RELAY_SCHEMES.iter().any(|s| relay.url.starts_with(s)) {
        errors.push(format!(
            "relay.url = {} must start with http://, https://, ws:// or wss://",
            relay.url
        ));
    }

    if !relay.path.starts_with('/') {
        errors.push(format!("relay.path = {} must start with '/'", relay.path));
    }
    if !relay.namespace.starts_with('/') {
        errors.push(format!(
            "relay.namespace = {} must start with '/'",
            relay.namespace
        ));
    }

    validate_range(
        errors,
        "relay.connect_timeout_secs",
        relay.connect_timeout_secs,
        1,
        120,
    );
    validate_range(
        errors,
        "relay.reconnect_delay_secs",
        relay.reconnect_delay_secs,
        1,
        60,
    );
    validate_range(
        errors,
        "relay.max_reconnect_delay_secs",
        relay.max_reconnect_delay_secs,
        1,
        600,
    );
    if relay.reconnect_delay_secs > relay.max_reconnect_delay_secs {
        errors.push(format!(
            "relay.reconnect_delay_secs = {} exceeds relay.max_reconnect_delay_secs = {}",
            relay.reconnect_delay_secs, relay.max_reconnect_delay_secs
        ));
    }
}
