//! ICE server list validation.

use std::sync::LazyLock;

use regex::Regex;

use crate::schema::PeerlinkConfig;

static ICE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(stun|turn|turns):[^\s:]+(:\d{1,5})?(\?transport=(udp|tcp))?$").unwrap()
});

pub(crate) fn validate_ice(errors: &mut Vec<String>, config: &PeerlinkConfig) {
    for (i, server) in config.ice.servers.iter().enumerate() {
        if server.urls.is_empty() {
            errors.push(format!("ice.servers[{i}].urls must not be empty"));
        }
        for url in &server.urls {
            if !ICE_URL_RE.is_match(url) {
                errors.push(format!(
                    "ice.servers[{i}] url {url} is not a valid stun:/turn:/turns: url"
                ));
            }
        }
        if server.is_turn() && (server.username.is_none() || server.credential.is_none()) {
            errors.push(format!(
                "ice.servers[{i}] is a TURN server and needs username and credential"
            ));
        }
    }
}
