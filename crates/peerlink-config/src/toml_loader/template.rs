//! Default TOML config template with inline documentation comments.

use crate::schema::CONFIG_SCHEMA_VERSION;

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    format!(
        r##"# Peerlink Configuration
# Schema version {CONFIG_SCHEMA_VERSION}
# Only override what you want to change -- missing fields use defaults.

[identity]
# display_name = "peerlink"

[relay]
# url = "http://localhost:5000"    # http, https, ws or wss
# path = "/socket.io/"
# namespace = "/"
# connect_timeout_secs = 15        # 1-120
# reconnect_delay_secs = 1         # 1-60
# max_reconnect_delay_secs = 30    # 1-600

# One [[ice.servers]] block per STUN/TURN endpoint.
[[ice.servers]]
urls = ["stun:stun.l.google.com:19302"]
# [[ice.servers]]
# urls = ["turn:turn.example.com:3478"]
# username = "user"
# credential = "secret"

[media]
# audio = true
# video = true
# width = 1280                     # 160-3840
# height = 720                     # 120-2160
# frame_rate = 30                  # 1-60

[call]
# notify_peer_on_hangup = true
# notify_peer_on_decline = true
# event_buffer = 256               # 16-65536

[logging]
# level = "info"                   # trace, debug, info, warn, error
"##
    )
}
