//! Turning CLI arguments and the config file into runtime settings.

use std::path::Path;

use peerlink_config::schema::PeerlinkConfig;
use peerlink_config::validation::validate;
use peerlink_config::{load_default, load_from_path};
use peerlink_signaling::{MediaConstraints, OrchestratorConfig, SocketIoConfig};

use crate::cli::Args;

/// Load the config named on the command line (or the default one), apply
/// overrides and validate the result.
pub fn load(args: &Args) -> peerlink_common::Result<PeerlinkConfig> {
    let mut config = match &args.config {
        Some(path) => load_from_path(Path::new(path))?,
        None => load_default()?,
    };
    if let Some(url) = &args.relay_url {
        config.relay.url = url.clone();
    }
    validate(&config)?;
    Ok(config)
}

/// Filter directive for the log subscriber when `RUST_LOG` is unset.
pub fn log_directive(cli_level: Option<&str>, config: &PeerlinkConfig) -> String {
    let level = cli_level.unwrap_or_else(|| config.logging.level.as_filter());
    format!("peerlink={level}")
}

pub fn socket_config(config: &PeerlinkConfig) -> SocketIoConfig {
    let relay = &config.relay;
    SocketIoConfig {
        url: relay.url.clone(),
        path: relay.path.clone(),
        namespace: relay.namespace.clone(),
        connect_timeout_secs: u64::from(relay.connect_timeout_secs),
        reconnect_delay_secs: u64::from(relay.reconnect_delay_secs),
        max_reconnect_delay_secs: u64::from(relay.max_reconnect_delay_secs),
    }
}

/// Call settings for an orchestrator built from this config.
pub fn orchestrator_config(config: &PeerlinkConfig) -> OrchestratorConfig {
    let media = &config.media;
    OrchestratorConfig {
        display_name: config.identity.display_name.clone(),
        ice_servers: config.ice.servers.clone(),
        constraints: MediaConstraints {
            audio: media.audio,
            video: media.video,
            width: media.width,
            height: media.height,
            frame_rate: media.frame_rate,
        },
        notify_peer_on_hangup: config.call.notify_peer_on_hangup,
        notify_peer_on_decline: config.call.notify_peer_on_decline,
        event_buffer: config.call.event_buffer as usize,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerlink_config::schema::LogLevel;

    fn args() -> Args {
        Args {
            config: None,
            log_level: None,
            relay_url: None,
            room: None,
            print_config: false,
        }
    }

    #[test]
    fn log_directive_prefers_cli_level() {
        let mut config = PeerlinkConfig::default();
        config.logging.level = LogLevel::Warn;
        assert_eq!(log_directive(None, &config), "peerlink=warn");
        assert_eq!(log_directive(Some("debug"), &config), "peerlink=debug");
    }

    #[test]
    fn socket_config_copies_relay_section() {
        let mut config = PeerlinkConfig::default();
        config.relay.url = "https://relay.example.org".into();
        config.relay.namespace = "/calls".into();
        config.relay.max_reconnect_delay_secs = 60;

        let socket = socket_config(&config);
        assert_eq!(socket.namespace, "/calls");
        assert_eq!(socket.max_reconnect_delay_secs, 60);
        assert_eq!(
            socket.ws_url(),
            "wss://relay.example.org/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn orchestrator_config_maps_call_sections() {
        let mut config = PeerlinkConfig::default();
        config.identity.display_name = "Ada".into();
        config.media.video = false;
        config.media.frame_rate = 15;
        config.call.notify_peer_on_decline = false;
        config.call.event_buffer = 64;

        let call = orchestrator_config(&config);
        assert_eq!(call.display_name, "Ada");
        assert_eq!(call.ice_servers, config.ice.servers);
        assert!(call.constraints.audio);
        assert!(!call.constraints.video);
        assert_eq!(call.constraints.frame_rate, 15);
        assert!(call.notify_peer_on_hangup);
        assert!(!call.notify_peer_on_decline);
        assert_eq!(call.event_buffer, 64);
    }

    #[test]
    fn load_applies_relay_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[identity]\ndisplay_name = \"probe\"\n").unwrap();

        let mut args = args();
        args.config = Some(path.to_string_lossy().into_owned());
        args.relay_url = Some("wss://other.example.org".into());

        let config = load(&args).unwrap();
        assert_eq!(config.identity.display_name, "probe");
        assert_eq!(config.relay.url, "wss://other.example.org");

        args.relay_url = Some("ftp://nope".into());
        assert!(load(&args).is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let mut args = args();
        args.config = Some("/nonexistent/peerlink/config.toml".into());
        let err = load(&args).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }
}
