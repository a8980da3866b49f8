mod cli;
mod monitor;
mod settings;

use std::sync::Arc;

use peerlink_common::PeerId;
use peerlink_config::schema::PeerlinkConfig;
use peerlink_signaling::{Orchestrator, SocketIoClient, TransportEvent};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use monitor::{NoDevices, NoEngine};

#[tokio::main]
async fn main() {
    let args = cli::parse();

    // Config errors are reported after logging is up.
    let loaded = settings::load(&args);
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => PeerlinkConfig::default(),
    };

    let directive = settings::log_directive(args.log_level.as_deref(), &config);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)),
        )
        .init();

    if let Err(e) = loaded {
        error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    }

    if args.print_config {
        println!("{}", peerlink_config::config_to_json(&config));
        return;
    }

    let call = settings::orchestrator_config(&config);
    info!(
        display_name = %call.display_name,
        ice_servers = call.ice_servers.len(),
        "Call settings"
    );

    let room = args.room.clone();
    let socket = settings::socket_config(&config);
    info!(url = %socket.url, room = ?room, "Connecting to signaling relay");
    let (client, mut relay_rx) = SocketIoClient::connect(socket);
    let client = Arc::new(client);

    let (orch, mut calls) = Orchestrator::new(
        call,
        PeerId::default(),
        client.clone(),
        Arc::new(NoDevices),
        Arc::new(NoEngine),
    );
    let (forward, orch_rx) = mpsc::channel(64);
    let orch_task = orch.spawn(orch_rx);

    // The orchestrator rejoins on reconnect once it knows the room.
    let mut joined = false;
    loop {
        tokio::select! {
            event = relay_rx.recv() => {
                let Some(event) = event else {
                    warn!("Transport event channel closed");
                    break;
                };
                let connected = matches!(event, TransportEvent::Connected);
                if forward.send(event).await.is_err() {
                    warn!("Orchestrator stopped");
                    break;
                }
                if connected && !joined {
                    if let Some(room) = room.as_deref() {
                        match orch.join_room(room).await {
                            Ok(()) => joined = true,
                            Err(e) => warn!(room, error = %e, "Failed to join room"),
                        }
                    }
                }
            }
            Some(event) = calls.recv() => monitor::on_call_event(&orch, event).await,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    drop(forward);
    if let Err(e) = orch_task.await {
        warn!(error = %e, "Orchestrator task failed");
    }
    client.disconnect().await;
}
