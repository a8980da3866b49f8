use clap::Parser;

/// peerlink-probe: sit on a signaling relay, log call events and decline
/// incoming calls.
#[derive(Parser, Debug)]
#[command(name = "peerlink-probe", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<String>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Relay URL override.
    #[arg(long)]
    pub relay_url: Option<String>,

    /// Room to join once connected.
    #[arg(short, long)]
    pub room: Option<String>,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    pub print_config: bool,
}

pub fn parse() -> Args {
    Args::parse()
}
