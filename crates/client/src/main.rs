mod net;

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use net::{ClientConfig, GameClient};

#[derive(Parser)]
#[command(name = "serfnet-client")]
#[command(about = "Headless serfnet game client")]
struct Args {
    #[arg(
        short,
        long,
        default_value = "127.0.0.1:7777",
        help = "Server address to connect to"
    )]
    server: String,

    #[arg(long, default_value_t = 5)]
    join_attempts: u32,

    #[arg(long, default_value_t = 2000, help = "Milliseconds between transfers, 0 to disable")]
    action_interval_ms: u64,

    #[arg(long, default_value_t = 10_000, help = "Silence in ms before the server is dropped")]
    hard_timeout_ms: u64,

    #[arg(long, help = "Leave after this many seconds")]
    run_for: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let addr = resolve(&args.server)?;

    let net = serfnet::NetConfig::default()
        .with_hard_timeout(Duration::from_millis(args.hard_timeout_ms))?;
    let config = ClientConfig {
        net,
        join_attempts: args.join_attempts,
        action_interval: (args.action_interval_ms > 0)
            .then(|| Duration::from_millis(args.action_interval_ms)),
        run_for: args.run_for.map(Duration::from_secs),
        ..ClientConfig::default()
    };

    let mut client = GameClient::new(config);
    client.connect(addr)?;
    client.run();

    Ok(())
}

fn resolve(server: &str) -> anyhow::Result<SocketAddr> {
    server
        .to_socket_addrs()
        .with_context(|| format!("invalid server address {}", server))?
        .next()
        .with_context(|| format!("{} did not resolve", server))
}
