mod config;
mod events;
mod server;
mod simulation;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use config::ServerConfig;
use serfnet::NetConfig;
use serfnet::net::{LobbyServerInfo, ServerFlags};
use server::GameHost;

#[derive(Parser)]
#[command(name = "serfnet-server")]
#[command(about = "Hosts a serfnet game")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = serfnet::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = serfnet::net::MAX_PLAYERS)]
    max_players: usize,

    #[arg(short, long, default_value_t = 20)]
    tick_rate: u32,

    #[arg(long, default_value_t = 5, help = "Ticks between state pushes")]
    sync_every: u32,

    #[arg(long, default_value_t = 10_000, help = "Silence in ms before a client is dropped")]
    hard_timeout_ms: u64,

    #[arg(long, help = "Start the game once this many clients joined")]
    autostart: Option<usize>,

    #[arg(long, default_value_t = 0)]
    computer_players: u8,

    #[arg(long, default_value_t = 4)]
    inventories: u32,

    #[arg(long, default_value_t = 3)]
    map_size: u8,

    #[arg(long, default_value = "[0123456789ABCDEF]")]
    map_seed: String,

    #[arg(long, help = "Stop after this many seconds")]
    run_for: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let bind_addr = format!("{}:{}", args.bind, args.port);

    let net = NetConfig {
        port: args.port,
        max_players: args.max_players,
        ..NetConfig::default()
    }
    .with_hard_timeout(Duration::from_millis(args.hard_timeout_ms))?;

    let config = ServerConfig {
        net,
        tick_rate: args.tick_rate,
        sync_every: args.sync_every,
        autostart_players: args.autostart,
        computer_players: args.computer_players,
        inventories: args.inventories,
        server_info: LobbyServerInfo {
            flags: ServerFlags::USE_SERVER_VALUES,
            map_size: args.map_size,
            map_seed: args.map_seed.clone(),
        },
        run_for: args.run_for.map(Duration::from_secs),
    };

    let seed = args
        .map_seed
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |hash, b| {
            (hash ^ b as u64).wrapping_mul(0x0100_0000_01b3)
        });

    let mut host = GameHost::new(&bind_addr, config, seed)?;
    if let Some(addr) = host.local_addr() {
        log::info!("Server started on {}", addr);
    }
    host.run();
    log::info!("Server shutting down");

    Ok(())
}
