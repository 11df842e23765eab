use std::time::Duration;

use serfnet::NetConfig;
use serfnet::net::LobbyServerInfo;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub net: NetConfig,
    pub tick_rate: u32,
    /// Ticks between incremental state pushes.
    pub sync_every: u32,
    pub autostart_players: Option<usize>,
    pub computer_players: u8,
    pub inventories: u32,
    pub server_info: LobbyServerInfo,
    pub run_for: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            net: NetConfig::default(),
            tick_rate: 20,
            sync_every: 5,
            autostart_players: None,
            computer_players: 0,
            inventories: 4,
            server_info: LobbyServerInfo::default(),
            run_for: None,
        }
    }
}
