use crate::net::{LobbyData, LobbyPlayerInfo, LobbyServerInfo, PlayerFlags};

const HOST_FACE: u8 = 12;

/// Pre-game membership as seen by the host. Slot 0 always holds the host.
#[derive(Debug, Clone)]
pub struct Lobby {
    server_info: LobbyServerInfo,
    players: Vec<LobbyPlayerInfo>,
    max_players: usize,
}

impl Lobby {
    pub fn new(host_identification: impl Into<String>, max_players: usize) -> Self {
        Self {
            server_info: LobbyServerInfo::default(),
            players: vec![LobbyPlayerInfo::host(host_identification)],
            max_players: max_players.clamp(1, u8::MAX as usize),
        }
    }

    pub fn server_info(&self) -> &LobbyServerInfo {
        &self.server_info
    }

    pub fn set_server_info(&mut self, info: LobbyServerInfo) {
        self.server_info = info;
    }

    pub fn players(&self) -> &[LobbyPlayerInfo] {
        &self.players
    }

    pub fn player(&self, index: u8) -> Option<&LobbyPlayerInfo> {
        self.players.get(index as usize)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    /// Returns the new player's index, or `None` when the lobby is full.
    pub fn add_player(&mut self, identification: impl Into<String>) -> Option<u8> {
        if self.is_full() {
            return None;
        }
        let index = self.players.len() as u8;
        self.players
            .push(LobbyPlayerInfo::human(identification, HOST_FACE.saturating_add(index)));
        Some(index)
    }

    pub fn add_computer(&mut self, face: u8) -> Option<u8> {
        if self.is_full() {
            return None;
        }
        let index = self.players.len() as u8;
        self.players.push(LobbyPlayerInfo {
            flags: PlayerFlags::COMPUTER,
            ..LobbyPlayerInfo::human(String::new(), face)
        });
        Some(index)
    }

    /// Removes a non-host player. Later players move down one slot.
    pub fn remove_player(&mut self, index: u8) -> Option<LobbyPlayerInfo> {
        let index = index as usize;
        if index == 0 || index >= self.players.len() {
            return None;
        }
        Some(self.players.remove(index))
    }

    pub fn index_of(&self, identification: &str) -> Option<u8> {
        find_player(&self.players, identification)
    }

    pub fn to_lobby_data(&self, number: u8) -> LobbyData {
        LobbyData {
            number,
            server_info: self.server_info.clone(),
            players: self.players.clone(),
        }
    }
}

impl LobbyData {
    /// Index of the first non-host player controlled from `identification`.
    pub fn player_index_of(&self, identification: &str) -> Option<u8> {
        find_player(&self.players, identification)
    }
}

fn find_player(players: &[LobbyPlayerInfo], identification: &str) -> Option<u8> {
    players
        .iter()
        .position(|p| !p.is_host() && !p.is_computer() && p.identification == identification)
        .map(|index| index as u8)
}
