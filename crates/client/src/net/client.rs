use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;

use serfnet::{ClientEvent, GamePhase, LocalClient, ResponseType, StateMirror};

use super::config::ClientConfig;

const INVENTORY_RECORD_LEN: usize = 5;
const RESOURCE_KINDS: u64 = 6;

pub struct GameClient {
    client: LocalClient,
    events: Receiver<ClientEvent>,
    mirror: Arc<StateMirror>,
    config: ClientConfig,
    last_heartbeat: Instant,
    last_action: Instant,
    last_status: Instant,
    seed: u64,
}

impl GameClient {
    pub fn new(config: ClientConfig) -> Self {
        let client = LocalClient::new(config.net.clone());
        let mirror = Arc::new(StateMirror::new());
        client.set_game_state_sink(mirror.clone());
        let events = client.subscribe();

        Self {
            client,
            events,
            mirror,
            config,
            last_heartbeat: Instant::now(),
            last_action: Instant::now(),
            last_status: Instant::now(),
            seed: 0x9e37_79b9_7f4a_7c15,
        }
    }

    /// Joins `addr`, retrying while the failure is transient.
    pub fn connect(&mut self, addr: SocketAddr) -> anyhow::Result<()> {
        let attempts = self.config.join_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.client.join_server(addr) {
                Ok(()) => {
                    log::info!("Connected to {} as {}", addr, self.client.identification());
                    self.seed ^= self.client.identification().len() as u64;
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < attempts => {
                    log::warn!("Join attempt {}/{} failed: {}", attempt, attempts, e);
                    attempt += 1;
                    thread::sleep(self.config.retry_delay);
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("could not join {}", addr));
                }
            }
        }
    }

    pub fn run(&mut self) {
        let started = Instant::now();

        loop {
            if !self.process_events() {
                break;
            }
            if self
                .config
                .run_for
                .is_some_and(|limit| started.elapsed() >= limit)
            {
                log::info!("Run time elapsed, leaving");
                self.client.disconnect();
                break;
            }

            self.send_heartbeat();
            self.send_action();
            self.log_status();
            thread::sleep(Duration::from_millis(20));
        }
    }

    /// Returns false once the session is gone.
    fn process_events(&mut self) -> bool {
        let events: Vec<ClientEvent> = self.events.try_iter().collect();
        for event in events {
            match event {
                ClientEvent::Disconnected => {
                    log::info!("Disconnected from server");
                    return false;
                }
                ClientEvent::LobbyDataUpdated => {
                    if let Some(lobby) = self.client.lobby_data() {
                        log::info!(
                            "Lobby: {} players, map size {}, we are player {}",
                            lobby.players.len(),
                            lobby.server_info.map_size,
                            self.client.player_index()
                        );
                    }
                }
                ClientEvent::GameStarted => log::info!("Game started"),
                ClientEvent::GamePaused => log::info!("Game paused"),
                ClientEvent::GameResumed => log::info!("Game resumed"),
                ClientEvent::InputAllowed => log::info!("Input allowed"),
                ClientEvent::InputDisallowed => log::info!("Input disallowed"),
                ClientEvent::GameStateSynced { game_time } => {
                    log::debug!("State synced at {}", game_time);
                }
                ClientEvent::InSync { game_time } => {
                    log::trace!("In sync at {}", game_time);
                }
            }
        }
        true
    }

    fn send_heartbeat(&mut self) {
        if self.last_heartbeat.elapsed() < self.config.net.heartbeat_interval {
            return;
        }
        self.last_heartbeat = Instant::now();
        if let Err(e) = self.client.send_heartbeat() {
            log::debug!("Heartbeat failed: {}", e);
        }
    }

    fn send_action(&mut self) {
        let Some(interval) = self.config.action_interval else {
            return;
        };
        if self.last_action.elapsed() < interval
            || self.client.phase() != GamePhase::Running
            || !self.client.input_allowed()
        {
            return;
        }
        self.last_action = Instant::now();

        let inventories = self.mirror.entity_count().max(1) as u64;
        let roll = self.next_random();
        let from = (roll % inventories) as u8;
        let to = ((roll >> 8) % inventories) as u8;
        let resource = ((roll >> 16) % RESOURCE_KINDS) as u8;
        let amount = ((roll >> 24) % 4) as u8 + 1;

        let result = self.client.send_user_action(
            vec![from, to, resource, amount],
            Some(Box::new(move |response| {
                if response != ResponseType::Ok {
                    log::warn!("Transfer {} -> {} answered {:?}", from, to, response);
                }
            })),
        );
        if let Err(e) = result {
            log::warn!("Transfer failed: {}", e);
        }
    }

    fn log_status(&mut self) {
        if self.last_status.elapsed() < self.config.status_interval {
            return;
        }
        self.last_status = Instant::now();

        if self.client.phase().in_game() {
            let total: u64 = (0..self.mirror.entity_count() as u32)
                .filter_map(|id| self.mirror.entity(id))
                .map(|state| total_goods(&state))
                .sum();
            log::info!(
                "Game time {}: {} inventories, {} goods, {} patches",
                self.mirror.game_time(),
                self.mirror.entity_count(),
                total,
                self.mirror.patches_applied()
            );
        }
    }

    fn next_random(&mut self) -> u64 {
        self.seed ^= self.seed << 13;
        self.seed ^= self.seed >> 7;
        self.seed ^= self.seed << 17;
        self.seed
    }
}

/// Sums the counts in an inventory record: `[resource u8, count u32 LE]*`.
fn total_goods(state: &[u8]) -> u64 {
    state
        .chunks_exact(INVENTORY_RECORD_LEN)
        .map(|record| u32::from_le_bytes([record[1], record[2], record[3], record[4]]) as u64)
        .sum()
}
