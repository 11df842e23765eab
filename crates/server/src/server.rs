use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use serfnet::{GamePhase, LocalServer, ServerEvent, SystemClock};
use serfnet::net::SystemResolver;

use crate::config::ServerConfig;
use crate::events::log_event;
use crate::simulation::Economy;

pub struct GameHost {
    server: LocalServer,
    events: Receiver<ServerEvent>,
    economy: Arc<Economy>,
    config: ServerConfig,
    tick: u64,
    tick_duration: Duration,
    last_heartbeat: Instant,
    started_at: Instant,
    running: Arc<AtomicBool>,
}

impl GameHost {
    pub fn new(bind_addr: &str, config: ServerConfig, seed: u64) -> io::Result<Self> {
        let server = LocalServer::with_collaborators(
            config.net.clone(),
            Arc::new(SystemClock::new()),
            &SystemResolver,
        );
        let events = server.subscribe();
        server.listen(bind_addr)?;
        server.set_server_info(config.server_info.clone());
        for face in 0..config.computer_players {
            if server.add_computer_player(face + 1).is_none() {
                log::warn!("Lobby full, skipping computer player {}", face);
            }
        }

        let tick_duration = Duration::from_secs_f64(1.0 / config.tick_rate.max(1) as f64);

        Ok(Self {
            running: server.running(),
            server,
            events,
            economy: Arc::new(Economy::new(config.inventories, seed)),
            tick: 0,
            tick_duration,
            last_heartbeat: Instant::now(),
            started_at: Instant::now(),
            config,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.local_addr()
    }

    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            let started = Instant::now();
            self.tick_once();

            if self
                .config
                .run_for
                .is_some_and(|limit| self.started_at.elapsed() >= limit)
            {
                log::info!("Run time elapsed");
                break;
            }

            if let Some(rest) = self.tick_duration.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        self.server.shutdown();
    }

    pub fn tick_once(&mut self) {
        self.process_events();
        self.maybe_autostart();

        if self.last_heartbeat.elapsed() >= self.config.net.heartbeat_interval {
            self.server.send_heartbeats();
            self.last_heartbeat = Instant::now();
        }

        if self.server.phase() != GamePhase::Running {
            return;
        }

        self.tick += 1;
        self.economy.step();

        if self.tick % self.config.sync_every.max(1) as u64 == 0 {
            if let Err(e) = self.server.sync_tick() {
                log::error!("Sync tick failed: {}", e);
            }
        }
    }

    fn process_events(&mut self) {
        let events: Vec<ServerEvent> = self.events.try_iter().collect();
        for event in events {
            log_event(&event);
            if let ServerEvent::UserAction {
                player_index,
                payload,
                ..
            } = &event
            {
                if let Err(e) = self.economy.apply_action(*player_index, payload) {
                    log::warn!("Rejected action: {:#}", e);
                }
            }
        }
    }

    fn maybe_autostart(&mut self) {
        let Some(wanted) = self.config.autostart_players else {
            return;
        };
        if self.server.phase() != GamePhase::Lobby || self.server.client_count() < wanted {
            return;
        }

        log::info!("{} players connected, starting game", self.server.client_count());
        self.server.start_game(self.economy.clone());
        self.server.allow_input();
    }
}
