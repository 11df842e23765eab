use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::thread;
use std::time::Duration;

use super::codec::FrameReader;
use super::config::NetConfig;
use super::correlator::{ReplyKind, ResponseHandler};
use super::error::SessionError;
use super::events::{DisconnectReason, EventBus, GamePhase, ServerEvent};
use super::liveness::{Clock, LivenessEvent, SystemClock, Watchdog};
use super::protocol::{
    LobbyData, LobbyServerInfo, Message, Request, ResponseType, Role, SPONTANEOUS_MESSAGE,
    SyncData,
};
use super::session::Session;
use super::transport::{AddressResolver, SystemResolver, TcpTransport, Transport};
use crate::lobby::Lobby;
use crate::sync::{GameStateSource, StateSync, SyncError, SyncMode};

const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// Host-side handle to one connected client.
pub struct RemoteClient {
    session: Arc<Session>,
    player_index: AtomicU8,
    identification: String,
    addr: Option<SocketAddr>,
    started: AtomicBool,
}

impl RemoteClient {
    pub fn player_index(&self) -> u8 {
        self.player_index.load(Ordering::Acquire)
    }

    pub fn identification(&self) -> &str {
        &self.identification
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    pub fn is_connected(&self) -> bool {
        !self.session.is_closed()
    }

    /// Whether the client acknowledged the game start.
    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn pending_requests(&self) -> usize {
        self.session.pending_requests()
    }

    pub fn send_heartbeat(&self) -> Result<(), SessionError> {
        self.session.send(&Message::Heartbeat {
            number: SPONTANEOUS_MESSAGE,
            player_index: self.player_index(),
        })
    }

    /// Best-effort notice that the host is dropping this client.
    pub fn send_disconnect(&self) {
        let _ = self
            .session
            .send_request(SPONTANEOUS_MESSAGE, Request::Disconnect);
    }

    pub fn send_request(&self, request: Request) -> Result<u8, SessionError> {
        let number = self.session.next_number();
        self.session.send_request(number, request)?;
        Ok(number)
    }

    pub fn send_request_with_response(
        &self,
        request: Request,
        handler: ResponseHandler,
    ) -> Result<u8, SessionError> {
        self.session.send_request_with_response(request, handler)
    }

    pub fn send_lobby_data(&self, data: LobbyData) -> Result<(), SessionError> {
        self.session.send(&Message::LobbyData(data))
    }

    pub fn send_game_state(&self, data: SyncData) -> Result<(), SessionError> {
        self.session.send(&Message::SyncData(data))
    }

    pub fn send_in_sync(&self, game_time: u32) -> Result<(), SessionError> {
        self.session.send(&Message::InSync { game_time })
    }

    pub fn send_response(&self, number: u8, response: ResponseType) -> Result<(), SessionError> {
        self.session.send_response(number, response)
    }
}

/// The hosting side of a game: accepts clients, owns the lobby and pushes
/// game state.
pub struct LocalServer {
    shared: Arc<ServerShared>,
}

struct ServerShared {
    config: NetConfig,
    clock: Arc<dyn Clock>,
    lobby: Mutex<Lobby>,
    clients: Mutex<Vec<Arc<RemoteClient>>>,
    source: RwLock<Option<Arc<dyn GameStateSource>>>,
    phase: Mutex<GamePhase>,
    events: EventBus<ServerEvent>,
    running: Arc<AtomicBool>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl LocalServer {
    pub fn new(config: NetConfig) -> Self {
        Self::with_collaborators(config, Arc::new(SystemClock::new()), &SystemResolver)
    }

    pub fn with_collaborators(
        config: NetConfig,
        clock: Arc<dyn Clock>,
        resolver: &dyn AddressResolver,
    ) -> Self {
        let host = resolver.local_address().to_string();
        let lobby = Lobby::new(host, config.max_players);

        Self {
            shared: Arc::new(ServerShared {
                config,
                clock,
                lobby: Mutex::new(lobby),
                clients: Mutex::new(Vec::new()),
                source: RwLock::new(None),
                phase: Mutex::new(GamePhase::Lobby),
                events: EventBus::new(),
                running: Arc::new(AtomicBool::new(true)),
                local_addr: Mutex::new(None),
            }),
        }
    }

    /// Binds `addr` and starts accepting clients on a background thread.
    pub fn listen<A: ToSocketAddrs>(&self, addr: A) -> io::Result<SocketAddr> {
        self.shared
            .config
            .validate()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        *self
            .shared
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(local_addr);

        let shared = Arc::downgrade(&self.shared);
        let running = Arc::clone(&self.shared.running);
        thread::Builder::new()
            .name("serfnet-accept".to_string())
            .spawn(move || accept_loop(listener, shared, running))?;

        log::info!(target: "serfnet::server", "Listening on {}", local_addr);
        Ok(local_addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self
            .shared
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shared.running)
    }

    pub fn subscribe(&self) -> Receiver<ServerEvent> {
        self.shared.events.subscribe()
    }

    /// Admits a client over an existing transport. Inbound records are fed
    /// through [`LocalServer::receive`].
    pub fn attach_client(
        &self,
        transport: Arc<dyn Transport>,
        identification: impl Into<String>,
    ) -> Option<Arc<RemoteClient>> {
        self.shared.admit(transport, identification.into()).ok()
    }

    pub fn receive(&self, client: &Arc<RemoteClient>, body: &[u8]) {
        self.shared.handle_frame(client, body);
    }

    /// Polls every client's liveness monitor once.
    pub fn check_liveness(&self) -> Vec<(u8, LivenessEvent)> {
        self.shared
            .clients()
            .into_iter()
            .filter_map(|client| {
                let index = client.player_index();
                self.shared
                    .check_liveness(&client)
                    .map(|event| (index, event))
            })
            .collect()
    }

    pub fn phase(&self) -> GamePhase {
        self.shared.phase()
    }

    pub fn clients(&self) -> Vec<Arc<RemoteClient>> {
        self.shared.clients()
    }

    pub fn client(&self, player_index: u8) -> Option<Arc<RemoteClient>> {
        self.shared
            .clients()
            .into_iter()
            .find(|client| client.player_index() == player_index)
    }

    pub fn client_count(&self) -> usize {
        self.shared
            .clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn lobby_data(&self) -> LobbyData {
        self.shared.lobby_snapshot(SPONTANEOUS_MESSAGE)
    }

    pub fn set_server_info(&self, info: LobbyServerInfo) {
        self.shared
            .lobby
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_server_info(info);
        self.broadcast_lobby();
    }

    pub fn add_computer_player(&self, face: u8) -> Option<u8> {
        let index = self
            .shared
            .lobby
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add_computer(face)?;
        self.broadcast_lobby();
        Some(index)
    }

    pub fn broadcast_lobby(&self) {
        self.shared.broadcast_lobby();
    }

    /// Starts the game and pushes the initial state to every client.
    pub fn start_game(&self, source: Arc<dyn GameStateSource>) {
        *self
            .shared
            .source
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(source);
        self.shared.set_phase(GamePhase::Running);
        log::info!(target: "serfnet::server", "Starting game");

        for client in self.shared.clients() {
            if let Err(e) = client
                .session
                .send_request(SPONTANEOUS_MESSAGE, Request::StartGame)
            {
                log::warn!(
                    target: "serfnet::server",
                    "Start request to player {} failed: {}",
                    client.player_index(),
                    e
                );
                continue;
            }
            self.shared.push_full_state(&client);
        }
    }

    pub fn pause(&self) {
        if self.shared.phase() == GamePhase::Running {
            self.shared.set_phase(GamePhase::Paused);
            self.shared.broadcast_request(Request::Pause);
        }
    }

    pub fn resume(&self) {
        if self.shared.phase() == GamePhase::Paused {
            self.shared.set_phase(GamePhase::Running);
            self.shared.broadcast_request(Request::Resume);
        }
    }

    pub fn allow_input(&self) {
        self.shared.broadcast_request(Request::AllowUserInput);
    }

    pub fn disallow_input(&self) {
        self.shared.broadcast_request(Request::DisallowUserInput);
    }

    pub fn send_heartbeats(&self) {
        for client in self.shared.clients() {
            if let Err(e) = client.send_heartbeat() {
                log::debug!(
                    target: "serfnet::server",
                    "Heartbeat to player {} failed: {}",
                    client.player_index(),
                    e
                );
            }
        }
    }

    /// Pushes entities changed since the last tick, or an in-sync notice
    /// when nothing changed.
    pub fn sync_tick(&self) -> Result<(), SyncError> {
        if self.shared.phase() != GamePhase::Running {
            return Ok(());
        }
        let Some(source) = self.shared.source() else {
            return Ok(());
        };

        let patch = StateSync::harvest(source.as_ref(), SyncMode::Incremental);
        let clients = self.shared.clients();

        if patch.is_empty() {
            for client in &clients {
                if let Err(e) = client.send_in_sync(patch.game_time) {
                    log::debug!(target: "serfnet::sync", "In-sync notice failed: {}", e);
                }
            }
            return Ok(());
        }

        let data = patch.into_sync_data()?;
        for client in &clients {
            if let Err(e) = client.send_game_state(data.clone()) {
                log::warn!(
                    target: "serfnet::sync",
                    "Sync to player {} failed: {}",
                    client.player_index(),
                    e
                );
            }
        }
        Ok(())
    }

    pub fn kick_client(&self, player_index: u8) -> bool {
        match self.client(player_index) {
            Some(client) => {
                client.send_disconnect();
                self.shared.drop_client(&client, DisconnectReason::Kicked);
                true
            }
            None => false,
        }
    }

    /// Disconnects every client and stops accepting new ones.
    pub fn shutdown(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        for client in self.shared.clients() {
            client.send_disconnect();
            self.shared.drop_client(&client, DisconnectReason::Graceful);
        }
        self.shared.set_phase(GamePhase::Disconnected);
    }
}

impl Drop for LocalServer {
    fn drop(&mut self) {
        if self.shared.running.load(Ordering::SeqCst) {
            self.shutdown();
        }
    }
}

fn accept_loop(listener: TcpListener, shared: Weak<ServerShared>, running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, addr)) => {
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                if let Err(e) = shared.accept(stream, addr) {
                    log::warn!(target: "serfnet::server", "Failed to accept {}: {}", addr, e);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => {
                log::warn!(target: "serfnet::server", "Accept failed: {}", e);
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
    log::debug!(target: "serfnet::server", "Accept loop stopped");
}

fn spawn_reader(
    shared: &Arc<ServerShared>,
    client: &Arc<RemoteClient>,
    mut reader: FrameReader<TcpStream>,
) -> io::Result<()> {
    let shared = Arc::downgrade(shared);
    let client = Arc::clone(client);

    thread::Builder::new()
        .name(format!("serfnet-recv-{}", client.identification))
        .spawn(move || {
            let reason = loop {
                match reader.read_frame() {
                    Ok(Some(body)) => match shared.upgrade() {
                        Some(shared) => shared.handle_frame(&client, &body),
                        None => break DisconnectReason::Lost,
                    },
                    Ok(None) => break DisconnectReason::Lost,
                    Err(e) => {
                        if client.is_connected() {
                            log::debug!(
                                target: "serfnet::server",
                                "Read from {} failed: {}",
                                client.identification,
                                e
                            );
                        }
                        break DisconnectReason::Lost;
                    }
                }
            };
            match shared.upgrade() {
                Some(shared) => shared.drop_client(&client, reason),
                None => {
                    client.session.close();
                }
            }
        })?;
    Ok(())
}

impl ServerShared {
    fn phase(&self) -> GamePhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: GamePhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    fn source(&self) -> Option<Arc<dyn GameStateSource>> {
        self.source
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clients(&self) -> Vec<Arc<RemoteClient>> {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lobby_snapshot(&self, number: u8) -> LobbyData {
        self.lobby
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .to_lobby_data(number)
    }

    fn accept(self: &Arc<Self>, stream: TcpStream, addr: SocketAddr) -> io::Result<()> {
        stream.set_nonblocking(false)?;
        let (transport, reader) = TcpTransport::split(stream)?;

        match self.admit(Arc::new(transport), addr.to_string()) {
            Ok(client) => {
                if let Err(e) = spawn_reader(self, &client, reader) {
                    self.drop_client(&client, DisconnectReason::Lost);
                    return Err(e);
                }
                Ok(())
            }
            Err(AdmitError::Full) => Ok(()),
            Err(AdmitError::Io(e)) => Err(e),
        }
    }

    fn admit(
        self: &Arc<Self>,
        transport: Arc<dyn Transport>,
        identification: String,
    ) -> Result<Arc<RemoteClient>, AdmitError> {
        let addr = transport.peer_addr();

        let index = self
            .lobby
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add_player(identification.clone());

        let Some(index) = index else {
            let reason = String::from("lobby is full");
            log::info!(
                target: "serfnet::server",
                "Denying {}: {}",
                identification,
                reason
            );
            if let Ok(body) = (Message::Request {
                number: SPONTANEOUS_MESSAGE,
                request: Request::Disconnect,
            })
            .serialize()
            {
                let _ = transport.send(&body);
            }
            transport.close();
            if let Some(addr) = addr {
                self.events
                    .emit(ServerEvent::ConnectionDenied { addr, reason });
            }
            return Err(AdmitError::Full);
        };

        let session = Arc::new(Session::new(
            Role::Server,
            transport,
            Arc::clone(&self.clock),
            &self.config,
        ));
        let client = Arc::new(RemoteClient {
            session,
            player_index: AtomicU8::new(index),
            identification,
            addr,
            started: AtomicBool::new(false),
        });

        let weak_shared = Arc::downgrade(self);
        let weak_client = Arc::downgrade(&client);
        let watchdog = Watchdog::spawn(
            "serfnet-server-watchdog",
            self.config.liveness_poll,
            move || match (weak_shared.upgrade(), weak_client.upgrade()) {
                (Some(shared), Some(client)) => {
                    shared.check_liveness(&client);
                    client.is_connected()
                }
                _ => false,
            },
        );
        match watchdog {
            Ok(watchdog) => client.session.set_watchdog(watchdog),
            Err(e) => {
                self.release_slot(&client);
                client.session.close();
                return Err(AdmitError::Io(e));
            }
        }

        // Slots may have shifted since `add_player`. Publishing under the lobby
        // lock lets any later release renumber this client too.
        let index = {
            let lobby = self.lobby.lock().unwrap_or_else(PoisonError::into_inner);
            let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(current) = lobby.index_of(&client.identification) else {
                return Err(AdmitError::Io(io::ErrorKind::ConnectionAborted.into()));
            };
            client.player_index.store(current, Ordering::Release);
            clients.push(Arc::clone(&client));
            current
        };

        log::info!(
            target: "serfnet::server",
            "Player {} joined from {}",
            index,
            client.identification
        );
        if let Some(addr) = addr {
            self.events.emit(ServerEvent::ClientConnected {
                player_index: index,
                addr,
            });
        }
        self.broadcast_lobby();
        Ok(client)
    }

    /// Closes the client's session and frees its lobby slot. Safe to call
    /// from several threads; only the first call has any effect.
    fn drop_client(&self, client: &Arc<RemoteClient>, reason: DisconnectReason) {
        if !client.session.close() {
            return;
        }

        let index = client.player_index();
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|c| !Arc::ptr_eq(c, client));
        self.release_slot(client);

        log::info!(
            target: "serfnet::server",
            "Player {} {}",
            index,
            reason.as_str()
        );
        self.events.emit(ServerEvent::ClientDisconnected {
            player_index: index,
            reason,
        });

        if self.running.load(Ordering::SeqCst) {
            self.broadcast_lobby();
        }
    }

    /// Removes the client from the lobby and renumbers everyone after it.
    fn release_slot(&self, client: &RemoteClient) {
        let mut lobby = self.lobby.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = lobby.index_of(&client.identification) {
            lobby.remove_player(index);
        }

        let clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        for other in clients.iter() {
            if let Some(index) = lobby.index_of(&other.identification) {
                other.player_index.store(index, Ordering::Release);
            }
        }
    }

    fn broadcast_lobby(&self) {
        let data = self.lobby_snapshot(SPONTANEOUS_MESSAGE);
        for client in self.clients() {
            if let Err(e) = client.send_lobby_data(data.clone()) {
                log::debug!(target: "serfnet::server", "Lobby update failed: {}", e);
            }
        }
    }

    fn broadcast_request(&self, request: Request) {
        for client in self.clients() {
            let index = client.player_index();
            let handler: ResponseHandler = Box::new(move |response| {
                if response != ResponseType::Ok {
                    log::warn!(
                        target: "serfnet::server",
                        "Player {} answered {:?} with {:?}",
                        index,
                        request,
                        response
                    );
                }
            });
            if let Err(e) = client.send_request_with_response(request, handler) {
                log::warn!(
                    target: "serfnet::server",
                    "{:?} to player {} failed: {}",
                    request,
                    index,
                    e
                );
            }
        }
    }

    fn push_full_state(&self, client: &RemoteClient) -> bool {
        let Some(source) = self.source() else {
            return false;
        };
        let patch = StateSync::harvest(source.as_ref(), SyncMode::Full);
        let data = match patch.into_sync_data() {
            Ok(data) => data,
            Err(e) => {
                log::warn!(target: "serfnet::sync", "Full state encoding failed: {}", e);
                return false;
            }
        };
        match client.send_game_state(data) {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    target: "serfnet::sync",
                    "Full state for player {} failed: {}",
                    client.player_index(),
                    e
                );
                false
            }
        }
    }

    fn check_liveness(&self, client: &Arc<RemoteClient>) -> Option<LivenessEvent> {
        let event = client.session.poll_liveness()?;
        match event {
            LivenessEvent::RefreshNeeded => {
                log::debug!(
                    target: "serfnet::server",
                    "Player {} quiet, pushing refresh",
                    client.player_index()
                );
                if self.phase().in_game() {
                    self.push_full_state(client);
                } else if let Err(e) =
                    client.send_lobby_data(self.lobby_snapshot(SPONTANEOUS_MESSAGE))
                {
                    log::debug!(target: "serfnet::server", "Lobby refresh failed: {}", e);
                }
            }
            LivenessEvent::ConnectionLost => {
                log::warn!(
                    target: "serfnet::server",
                    "Player {} stopped responding",
                    client.player_index()
                );
                self.drop_client(client, DisconnectReason::Timeout);
            }
        }
        Some(event)
    }

    fn handle_frame(&self, client: &Arc<RemoteClient>, body: &[u8]) {
        let message = match Message::parse(body) {
            Ok(message) => message,
            Err(e) => {
                log::warn!(
                    target: "serfnet::codec",
                    "Dropping record from {}: {}",
                    client.identification,
                    e
                );
                return;
            }
        };
        client.session.touch();
        self.handle_message(client, message);
    }

    fn handle_message(&self, client: &Arc<RemoteClient>, message: Message) {
        match message {
            Message::Request { number, request } => self.handle_request(client, number, request),
            Message::UserAction(action) => {
                self.events.emit(ServerEvent::UserAction {
                    player_index: client.player_index(),
                    number: action.number,
                    payload: action.payload,
                });
                self.reply(client, action.number, ResponseType::Ok);
            }
            Message::Response { number, response } => {
                if !client.session.dispatch(number, ReplyKind::Response, response) {
                    log::debug!(
                        target: "serfnet::server",
                        "Unmatched response {} from player {}",
                        number,
                        client.player_index()
                    );
                }
            }
            Message::Heartbeat { number, .. } => {
                if number != SPONTANEOUS_MESSAGE {
                    client
                        .session
                        .dispatch(number, ReplyKind::Heartbeat, ResponseType::Ok);
                }
            }
            Message::LobbyData(_) | Message::InSync { .. } | Message::SyncData(_) => {
                let data_type = message.data_type();
                log::warn!(
                    target: "serfnet::server",
                    "Player {} sent {:?}, which only the server may send",
                    client.player_index(),
                    data_type
                );
                if let Some(number) = message.number() {
                    self.reply(client, number, ResponseType::BadDestination);
                }
            }
            other => {
                log::debug!(
                    target: "serfnet::server",
                    "Ignoring {:?} from player {}",
                    other.data_type(),
                    client.player_index()
                );
            }
        }
    }

    fn handle_request(&self, client: &Arc<RemoteClient>, number: u8, request: Request) {
        match request {
            Request::Heartbeat => {
                if let Err(e) = client
                    .session
                    .send_heartbeat_reply(number, client.player_index())
                {
                    log::debug!(target: "serfnet::server", "Heartbeat reply failed: {}", e);
                }
            }
            Request::LobbyData => {
                let response = match client.send_lobby_data(self.lobby_snapshot(number)) {
                    Ok(()) => ResponseType::Ok,
                    Err(e) => {
                        log::debug!(target: "serfnet::server", "Lobby reply failed: {}", e);
                        ResponseType::BadState
                    }
                };
                self.reply(client, number, response);
            }
            Request::GameData => {
                let response = if self.phase().in_game() && self.push_full_state(client) {
                    ResponseType::Ok
                } else {
                    ResponseType::BadState
                };
                self.reply(client, number, response);
            }
            Request::Disconnect => {
                log::debug!(
                    target: "serfnet::server",
                    "Player {} asked to leave",
                    client.player_index()
                );
                self.drop_client(client, DisconnectReason::Graceful);
            }
            Request::StartGame => {
                client.started.store(true, Ordering::Release);
                self.events.emit(ServerEvent::ClientStarted {
                    player_index: client.player_index(),
                });
            }
            Request::AllowUserInput
            | Request::DisallowUserInput
            | Request::Pause
            | Request::Resume => {
                log::warn!(
                    target: "serfnet::server",
                    "Player {} sent {:?}, which only the server may request",
                    client.player_index(),
                    request
                );
                self.reply(client, number, ResponseType::BadRequest);
            }
        }
    }

    fn reply(&self, client: &RemoteClient, number: u8, response: ResponseType) {
        if let Err(e) = client.send_response(number, response) {
            log::debug!(target: "serfnet::server", "Response {} failed: {}", number, e);
        }
    }
}

#[derive(Debug)]
enum AdmitError {
    Full,
    Io(io::Error),
}
