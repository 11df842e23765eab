use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::thread;

use super::codec::FrameReader;
use super::config::NetConfig;
use super::correlator::{ReplyKind, ResponseHandler};
use super::error::{JoinError, SessionError};
use super::events::{ClientEvent, EventBus, GamePhase};
use super::liveness::{Clock, LivenessEvent, SystemClock, Watchdog};
use super::protocol::{
    LobbyData, Message, Request, ResponseType, Role, SPONTANEOUS_MESSAGE, UserActionData,
};
use super::session::Session;
use super::transport::{AddressResolver, SystemResolver, TcpTransport, Transport};
use crate::sync::{GameStateSink, SyncPatch};

/// Client side of a game: one session to the host.
pub struct LocalClient {
    shared: Arc<ClientShared>,
}

struct ClientShared {
    config: NetConfig,
    clock: Arc<dyn Clock>,
    resolver: Arc<dyn AddressResolver>,
    session: Mutex<Option<Arc<Session>>>,
    identification: RwLock<String>,
    player_index: AtomicU8,
    lobby: RwLock<Option<LobbyData>>,
    phase: Mutex<GamePhase>,
    input_allowed: AtomicBool,
    sink: RwLock<Option<Arc<dyn GameStateSink>>>,
    last_in_sync: AtomicU32,
    events: EventBus<ClientEvent>,
}

impl LocalClient {
    pub fn new(config: NetConfig) -> Self {
        Self::with_collaborators(config, Arc::new(SystemClock::new()), Arc::new(SystemResolver))
    }

    pub fn with_collaborators(
        config: NetConfig,
        clock: Arc<dyn Clock>,
        resolver: Arc<dyn AddressResolver>,
    ) -> Self {
        Self {
            shared: Arc::new(ClientShared {
                config,
                clock,
                resolver,
                session: Mutex::new(None),
                identification: RwLock::new(String::new()),
                player_index: AtomicU8::new(0),
                lobby: RwLock::new(None),
                phase: Mutex::new(GamePhase::Disconnected),
                input_allowed: AtomicBool::new(false),
                sink: RwLock::new(None),
                last_in_sync: AtomicU32::new(0),
                events: EventBus::new(),
            }),
        }
    }

    /// Connects to a host. An existing session is disconnected first.
    pub fn join_server<A: ToSocketAddrs>(&self, addr: A) -> Result<(), JoinError> {
        self.disconnect();

        self.shared
            .config
            .validate()
            .map_err(|e| JoinError::Fatal {
                reason: e.to_string(),
            })?;

        let stream = TcpStream::connect(addr)?;
        let local = stream.local_addr()?;
        let (transport, reader) = TcpTransport::split(stream)?;
        let peer = transport.peer_addr();

        let session = self
            .shared
            .install(Arc::new(transport), local.to_string())
            .map_err(|e| JoinError::Fatal {
                reason: format!("failed to start watchdog: {}", e),
            })?;

        if let Err(e) = spawn_reader(&self.shared, &session, reader) {
            self.shared.teardown(&session);
            return Err(JoinError::Fatal {
                reason: format!("failed to start receive thread: {}", e),
            });
        }

        log::info!(
            target: "serfnet::session",
            "Joined server {} as {}",
            peer.map(|p| p.to_string()).unwrap_or_default(),
            local
        );
        Ok(())
    }

    /// Uses an already established transport. Inbound records are fed
    /// through [`LocalClient::receive`].
    pub fn attach(&self, transport: Arc<dyn Transport>) -> std::io::Result<()> {
        self.disconnect();
        let identification = self.shared.resolver.local_address().to_string();
        self.shared.install(transport, identification)?;
        Ok(())
    }

    /// Handles one inbound record body on the current session.
    pub fn receive(&self, body: &[u8]) {
        if let Some(session) = self.shared.current() {
            self.shared.handle_frame(&session, body);
        }
    }

    /// Polls the liveness monitor once and reacts to what it reports.
    pub fn check_liveness(&self) -> Option<LivenessEvent> {
        let session = self.shared.current()?;
        self.shared.check_liveness(&session)
    }

    pub fn is_connected(&self) -> bool {
        self.shared.current().is_some()
    }

    pub fn player_index(&self) -> u8 {
        self.shared.player_index.load(Ordering::Acquire)
    }

    pub fn identification(&self) -> String {
        self.shared
            .identification
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn lobby_data(&self) -> Option<LobbyData> {
        self.shared
            .lobby
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn phase(&self) -> GamePhase {
        self.shared.phase()
    }

    pub fn input_allowed(&self) -> bool {
        self.shared.input_allowed.load(Ordering::Acquire)
    }

    pub fn last_in_sync_time(&self) -> u32 {
        self.shared.last_in_sync.load(Ordering::Acquire)
    }

    pub fn pending_requests(&self) -> usize {
        self.shared
            .current()
            .map(|session| session.pending_requests())
            .unwrap_or(0)
    }

    pub fn subscribe(&self) -> Receiver<ClientEvent> {
        self.shared.events.subscribe()
    }

    pub fn set_game_state_sink(&self, sink: Arc<dyn GameStateSink>) {
        *self
            .shared
            .sink
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    pub fn send_request(&self, request: Request) -> Result<u8, SessionError> {
        let session = self.shared.connected()?;
        let number = session.next_number();
        session.send_request(number, request)?;
        Ok(number)
    }

    pub fn request_lobby_update(&self) -> Result<u8, SessionError> {
        self.send_request(Request::LobbyData)
    }

    /// Asks the host for a complete copy of the game state.
    pub fn request_game_state_update(&self) -> Result<u8, SessionError> {
        self.send_request(Request::GameData)
    }

    pub fn send_heartbeat(&self) -> Result<(), SessionError> {
        let session = self.shared.connected()?;
        session.send(&Message::Heartbeat {
            number: SPONTANEOUS_MESSAGE,
            player_index: self.player_index(),
        })
    }

    pub fn send_heartbeat_response(&self, number: u8) -> Result<(), SessionError> {
        let session = self.shared.connected()?;
        self.shared.reply_heartbeat(&session, number)
    }

    /// Sends a heartbeat request; `handler` runs once the host echoes it.
    pub fn request_heartbeat(&self, handler: ResponseHandler) -> Result<u8, SessionError> {
        let session = self.shared.connected()?;
        session.send_request_with_response(Request::Heartbeat, handler)
    }

    /// Sends a user action. Without a handler the action is spontaneous.
    pub fn send_user_action(
        &self,
        payload: Vec<u8>,
        handler: Option<ResponseHandler>,
    ) -> Result<u8, SessionError> {
        let session = self.shared.connected()?;
        let number = match handler {
            Some(handler) => {
                let number = session.next_number();
                session.register(number, ReplyKind::Response, handler);
                number
            }
            None => SPONTANEOUS_MESSAGE,
        };
        if let Err(e) = session.send(&Message::UserAction(UserActionData { number, payload })) {
            session.cancel(number);
            return Err(e);
        }
        Ok(number)
    }

    /// Tells the host we are leaving. Failures are ignored.
    pub fn send_disconnect(&self) {
        if let Some(session) = self.shared.current() {
            let _ = session.send_request(SPONTANEOUS_MESSAGE, Request::Disconnect);
        }
    }

    pub fn disconnect(&self) {
        if let Some(session) = self.shared.current() {
            let _ = session.send_request(SPONTANEOUS_MESSAGE, Request::Disconnect);
            self.shared.teardown(&session);
        }
    }
}

impl Drop for LocalClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn spawn_reader(
    shared: &Arc<ClientShared>,
    session: &Arc<Session>,
    mut reader: FrameReader<TcpStream>,
) -> std::io::Result<()> {
    let shared = Arc::downgrade(shared);
    let session = Arc::clone(session);

    thread::Builder::new()
        .name("serfnet-client-recv".to_string())
        .spawn(move || {
            loop {
                match reader.read_frame() {
                    Ok(Some(body)) => match shared.upgrade() {
                        Some(shared) => shared.handle_frame(&session, &body),
                        None => break,
                    },
                    Ok(None) => {
                        if !session.is_closed() {
                            log::warn!(target: "serfnet::session", "Server closed the connection");
                        }
                        break;
                    }
                    Err(e) => {
                        if !session.is_closed() {
                            log::warn!(target: "serfnet::session", "Connection read failed: {}", e);
                        }
                        break;
                    }
                }
            }
            match shared.upgrade() {
                Some(shared) => shared.teardown(&session),
                None => {
                    session.close();
                }
            }
        })?;
    Ok(())
}

impl ClientShared {
    fn current(&self) -> Option<Arc<Session>> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn connected(&self) -> Result<Arc<Session>, SessionError> {
        self.current().ok_or(SessionError::NotConnected)
    }

    fn phase(&self) -> GamePhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: GamePhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    fn install(
        self: &Arc<Self>,
        transport: Arc<dyn Transport>,
        identification: String,
    ) -> std::io::Result<Arc<Session>> {
        let session = Arc::new(Session::new(
            Role::Client,
            transport,
            Arc::clone(&self.clock),
            &self.config,
        ));

        *self
            .identification
            .write()
            .unwrap_or_else(PoisonError::into_inner) = identification;
        *self.lobby.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.player_index.store(0, Ordering::Release);
        self.input_allowed.store(false, Ordering::Release);
        self.last_in_sync.store(0, Ordering::Release);
        self.set_phase(GamePhase::Lobby);

        let weak_shared: Weak<ClientShared> = Arc::downgrade(self);
        let weak_session = Arc::downgrade(&session);
        let watchdog = Watchdog::spawn(
            "serfnet-client-watchdog",
            self.config.liveness_poll,
            move || match (weak_shared.upgrade(), weak_session.upgrade()) {
                (Some(shared), Some(session)) => {
                    shared.check_liveness(&session);
                    !session.is_closed()
                }
                _ => false,
            },
        );
        let watchdog = match watchdog {
            Ok(watchdog) => watchdog,
            Err(e) => {
                session.close();
                return Err(e);
            }
        };
        session.set_watchdog(watchdog);

        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Takes `session` out of its slot and closes it. Only the first caller
    /// raises `Disconnected`.
    fn teardown(&self, session: &Arc<Session>) {
        {
            let mut slot = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, session)) {
                *slot = None;
            }
        }

        if session.close() {
            self.input_allowed.store(false, Ordering::Release);
            self.set_phase(GamePhase::Disconnected);
            log::info!(target: "serfnet::session", "Disconnected from server");
            self.events.emit(ClientEvent::Disconnected);
        }
    }

    fn check_liveness(&self, session: &Arc<Session>) -> Option<LivenessEvent> {
        let event = session.poll_liveness()?;
        match event {
            LivenessEvent::RefreshNeeded => {
                let request = if self.phase().in_game() {
                    Request::GameData
                } else {
                    Request::LobbyData
                };
                log::debug!(
                    target: "serfnet::session",
                    "Server quiet, requesting {:?} refresh",
                    request
                );
                if let Err(e) = session.send_request(session.next_number(), request) {
                    log::warn!(target: "serfnet::session", "Refresh request failed: {}", e);
                }
            }
            LivenessEvent::ConnectionLost => {
                log::warn!(target: "serfnet::session", "Server stopped responding");
                self.teardown(session);
            }
        }
        Some(event)
    }

    fn handle_frame(&self, session: &Arc<Session>, body: &[u8]) {
        let message = match Message::parse(body) {
            Ok(message) => message,
            Err(e) => {
                log::warn!(target: "serfnet::codec", "Dropping inbound record: {}", e);
                return;
            }
        };
        session.touch();
        self.handle_message(session, message);
    }

    fn handle_message(&self, session: &Arc<Session>, message: Message) {
        match message {
            Message::Request { number, request } => self.handle_request(session, number, request),
            Message::Heartbeat { number, .. } => {
                if number != SPONTANEOUS_MESSAGE {
                    session.dispatch(number, ReplyKind::Heartbeat, ResponseType::Ok);
                }
            }
            Message::LobbyData(data) => self.handle_lobby_data(data),
            Message::Response { number, response } => {
                if !session.dispatch(number, ReplyKind::Response, response) {
                    log::debug!(
                        target: "serfnet::session",
                        "No pending request for response {} ({:?})",
                        number,
                        response
                    );
                }
            }
            Message::UserAction(action) => {
                log::warn!(
                    target: "serfnet::session",
                    "Server sent user action {}, which clients do not accept",
                    action.number
                );
                self.reply(session, action.number, ResponseType::BadDestination);
            }
            Message::SyncData(sync) => self.handle_sync(sync.game_time, &sync.patch),
            Message::InSync { game_time } => {
                self.last_in_sync.store(game_time, Ordering::Release);
                self.events.emit(ClientEvent::InSync { game_time });
            }
            other => {
                log::debug!(
                    target: "serfnet::session",
                    "Ignoring {:?} from server",
                    other.data_type()
                );
            }
        }
    }

    fn handle_request(&self, session: &Arc<Session>, number: u8, request: Request) {
        if !request.permitted_toward(Role::Client) {
            log::warn!(
                target: "serfnet::session",
                "{}",
                SessionError::RequestNotPermitted {
                    request,
                    target: Role::Client
                }
            );
            return;
        }

        match request {
            Request::Disconnect => {
                log::info!(target: "serfnet::session", "Server requested disconnect");
                self.teardown(session);
            }
            Request::Heartbeat => {
                if let Err(e) = self.reply_heartbeat(session, number) {
                    log::warn!(target: "serfnet::session", "Heartbeat reply failed: {}", e);
                }
            }
            Request::StartGame => {
                self.set_phase(GamePhase::Running);
                self.events.emit(ClientEvent::GameStarted);
                if let Err(e) = session.send_request(SPONTANEOUS_MESSAGE, Request::StartGame) {
                    log::warn!(target: "serfnet::session", "Start acknowledgement failed: {}", e);
                }
            }
            Request::AllowUserInput => {
                self.input_allowed.store(true, Ordering::Release);
                self.events.emit(ClientEvent::InputAllowed);
                self.reply(session, number, ResponseType::Ok);
            }
            Request::DisallowUserInput => {
                self.input_allowed.store(false, Ordering::Release);
                self.events.emit(ClientEvent::InputDisallowed);
                self.reply(session, number, ResponseType::Ok);
            }
            Request::Pause => {
                self.set_phase(GamePhase::Paused);
                self.events.emit(ClientEvent::GamePaused);
                self.reply(session, number, ResponseType::Ok);
            }
            Request::Resume => {
                self.set_phase(GamePhase::Running);
                self.events.emit(ClientEvent::GameResumed);
                self.reply(session, number, ResponseType::Ok);
            }
            Request::LobbyData | Request::GameData => {}
        }
    }

    fn handle_lobby_data(&self, data: LobbyData) {
        let identification = self
            .identification
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match data.player_index_of(&identification) {
            Some(index) => self.player_index.store(index, Ordering::Release),
            None => log::debug!(
                target: "serfnet::session",
                "Lobby has no player for {}",
                identification
            ),
        }

        *self.lobby.write().unwrap_or_else(PoisonError::into_inner) = Some(data);
        self.events.emit(ClientEvent::LobbyDataUpdated);
    }

    fn handle_sync(&self, game_time: u32, blob: &[u8]) {
        let patch = match SyncPatch::decode(blob) {
            Ok(patch) => patch,
            Err(e) => {
                log::warn!(target: "serfnet::sync", "Dropping sync data: {}", e);
                return;
            }
        };

        let sink = self
            .sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match sink {
            Some(sink) => {
                if let Err(e) = sink.apply_patch(&patch) {
                    log::warn!(target: "serfnet::sync", "Patch for {} not applied: {}", game_time, e);
                    return;
                }
            }
            None => log::debug!(target: "serfnet::sync", "No game state sink attached"),
        }

        self.events.emit(ClientEvent::GameStateSynced { game_time });
    }

    fn reply_heartbeat(&self, session: &Session, number: u8) -> Result<(), SessionError> {
        session.send_heartbeat_reply(number, self.player_index.load(Ordering::Acquire))
    }

    fn reply(&self, session: &Session, number: u8, response: ResponseType) {
        if let Err(e) = session.send_response(number, response) {
            log::warn!(target: "serfnet::session", "Response {} failed: {}", number, e);
        }
    }
}
