use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serfnet::net::UserActionData;
use serfnet::{
    ClientEvent, DirtyMap, DisconnectReason, FixedAddress, GamePhase, GameStateSink,
    GameStateSource, LivenessEvent, LocalClient, LocalServer, ManualClock, MemoryTransport,
    Message, NetConfig, Request, ResponseType, SPONTANEOUS_MESSAGE, ServerEvent, SessionError,
    StateMirror, StateSync, SyncEntity, SyncMode, Transport,
};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn wait_until<F: Fn() -> bool>(timeout_ms: u64, condition: F) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn wait_for_event<E, F>(events: &Receiver<E>, timeout_ms: u64, mut matches: F) -> Option<E>
where
    F: FnMut(&E) -> bool,
{
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }
        match events.recv_timeout(remaining) {
            Ok(event) if matches(&event) => return Some(event),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}

fn tcp_config() -> NetConfig {
    NetConfig {
        liveness_poll: Duration::from_millis(20),
        ..NetConfig::default()
    }
}

/// Timeouts of 100/200 with a watchdog that never fires on its own.
fn timed_config() -> NetConfig {
    NetConfig {
        liveness_poll: Duration::from_secs(3600),
        ..NetConfig::default()
    }
    .with_timeouts(Duration::from_millis(100), Duration::from_millis(200))
    .unwrap()
}

fn start_server(config: NetConfig) -> (LocalServer, SocketAddr) {
    let server = LocalServer::with_collaborators(
        config,
        Arc::new(serfnet::SystemClock::new()),
        &FixedAddress(LOCALHOST),
    );
    let addr = server.listen("127.0.0.1:0").unwrap();
    (server, addr)
}

fn memory_client() -> (LocalClient, Arc<MemoryTransport>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0));
    let client = LocalClient::with_collaborators(
        timed_config(),
        clock.clone(),
        Arc::new(FixedAddress(LOCALHOST)),
    );
    let transport = Arc::new(MemoryTransport::new());
    client.attach(transport.clone()).unwrap();
    (client, transport, clock)
}

fn sent_messages(transport: &MemoryTransport) -> Vec<Message> {
    transport
        .take_sent()
        .iter()
        .map(|body| Message::parse(body).unwrap())
        .collect()
}

fn encode(message: Message) -> Vec<u8> {
    message.serialize().unwrap()
}

struct Stock {
    id: u32,
    goods: DirtyMap<String, u32>,
}

impl SyncEntity for Stock {
    fn sync_id(&self) -> u32 {
        self.id
    }

    fn is_dirty(&self) -> bool {
        self.goods.is_dirty()
    }

    fn encode_state(&self) -> Vec<u8> {
        let mut goods: Vec<_> = self.goods.snapshot().into_iter().collect();
        goods.sort();
        goods
            .iter()
            .map(|(name, count)| format!("{}={};", name, count))
            .collect::<String>()
            .into_bytes()
    }

    fn take_dirty(&self) -> bool {
        self.goods.take_dirty()
    }
}

struct Economy {
    time: AtomicU32,
    stocks: Vec<Stock>,
}

impl Economy {
    fn new() -> Self {
        let stocks = (1..=2)
            .map(|id| {
                let goods = DirtyMap::new();
                goods.initialize([("planks".to_string(), 10), ("stones".to_string(), 5)]);
                Stock { id, goods }
            })
            .collect();
        Self {
            time: AtomicU32::new(100),
            stocks,
        }
    }
}

impl GameStateSource for Economy {
    fn game_time(&self) -> u32 {
        self.time.load(Ordering::SeqCst)
    }

    fn visit_entities(&self, visitor: &mut dyn FnMut(&dyn SyncEntity)) {
        for stock in &self.stocks {
            visitor(stock);
        }
    }
}

#[test]
fn test_heartbeat_request_answered_over_tcp() {
    let (server, addr) = start_server(tcp_config());
    let client = LocalClient::new(tcp_config());
    client.join_server(addr).unwrap();
    assert!(wait_until(1000, || server.client_count() == 1));

    let (tx, rx) = mpsc::channel();
    client
        .request_heartbeat(Box::new(move |result| {
            let _ = tx.send(result);
        }))
        .unwrap();

    assert_eq!(
        rx.recv_timeout(Duration::from_secs(2)).unwrap(),
        ResponseType::Ok
    );
    assert_eq!(client.pending_requests(), 0);
    assert!(client.is_connected());
}

#[test]
fn test_lobby_assigns_distinct_player_indices() {
    let (server, addr) = start_server(tcp_config());

    let first = LocalClient::new(tcp_config());
    let second = LocalClient::new(tcp_config());
    first.join_server(addr).unwrap();
    assert!(wait_until(1000, || server.client_count() == 1));
    second.join_server(addr).unwrap();

    assert!(wait_until(1000, || {
        first.lobby_data().is_some_and(|l| l.players.len() == 3)
            && second.lobby_data().is_some_and(|l| l.players.len() == 3)
    }));
    assert_eq!(first.player_index(), 1);
    assert_eq!(second.player_index(), 2);
    assert!(first.lobby_data().unwrap().players[0].is_host());
}

#[test]
fn test_leaving_client_renumbers_remaining() {
    let (server, addr) = start_server(tcp_config());
    let server_events = server.subscribe();

    let first = LocalClient::new(tcp_config());
    let second = LocalClient::new(tcp_config());
    first.join_server(addr).unwrap();
    assert!(wait_until(1000, || server.client_count() == 1));
    second.join_server(addr).unwrap();
    assert!(wait_until(1000, || second.player_index() == 2));

    let first_events = first.subscribe();
    first.disconnect();

    let left = wait_for_event(&server_events, 2000, |e| {
        matches!(e, ServerEvent::ClientDisconnected { .. })
    });
    assert_eq!(
        left,
        Some(ServerEvent::ClientDisconnected {
            player_index: 1,
            reason: DisconnectReason::Graceful
        })
    );
    assert!(wait_until(1000, || second.player_index() == 1));
    assert_eq!(server.client(1).unwrap().identification(), second.identification());

    let disconnects = first_events
        .try_iter()
        .filter(|e| *e == ClientEvent::Disconnected)
        .count();
    assert_eq!(disconnects, 1);
    assert_eq!(first.phase(), GamePhase::Disconnected);
}

#[test]
fn test_full_lobby_denies_connection() {
    let config = NetConfig {
        max_players: 2,
        ..tcp_config()
    };
    let (server, addr) = start_server(config);
    let server_events = server.subscribe();

    let admitted = LocalClient::new(tcp_config());
    admitted.join_server(addr).unwrap();
    assert!(wait_until(1000, || server.client_count() == 1));

    let rejected = LocalClient::new(tcp_config());
    let rejected_events = rejected.subscribe();
    rejected.join_server(addr).unwrap();

    assert!(
        wait_for_event(&server_events, 2000, |e| {
            matches!(e, ServerEvent::ConnectionDenied { .. })
        })
        .is_some()
    );
    assert!(
        wait_for_event(&rejected_events, 2000, |e| *e == ClientEvent::Disconnected).is_some()
    );
    assert!(!rejected.is_connected());
    assert_eq!(server.client_count(), 1);
}

#[test]
fn test_start_game_then_incremental_sync() {
    let (server, addr) = start_server(tcp_config());
    let server_events = server.subscribe();

    let client = LocalClient::new(tcp_config());
    let mirror = Arc::new(StateMirror::new());
    client.set_game_state_sink(mirror.clone());
    let events = client.subscribe();
    client.join_server(addr).unwrap();
    assert!(wait_until(1000, || server.client_count() == 1));

    let economy = Arc::new(Economy::new());
    server.start_game(economy.clone());

    assert!(wait_for_event(&events, 2000, |e| *e == ClientEvent::GameStarted).is_some());
    assert!(
        wait_for_event(&server_events, 2000, |e| {
            matches!(e, ServerEvent::ClientStarted { player_index: 1 })
        })
        .is_some()
    );
    assert!(wait_until(1000, || mirror.entity_count() == 2));
    assert_eq!(client.phase(), GamePhase::Running);

    economy.stocks[1].goods.set("planks".to_string(), 11);
    economy.time.store(101, Ordering::SeqCst);
    server.sync_tick().unwrap();

    assert!(
        wait_for_event(&events, 2000, |e| {
            *e == ClientEvent::GameStateSynced { game_time: 101 }
        })
        .is_some()
    );
    assert_eq!(mirror.entity(2), Some(b"planks=11;stones=5;".to_vec()));
    assert_eq!(mirror.entity(1), Some(b"planks=10;stones=5;".to_vec()));

    server.sync_tick().unwrap();
    assert!(
        wait_for_event(&events, 2000, |e| *e == ClientEvent::InSync { game_time: 101 }).is_some()
    );
    assert_eq!(client.last_in_sync_time(), 101);
}

#[test]
fn test_pause_and_resume_acknowledged() {
    let (server, addr) = start_server(tcp_config());
    let client = LocalClient::new(tcp_config());
    let events = client.subscribe();
    client.join_server(addr).unwrap();
    assert!(wait_until(1000, || server.client_count() == 1));

    server.start_game(Arc::new(Economy::new()));
    assert!(wait_for_event(&events, 2000, |e| *e == ClientEvent::GameStarted).is_some());

    server.pause();
    assert!(wait_for_event(&events, 2000, |e| *e == ClientEvent::GamePaused).is_some());
    assert_eq!(client.phase(), GamePhase::Paused);
    let remote = server.client(1).unwrap();
    assert!(wait_until(1000, || remote.pending_requests() == 0));

    server.resume();
    assert!(wait_for_event(&events, 2000, |e| *e == ClientEvent::GameResumed).is_some());
    assert_eq!(server.phase(), GamePhase::Running);

    server.allow_input();
    assert!(wait_for_event(&events, 2000, |e| *e == ClientEvent::InputAllowed).is_some());
    assert!(client.input_allowed());
}

#[test]
fn test_user_action_acknowledged_by_server() {
    let (server, addr) = start_server(tcp_config());
    let server_events = server.subscribe();
    let client = LocalClient::new(tcp_config());
    client.join_server(addr).unwrap();
    assert!(wait_until(1000, || server.client_count() == 1));

    let (tx, rx) = mpsc::channel();
    let number = client
        .send_user_action(
            vec![1, 2, 3],
            Some(Box::new(move |result| {
                let _ = tx.send(result);
            })),
        )
        .unwrap();

    assert_eq!(
        rx.recv_timeout(Duration::from_secs(2)).unwrap(),
        ResponseType::Ok
    );
    let action = wait_for_event(&server_events, 2000, |e| {
        matches!(e, ServerEvent::UserAction { .. })
    });
    assert_eq!(
        action,
        Some(ServerEvent::UserAction {
            player_index: 1,
            number,
            payload: vec![1, 2, 3]
        })
    );
}

#[test]
fn test_rejoin_replaces_existing_session() {
    let (server, addr) = start_server(tcp_config());
    let client = LocalClient::new(tcp_config());
    let events = client.subscribe();

    client.join_server(addr).unwrap();
    assert!(wait_until(1000, || server.client_count() == 1));
    client.join_server(addr).unwrap();

    assert!(wait_for_event(&events, 1000, |e| *e == ClientEvent::Disconnected).is_some());
    assert!(client.is_connected());
    assert!(wait_until(2000, || server.client_count() == 1
        && server.client(1).is_some_and(|c| c.identification() == client.identification())));
}

#[test]
fn test_client_answers_heartbeat_with_same_number() {
    let (client, transport, _) = memory_client();

    client.receive(&encode(Message::Request {
        number: 7,
        request: Request::Heartbeat,
    }));

    assert_eq!(
        sent_messages(&transport),
        vec![Message::Heartbeat {
            number: 7,
            player_index: 0
        }]
    );
}

#[test]
fn test_client_ignores_spontaneous_heartbeat_request() {
    let (client, transport, _) = memory_client();

    client.receive(&encode(Message::Request {
        number: SPONTANEOUS_MESSAGE,
        request: Request::Heartbeat,
    }));

    assert!(sent_messages(&transport).is_empty());
    assert!(client.is_connected());
}

#[test]
fn test_failed_user_action_leaves_no_pending_handler() {
    let (client, transport, _) = memory_client();
    transport.fail_sends(true);

    let result = client.send_user_action(vec![1, 2, 3], Some(Box::new(|_| {})));
    assert!(matches!(result, Err(SessionError::Transport(_))));
    assert_eq!(client.pending_requests(), 0);

    let result = client.request_heartbeat(Box::new(|_| {}));
    assert!(result.is_err());
    assert_eq!(client.pending_requests(), 0);
}

#[test]
fn test_client_rejects_user_action() {
    let (client, transport, _) = memory_client();

    client.receive(&encode(Message::UserAction(UserActionData {
        number: 5,
        payload: vec![9],
    })));
    assert_eq!(
        sent_messages(&transport),
        vec![Message::Response {
            number: 5,
            response: ResponseType::BadDestination
        }]
    );

    client.receive(&encode(Message::UserAction(UserActionData {
        number: SPONTANEOUS_MESSAGE,
        payload: vec![9],
    })));
    assert!(sent_messages(&transport).is_empty());
    assert!(client.is_connected());
}

#[test]
fn test_client_ignores_requests_meant_for_server() {
    let (client, transport, _) = memory_client();
    let events = client.subscribe();

    client.receive(&encode(Message::Request {
        number: 2,
        request: Request::GameData,
    }));

    assert!(sent_messages(&transport).is_empty());
    assert!(events.try_recv().is_err());
    assert!(client.is_connected());
}

#[test]
fn test_client_start_game_acknowledged_spontaneously() {
    let (client, transport, _) = memory_client();
    let events = client.subscribe();

    client.receive(&encode(Message::Request {
        number: 4,
        request: Request::StartGame,
    }));

    assert_eq!(events.try_recv(), Ok(ClientEvent::GameStarted));
    assert_eq!(
        sent_messages(&transport),
        vec![Message::Request {
            number: SPONTANEOUS_MESSAGE,
            request: Request::StartGame
        }]
    );
}

#[test]
fn test_malformed_record_keeps_connection() {
    let (client, transport, _) = memory_client();
    let events = client.subscribe();

    client.receive(&[0xFF]);
    client.receive(&[0x30, 0x00]);
    client.receive(&[0x01, 0x00, 0x07]);

    assert!(events.try_recv().is_err());
    assert!(sent_messages(&transport).is_empty());
    assert!(client.is_connected());
}

#[test]
fn test_client_liveness_timeout_tears_down() {
    let (client, transport, clock) = memory_client();
    let events = client.subscribe();

    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);
    client
        .request_heartbeat(Box::new(move |_| flag.store(true, Ordering::SeqCst)))
        .unwrap();
    assert_eq!(client.pending_requests(), 1);
    transport.take_sent();

    let mut refreshes = 0;
    let mut losses = 0;
    for _ in 0..30 {
        clock.advance(10);
        match client.check_liveness() {
            Some(LivenessEvent::RefreshNeeded) => refreshes += 1,
            Some(LivenessEvent::ConnectionLost) => losses += 1,
            None => {}
        }
    }

    assert_eq!(refreshes, 1);
    assert_eq!(losses, 1);
    assert!(matches!(
        sent_messages(&transport).as_slice(),
        [Message::Request {
            request: Request::LobbyData,
            ..
        }]
    ));

    assert!(!client.is_connected());
    assert!(!transport.is_open());
    assert!(!fired.load(Ordering::SeqCst));
    assert_eq!(Arc::strong_count(&fired), 1);

    let received: Vec<_> = events.try_iter().collect();
    assert_eq!(received, vec![ClientEvent::Disconnected]);
}

#[test]
fn test_traffic_postpones_refresh() {
    let (client, _transport, clock) = memory_client();

    clock.advance(90);
    client.receive(&encode(Message::Heartbeat {
        number: SPONTANEOUS_MESSAGE,
        player_index: 0,
    }));
    clock.advance(90);
    assert_eq!(client.check_liveness(), None);
    clock.advance(20);
    assert_eq!(client.check_liveness(), Some(LivenessEvent::RefreshNeeded));
}

fn memory_server() -> (LocalServer, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0));
    let server =
        LocalServer::with_collaborators(timed_config(), clock.clone(), &FixedAddress(LOCALHOST));
    (server, clock)
}

fn peer() -> SocketAddr {
    "127.0.0.1:50001".parse().unwrap()
}

#[test]
fn test_server_answers_game_data_with_bad_state_before_start() {
    let (server, _) = memory_server();
    let transport = Arc::new(MemoryTransport::with_peer(peer()));
    let client = server.attach_client(transport.clone(), "127.0.0.1:50001").unwrap();
    transport.take_sent();

    server.receive(
        &client,
        &encode(Message::Request {
            number: 5,
            request: Request::GameData,
        }),
    );

    assert_eq!(
        sent_messages(&transport),
        vec![Message::Response {
            number: 5,
            response: ResponseType::BadState
        }]
    );
}

#[test]
fn test_server_lobby_reply_carries_request_number() {
    let (server, _) = memory_server();
    let transport = Arc::new(MemoryTransport::with_peer(peer()));
    let client = server.attach_client(transport.clone(), "127.0.0.1:50001").unwrap();
    transport.take_sent();

    server.receive(
        &client,
        &encode(Message::Request {
            number: 11,
            request: Request::LobbyData,
        }),
    );

    match sent_messages(&transport).as_slice() {
        [
            Message::LobbyData(data),
            Message::Response {
                number: 11,
                response: ResponseType::Ok,
            },
        ] => {
            assert_eq!(data.number, 11);
            assert_eq!(data.player_index_of("127.0.0.1:50001"), Some(1));
        }
        other => panic!("unexpected reply {:?}", other),
    }

    server.receive(
        &client,
        &encode(Message::Request {
            number: SPONTANEOUS_MESSAGE,
            request: Request::LobbyData,
        }),
    );
    assert!(matches!(
        sent_messages(&transport).as_slice(),
        [Message::LobbyData(_)]
    ));
}

#[test]
fn test_server_rejects_client_bound_request_and_data() {
    let (server, _) = memory_server();
    let transport = Arc::new(MemoryTransport::with_peer(peer()));
    let client = server.attach_client(transport.clone(), "127.0.0.1:50001").unwrap();
    transport.take_sent();

    server.receive(
        &client,
        &encode(Message::Request {
            number: 3,
            request: Request::Pause,
        }),
    );
    server.receive(&client, &encode(Message::InSync { game_time: 9 }));
    server.receive(&client, &encode(Message::LobbyData(server.lobby_data())));
    server.receive(
        &client,
        &encode(Message::LobbyData(serfnet::Lobby::new("x", 4).to_lobby_data(8))),
    );

    assert_eq!(
        sent_messages(&transport),
        vec![
            Message::Response {
                number: 3,
                response: ResponseType::BadRequest
            },
            Message::Response {
                number: 8,
                response: ResponseType::BadDestination
            },
        ]
    );
    assert!(client.is_connected());
}

#[test]
fn test_remote_send_request_not_permitted() {
    let (server, _) = memory_server();
    let transport = Arc::new(MemoryTransport::with_peer(peer()));
    let client = server.attach_client(transport.clone(), "127.0.0.1:50001").unwrap();
    transport.take_sent();

    let err = client.send_request(Request::LobbyData).unwrap_err();
    assert!(matches!(err, SessionError::RequestNotPermitted { .. }));
    assert!(sent_messages(&transport).is_empty());
    assert!(client.is_connected());

    client.send_request(Request::Pause).unwrap();
    assert_eq!(sent_messages(&transport).len(), 1);
}

#[test]
fn test_server_drops_silent_client() {
    let (server, clock) = memory_server();
    let events = server.subscribe();
    let transport = Arc::new(MemoryTransport::with_peer(peer()));
    let client = server.attach_client(transport.clone(), "127.0.0.1:50001").unwrap();
    transport.take_sent();

    let answered = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&answered);
    client
        .send_request_with_response(
            Request::Resume,
            Box::new(move |result| *slot.lock().unwrap() = Some(result)),
        )
        .unwrap();
    transport.take_sent();

    clock.set(150);
    assert_eq!(server.check_liveness(), vec![(1, LivenessEvent::RefreshNeeded)]);
    assert!(matches!(
        sent_messages(&transport).as_slice(),
        [Message::LobbyData(_)]
    ));

    clock.set(300);
    assert_eq!(server.check_liveness(), vec![(1, LivenessEvent::ConnectionLost)]);
    assert_eq!(server.client_count(), 0);
    assert!(!client.is_connected());
    assert_eq!(*answered.lock().unwrap(), None);
    assert_eq!(server.lobby_data().players.len(), 1);

    let disconnects: Vec<_> = events
        .try_iter()
        .filter(|e| matches!(e, ServerEvent::ClientDisconnected { .. }))
        .collect();
    assert_eq!(
        disconnects,
        vec![ServerEvent::ClientDisconnected {
            player_index: 1,
            reason: DisconnectReason::Timeout
        }]
    );
}

#[test]
fn test_server_ignores_spontaneous_heartbeat_request() {
    let (server, _) = memory_server();
    let transport = Arc::new(MemoryTransport::with_peer(peer()));
    let client = server.attach_client(transport.clone(), "127.0.0.1:50001").unwrap();
    transport.take_sent();

    server.receive(
        &client,
        &encode(Message::Request {
            number: SPONTANEOUS_MESSAGE,
            request: Request::Heartbeat,
        }),
    );
    assert!(sent_messages(&transport).is_empty());

    server.receive(
        &client,
        &encode(Message::Request {
            number: 6,
            request: Request::Heartbeat,
        }),
    );
    assert_eq!(
        sent_messages(&transport),
        vec![Message::Heartbeat {
            number: 6,
            player_index: 1
        }]
    );
}

#[test]
fn test_join_after_leave_takes_current_index() {
    let (server, _) = memory_server();
    let first = server
        .attach_client(Arc::new(MemoryTransport::with_peer(peer())), "127.0.0.1:50001")
        .unwrap();
    let second = server
        .attach_client(Arc::new(MemoryTransport::new()), "127.0.0.1:50002")
        .unwrap();

    server.receive(
        &first,
        &encode(Message::Request {
            number: SPONTANEOUS_MESSAGE,
            request: Request::Disconnect,
        }),
    );
    let third = server
        .attach_client(Arc::new(MemoryTransport::new()), "127.0.0.1:50003")
        .unwrap();

    let lobby = server.lobby_data();
    assert_eq!(second.player_index(), 1);
    assert_eq!(third.player_index(), 2);
    for client in server.clients() {
        assert_eq!(
            lobby.player_index_of(client.identification()),
            Some(client.player_index())
        );
    }
}

#[test]
fn test_player_limit_beyond_maximum_refused() {
    let config = NetConfig {
        max_players: 300,
        ..tcp_config()
    };
    let server = LocalServer::with_collaborators(
        config,
        Arc::new(serfnet::SystemClock::new()),
        &FixedAddress(LOCALHOST),
    );

    let err = server.listen("127.0.0.1:0").unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    assert_eq!(server.local_addr(), None);
}

#[test]
fn test_writes_racing_sync_ticks_converge() {
    let economy = Arc::new(Economy::new());
    let mirror = StateMirror::new();
    mirror
        .apply_patch(&StateSync::harvest(economy.as_ref(), SyncMode::Full))
        .unwrap();

    let writer = {
        let economy = Arc::clone(&economy);
        thread::spawn(move || {
            for n in 0..2000u32 {
                economy.stocks[0].goods.set("planks".to_string(), 11 + n);
            }
        })
    };
    while !writer.is_finished() {
        mirror
            .apply_patch(&StateSync::harvest(economy.as_ref(), SyncMode::Incremental))
            .unwrap();
    }
    writer.join().unwrap();
    mirror
        .apply_patch(&StateSync::harvest(economy.as_ref(), SyncMode::Incremental))
        .unwrap();

    for stock in &economy.stocks {
        assert_eq!(mirror.entity(stock.id), Some(stock.encode_state()));
    }
}
