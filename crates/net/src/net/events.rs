use std::net::SocketAddr;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

/// Fan-out of events to every live subscriber.
pub struct EventBus<E> {
    subscribers: Mutex<Vec<Sender<E>>>,
}

impl<E: Clone> EventBus<E> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> Receiver<E> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Subscribers whose receiver was dropped are pruned here.
    pub fn emit(&self, event: E) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    Disconnected,
    LobbyDataUpdated,
    GameStarted,
    GamePaused,
    GameResumed,
    InputAllowed,
    InputDisallowed,
    GameStateSynced { game_time: u32 },
    InSync { game_time: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    ClientConnected {
        player_index: u8,
        addr: SocketAddr,
    },
    ClientDisconnected {
        player_index: u8,
        reason: DisconnectReason,
    },
    ClientStarted {
        player_index: u8,
    },
    UserAction {
        player_index: u8,
        number: u8,
        payload: Vec<u8>,
    },
    ConnectionDenied {
        addr: SocketAddr,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Graceful,
    Timeout,
    Kicked,
    Lost,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Graceful => "disconnected",
            DisconnectReason::Timeout => "timed out",
            DisconnectReason::Kicked => "kicked",
            DisconnectReason::Lost => "lost connection",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Lobby,
    Running,
    Paused,
    Disconnected,
}

impl GamePhase {
    pub fn in_game(&self) -> bool {
        matches!(self, GamePhase::Running | GamePhase::Paused)
    }
}
