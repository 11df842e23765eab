mod client;
mod codec;
mod config;
mod correlator;
mod error;
mod events;
mod liveness;
mod protocol;
mod sequence;
mod server;
mod session;
mod transport;

pub use client::LocalClient;
pub use codec::{FrameReader, MalformedKind, MessageError, write_frame};
pub use config::{ConfigError, NetConfig};
pub use correlator::{ReplyKind, ResponseCorrelator, ResponseHandler};
pub use error::{JoinError, SessionError, TransportError};
pub use events::{ClientEvent, DisconnectReason, EventBus, GamePhase, ServerEvent};
pub use liveness::{
    Clock, LivenessEvent, LivenessMonitor, LivenessRecord, LivenessState, ManualClock,
    SystemClock, Watchdog,
};
pub use protocol::{
    DEFAULT_PORT, LobbyData, LobbyPlayerInfo, LobbyServerInfo, MAX_FRAME_LEN, MAX_PLAYERS,
    Message, NetworkDataType, PlayerFlags, Request, ResponseType, Role, SPONTANEOUS_MESSAGE,
    ServerFlags, SyncData, UserActionData,
};
pub use sequence::MessageIndexer;
pub use server::{LocalServer, RemoteClient};
pub use transport::{
    AddressResolver, FixedAddress, MemoryTransport, SystemResolver, TcpTransport, Transport,
};
