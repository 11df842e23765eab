pub mod lobby;
pub mod net;
pub mod sync;

pub use lobby::Lobby;
pub use net::{
    AddressResolver, ClientEvent, Clock, ConfigError, DEFAULT_PORT, DisconnectReason,
    FixedAddress, GamePhase, JoinError, LivenessEvent, LocalClient, LocalServer, ManualClock,
    MemoryTransport, Message, MessageError, NetConfig, RemoteClient, Request, ResponseType,
    SPONTANEOUS_MESSAGE, ServerEvent, SessionError, SystemClock, Transport,
};
pub use sync::{
    DirtyMap, GameStateSink, GameStateSource, PatchEntry, StateMirror, StateSync, SyncEntity,
    SyncError, SyncMode, SyncPatch,
};
