use bitflags::bitflags;

pub const DEFAULT_PORT: u16 = 7777;
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;
pub const MAX_PLAYERS: usize = 4;

/// Message number reserved for messages that expect no response.
pub const SPONTANEOUS_MESSAGE: u8 = u8::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum NetworkDataType {
    Request = 0,
    Heartbeat = 1,
    LobbyData = 2,
    PlayerData = 3,
    MapData = 4,
    GameData = 5,
    UserActionData = 6,
    Response = 7,
    InSync = 8,
    SyncData = 9,
}

impl TryFrom<u16> for NetworkDataType {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Request,
            1 => Self::Heartbeat,
            2 => Self::LobbyData,
            3 => Self::PlayerData,
            4 => Self::MapData,
            5 => Self::GameData,
            6 => Self::UserActionData,
            7 => Self::Response,
            8 => Self::InSync,
            9 => Self::SyncData,
            other => return Err(other),
        })
    }
}

/// Which side of a connection a session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Server => "server",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Request {
    Disconnect = 0,
    Heartbeat = 1,
    StartGame = 2,
    AllowUserInput = 3,
    DisallowUserInput = 4,
    Pause = 5,
    Resume = 6,
    LobbyData = 7,
    GameData = 8,
}

impl Request {
    /// Whether a peer in `target` role may ever receive this request.
    pub fn permitted_toward(self, target: Role) -> bool {
        match self {
            Request::Disconnect | Request::Heartbeat | Request::StartGame => true,
            Request::AllowUserInput
            | Request::DisallowUserInput
            | Request::Pause
            | Request::Resume => target == Role::Client,
            Request::LobbyData | Request::GameData => target == Role::Server,
        }
    }
}

impl TryFrom<u8> for Request {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Disconnect,
            1 => Self::Heartbeat,
            2 => Self::StartGame,
            3 => Self::AllowUserInput,
            4 => Self::DisallowUserInput,
            5 => Self::Pause,
            6 => Self::Resume,
            7 => Self::LobbyData,
            8 => Self::GameData,
            other => return Err(other),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseType {
    Ok = 0,
    BadRequest = 1,
    BadState = 2,
    BadDestination = 3,
}

impl TryFrom<u8> for ResponseType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Ok,
            1 => Self::BadRequest,
            2 => Self::BadState,
            3 => Self::BadDestination,
            other => return Err(other),
        })
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ServerFlags: u8 {
        const USE_SERVER_VALUES = 1 << 0;
        const USE_SAME_VALUES = 1 << 1;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PlayerFlags: u8 {
        const HOST = 1 << 0;
        const COMPUTER = 1 << 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyServerInfo {
    pub flags: ServerFlags,
    pub map_size: u8,
    pub map_seed: String,
}

impl Default for LobbyServerInfo {
    fn default() -> Self {
        Self {
            flags: ServerFlags::USE_SERVER_VALUES,
            map_size: 3,
            map_seed: String::from("[0123456789ABCDEF]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyPlayerInfo {
    pub flags: PlayerFlags,
    /// Address of the peer controlling this player, empty for computer players.
    pub identification: String,
    pub face: u8,
    pub supplies: u8,
    pub reproduction: u8,
    pub intelligence: u8,
}

impl LobbyPlayerInfo {
    pub fn human(identification: impl Into<String>, face: u8) -> Self {
        Self {
            flags: PlayerFlags::empty(),
            identification: identification.into(),
            face,
            supplies: 20,
            reproduction: 20,
            intelligence: 40,
        }
    }

    pub fn host(identification: impl Into<String>) -> Self {
        Self {
            flags: PlayerFlags::HOST,
            ..Self::human(identification, 12)
        }
    }

    pub fn is_host(&self) -> bool {
        self.flags.contains(PlayerFlags::HOST)
    }

    pub fn is_computer(&self) -> bool {
        self.flags.contains(PlayerFlags::COMPUTER)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyData {
    pub number: u8,
    pub server_info: LobbyServerInfo,
    pub players: Vec<LobbyPlayerInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserActionData {
    pub number: u8,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncData {
    pub game_time: u32,
    pub patch: Vec<u8>,
}

/// A decoded wire record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Request {
        number: u8,
        request: Request,
    },
    Heartbeat {
        number: u8,
        player_index: u8,
    },
    LobbyData(LobbyData),
    PlayerData {
        number: u8,
        player_index: u8,
        payload: Vec<u8>,
    },
    MapData {
        number: u8,
        payload: Vec<u8>,
    },
    GameData {
        number: u8,
        payload: Vec<u8>,
    },
    UserAction(UserActionData),
    Response {
        number: u8,
        response: ResponseType,
    },
    InSync {
        game_time: u32,
    },
    SyncData(SyncData),
}

impl Message {
    pub fn data_type(&self) -> NetworkDataType {
        match self {
            Message::Request { .. } => NetworkDataType::Request,
            Message::Heartbeat { .. } => NetworkDataType::Heartbeat,
            Message::LobbyData(_) => NetworkDataType::LobbyData,
            Message::PlayerData { .. } => NetworkDataType::PlayerData,
            Message::MapData { .. } => NetworkDataType::MapData,
            Message::GameData { .. } => NetworkDataType::GameData,
            Message::UserAction(_) => NetworkDataType::UserActionData,
            Message::Response { .. } => NetworkDataType::Response,
            Message::InSync { .. } => NetworkDataType::InSync,
            Message::SyncData(_) => NetworkDataType::SyncData,
        }
    }

    /// Sequence number used for correlation, if the record carries one.
    pub fn number(&self) -> Option<u8> {
        match self {
            Message::Request { number, .. }
            | Message::Heartbeat { number, .. }
            | Message::PlayerData { number, .. }
            | Message::MapData { number, .. }
            | Message::GameData { number, .. }
            | Message::Response { number, .. } => Some(*number),
            Message::LobbyData(data) => Some(data.number),
            Message::UserAction(action) => Some(action.number),
            Message::InSync { .. } | Message::SyncData(_) => None,
        }
    }

    /// True when the sender does not expect any reply.
    pub fn is_spontaneous(&self) -> bool {
        self.number().is_none_or(|number| number == SPONTANEOUS_MESSAGE)
    }
}
