//! Fixed-layout little-endian encoding of [`Message`] records and the
//! length-prefixed framing used on the byte stream.

use std::fmt;
use std::io::{self, Read, Write};

use super::protocol::{
    LobbyData, LobbyPlayerInfo, LobbyServerInfo, MAX_FRAME_LEN, Message, NetworkDataType,
    PlayerFlags, Request, ResponseType, ServerFlags, SyncData, UserActionData,
};

const TAG_SIZE: usize = 2;
const FRAME_HEADER_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedKind {
    TooShort(usize),
    UnknownType(u16),
    UnknownRequest(u8),
    UnknownResponse(u8),
    InvalidUtf8,
    TrailingBytes(usize),
}

impl fmt::Display for MalformedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedKind::TooShort(len) => write!(f, "{} bytes cannot hold a type tag", len),
            MalformedKind::UnknownType(tag) => write!(f, "unknown network data type {}", tag),
            MalformedKind::UnknownRequest(kind) => write!(f, "unknown request kind {}", kind),
            MalformedKind::UnknownResponse(kind) => write!(f, "unknown response kind {}", kind),
            MalformedKind::InvalidUtf8 => write!(f, "string field is not valid UTF-8"),
            MalformedKind::TrailingBytes(count) => {
                write!(f, "{} unexpected bytes after record", count)
            }
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("malformed message: {0}")]
    Malformed(MalformedKind),
    #[error("truncated {data_type:?} record: needed {needed} bytes, got {available}")]
    Truncated {
        data_type: NetworkDataType,
        needed: usize,
        available: usize,
    },
    #[error("{field} of {len} does not fit its length prefix")]
    FieldTooLarge { field: &'static str, len: usize },
}

impl MessageError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, MessageError::Malformed(_))
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, MessageError::Truncated { .. })
    }
}

struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    fn new(data_type: NetworkDataType) -> Self {
        let mut writer = Self {
            buf: Vec::with_capacity(16),
        };
        writer.put_u16(data_type as u16);
        writer
    }

    fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn put_str(&mut self, field: &'static str, value: &str) -> Result<(), MessageError> {
        let len = u16::try_from(value.len()).map_err(|_| MessageError::FieldTooLarge {
            field,
            len: value.len(),
        })?;
        self.put_u16(len);
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    fn put_blob(&mut self, field: &'static str, value: &[u8]) -> Result<(), MessageError> {
        let len = u32::try_from(value.len())
            .ok()
            .filter(|&len| len as usize <= MAX_FRAME_LEN)
            .ok_or(MessageError::FieldTooLarge {
                field,
                len: value.len(),
            })?;
        self.put_u32(len);
        self.buf.extend_from_slice(value);
        Ok(())
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

struct WireReader<'a> {
    data: &'a [u8],
    offset: usize,
    data_type: NetworkDataType,
}

impl<'a> WireReader<'a> {
    fn take(&mut self, count: usize) -> Result<&'a [u8], MessageError> {
        let end = self.offset + count;
        if end > self.data.len() {
            return Err(MessageError::Truncated {
                data_type: self.data_type,
                needed: end,
                available: self.data.len(),
            });
        }
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    fn get_u8(&mut self) -> Result<u8, MessageError> {
        Ok(self.take(1)?[0])
    }

    fn get_u16(&mut self) -> Result<u16, MessageError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn get_u32(&mut self) -> Result<u32, MessageError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn get_str(&mut self) -> Result<String, MessageError> {
        let len = self.get_u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| MessageError::Malformed(MalformedKind::InvalidUtf8))
    }

    fn get_blob(&mut self) -> Result<Vec<u8>, MessageError> {
        let len = self.get_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn finish(self) -> Result<(), MessageError> {
        let remaining = self.data.len() - self.offset;
        if remaining > 0 {
            return Err(MessageError::Malformed(MalformedKind::TrailingBytes(remaining)));
        }
        Ok(())
    }
}

impl Message {
    pub fn serialize(&self) -> Result<Vec<u8>, MessageError> {
        let mut w = WireWriter::new(self.data_type());

        match self {
            Message::Request { number, request } => {
                w.put_u8(*number);
                w.put_u8(*request as u8);
            }
            Message::Heartbeat {
                number,
                player_index,
            } => {
                w.put_u8(*number);
                w.put_u8(*player_index);
            }
            Message::LobbyData(data) => {
                w.put_u8(data.number);
                write_server_info(&mut w, &data.server_info)?;
                let count = u8::try_from(data.players.len()).map_err(|_| {
                    MessageError::FieldTooLarge {
                        field: "player list",
                        len: data.players.len(),
                    }
                })?;
                w.put_u8(count);
                for player in &data.players {
                    write_player_info(&mut w, player)?;
                }
            }
            Message::PlayerData {
                number,
                player_index,
                payload,
            } => {
                w.put_u8(*number);
                w.put_u8(*player_index);
                w.put_blob("player data", payload)?;
            }
            Message::MapData { number, payload } => {
                w.put_u8(*number);
                w.put_blob("map data", payload)?;
            }
            Message::GameData { number, payload } => {
                w.put_u8(*number);
                w.put_blob("game data", payload)?;
            }
            Message::UserAction(action) => {
                w.put_u8(action.number);
                w.put_blob("user action", &action.payload)?;
            }
            Message::Response { number, response } => {
                w.put_u8(*number);
                w.put_u8(*response as u8);
            }
            Message::InSync { game_time } => {
                w.put_u32(*game_time);
            }
            Message::SyncData(sync) => {
                w.put_u32(sync.game_time);
                w.put_blob("sync patch", &sync.patch)?;
            }
        }

        Ok(w.finish())
    }

    /// Route a record by its leading type tag and decode it.
    pub fn parse(data: &[u8]) -> Result<Message, MessageError> {
        if data.len() < TAG_SIZE {
            return Err(MessageError::Malformed(MalformedKind::TooShort(data.len())));
        }

        let tag = u16::from_le_bytes([data[0], data[1]]);
        let data_type = NetworkDataType::try_from(tag)
            .map_err(|tag| MessageError::Malformed(MalformedKind::UnknownType(tag)))?;

        let mut r = WireReader {
            data,
            offset: TAG_SIZE,
            data_type,
        };

        let message = match data_type {
            NetworkDataType::Request => {
                let number = r.get_u8()?;
                let kind = r.get_u8()?;
                let request = Request::try_from(kind)
                    .map_err(|kind| MessageError::Malformed(MalformedKind::UnknownRequest(kind)))?;
                Message::Request { number, request }
            }
            NetworkDataType::Heartbeat => Message::Heartbeat {
                number: r.get_u8()?,
                player_index: r.get_u8()?,
            },
            NetworkDataType::LobbyData => {
                let number = r.get_u8()?;
                let server_info = read_server_info(&mut r)?;
                let count = r.get_u8()? as usize;
                let mut players = Vec::with_capacity(count);
                for _ in 0..count {
                    players.push(read_player_info(&mut r)?);
                }
                Message::LobbyData(LobbyData {
                    number,
                    server_info,
                    players,
                })
            }
            NetworkDataType::PlayerData => Message::PlayerData {
                number: r.get_u8()?,
                player_index: r.get_u8()?,
                payload: r.get_blob()?,
            },
            NetworkDataType::MapData => Message::MapData {
                number: r.get_u8()?,
                payload: r.get_blob()?,
            },
            NetworkDataType::GameData => Message::GameData {
                number: r.get_u8()?,
                payload: r.get_blob()?,
            },
            NetworkDataType::UserActionData => Message::UserAction(UserActionData {
                number: r.get_u8()?,
                payload: r.get_blob()?,
            }),
            NetworkDataType::Response => {
                let number = r.get_u8()?;
                let kind = r.get_u8()?;
                let response = ResponseType::try_from(kind).map_err(|kind| {
                    MessageError::Malformed(MalformedKind::UnknownResponse(kind))
                })?;
                Message::Response { number, response }
            }
            NetworkDataType::InSync => Message::InSync {
                game_time: r.get_u32()?,
            },
            NetworkDataType::SyncData => Message::SyncData(SyncData {
                game_time: r.get_u32()?,
                patch: r.get_blob()?,
            }),
        };

        r.finish()?;
        Ok(message)
    }
}

fn write_server_info(w: &mut WireWriter, info: &LobbyServerInfo) -> Result<(), MessageError> {
    w.put_u8(info.flags.bits());
    w.put_u8(info.map_size);
    w.put_str("map seed", &info.map_seed)
}

fn read_server_info(r: &mut WireReader<'_>) -> Result<LobbyServerInfo, MessageError> {
    Ok(LobbyServerInfo {
        flags: ServerFlags::from_bits_truncate(r.get_u8()?),
        map_size: r.get_u8()?,
        map_seed: r.get_str()?,
    })
}

fn write_player_info(w: &mut WireWriter, player: &LobbyPlayerInfo) -> Result<(), MessageError> {
    w.put_u8(player.flags.bits());
    w.put_str("player identification", &player.identification)?;
    w.put_u8(player.face);
    w.put_u8(player.supplies);
    w.put_u8(player.reproduction);
    w.put_u8(player.intelligence);
    Ok(())
}

fn read_player_info(r: &mut WireReader<'_>) -> Result<LobbyPlayerInfo, MessageError> {
    Ok(LobbyPlayerInfo {
        flags: PlayerFlags::from_bits_truncate(r.get_u8()?),
        identification: r.get_str()?,
        face: r.get_u8()?,
        supplies: r.get_u8()?,
        reproduction: r.get_u8()?,
        intelligence: r.get_u8()?,
    })
}

/// Write one record prefixed by its 4-byte little-endian length.
pub fn write_frame<W: Write>(writer: &mut W, body: &[u8]) -> io::Result<()> {
    if body.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "frame exceeds maximum length",
        ));
    }
    writer.write_all(&(body.len() as u32).to_le_bytes())?;
    writer.write_all(body)?;
    writer.flush()
}

/// Blocking reader splitting a byte stream back into record bodies.
pub struct FrameReader<R> {
    inner: R,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Returns `Ok(None)` when the peer closed the stream between frames.
    pub fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        let mut filled = 0;
        while filled < FRAME_HEADER_SIZE {
            match self.inner.read(&mut header[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        let len = u32::from_le_bytes(header) as usize;
        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {} bytes exceeds maximum length", len),
            ));
        }

        let mut body = vec![0u8; len];
        self.inner.read_exact(&mut body)?;
        Ok(Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::SPONTANEOUS_MESSAGE;

    fn sample_lobby() -> LobbyData {
        LobbyData {
            number: 12,
            server_info: LobbyServerInfo::default(),
            players: vec![
                LobbyPlayerInfo::host("192.168.0.10"),
                LobbyPlayerInfo::human("192.168.0.11", 4),
            ],
        }
    }

    #[test]
    fn test_round_trip_all_types() {
        let messages = vec![
            Message::Request {
                number: 1,
                request: Request::GameData,
            },
            Message::Heartbeat {
                number: 7,
                player_index: 2,
            },
            Message::LobbyData(sample_lobby()),
            Message::PlayerData {
                number: 3,
                player_index: 1,
                payload: vec![1, 2, 3],
            },
            Message::MapData {
                number: 4,
                payload: vec![9; 40],
            },
            Message::GameData {
                number: 5,
                payload: Vec::new(),
            },
            Message::UserAction(UserActionData {
                number: SPONTANEOUS_MESSAGE,
                payload: vec![0xAB, 0xCD],
            }),
            Message::Response {
                number: 6,
                response: ResponseType::BadDestination,
            },
            Message::InSync { game_time: 123_456 },
            Message::SyncData(SyncData {
                game_time: 77,
                patch: vec![5; 300],
            }),
        ];

        for message in messages {
            let bytes = message.serialize().unwrap();
            assert_eq!(Message::parse(&bytes).unwrap(), message);
        }
    }

    #[test]
    fn test_request_layout_is_bit_exact() {
        let bytes = Message::Request {
            number: 0x22,
            request: Request::Pause,
        }
        .serialize()
        .unwrap();
        assert_eq!(bytes, vec![0x00, 0x00, 0x22, 0x05]);

        let bytes = Message::InSync {
            game_time: 0x0102_0304,
        }
        .serialize()
        .unwrap();
        assert_eq!(bytes, vec![0x08, 0x00, 0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_short_input_is_malformed() {
        assert!(Message::parse(&[]).unwrap_err().is_malformed());
        assert!(Message::parse(&[0]).unwrap_err().is_malformed());
    }

    #[test]
    fn test_unknown_tag_is_malformed() {
        let err = Message::parse(&[0x30, 0x00]).unwrap_err();
        assert_eq!(err, MessageError::Malformed(MalformedKind::UnknownType(0x30)));
    }

    #[test]
    fn test_known_tag_short_payload_is_truncated() {
        let err = Message::parse(&[0x01, 0x00, 0x07]).unwrap_err();
        assert!(err.is_truncated());

        let mut bytes = Message::LobbyData(sample_lobby()).serialize().unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(Message::parse(&bytes).unwrap_err().is_truncated());
    }

    #[test]
    fn test_invalid_enum_bytes_are_malformed() {
        assert_eq!(
            Message::parse(&[0x00, 0x00, 0x01, 0x63]).unwrap_err(),
            MessageError::Malformed(MalformedKind::UnknownRequest(0x63))
        );
        assert_eq!(
            Message::parse(&[0x07, 0x00, 0x01, 0x09]).unwrap_err(),
            MessageError::Malformed(MalformedKind::UnknownResponse(0x09))
        );
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let err = Message::parse(&[0x01, 0x00, 0x07, 0x02, 0xFF]).unwrap_err();
        assert_eq!(err, MessageError::Malformed(MalformedKind::TrailingBytes(1)));
    }

    #[test]
    fn test_oversized_string_rejected() {
        let mut lobby = sample_lobby();
        lobby.server_info.map_seed = "x".repeat(u16::MAX as usize + 1);
        let err = Message::LobbyData(lobby).serialize().unwrap_err();
        assert!(matches!(err, MessageError::FieldTooLarge { field: "map seed", .. }));
    }

    #[test]
    fn test_frames_split_stream() {
        let mut stream = Vec::new();
        write_frame(&mut stream, &[1, 2, 3]).unwrap();
        write_frame(&mut stream, &[]).unwrap();
        write_frame(&mut stream, &[9]).unwrap();

        let mut reader = FrameReader::new(stream.as_slice());
        assert_eq!(reader.read_frame().unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(reader.read_frame().unwrap(), Some(Vec::new()));
        assert_eq!(reader.read_frame().unwrap(), Some(vec![9]));
        assert_eq!(reader.read_frame().unwrap(), None);
    }

    #[test]
    fn test_frame_cut_mid_header_is_error() {
        let stream = [3u8, 0];
        let mut reader = FrameReader::new(&stream[..]);
        let err = reader.read_frame().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
