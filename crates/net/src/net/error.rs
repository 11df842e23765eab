use std::io;

use super::codec::MessageError;
use super::protocol::{Request, Role};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("frame of {0} bytes exceeds maximum length")]
    FrameTooLarge(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{request:?} may not be sent to a {}", target.as_str())]
    RequestNotPermitted { request: Request, target: Role },
    #[error("session is not connected")]
    NotConnected,
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error("server unreachable, retry later: {source}")]
    Retryable {
        #[source]
        source: io::Error,
    },
    #[error("cannot join server: {reason}")]
    Fatal { reason: String },
}

impl JoinError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, JoinError::Retryable { .. })
    }
}

impl From<io::Error> for JoinError {
    fn from(source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock => JoinError::Retryable { source },
            _ => JoinError::Fatal {
                reason: source.to_string(),
            },
        }
    }
}
