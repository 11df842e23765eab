use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::protocol::{ResponseType, SPONTANEOUS_MESSAGE};

/// The record kind that settles a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Response,
    Heartbeat,
}

pub type ResponseHandler = Box<dyn FnOnce(ResponseType) + Send>;

#[derive(Default)]
struct Registry {
    handlers: HashMap<u8, (ReplyKind, ResponseHandler)>,
    closed: bool,
}

/// Matches replies to outstanding requests by message number.
#[derive(Default)]
pub struct ResponseCorrelator {
    registry: Mutex<Registry>,
}

impl ResponseCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, number: u8, expected: ReplyKind, handler: ResponseHandler) {
        if number == SPONTANEOUS_MESSAGE {
            return;
        }

        let stale = {
            let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            if registry.closed {
                return;
            }
            registry.handlers.insert(number, (expected, handler))
        };

        if stale.is_some() {
            log::debug!(target: "serfnet::session", "Discarding stale handler for message {}", number);
        }
    }

    /// Invokes and removes the handler waiting on `number`. Returns whether
    /// one was found.
    pub fn dispatch(&self, number: u8, kind: ReplyKind, result: ResponseType) -> bool {
        let handler = {
            let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            match registry.handlers.get(&number) {
                Some((expected, _)) if *expected == kind => {
                    registry.handlers.remove(&number).map(|(_, handler)| handler)
                }
                _ => None,
            }
        };

        match handler {
            Some(handler) => {
                handler(result);
                true
            }
            None => false,
        }
    }

    /// Forgets the handler for `number` without running it.
    pub fn cancel(&self, number: u8) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .remove(&number);
    }

    /// Drops every pending handler without running it.
    pub fn close(&self) {
        let dropped = {
            let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry.closed = true;
            std::mem::take(&mut registry.handlers)
        };
        if !dropped.is_empty() {
            log::debug!(target: "serfnet::session", "Dropped {} pending handlers", dropped.len());
        }
    }

    pub fn len(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
