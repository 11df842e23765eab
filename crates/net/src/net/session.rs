use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::config::NetConfig;
use super::correlator::{ReplyKind, ResponseCorrelator, ResponseHandler};
use super::error::SessionError;
use super::liveness::{Clock, LivenessEvent, LivenessMonitor, LivenessRecord, Watchdog};
use super::protocol::{Message, Request, ResponseType, Role, SPONTANEOUS_MESSAGE};
use super::sequence::MessageIndexer;
use super::transport::Transport;

/// State shared by both ends of one connection.
pub(crate) struct Session {
    role: Role,
    transport: Arc<dyn Transport>,
    indexer: MessageIndexer,
    correlator: ResponseCorrelator,
    record: LivenessRecord,
    monitor: Mutex<LivenessMonitor>,
    watchdog: Mutex<Option<Watchdog>>,
    clock: Arc<dyn Clock>,
    closed: AtomicBool,
}

impl Session {
    pub fn new(
        role: Role,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        config: &NetConfig,
    ) -> Self {
        Self {
            role,
            transport,
            indexer: MessageIndexer::new(),
            correlator: ResponseCorrelator::new(),
            record: LivenessRecord::new(clock.now_ms()),
            monitor: Mutex::new(LivenessMonitor::new(
                config.soft_timeout,
                config.hard_timeout,
            )),
            watchdog: Mutex::new(None),
            clock,
            closed: AtomicBool::new(false),
        }
    }

    pub fn peer_role(&self) -> Role {
        match self.role {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn next_number(&self) -> u8 {
        self.indexer.next()
    }

    pub fn send(&self, message: &Message) -> Result<(), SessionError> {
        let body = message.serialize()?;
        log::trace!(
            target: "serfnet::session",
            "{} sending {:?} ({} bytes)",
            self.role.as_str(),
            message.data_type(),
            body.len()
        );
        self.transport.send(&body)?;
        Ok(())
    }

    /// Sends `request` after checking the peer may receive it at all.
    pub fn send_request(&self, number: u8, request: Request) -> Result<(), SessionError> {
        let target = self.peer_role();
        if !request.permitted_toward(target) {
            return Err(SessionError::RequestNotPermitted { request, target });
        }
        self.send(&Message::Request { number, request })
    }

    /// Allocates a number, registers `handler` for its reply and sends.
    pub fn send_request_with_response(
        &self,
        request: Request,
        handler: ResponseHandler,
    ) -> Result<u8, SessionError> {
        let target = self.peer_role();
        if !request.permitted_toward(target) {
            return Err(SessionError::RequestNotPermitted { request, target });
        }
        let number = self.next_number();
        let expected = match request {
            Request::Heartbeat => ReplyKind::Heartbeat,
            _ => ReplyKind::Response,
        };
        self.correlator.register(number, expected, handler);
        if let Err(e) = self.send(&Message::Request { number, request }) {
            self.correlator.cancel(number);
            return Err(e);
        }
        Ok(number)
    }

    pub fn send_response(&self, number: u8, response: ResponseType) -> Result<(), SessionError> {
        if number == SPONTANEOUS_MESSAGE {
            return Ok(());
        }
        self.send(&Message::Response { number, response })
    }

    /// Echoes a heartbeat request back with our player index.
    pub fn send_heartbeat_reply(&self, number: u8, player_index: u8) -> Result<(), SessionError> {
        if number == SPONTANEOUS_MESSAGE {
            return Ok(());
        }
        self.send(&Message::Heartbeat {
            number,
            player_index,
        })
    }

    pub fn register(&self, number: u8, expected: ReplyKind, handler: ResponseHandler) {
        self.correlator.register(number, expected, handler);
    }

    pub fn cancel(&self, number: u8) {
        self.correlator.cancel(number);
    }

    pub fn dispatch(&self, number: u8, kind: ReplyKind, result: ResponseType) -> bool {
        self.correlator.dispatch(number, kind, result)
    }

    pub fn pending_requests(&self) -> usize {
        self.correlator.len()
    }

    pub fn touch(&self) {
        self.record.touch(self.clock.now_ms());
    }

    pub fn poll_liveness(&self) -> Option<LivenessEvent> {
        if self.is_closed() {
            return None;
        }
        let now = self.clock.now_ms();
        self.monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .poll(self.record.last_seen(), now)
    }

    pub fn set_watchdog(&self, watchdog: Watchdog) {
        let mut slot = self.watchdog.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            drop(watchdog);
            return;
        }
        *slot = Some(watchdog);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops the watchdog, drops pending handlers and closes the transport.
    /// Returns true only for the call that actually closed the session.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(mut watchdog) = self
            .watchdog
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            watchdog.cancel();
        }
        self.correlator.close();
        self.transport.close();
        true
    }
}
