//! Heartbeat-driven connection liveness.
//!
//! Every inbound message stamps a [`LivenessRecord`]. A [`LivenessMonitor`]
//! compares that stamp against two thresholds: past the soft one the owner
//! should ask its peer for fresh state, past the hard one the connection is
//! considered gone. The [`Watchdog`] thread polls on a fixed interval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// Monotonic millisecond source.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Clock advanced by hand, for deterministic timing.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct LivenessRecord {
    last_seen: AtomicU64,
}

impl LivenessRecord {
    pub fn new(now_ms: u64) -> Self {
        Self {
            last_seen: AtomicU64::new(now_ms),
        }
    }

    pub fn touch(&self, now_ms: u64) {
        self.last_seen.fetch_max(now_ms, Ordering::AcqRel);
    }

    pub fn last_seen(&self) -> u64 {
        self.last_seen.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessState {
    Healthy,
    Stale,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessEvent {
    RefreshNeeded,
    ConnectionLost,
}

#[derive(Debug)]
pub struct LivenessMonitor {
    soft_ms: u64,
    hard_ms: u64,
    state: LivenessState,
}

impl LivenessMonitor {
    pub fn new(soft: Duration, hard: Duration) -> Self {
        Self {
            soft_ms: soft.as_millis() as u64,
            hard_ms: hard.as_millis() as u64,
            state: LivenessState::Healthy,
        }
    }

    pub fn state(&self) -> LivenessState {
        self.state
    }

    /// Advance the state machine. Each event is raised only on the
    /// transition into its state.
    pub fn poll(&mut self, last_seen: u64, now: u64) -> Option<LivenessEvent> {
        if self.state == LivenessState::Lost {
            return None;
        }

        let silence = now.saturating_sub(last_seen);
        if silence >= self.hard_ms {
            self.state = LivenessState::Lost;
            return Some(LivenessEvent::ConnectionLost);
        }

        if silence >= self.soft_ms {
            if self.state == LivenessState::Healthy {
                self.state = LivenessState::Stale;
                return Some(LivenessEvent::RefreshNeeded);
            }
            return None;
        }

        self.state = LivenessState::Healthy;
        None
    }
}

/// Background thread running `tick` every `interval` until cancelled or
/// until `tick` returns false.
#[derive(Debug)]
pub struct Watchdog {
    stop: Option<Sender<()>>,
}

impl Watchdog {
    pub fn spawn<F>(name: &str, interval: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (stop, stopped) = mpsc::channel::<()>();

        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if !tick() {
                                break;
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;

        Ok(Self { stop: Some(stop) })
    }

    /// Stops the thread after its current tick. Never blocks, so it is safe
    /// to call from inside `tick`.
    pub fn cancel(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop.is_none()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.cancel();
    }
}
