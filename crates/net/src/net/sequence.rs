use std::sync::atomic::{AtomicU8, Ordering};

use super::protocol::SPONTANEOUS_MESSAGE;

/// Per-session allocator for correlation numbers. Wraps modulo 256 and
/// never yields the spontaneous sentinel.
#[derive(Debug, Default)]
pub struct MessageIndexer {
    next: AtomicU8,
}

impl MessageIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u8 {
        let mut current = self.next.load(Ordering::Relaxed);
        loop {
            let number = if current == SPONTANEOUS_MESSAGE {
                0
            } else {
                current
            };
            let following = match number.wrapping_add(1) {
                SPONTANEOUS_MESSAGE => 0,
                n => n,
            };
            match self.next.compare_exchange_weak(
                current,
                following,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return number,
                Err(actual) => current = actual,
            }
        }
    }
}
