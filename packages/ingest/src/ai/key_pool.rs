//! FIFO-fair round-robin API key pool.
//!
//! Each key admits one in-flight request. Acquisition takes the key at
//! the cursor when one is free and advances the cursor; otherwise the
//! acquirer queues, and a release hands its key to the head of the queue
//! directly. Acquisition is bounded by a timeout.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;

struct PoolState {
    keys: Vec<String>,
    busy: Vec<bool>,
    cursor: usize,
    waiters: VecDeque<oneshot::Sender<usize>>,
}

impl PoolState {
    /// First free key at or after the cursor, if any.
    fn take_free(&mut self) -> Option<usize> {
        let n = self.keys.len();
        for offset in 0..n {
            let index = (self.cursor + offset) % n;
            if !self.busy[index] {
                self.busy[index] = true;
                self.cursor = (index + 1) % n;
                return Some(index);
            }
        }
        None
    }
}

/// A leased key; releases back to the pool on drop.
pub struct KeyLease {
    pool: Arc<Mutex<PoolState>>,
    index: usize,
}

impl KeyLease {
    /// The API key this lease holds.
    pub fn key(&self) -> String {
        let state = self.pool.lock().expect("key pool lock");
        state.keys[self.index].clone()
    }

    /// Which slot in the pool this is (for logging).
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Drop for KeyLease {
    fn drop(&mut self) {
        let mut state = self.pool.lock().expect("key pool lock");
        // Hand the key straight to the oldest live waiter; if none is
        // left, mark it free
        while let Some(waiter) = state.waiters.pop_front() {
            if waiter.send(self.index).is_ok() {
                return;
            }
        }
        let index = self.index;
        state.busy[index] = false;
    }
}

/// Process-global pool of LLM API keys.
#[derive(Clone)]
pub struct KeyPool {
    inner: Arc<Mutex<PoolState>>,
    acquire_timeout: Duration,
}

impl KeyPool {
    pub fn new(keys: Vec<String>, acquire_timeout: Duration) -> Self {
        let busy = vec![false; keys.len()];
        Self {
            inner: Arc::new(Mutex::new(PoolState {
                keys,
                busy,
                cursor: 0,
                waiters: VecDeque::new(),
            })),
            acquire_timeout,
        }
    }

    /// Number of keys in the pool.
    pub fn size(&self) -> usize {
        self.inner.lock().expect("key pool lock").keys.len()
    }

    /// Pipeline concurrency implied by the pool.
    pub fn concurrency(&self) -> usize {
        self.size().max(1)
    }

    /// Acquire a key, waiting FIFO behind earlier acquirers. Returns
    /// `None` when the pool is empty or the timeout elapses.
    pub async fn acquire(&self) -> Option<KeyLease> {
        let receiver = {
            let mut state = self.inner.lock().expect("key pool lock");
            if state.keys.is_empty() {
                return None;
            }
            if let Some(index) = state.take_free() {
                return Some(KeyLease { pool: Arc::clone(&self.inner), index });
            }
            let (sender, receiver) = oneshot::channel();
            state.waiters.push_back(sender);
            receiver
        };

        match tokio::time::timeout(self.acquire_timeout, receiver).await {
            Ok(Ok(index)) => Some(KeyLease { pool: Arc::clone(&self.inner), index }),
            // Timed out or the sender vanished; the Drop-side handoff
            // skips dead receivers, so nothing leaks
            _ => None,
        }
    }
}
