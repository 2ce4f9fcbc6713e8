//! Sequence-number registry.
//!
//! Maps each open transaction's sequence number to the channel its inbound
//! frames are delivered on. Allocation is a lock-free counter; the map and
//! the connection's failure state share one mutex so that registering a
//! transaction and observing a dead connection cannot interleave.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::{Bw2Error, Result};
use crate::protocol::Frame;

/// Default buffer of the per-transaction inbound channel.
pub const DEFAULT_RESPONSE_CAPACITY: usize = 3;

#[derive(Debug, Default)]
struct RegistryState {
    pending: HashMap<u32, mpsc::Sender<Frame>>,
    /// Closed because their buffer filled; cleared when the owner looks.
    overflowed: HashSet<u32>,
    /// Set once, when the connection dies.
    failure: Option<String>,
}

/// Routes inbound frames to open transactions by sequence number.
#[derive(Debug)]
pub struct SequenceRegistry {
    next_seqno: AtomicU32,
    state: Mutex<RegistryState>,
    dropped: AtomicU64,
    capacity: usize,
}

impl SequenceRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            next_seqno: AtomicU32::new(0),
            state: Mutex::new(RegistryState::default()),
            dropped: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    /// Hand out the next sequence number. The first one is 1.
    pub fn allocate(&self) -> u32 {
        self.next_seqno.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Register `seqno` and run `send` while still holding the lock.
    ///
    /// `send` is where the request gets queued for writing. Running it inside
    /// the same critical section means no reply can be routed before the
    /// entry exists, and a registration can never race past a connection
    /// failure. If `send` fails the entry is removed again.
    pub fn register_with<T, F>(&self, seqno: u32, send: F) -> Result<(mpsc::Receiver<Frame>, T)>
    where
        F: FnOnce() -> Result<T>,
    {
        let mut state = self.state.lock();
        if let Some(reason) = &state.failure {
            return Err(Bw2Error::ConnectionLost(reason.clone()));
        }

        let (tx, rx) = mpsc::channel(self.capacity);
        if state.pending.insert(seqno, tx).is_some() {
            tracing::warn!(seqno, "Sequence number reused while still open");
        }

        match send() {
            Ok(sent) => {
                tracing::debug!(seqno, open = state.pending.len(), "Registered transaction");
                Ok((rx, sent))
            }
            Err(e) => {
                state.pending.remove(&seqno);
                Err(e)
            }
        }
    }

    /// Remove `seqno`. Safe to call more than once.
    pub fn deregister(&self, seqno: u32) -> bool {
        let removed = {
            let mut state = self.state.lock();
            state.overflowed.remove(&seqno);
            state.pending.remove(&seqno).is_some()
        };
        if removed {
            tracing::debug!(seqno, "Deregistered transaction");
        }
        removed
    }

    /// Look up the channel for an inbound frame.
    ///
    /// The sender is cloned out so the caller can await delivery without
    /// holding the lock. Unknown sequence numbers are counted and logged.
    pub fn route(&self, seqno: u32) -> Option<mpsc::Sender<Frame>> {
        let sender = self.state.lock().pending.get(&seqno).cloned();
        if sender.is_none() {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(seqno, dropped, "Dropping frame for unknown sequence number");
        }
        sender
    }

    /// Hand `frame` to its transaction without waiting.
    ///
    /// A transaction whose buffer is full is closed and marked overflowed;
    /// frames for other sequence numbers are never held up behind it.
    pub fn deliver(&self, frame: Frame) {
        let seqno = frame.seqno;
        let Some(sender) = self.route(seqno) else {
            return;
        };
        match sender.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                {
                    let mut state = self.state.lock();
                    state.pending.remove(&seqno);
                    state.overflowed.insert(seqno);
                }
                tracing::warn!(seqno, capacity = self.capacity, "Transaction fell behind, closing it");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(seqno, "Transaction went away before delivery");
            }
        }
    }

    /// Whether `seqno` was closed for falling behind. Clears the mark.
    pub fn take_overflow(&self, seqno: u32) -> bool {
        self.state.lock().overflowed.remove(&seqno)
    }

    /// Mark the connection dead and close every open transaction.
    ///
    /// Only the first reason is kept. Senders are dropped after the lock is
    /// released, which closes each transaction's inbound channel.
    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.mark_dead(reason.clone()) {
            tracing::error!("Connection lost: {}", reason);
        }
    }

    /// Like [`fail`](Self::fail), for a shutdown the client asked for.
    pub fn close(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.mark_dead(reason.clone()) {
            tracing::debug!("Connection closed: {}", reason);
        }
    }

    /// Returns whether this call was the one that killed the connection.
    fn mark_dead(&self, reason: String) -> bool {
        let (first, drained) = {
            let mut state = self.state.lock();
            let first = state.failure.is_none();
            if first {
                state.failure = Some(reason);
            }
            (first, std::mem::take(&mut state.pending))
        };
        if !drained.is_empty() {
            tracing::debug!(closed = drained.len(), "Closed open transactions");
        }
        first
    }

    /// Why the connection died, if it has.
    pub fn failure(&self) -> Option<String> {
        self.state.lock().failure.clone()
    }

    pub fn is_alive(&self) -> bool {
        self.state.lock().failure.is_none()
    }

    /// Error for a transaction whose channel closed without a frame.
    pub fn closed_error(&self) -> Bw2Error {
        match self.failure() {
            Some(reason) => Bw2Error::ConnectionLost(reason),
            None => Bw2Error::ChannelClosed,
        }
    }

    /// Number of transactions currently open.
    pub fn open_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Sorted sequence numbers of open transactions.
    pub fn open_seqnos(&self) -> Vec<u32> {
        let mut seqnos: Vec<u32> = self.state.lock().pending.keys().copied().collect();
        seqnos.sort_unstable();
        seqnos
    }

    /// Frames dropped because no transaction owned their sequence number.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for SequenceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_RESPONSE_CAPACITY)
    }
}
