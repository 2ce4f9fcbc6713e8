//! Transactions and response streams.
//!
//! A transaction is one request and every frame the router sends back under
//! its sequence number. A relay task sits between the registry's inbound
//! channel and the caller: it forwards frames until one carries
//! `finished=true`, then closes the caller's channel and deregisters.
//!
//! ```text
//! Dispatcher ─► registry channel ─► relay ─► caller channel ─► Transaction::recv
//!                                     │
//!                      finished=true ─┴─► deregister, close
//! ```
//!
//! Dropping a [`Transaction`] (or a [`ResponseStream`] wrapping one) stops
//! the relay and deregisters, which is how callers cancel.
//!
//! When the caller's channel closes, [`Transaction::end_reason`] tells a
//! clean finish apart from a lost connection or an overflowed buffer.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::registry::SequenceRegistry;
use crate::error::{Bw2Error, Result};
use crate::protocol::{encode_frame, Frame};
use crate::writer::WriterHandle;

/// How the relay stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Ending {
    Finished,
    Lost(String),
    Overflowed,
}

/// An open request/response exchange.
#[derive(Debug)]
pub struct Transaction {
    seqno: u32,
    frames: mpsc::Receiver<Frame>,
    registry: Arc<SequenceRegistry>,
    ending: Arc<Mutex<Option<Ending>>>,
    relay: JoinHandle<()>,
}

impl Transaction {
    /// Register `request`, write it, and start relaying replies.
    ///
    /// Returns once the request bytes have been flushed to the socket.
    /// `capacity` bounds the caller-facing channel.
    pub async fn open(
        registry: Arc<SequenceRegistry>,
        writer: &WriterHandle,
        request: &Frame,
        capacity: usize,
    ) -> Result<Self> {
        let seqno = request.seqno;
        let bytes = encode_frame(request);

        let (inbound, receipt) = registry.register_with(seqno, || writer.send(bytes))?;

        let (out_tx, out_rx) = mpsc::channel(capacity.max(1));
        let ending = Arc::new(Mutex::new(None));
        let relay = tokio::spawn(relay(seqno, inbound, out_tx, registry.clone(), ending.clone()));
        let transaction = Transaction {
            seqno,
            frames: out_rx,
            registry,
            ending,
            relay,
        };

        // On failure the transaction drops here and deregisters.
        receipt.wait().await?;
        tracing::debug!(seqno, command = request.command.code(), "Sent request");
        Ok(transaction)
    }

    #[inline]
    pub fn seqno(&self) -> u32 {
        self.seqno
    }

    /// Next frame, or `None` once the exchange is over.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.frames.recv().await
    }

    /// The first reply.
    ///
    /// # Errors
    ///
    /// `ConnectionLost` if the connection died, `ChannelClosed` if the
    /// exchange ended without any frame.
    pub async fn first(&mut self) -> Result<Frame> {
        match self.frames.recv().await {
            Some(frame) => Ok(frame),
            None => Err(self.closed_error()),
        }
    }

    /// Why the exchange ended abnormally.
    ///
    /// `None` while frames may still arrive and after a clean finish.
    /// `ConnectionLost` or `Overflow` once [`recv`](Self::recv) has returned
    /// `None` for one of those reasons.
    pub fn end_reason(&self) -> Option<Bw2Error> {
        match &*self.ending.lock() {
            Some(Ending::Lost(reason)) => Some(Bw2Error::ConnectionLost(reason.clone())),
            Some(Ending::Overflowed) => Some(Bw2Error::Overflow(self.seqno)),
            Some(Ending::Finished) | None => None,
        }
    }

    /// Error to report when the channel closes without a frame.
    pub(crate) fn closed_error(&self) -> Bw2Error {
        self.end_reason().unwrap_or(Bw2Error::ChannelClosed)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.relay.abort();
        self.registry.deregister(self.seqno);
    }
}

/// Forward frames until the router says the exchange is finished.
async fn relay(
    seqno: u32,
    mut inbound: mpsc::Receiver<Frame>,
    out: mpsc::Sender<Frame>,
    registry: Arc<SequenceRegistry>,
    ending: Arc<Mutex<Option<Ending>>>,
) {
    let end = loop {
        let Some(frame) = inbound.recv().await else {
            // Checked before `out` drops, so the caller sees it on `None`
            if registry.take_overflow(seqno) {
                break Ending::Overflowed;
            }
            match registry.failure() {
                Some(reason) => break Ending::Lost(reason),
                None => break Ending::Finished,
            }
        };
        if frame.is_finished() {
            // A pure sentinel carries nothing worth delivering
            if frame.has_objects() {
                let _ = out.send(frame).await;
            }
            break Ending::Finished;
        }
        if out.send(frame).await.is_err() {
            break Ending::Finished;
        }
    };
    *ending.lock() = Some(end);
    registry.deregister(seqno);
    tracing::debug!(seqno, "Relay finished");
    drop(out);
}

/// A stream of replies projected into `T` as they are received.
pub struct ResponseStream<T> {
    transaction: Transaction,
    project: fn(Frame) -> T,
}

impl<T> std::fmt::Debug for ResponseStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStream")
            .field("seqno", &self.transaction.seqno)
            .finish()
    }
}

impl<T: Send + 'static> ResponseStream<T> {
    pub fn new(transaction: Transaction, project: fn(Frame) -> T) -> Self {
        Self {
            transaction,
            project,
        }
    }

    #[inline]
    pub fn seqno(&self) -> u32 {
        self.transaction.seqno()
    }

    /// Next item, or `None` once the router has finished.
    pub async fn recv(&mut self) -> Option<T> {
        let frame = self.transaction.recv().await?;
        Some((self.project)(frame))
    }

    /// Collect every remaining item.
    pub async fn collect(mut self) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = self.recv().await {
            items.push(item);
        }
        items
    }

    /// Keep consuming in the background until the router finishes, so the
    /// exchange is never cut off for falling behind. Resolves to the number
    /// of frames discarded.
    pub fn drain(mut self) -> JoinHandle<usize> {
        tokio::spawn(async move {
            let mut discarded = 0;
            while self.transaction.recv().await.is_some() {
                discarded += 1;
            }
            discarded
        })
    }

    /// Why the stream ended abnormally; see [`Transaction::end_reason`].
    pub fn end_reason(&self) -> Option<Bw2Error> {
        self.transaction.end_reason()
    }
}
