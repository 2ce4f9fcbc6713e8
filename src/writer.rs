//! Dedicated writer task for outbound frames.
//!
//! Requests from every caller funnel through one queue into one task that
//! owns the socket's write half. The queue is FIFO, so the order frames are
//! enqueued in (under the registry lock, see [`crate::mux`]) is the order
//! they reach the router.
//!
//! # Architecture
//!
//! ```text
//! Caller 1 ─┐
//! Caller 2 ─┼─► mpsc::UnboundedSender<OutboundFrame> ─► Writer Task ─► Socket
//! Caller N ─┘                                              │
//!                                  WriteReceipt ◄──────────┘ (after flush)
//! ```
//!
//! Enqueueing never waits, which is what lets it happen while the registry
//! lock is held. Each caller then awaits its [`WriteReceipt`] outside the
//! lock, so `transact` still returns only once its bytes are flushed.

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Bw2Error, Result};

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

type Completion = oneshot::Sender<std::result::Result<(), String>>;

/// An encoded frame waiting to be written.
#[derive(Debug)]
pub struct OutboundFrame {
    pub bytes: Bytes,
    done: Option<Completion>,
}

impl OutboundFrame {
    /// Total size of this frame on the wire.
    #[inline]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Resolves once the frame has been flushed to the socket (or failed to be).
#[derive(Debug)]
pub struct WriteReceipt(oneshot::Receiver<std::result::Result<(), String>>);

impl WriteReceipt {
    /// Wait for the write to complete.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionLost` if the write failed or the writer stopped.
    pub async fn wait(self) -> Result<()> {
        match self.0.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(Bw2Error::ConnectionLost(reason)),
            Err(_) => Err(Bw2Error::ConnectionLost("writer stopped".to_string())),
        }
    }
}

/// Handle for sending frames to the writer task.
///
/// This is cheaply cloneable.
#[derive(Clone, Debug)]
pub struct WriterHandle {
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue an encoded frame without waiting.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionLost` if the writer task has exited.
    pub fn send(&self, bytes: Bytes) -> Result<WriteReceipt> {
        let (done_tx, done_rx) = oneshot::channel();
        let frame = OutboundFrame {
            bytes,
            done: Some(done_tx),
        };
        self.tx
            .send(frame)
            .map_err(|_| Bw2Error::ConnectionLost("writer stopped".to_string()))?;
        Ok(WriteReceipt(done_rx))
    }

    /// Whether the writer task is still accepting frames.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The task ends cleanly once every [`WriterHandle`] is dropped, and with an
/// error as soon as a write fails. Either way the write half is dropped.
pub fn spawn_writer_task<W>(writer: W) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

/// Main writer loop - receives frames and writes them to the socket.
async fn writer_loop<W>(mut rx: mpsc::UnboundedReceiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = match rx.recv().await {
            Some(f) => f,
            None => {
                // Every handle dropped, clean shutdown
                let _ = writer.shutdown().await;
                return Ok(());
            }
        };

        // Collect additional ready frames (non-blocking)
        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        match write_batch(&mut writer, &batch).await {
            Ok(()) => complete(&mut batch, Ok(())),
            Err(e) => {
                let reason = format!("write failed: {}", e);
                tracing::error!("{}", reason);
                complete(&mut batch, Err(reason.clone()));

                // Fail everything still queued behind the broken write
                rx.close();
                while let Ok(mut frame) = rx.try_recv() {
                    if let Some(done) = frame.done.take() {
                        let _ = done.send(Err(reason.clone()));
                    }
                }
                return Err(e);
            }
        }
    }
}

fn complete(batch: &mut [OutboundFrame], outcome: std::result::Result<(), String>) {
    for frame in batch {
        if let Some(done) = frame.done.take() {
            let _ = done.send(outcome.clone());
        }
    }
}

/// Write a batch of frames using scatter/gather I/O (`write_vectored`).
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if batch.is_empty() {
        return Ok(());
    }

    let total_size: usize = batch.iter().map(|f| f.size()).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(Bw2Error::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for remaining data after a partial write.
fn build_remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len());
    let mut offset = 0;

    for frame in batch {
        let end = offset + frame.size();
        if skip_bytes < end && !frame.bytes.is_empty() {
            let start = skip_bytes.saturating_sub(offset);
            slices.push(IoSlice::new(&frame.bytes[start..]));
        }
        offset = end;
    }

    slices
}
