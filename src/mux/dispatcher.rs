//! Inbound dispatcher.
//!
//! One task owns the socket's read half for the life of the connection. It
//! decodes frames and hands each to the transaction registered under its
//! sequence number. A decode error or end of stream fails the connection.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

use super::registry::SequenceRegistry;
use crate::error::{Bw2Error, Result};
use crate::protocol::FrameBuffer;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Spawn the dispatcher over `reader`.
///
/// `buffer` is the buffer the greeting was read through, so anything the
/// router sent right behind its hello is not lost.
pub fn spawn_dispatcher<R>(reader: R, buffer: FrameBuffer, registry: Arc<SequenceRegistry>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let reason = match read_loop(reader, buffer, &registry).await {
            Ok(()) => "router closed the connection".to_string(),
            Err(e) => {
                tracing::error!("Read loop error: {}", e);
                e.to_string()
            }
        };
        registry.fail(reason);
    })
}

/// Read and dispatch until end of stream or a fatal error.
async fn read_loop<R>(mut reader: R, mut buffer: FrameBuffer, registry: &SequenceRegistry) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        while let Some(frame) = buffer.next_frame()? {
            tracing::trace!(seqno = frame.seqno, command = frame.command.code(), "Received frame");
            registry.deliver(frame);
        }

        let n = match reader.read(&mut buf).await {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) => return Err(Bw2Error::Io(e)),
        };
        buffer.extend(&buf[..n]);
    }
}
