//! Router greeting.
//!
//! The router speaks first: the very first frame on a new connection is a
//! `helo` frame carrying a `version` header. It is read directly from the
//! socket, before the dispatcher takes over the read half, so any bytes that
//! arrive behind it stay in the shared [`FrameBuffer`].

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Bw2Error, Result};
use crate::protocol::{Command, Frame, FrameBuffer};

/// How long the router has to greet us.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Header carrying the router's protocol version.
pub const VERSION_HEADER: &str = "version";

const READ_CHUNK_SIZE: usize = 4096;

/// Read and validate the greeting, returning the router version.
///
/// # Errors
///
/// - `HandshakeTimeout` if no complete frame arrives within `timeout`
/// - `BadHandshake` if the frame is malformed, not `helo`, or has no version
pub async fn read_hello<R>(reader: &mut R, buffer: &mut FrameBuffer, timeout: Duration) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let frame = match tokio::time::timeout(timeout, read_first_frame(reader, buffer)).await {
        Ok(result) => result?,
        Err(_) => {
            tracing::error!("Timeout on router hello after {:?}", timeout);
            return Err(Bw2Error::HandshakeTimeout);
        }
    };
    validate_hello(&frame)
}

/// Check a frame is a greeting and pull out the version.
pub fn validate_hello(frame: &Frame) -> Result<String> {
    if frame.command != Command::Hello {
        tracing::error!("First frame was {:?}, not hello", frame.command);
        return Err(Bw2Error::BadHandshake(format!(
            "expected hello, got {}",
            frame.command.code()
        )));
    }
    match frame.first_header(VERSION_HEADER) {
        Some(version) => Ok(version.to_string()),
        None => {
            tracing::error!("Hello frame has no version");
            Err(Bw2Error::BadHandshake("hello has no version".to_string()))
        }
    }
}

async fn read_first_frame<R>(reader: &mut R, buffer: &mut FrameBuffer) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    loop {
        match buffer.next_frame() {
            Ok(Some(frame)) => return Ok(frame),
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Malformed hello frame: {}", e);
                return Err(Bw2Error::BadHandshake(format!("malformed hello: {}", e)));
            }
        }

        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(Bw2Error::BadHandshake(
                "connection closed before hello".to_string(),
            ));
        }
        buffer.extend(&chunk[..n]);
    }
}
