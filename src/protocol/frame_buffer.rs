//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` so object bodies are split off without copying.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForHeader`: need the 27-byte header line
//! - `WaitingForSection`: need a complete section line (`kv`, `ro`, `po`, `end`)
//! - `WaitingForBody`: section line parsed, need `len` body bytes plus `\n`
//!
//! # Example
//!
//! ```
//! use bw2_client::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//!
//! // Data arrives in arbitrary chunks from the socket
//! assert!(buffer.push(b"resp 0000000000 00000000").unwrap().is_empty());
//! let frames = buffer.push(b"05\nkv status 4\nokay\nend\n").unwrap();
//!
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].seqno, 5);
//! assert!(frames[0].is_okay());
//! ```

use std::mem;

use bytes::BytesMut;

use super::objects::{PayloadObject, RoutingObject};
use super::wire_format::{
    FrameHeader, SectionLine, DEFAULT_MAX_BODY_SIZE, FRAME_HEADER_SIZE, MAX_LINE_LENGTH,
};
use super::Frame;
use crate::error::{Bw2Error, Result};

/// State machine for frame parsing.
#[derive(Debug)]
enum State {
    WaitingForHeader,
    WaitingForSection { frame: Frame },
    WaitingForBody { frame: Frame, section: SectionLine },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// A decode error leaves the buffer in an unspecified position; the stream
/// it came from must be abandoned.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed body size of a single section.
    max_body_size: usize,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 64KB, max body: 1GB.
    pub fn new() -> Self {
        Self::with_max_body(DEFAULT_MAX_BODY_SIZE)
    }

    /// Create a new frame buffer with a custom max body size.
    pub fn with_max_body(max_body_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForHeader,
            max_body_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// # Errors
    ///
    /// Returns error on any malformed line or oversize body.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.extend(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Append data to the buffer without extracting frames.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extract the next complete frame, if the buffer holds one.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` if a complete frame was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` on a protocol violation
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            match mem::replace(&mut self.state, State::WaitingForHeader) {
                State::WaitingForHeader => {
                    if self.buffer.len() < FRAME_HEADER_SIZE {
                        return Ok(None);
                    }
                    let line = self.buffer.split_to(FRAME_HEADER_SIZE);
                    let header = FrameHeader::decode(&line)?;
                    self.state = State::WaitingForSection {
                        frame: Frame::new(header.command, header.seqno),
                    };
                }

                State::WaitingForSection { frame } => {
                    let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') else {
                        if self.buffer.len() > MAX_LINE_LENGTH {
                            return Err(Bw2Error::Protocol("Section line too long".to_string()));
                        }
                        self.state = State::WaitingForSection { frame };
                        return Ok(None);
                    };
                    if pos > MAX_LINE_LENGTH {
                        return Err(Bw2Error::Protocol("Section line too long".to_string()));
                    }

                    let line = self.buffer.split_to(pos + 1);
                    let section = SectionLine::decode(&line[..pos])?;
                    if section == SectionLine::End {
                        return Ok(Some(frame));
                    }
                    if section.body_len() > self.max_body_size {
                        return Err(Bw2Error::Protocol(format!(
                            "Body size {} exceeds maximum {}",
                            section.body_len(),
                            self.max_body_size
                        )));
                    }
                    self.state = State::WaitingForBody { frame, section };
                }

                State::WaitingForBody { mut frame, section } => {
                    let len = section.body_len();
                    if self.buffer.len() <= len {
                        self.state = State::WaitingForBody { frame, section };
                        return Ok(None);
                    }

                    let body = self.buffer.split_to(len).freeze();
                    let terminator = self.buffer.split_to(1);
                    if terminator[0] != b'\n' {
                        return Err(Bw2Error::Protocol(
                            "Missing newline after section body".to_string(),
                        ));
                    }

                    match section {
                        SectionLine::KeyValue { key, .. } => {
                            let value = String::from_utf8(body.to_vec()).map_err(|_| {
                                Bw2Error::Protocol(format!("Header {:?} is not UTF-8", key))
                            })?;
                            frame.add_header(key, value);
                        }
                        SectionLine::RoutingObject { ro_num, .. } => {
                            frame.add_routing_object(RoutingObject::new(ro_num, body));
                        }
                        SectionLine::PayloadObject { po_num, .. } => {
                            frame.add_payload_object(PayloadObject::new(po_num, body));
                        }
                        SectionLine::End => {}
                    }
                    self.state = State::WaitingForSection { frame };
                }
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForSection { .. } => "WaitingForSection",
            State::WaitingForBody { .. } => "WaitingForBody",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
