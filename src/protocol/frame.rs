//! Frame struct with typed accessors.
//!
//! A frame carries a command, a sequence number, an ordered header multimap
//! and two object lists. Frames are built by the operation layer, encoded
//! with [`encode_frame`], and decoded on the way in by
//! [`FrameBuffer`](super::FrameBuffer).
//!
//! # Example
//!
//! ```
//! use bw2_client::protocol::{Command, Frame};
//!
//! let mut frame = Frame::new(Command::Publish, 42);
//! frame.add_header("uri", "a/b/c");
//! frame.add_header("revoker", "x");
//! frame.add_header("revoker", "y");
//!
//! assert_eq!(frame.first_header("uri"), Some("a/b/c"));
//! assert_eq!(frame.headers("revoker").collect::<Vec<_>>(), ["x", "y"]);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::objects::{PayloadObject, RoutingObject};
use super::wire_format::{Command, FrameHeader, SectionLine, FRAME_HEADER_SIZE};

/// Header marking the last frame of a multi-frame exchange.
pub const FINISHED_HEADER: &str = "finished";

/// Status value the router uses for success.
pub const STATUS_OKAY: &str = "okay";

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub seqno: u32,
    headers: Vec<(String, String)>,
    payload_objects: Vec<PayloadObject>,
    routing_objects: Vec<RoutingObject>,
}

impl Frame {
    pub fn new(command: Command, seqno: u32) -> Self {
        Self {
            command,
            seqno,
            headers: Vec::new(),
            payload_objects: Vec::new(),
            routing_objects: Vec::new(),
        }
    }

    #[inline]
    pub fn header(&self) -> FrameHeader {
        FrameHeader::new(self.command, self.seqno)
    }

    /// Append a header. Keys may repeat; order is preserved.
    pub fn add_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.push((key.into(), value.into()));
    }

    pub fn add_payload_object(&mut self, po: PayloadObject) {
        self.payload_objects.push(po);
    }

    pub fn add_routing_object(&mut self, ro: RoutingObject) {
        self.routing_objects.push(ro);
    }

    /// Value of the first header named `key`.
    pub fn first_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values of headers named `key`, in wire order.
    pub fn headers<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every header in wire order.
    pub fn all_headers(&self) -> &[(String, String)] {
        &self.headers
    }

    #[inline]
    pub fn payload_objects(&self) -> &[PayloadObject] {
        &self.payload_objects
    }

    #[inline]
    pub fn routing_objects(&self) -> &[RoutingObject] {
        &self.routing_objects
    }

    pub fn into_payload_objects(self) -> Vec<PayloadObject> {
        self.payload_objects
    }

    pub fn into_routing_objects(self) -> Vec<RoutingObject> {
        self.routing_objects
    }

    /// Whether this frame carries `finished=true`.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.first_header(FINISHED_HEADER) == Some("true")
    }

    /// Whether this frame carries any object besides headers.
    #[inline]
    pub fn has_objects(&self) -> bool {
        !self.payload_objects.is_empty() || !self.routing_objects.is_empty()
    }

    #[inline]
    pub fn status(&self) -> Option<&str> {
        self.first_header("status")
    }

    #[inline]
    pub fn reason(&self) -> Option<&str> {
        self.first_header("reason")
    }

    /// Whether the router reported `status=okay`.
    #[inline]
    pub fn is_okay(&self) -> bool {
        self.status() == Some(STATUS_OKAY)
    }
}

/// Encode a frame into its wire representation.
///
/// # Example
///
/// ```
/// use bw2_client::protocol::{encode_frame, Command, Frame};
///
/// let mut frame = Frame::new(Command::Hello, 1);
/// frame.add_header("version", "2.7");
/// let bytes = encode_frame(&frame);
/// assert_eq!(
///     &bytes[..],
///     &b"helo 0000000000 0000000001\nkv version 3\n2.7\nend\n"[..]
/// );
/// ```
pub fn encode_frame(frame: &Frame) -> Bytes {
    let content_len: usize = frame.headers.iter().map(|(_, v)| v.len()).sum::<usize>()
        + frame.routing_objects.iter().map(|ro| ro.content.len()).sum::<usize>()
        + frame.payload_objects.iter().map(|po| po.content.len()).sum::<usize>();
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + content_len + 256);

    buf.put_slice(&frame.header().encode());
    for (key, value) in &frame.headers {
        SectionLine::KeyValue {
            key: key.clone(),
            len: value.len(),
        }
        .encode_into(&mut buf);
        buf.put_slice(value.as_bytes());
        buf.put_u8(b'\n');
    }
    for ro in &frame.routing_objects {
        SectionLine::RoutingObject {
            ro_num: ro.ro_num,
            len: ro.content.len(),
        }
        .encode_into(&mut buf);
        buf.put_slice(&ro.content);
        buf.put_u8(b'\n');
    }
    for po in &frame.payload_objects {
        SectionLine::PayloadObject {
            po_num: po.po_num,
            len: po.content.len(),
        }
        .encode_into(&mut buf);
        buf.put_slice(&po.content);
        buf.put_u8(b'\n');
    }
    SectionLine::End.encode_into(&mut buf);
    buf.freeze()
}
