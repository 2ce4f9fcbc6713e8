//! Wire format encoding and decoding.
//!
//! Every frame starts with a fixed 27-byte header line:
//! ```text
//! ┌──────────┬───┬────────────┬───┬────────────┬────┐
//! │ Command  │ ␠ │ Length     │ ␠ │ Seq No     │ \n │
//! │ 4 ASCII  │   │ 10 digits  │   │ 10 digits  │    │
//! └──────────┴───┴────────────┴───┴────────────┴────┘
//! ```
//!
//! followed by section lines, each announcing a body of `len` bytes that is
//! itself terminated by `\n`:
//!
//! ```text
//! kv <key> <len>
//! ro <ronum> <len>
//! po <dotform>:<ponum> <len>
//! end
//! ```
//!
//! The length field of the header line is informational and always written
//! as zero; the router delimits frames by the `end` line.

use bytes::{BufMut, BytesMut};

use super::objects::{po_num_from_dot_form, po_num_to_dot_form};
use crate::error::{Bw2Error, Result};

/// Header line size in bytes, including the trailing newline.
pub const FRAME_HEADER_SIZE: usize = 27;

/// Default maximum body size of a single section (1 GB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 1_073_741_824;

/// Longest section line we accept before giving up on the stream.
pub const MAX_LINE_LENGTH: usize = 1024;

/// Commands understood by the router.
///
/// This is a closed set: a frame carrying any other code fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Router greeting, the first frame on every connection.
    Hello,
    /// Generic status response (`status`/`reason` headers).
    Response,
    /// A result frame of a streaming exchange.
    Result,
    Publish,
    Persist,
    Subscribe,
    Query,
    List,
    MakeEntity,
    MakeDot,
    MakeChain,
    BuildChain,
    SetEntity,
}

impl Command {
    /// The four-letter wire code.
    pub fn code(self) -> &'static str {
        match self {
            Command::Hello => "helo",
            Command::Response => "resp",
            Command::Result => "rslt",
            Command::Publish => "publ",
            Command::Persist => "pers",
            Command::Subscribe => "subs",
            Command::Query => "quer",
            Command::List => "list",
            Command::MakeEntity => "make",
            Command::MakeDot => "makd",
            Command::MakeChain => "makc",
            Command::BuildChain => "bldc",
            Command::SetEntity => "sete",
        }
    }

    /// Parse a four-letter wire code.
    pub fn from_code(code: &str) -> Option<Self> {
        let cmd = match code {
            "helo" => Command::Hello,
            "resp" => Command::Response,
            "rslt" => Command::Result,
            "publ" => Command::Publish,
            "pers" => Command::Persist,
            "subs" => Command::Subscribe,
            "quer" => Command::Query,
            "list" => Command::List,
            "make" => Command::MakeEntity,
            "makd" => Command::MakeDot,
            "makc" => Command::MakeChain,
            "bldc" => Command::BuildChain,
            "sete" => Command::SetEntity,
            _ => return None,
        };
        Some(cmd)
    }
}

/// Decoded header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub command: Command,
    pub seqno: u32,
}

impl FrameHeader {
    pub fn new(command: Command, seqno: u32) -> Self {
        Self { command, seqno }
    }

    /// Encode the header line.
    ///
    /// # Example
    ///
    /// ```
    /// use bw2_client::protocol::{Command, FrameHeader};
    ///
    /// let line = FrameHeader::new(Command::Publish, 42).encode();
    /// assert_eq!(&line[..], b"publ 0000000000 0000000042\n");
    /// ```
    pub fn encode(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        let text = format!("{} {:010} {:010}\n", self.command.code(), 0, self.seqno);
        buf.copy_from_slice(text.as_bytes());
        buf
    }

    /// Decode a header line (exactly `FRAME_HEADER_SIZE` bytes, newline included).
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != FRAME_HEADER_SIZE || buf[FRAME_HEADER_SIZE - 1] != b'\n' {
            return Err(Bw2Error::Protocol("Truncated frame header".to_string()));
        }
        let line = std::str::from_utf8(&buf[..FRAME_HEADER_SIZE - 1])
            .map_err(|_| Bw2Error::Protocol("Frame header is not ASCII".to_string()))?;

        let mut parts = line.split(' ');
        let (Some(code), Some(length), Some(seqno), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Bw2Error::Protocol(format!("Malformed frame header {:?}", line)));
        };

        let command = Command::from_code(code)
            .ok_or_else(|| Bw2Error::Protocol(format!("Unknown command {:?}", code)))?;
        parse_decimal::<u64>(length, "frame length")?;
        let seqno = parse_decimal::<u32>(seqno, "sequence number")?;

        Ok(Self { command, seqno })
    }
}

/// A parsed section line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionLine {
    /// Header key/value; the value body follows.
    KeyValue { key: String, len: usize },
    /// Routing object; the content body follows.
    RoutingObject { ro_num: u8, len: usize },
    /// Payload object; the content body follows.
    PayloadObject { po_num: u32, len: usize },
    /// End of frame.
    End,
}

impl SectionLine {
    /// Body length announced by this line (0 for `End`).
    pub fn body_len(&self) -> usize {
        match self {
            SectionLine::KeyValue { len, .. }
            | SectionLine::RoutingObject { len, .. }
            | SectionLine::PayloadObject { len, .. } => *len,
            SectionLine::End => 0,
        }
    }

    /// Parse a section line without its trailing newline.
    pub fn decode(line: &[u8]) -> Result<Self> {
        let line = std::str::from_utf8(line)
            .map_err(|_| Bw2Error::Protocol("Section line is not UTF-8".to_string()))?;
        if line == "end" {
            return Ok(SectionLine::End);
        }

        let mut parts = line.split(' ');
        let (Some(kind), Some(name), Some(len), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Bw2Error::Protocol(format!("Malformed section line {:?}", line)));
        };
        let len = parse_decimal::<usize>(len, "section length")?;

        match kind {
            "kv" => {
                if name.is_empty() {
                    return Err(Bw2Error::Protocol("Empty header key".to_string()));
                }
                Ok(SectionLine::KeyValue {
                    key: name.to_string(),
                    len,
                })
            }
            "ro" => {
                let ro_num = parse_decimal::<u8>(name, "routing object number")?;
                Ok(SectionLine::RoutingObject { ro_num, len })
            }
            "po" => {
                let po_num = parse_po_type(name)?;
                Ok(SectionLine::PayloadObject { po_num, len })
            }
            other => Err(Bw2Error::Protocol(format!("Unknown section {:?}", other))),
        }
    }

    /// Append this line, newline included, to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        let line = match self {
            SectionLine::KeyValue { key, len } => format!("kv {} {}\n", key, len),
            SectionLine::RoutingObject { ro_num, len } => format!("ro {} {}\n", ro_num, len),
            SectionLine::PayloadObject { po_num, len } => {
                format!("po {}:{} {}\n", po_num_to_dot_form(*po_num), po_num, len)
            }
            SectionLine::End => "end\n".to_string(),
        };
        buf.put_slice(line.as_bytes());
    }
}

/// Payload type field: `dotform:ponum`, where either half may be empty.
/// The number wins when both are present.
fn parse_po_type(field: &str) -> Result<u32> {
    let (dot_form, num) = field
        .split_once(':')
        .ok_or_else(|| Bw2Error::Protocol(format!("Malformed payload type {:?}", field)))?;
    if !num.is_empty() {
        return parse_decimal::<u32>(num, "payload object number");
    }
    if !dot_form.is_empty() {
        return po_num_from_dot_form(dot_form);
    }
    Err(Bw2Error::Protocol("Empty payload type".to_string()))
}

fn parse_decimal<T: std::str::FromStr>(text: &str, what: &str) -> Result<T> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Bw2Error::Protocol(format!("Invalid {} {:?}", what, text)));
    }
    text.parse::<T>()
        .map_err(|_| Bw2Error::Protocol(format!("Invalid {} {:?}", what, text)))
}
