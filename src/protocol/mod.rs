//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the router's text framing:
//! - 27-byte header line encoding/decoding
//! - Frame buffer for accumulating partial reads
//! - Frame struct with typed accessors
//! - Payload and routing objects

mod frame;
mod frame_buffer;
mod objects;
mod wire_format;

pub use frame::{encode_frame, Frame, FINISHED_HEADER, STATUS_OKAY};
pub use frame_buffer::FrameBuffer;
pub use objects::{
    po, po_num_from_dot_form, po_num_to_dot_form, Dot, DotChain, PayloadObject, RoutingObject,
    RoutingObjectKind,
};
pub use wire_format::{
    Command, FrameHeader, SectionLine, DEFAULT_MAX_BODY_SIZE, FRAME_HEADER_SIZE, MAX_LINE_LENGTH,
};
