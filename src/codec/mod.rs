//! Codec module - typed access to payload objects.
//!
//! - [`MsgPackCodec`] - MessagePack via `rmp-serde`, `2.0.0.0/8` class
//! - [`JsonCodec`] - JSON via `serde_json`, `65.0.0.0/8` class
//!
//! Codecs are marker structs with static methods rather than trait objects.
//! [`validate_payload_object`] is what message projection uses to report
//! per-object decode errors without failing the whole delivery.
//!
//! # Example
//!
//! ```
//! use bw2_client::codec::{validate_payload_object, JsonCodec};
//! use bw2_client::protocol::PayloadObject;
//!
//! let po = JsonCodec::payload_object(&vec![1, 2, 3]).unwrap();
//! assert!(validate_payload_object(&po).is_ok());
//!
//! let broken = PayloadObject::new(po.po_num, &b"[1, 2"[..]);
//! assert!(validate_payload_object(&broken).is_err());
//! ```

mod json;
mod msgpack;

pub use json::JsonCodec;
pub use msgpack::MsgPackCodec;

use crate::error::{Bw2Error, Result};
use crate::protocol::{po, PayloadObject};

/// Check that a payload object's content matches its schema class.
///
/// Only the classes with a public encoding are checked; everything else
/// (binary, blob, unallocated) is accepted as-is.
pub fn validate_payload_object(object: &PayloadObject) -> Result<()> {
    if object.is_in_class(po::MSGPACK, po::MSGPACK_MASK) {
        return MsgPackCodec::validate(&object.content);
    }
    if object.is_in_class(po::JSON, po::JSON_MASK) {
        return JsonCodec::validate(&object.content);
    }
    if object.is_in_class(po::TEXT, po::TEXT_MASK) {
        std::str::from_utf8(&object.content).map_err(|e| {
            Bw2Error::Protocol(format!(
                "Payload object {} is not UTF-8: {}",
                object.dot_form(),
                e
            ))
        })?;
    }
    Ok(())
}
