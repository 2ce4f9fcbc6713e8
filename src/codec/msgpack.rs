//! MsgPack codec using `rmp-serde`.
//!
//! Structs are always written with `to_vec_named` (map form). Subscribers in
//! other languages key on field names, never on field order.
//!
//! # Example
//!
//! ```
//! use bw2_client::codec::MsgPackCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Reading {
//!     sensor: String,
//!     value: f64,
//! }
//!
//! let reading = Reading { sensor: "temp".to_string(), value: 21.5 };
//! let po = MsgPackCodec::payload_object(&reading).unwrap();
//! let decoded: Reading = MsgPackCodec::from_payload_object(&po).unwrap();
//! assert_eq!(decoded, reading);
//! ```

use bytes::Bytes;
use serde::de::IgnoredAny;

use crate::error::{Bw2Error, Result};
use crate::protocol::{po, PayloadObject};

/// MessagePack codec for payload objects in the `2.0.0.0/8` class.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Wrap a value in a payload object of the generic MsgPack schema.
    pub fn payload_object<T: serde::Serialize>(value: &T) -> Result<PayloadObject> {
        Self::payload_object_with_schema(po::MSGPACK, value)
    }

    /// Wrap a value in a payload object of a specific MsgPack sub-schema.
    pub fn payload_object_with_schema<T: serde::Serialize>(
        po_num: u32,
        value: &T,
    ) -> Result<PayloadObject> {
        if !PayloadObject::new(po_num, Bytes::new()).is_in_class(po::MSGPACK, po::MSGPACK_MASK) {
            return Err(Bw2Error::Unsupported(
                "MsgPack payloads must use a 2.0.0.0/8 schema",
            ));
        }
        Ok(PayloadObject::new(po_num, Self::encode(value)?))
    }

    /// Decode the content of a MsgPack payload object.
    pub fn from_payload_object<T: serde::de::DeserializeOwned>(po: &PayloadObject) -> Result<T> {
        Self::decode(&po.content)
    }

    /// Check that `bytes` hold exactly one well-formed MsgPack value.
    pub fn validate(bytes: &[u8]) -> Result<()> {
        let mut de = rmp_serde::Deserializer::new(bytes);
        serde::Deserialize::deserialize(&mut de).map(|_: IgnoredAny| ())?;
        if !de.get_ref().is_empty() {
            return Err(Bw2Error::Protocol(
                "Trailing bytes after MsgPack value".to_string(),
            ));
        }
        Ok(())
    }
}
