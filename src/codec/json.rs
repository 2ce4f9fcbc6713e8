//! JSON codec using `serde_json`, for payload objects in the `65.0.0.0/8` class.

use bytes::Bytes;
use serde::de::IgnoredAny;

use crate::error::{Bw2Error, Result};
use crate::protocol::{po, PayloadObject};

/// JSON codec for payload objects.
pub struct JsonCodec;

impl JsonCodec {
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Wrap a value in a payload object of the generic JSON schema.
    pub fn payload_object<T: serde::Serialize>(value: &T) -> Result<PayloadObject> {
        Self::payload_object_with_schema(po::JSON, value)
    }

    pub fn payload_object_with_schema<T: serde::Serialize>(
        po_num: u32,
        value: &T,
    ) -> Result<PayloadObject> {
        if !PayloadObject::new(po_num, Bytes::new()).is_in_class(po::JSON, po::JSON_MASK) {
            return Err(Bw2Error::Unsupported(
                "JSON payloads must use a 65.0.0.0/8 schema",
            ));
        }
        Ok(PayloadObject::new(po_num, Self::encode(value)?))
    }

    pub fn from_payload_object<T: serde::de::DeserializeOwned>(po: &PayloadObject) -> Result<T> {
        Self::decode(&po.content)
    }

    /// Check that `bytes` hold one well-formed JSON document.
    pub fn validate(bytes: &[u8]) -> Result<()> {
        serde_json::from_slice::<IgnoredAny>(bytes)?;
        Ok(())
    }
}
