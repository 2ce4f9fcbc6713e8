//! Text encodings for fixed-length identifiers.
//!
//! Verifying keys, hashes and signatures travel as URL-safe base64 with
//! padding, the same form the router prints in headers such as `vk` and
//! `hash`.
//!
//! ```
//! use bw2_client::keys;
//!
//! let vk = [7u8; 32];
//! let text = keys::fmt_key(&vk);
//! assert_eq!(keys::parse_key(&text).unwrap(), vk);
//! ```

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;

use crate::error::{Bw2Error, Result};

pub const KEY_LEN: usize = 32;
pub const HASH_LEN: usize = 32;
pub const SIG_LEN: usize = 64;

pub fn fmt_key(key: &[u8]) -> String {
    URL_SAFE.encode(key)
}

pub fn parse_key(text: &str) -> Result<[u8; KEY_LEN]> {
    decode_fixed(text)
}

pub fn fmt_hash(hash: &[u8]) -> String {
    URL_SAFE.encode(hash)
}

pub fn parse_hash(text: &str) -> Result<[u8; HASH_LEN]> {
    decode_fixed(text)
}

pub fn fmt_sig(sig: &[u8]) -> String {
    URL_SAFE.encode(sig)
}

pub fn parse_sig(text: &str) -> Result<[u8; SIG_LEN]> {
    decode_fixed(text)
}

fn decode_fixed<const N: usize>(text: &str) -> Result<[u8; N]> {
    let bytes = URL_SAFE.decode(text)?;
    bytes.try_into().map_err(|bytes: Vec<u8>| Bw2Error::InvalidLength {
        expected: N,
        actual: bytes.len(),
    })
}
