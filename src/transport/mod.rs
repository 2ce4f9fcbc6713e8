//! Transport module - router address handling and TCP dialing.

mod tcp;

pub use tcp::{dial, resolve_address, DEFAULT_HOST, DEFAULT_PORT};
