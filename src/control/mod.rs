//! Control module - connection handshake.
//!
//! # Workflow
//!
//! 1. Client dials the router
//! 2. Router sends `helo` with a `version` header
//! 3. Client validates it within the handshake timeout
//! 4. Dispatcher takes over the read half

mod hello;

pub use hello::{read_hello, validate_hello, DEFAULT_HANDSHAKE_TIMEOUT, VERSION_HEADER};
