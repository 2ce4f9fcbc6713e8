//! Connection multiplexing.
//!
//! Many concurrent transactions share one socket. Each gets a unique
//! sequence number from the [`SequenceRegistry`]; the dispatcher routes
//! inbound frames back by that number.

mod dispatcher;
mod registry;
mod transaction;

pub use dispatcher::spawn_dispatcher;
pub use registry::{SequenceRegistry, DEFAULT_RESPONSE_CAPACITY};
pub use transaction::{ResponseStream, Transaction};
