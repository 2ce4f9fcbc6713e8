//! # bw2-client
//!
//! Async client for the BOSSWAVE router.
//!
//! One TCP connection to the local router carries every request. Each
//! request gets its own sequence number, and a background dispatcher routes
//! the router's replies back to whichever caller is waiting on that number,
//! so publishes, long-lived subscriptions and chain builds all share the
//! socket concurrently.
//!
//! ## Architecture
//!
//! - **protocol**: frame model and the router's text framing
//! - **control**: the router's hello handshake
//! - **mux**: sequence registry, dispatcher, transactions
//! - **ops**: publish, subscribe, query, list, chains, entities
//!
//! ## Example
//!
//! ```no_run
//! use bw2_client::{Client, PublishParams, SubscribeParams};
//! use bw2_client::protocol::PayloadObject;
//!
//! # async fn run() -> bw2_client::Result<()> {
//! let client = Client::connect("").await?;
//! client.set_entity_file("me.ent").await?;
//!
//! let mut messages = client
//!     .subscribe(&SubscribeParams {
//!         uri: "scratch.ns/demo/*".into(),
//!         auto_chain: true,
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! client
//!     .publish(&PublishParams {
//!         uri: "scratch.ns/demo/hello".into(),
//!         auto_chain: true,
//!         payload_objects: vec![PayloadObject::text("hi")],
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! while let Some(msg) = messages.recv().await {
//!     println!("{} from {}", msg.uri, msg.from);
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod control;
pub mod error;
pub mod keys;
pub mod mux;
pub mod ops;
pub mod protocol;
pub mod transport;
pub mod writer;

mod client;

pub use client::{Client, ClientBuilder, ClientConfig, DEFAULT_STREAM_CAPACITY};
pub use error::{Bw2Error, Result};
pub use mux::{ResponseStream, Transaction};
pub use ops::{
    ChainStream, CreateDotChainParams, CreateDotParams, CreateEntityParams, ElaborateLevel,
    ListParams, ListStream, MessageStream, PayloadObjectError, PublishParams, QueryParams,
    SimpleChain, SimpleMessage, SubscribeParams,
};
pub use protocol::{Dot, DotChain, PayloadObject, RoutingObject};
