//! Router operations.
//!
//! Every operation follows the same path: encode a [`request::Request`]
//! under a fresh sequence number, open a transaction, classify the first
//! reply, then either project it (single response) or hand back a stream of
//! the replies that follow (streaming).
//!
//! | Operation | Command | Shape |
//! |-----------|---------|-------|
//! | `create_entity` | `make` | single |
//! | `create_dot` | `makd` | single |
//! | `create_dot_chain` | `makc` | single |
//! | `publish` | `publ` / `pers` | single |
//! | `set_entity` | `sete` | single |
//! | `subscribe` | `subs` | streaming |
//! | `query` | `quer` | streaming |
//! | `list` | `list` | streaming |
//! | `build_chain` | `bldc` | streaming |

mod chain;
mod entity;
mod params;
mod publish;
mod query;
mod reply;
mod request;
mod results;

pub use params::{
    format_duration, CreateDotChainParams, CreateDotParams, CreateEntityParams, ElaborateLevel,
    ListParams, PublishParams, QueryParams, SubscribeParams,
};
pub use results::{
    ChainStream, ListStream, MessageStream, PayloadObjectError, SimpleChain, SimpleMessage,
};

use reply::Reply;
use request::Request;

use crate::client::Client;
use crate::error::Result;
use crate::mux::{ResponseStream, Transaction};
use crate::protocol::Frame;

impl Client {
    /// Encode `request` and open its transaction.
    async fn begin(&self, request: Request<'_>, capacity: usize) -> Result<Transaction> {
        // Unsupported requests fail before a sequence number is spent
        request.check()?;
        let seqno = self.next_seqno();
        let frame = request.encode(seqno)?;
        self.transact(&frame, capacity).await
    }

    /// Run a single-response exchange and classify its only frame.
    ///
    /// The transaction is dropped on return, which deregisters it.
    async fn single(&self, request: Request<'_>) -> Result<Reply> {
        let mut tx = self.begin(request, self.config().response_capacity).await?;
        let frame = tx.first().await?;
        Ok(Reply::classify(frame))
    }

    /// Run a streaming exchange: check the acknowledgement, then stream.
    async fn streaming<T>(&self, request: Request<'_>, project: fn(Frame) -> T) -> Result<ResponseStream<T>>
    where
        T: Send + 'static,
    {
        let mut tx = self.begin(request, self.config().stream_capacity).await?;
        Reply::classify(tx.first().await?).into_ack()?;
        Ok(ResponseStream::new(tx, project))
    }
}
