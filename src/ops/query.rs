//! Subscribe, query and list.

use super::params::{ListParams, QueryParams, SubscribeParams};
use super::request::Request;
use super::results::{child_name, ListStream, MessageStream, SimpleMessage};
use crate::client::Client;
use crate::error::Result;

impl Client {
    /// Subscribe to `params.uri`.
    ///
    /// The stream yields messages until the subscription ends or the
    /// connection is lost. Dropping it cancels the subscription locally.
    pub async fn subscribe(&self, params: &SubscribeParams) -> Result<MessageStream> {
        let auto_chain = self.effective_auto_chain(params.auto_chain);
        self.streaming(Request::Subscribe { params, auto_chain }, SimpleMessage::from_frame)
            .await
    }

    /// Query persisted messages under `params.uri`.
    pub async fn query(&self, params: &QueryParams) -> Result<MessageStream> {
        let auto_chain = self.effective_auto_chain(params.auto_chain);
        self.streaming(Request::Query { params, auto_chain }, SimpleMessage::from_frame)
            .await
    }

    /// First result of a query, if any. The rest is drained in the background.
    ///
    /// # Errors
    ///
    /// `ConnectionLost` if the connection died before a result arrived.
    pub async fn query_one(&self, params: &QueryParams) -> Result<Option<SimpleMessage>> {
        let mut stream = self.query(params).await?;
        match stream.recv().await {
            Some(first) => {
                stream.drain();
                Ok(Some(first))
            }
            None => match stream.end_reason() {
                Some(e) => Err(e),
                None => Ok(None),
            },
        }
    }

    /// List the children of `params.uri` that hold persisted messages.
    pub async fn list(&self, params: &ListParams) -> Result<ListStream> {
        let auto_chain = self.effective_auto_chain(params.auto_chain);
        self.streaming(Request::List { params, auto_chain }, child_name)
            .await
    }
}
