//! Chain building.

use super::request::Request;
use super::results::{ChainStream, SimpleChain};
use crate::client::Client;
use crate::error::{Bw2Error, Result};

impl Client {
    /// Ask the router for every chain granting `permissions` on `uri` to `to`.
    pub async fn build_chain(&self, uri: &str, permissions: &str, to: &str) -> Result<ChainStream> {
        self.streaming(
            Request::BuildChain {
                uri,
                permissions,
                to,
            },
            SimpleChain::from_frame,
        )
        .await
    }

    /// The first chain the router finds. The rest is drained in the background.
    ///
    /// # Errors
    ///
    /// `NoResult` if the router finds none, `ConnectionLost` if the connection
    /// died first.
    pub async fn build_any_chain(&self, uri: &str, permissions: &str, to: &str) -> Result<SimpleChain> {
        let mut stream = self.build_chain(uri, permissions, to).await?;
        match stream.recv().await {
            Some(chain) => {
                stream.drain();
                Ok(chain)
            }
            None => Err(stream.end_reason().unwrap_or(Bw2Error::NoResult)),
        }
    }
}
