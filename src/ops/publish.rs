use super::params::PublishParams;
use super::request::Request;
use crate::client::Client;
use crate::error::Result;

impl Client {
    /// Publish (or persist, see [`PublishParams::persist`]) a message.
    ///
    /// Resolves once the router accepts it. A refusal comes back as
    /// [`Bw2Error::Router`](crate::Bw2Error::Router) with the router's reason.
    pub async fn publish(&self, params: &PublishParams) -> Result<()> {
        let auto_chain = self.effective_auto_chain(params.auto_chain);
        self.single(Request::Publish { params, auto_chain })
            .await?
            .into_ack()?;
        tracing::debug!(uri = %params.uri, persist = params.persist, "Published");
        Ok(())
    }
}
