//! Entity, DOT and chain creation; setting the active entity.

use std::path::Path;

use bytes::Bytes;

use super::params::{CreateDotChainParams, CreateDotParams, CreateEntityParams};
use super::request::Request;
use crate::client::Client;
use crate::error::{Bw2Error, Result};
use crate::protocol::{Dot, DotChain, Frame, RoutingObject};

impl Client {
    /// Create a new entity. Returns its verifying key and the entity blob.
    pub async fn create_entity(&self, params: &CreateEntityParams) -> Result<(String, Bytes)> {
        let frame = self.single(Request::CreateEntity(params)).await?.into_result()?;
        let vk = header(&frame, "vk");
        let mut objects = frame.into_payload_objects();
        if objects.len() != 1 {
            return Err(Bw2Error::MalformedResponse(format!(
                "expected 1 payload object, got {}",
                objects.len()
            )));
        }
        let entity = objects.remove(0);
        Ok((vk, entity.content))
    }

    /// Create an access DOT. Returns its hash and the DOT.
    ///
    /// # Errors
    ///
    /// `Unsupported` immediately if `params.is_permission` is set.
    pub async fn create_dot(&self, params: &CreateDotParams) -> Result<(String, Dot)> {
        let frame = self.single(Request::CreateDot(params)).await?.into_result()?;
        let hash = header(&frame, "hash");
        let dot = Dot::try_from(only_routing_object(frame)?)?;
        Ok((hash, dot))
    }

    /// Compose existing DOTs into a chain. Returns its hash and the chain.
    pub async fn create_dot_chain(&self, params: &CreateDotChainParams) -> Result<(String, DotChain)> {
        let frame = self
            .single(Request::CreateDotChain(params))
            .await?
            .into_result()?;
        let hash = header(&frame, "hash");
        let chain = DotChain::try_from(only_routing_object(frame)?)?;
        Ok((hash, chain))
    }

    /// Make `key` the entity this connection acts as. Returns its verifying key.
    pub async fn set_entity(&self, key: impl Into<Bytes>) -> Result<String> {
        let frame = self
            .single(Request::SetEntity(key.into()))
            .await?
            .into_ack()?;
        Ok(header(&frame, "vk"))
    }

    /// [`set_entity`](Self::set_entity) from an entity file.
    ///
    /// The file's first byte is a type marker and is not sent.
    pub async fn set_entity_file(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let contents = tokio::fs::read(path).await?;
        if contents.is_empty() {
            return Err(Bw2Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("entity file {} is empty", path.display()),
            )));
        }
        tracing::debug!(path = %path.display(), "Loading entity file");
        let key = Bytes::from(contents).slice(1..);
        self.set_entity(key).await
    }
}

fn header(frame: &Frame, key: &str) -> String {
    frame.first_header(key).unwrap_or_default().to_string()
}

fn only_routing_object(frame: Frame) -> Result<RoutingObject> {
    let mut objects = frame.into_routing_objects();
    if objects.len() != 1 {
        return Err(Bw2Error::MalformedResponse(format!(
            "expected 1 routing object, got {}",
            objects.len()
        )));
    }
    Ok(objects.remove(0))
}
