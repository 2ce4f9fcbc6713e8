//! Publish a MsgPack reading once a second.
//!
//! ```text
//! cargo run --example publish -- me.ent scratch.ns/demo/temp
//! ```
//!
//! The entity file must be granted publish permission on the URI, or the
//! router must be able to find a chain for it (`autochain`).

use std::time::Duration;

use bw2_client::codec::MsgPackCodec;
use bw2_client::{Client, PublishParams};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Payload published on every tick.
#[derive(Serialize, Debug)]
struct Reading {
    seq: u64,
    celsius: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let entity = args.next().ok_or("usage: publish <entity file> <uri>")?;
    let uri = args.next().ok_or("usage: publish <entity file> <uri>")?;

    let client = Client::connect("").await?;
    let vk = client.set_entity_file(&entity).await?;
    tracing::info!("Publishing as {}", vk);

    for seq in 0.. {
        let reading = Reading {
            seq,
            celsius: 20.0 + (seq % 10) as f64 / 10.0,
        };
        let params = PublishParams {
            uri: uri.clone(),
            auto_chain: true,
            payload_objects: vec![MsgPackCodec::payload_object(&reading)?],
            ..Default::default()
        };
        match client.publish(&params).await {
            Ok(()) => tracing::info!("Published {:?}", reading),
            Err(e) => tracing::warn!("Publish failed: {}", e),
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    Ok(())
}
