//! Subscribe to a URI pattern and print every message.
//!
//! ```text
//! RUST_LOG=bw2_client=debug cargo run --example subscribe -- me.ent 'scratch.ns/demo/*'
//! ```

use bw2_client::codec::MsgPackCodec;
use bw2_client::protocol::po;
use bw2_client::{Client, SubscribeParams};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let entity = args.next().ok_or("usage: subscribe <entity file> <uri>")?;
    let uri = args.next().ok_or("usage: subscribe <entity file> <uri>")?;

    let client = Client::connect("").await?;
    client.set_entity_file(&entity).await?;

    let mut messages = client
        .subscribe(&SubscribeParams {
            uri,
            auto_chain: true,
            ..Default::default()
        })
        .await?;

    while let Some(msg) = messages.recv().await {
        for err in &msg.payload_errors {
            tracing::warn!("Payload object {} unreadable: {}", err.index, err.error);
        }
        match msg.payload_object_in(po::MSGPACK, po::MSGPACK_MASK) {
            Some(object) => {
                let value: serde_json::Value = MsgPackCodec::from_payload_object(object)?;
                println!("{} from {}: {}", msg.uri, msg.from, value);
            }
            None => println!(
                "{} from {}: {} payload objects",
                msg.uri,
                msg.from,
                msg.payload_objects.len()
            ),
        }
    }

    if let Some(reason) = client.failure() {
        tracing::error!("Connection lost: {}", reason);
    }
    Ok(())
}
