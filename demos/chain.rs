//! Ask the router for a chain granting permissions on a URI.
//!
//! ```text
//! cargo run --example chain -- me.ent 'scratch.ns/demo/*' PC <grantee vk>
//! ```

use bw2_client::{Bw2Error, Client};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [entity, uri, permissions, to] = args.as_slice() else {
        return Err("usage: chain <entity file> <uri> <permissions> <to>".into());
    };

    let client = Client::connect("").await?;
    client.set_entity_file(entity).await?;

    match client.build_any_chain(uri, permissions, to).await {
        Ok(chain) => println!("{} grants {} on {} to {}", chain.hash, chain.permissions, chain.uri, chain.to),
        Err(Bw2Error::NoResult) => println!("no chain grants {} on {} to {}", permissions, uri, to),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
