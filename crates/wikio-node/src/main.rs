//! Wiki-O node binary
//!
//! Serves moderation and opinion commands over the admin socket.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wikio_node::{NodeConfig, WikioNode};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wikio_node=info,wikio=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Wiki-O node");

    let config = NodeConfig::from_env();

    let node = WikioNode::new(config).await?;
    node.run().await?;

    Ok(())
}
