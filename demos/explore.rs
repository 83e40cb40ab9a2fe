// demos/explore.rs
use chain_explorer::api::{self, ApiState};
use chain_explorer::{ChainExplorer, ExplorerConfig};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chain_explorer=debug,info".into()),
        )
        .init();

    // Default config targets the public blockchain.info endpoint
    let explorer = ChainExplorer::new(ExplorerConfig::default())?;
    let _maintenance = explorer.spawn_maintenance();

    // Health check
    println!("🏥 Running health check...");
    explorer.health_check().await?;
    println!("✅ Health check passed");

    // Seed the graph from a CLI argument, if one was given
    if let Some(address) = std::env::args().nth(1) {
        println!("🔎 Exploring {}...", address);
        match explorer.load_initial(&address).await {
            Ok(outcome) => println!("✅ Loaded: {:?}", outcome),
            Err(e) => println!("⚠️  Initial load failed: {}", e),
        }

        let graph = explorer.graph_snapshot().await;
        println!(
            "📊 Graph now has {} nodes and {} links",
            graph.nodes.len(),
            graph.links.len()
        );
    }

    // Serve the API for the UI
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    println!("🌐 Serving API on http://{}", addr);
    let state = ApiState {
        gateway: explorer.gateway(),
    };
    api::serve(addr, state).await?;

    Ok(())
}
