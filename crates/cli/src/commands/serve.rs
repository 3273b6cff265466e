//! `discovery serve`: start the HTTP gateway.

use std::path::Path;

pub async fn run(config_path: &Path, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    if !config.has_api_key() {
        tracing::warn!("No API key configured; model calls will fail until DISCOVERY_API_KEY is set");
    }

    println!("Discovery AI gateway");
    println!("   Listening: http://{}:{}/discovery-ai", config.gateway.host, config.gateway.port);
    println!("   Model:     {} ({})", config.default_model, config.default_provider);

    discovery_gateway::start(config).await?;

    Ok(())
}
