//! Connection check for the Aruba Central API.
//!
//! Loads configuration from the environment, fetches a few access points and
//! prints the client's resilience state.
//!
//! # Usage
//!
//! ```bash
//! export ARUBA_BASE_URL="https://us1.api.central.arubanetworks.com"
//! export ARUBA_CLIENT_ID="..."
//! export ARUBA_CLIENT_SECRET="..."
//! # or a pre-issued token instead of the pair above
//! export ARUBA_ACCESS_TOKEN="..."
//! ```
//!
//! Then run:
//! ```bash
//! RUST_LOG=aruba_central_integration=debug cargo run --example connection_check
//! ```

use aruba_central_integration::{CentralConfig, CentralError, QueryParams, ResilientClient};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    println!("=== Aruba Central Connection Check ===\n");

    let config = CentralConfig::from_env()?;
    println!("Base URL: {}", config.base_url);
    println!(
        "Credentials: client credentials {}, pre-issued token {}",
        if config.credentials.can_refresh() { "set" } else { "not set" },
        if config.credentials.access_token.is_some() { "set" } else { "not set" },
    );

    let client = ResilientClient::new(config)?;

    let mut params = QueryParams::new();
    params.insert("limit".to_string(), "5".to_string());

    match client.get("/monitoring/v2/aps", Some(&params)).await {
        Ok(response) => {
            let count = response
                .get("aps")
                .and_then(|aps| aps.as_array())
                .map_or(0, Vec::len);
            println!("Connection OK, received {} access points", count);
            if let Some(total) = response.get("total") {
                println!("Total access points: {}", total);
            }
        }
        Err(CentralError::Upstream(e)) => {
            println!("API answered with an error: {}", e);
        }
        Err(e) => {
            println!("Connection failed [{}]: {}", e.error_code(), e);
        }
    }

    let health = client.health();
    println!("\nCircuit state: {}", health.circuit_state);
    println!("Consecutive failures: {}", health.consecutive_failures);
    println!("Rate limit tokens available: {:.1}", health.available_tokens);
    println!("Access token cached: {}", health.has_token);

    Ok(())
}
