//! FlowLB controller binary

use lb_controller::{Config, ControllerServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration errors are fatal: there is no safe fallback policy
    // for a missing backend pool or an unparseable virtual address.
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return Err(e.into());
        }
    };

    let level = config.logging.level.as_deref().unwrap_or("info");
    match config.logging.format.as_deref() {
        Some("json") => common::logging::init_json(),
        _ => common::logging::init_with_level(level),
    }

    tracing::info!("FlowLB controller starting");

    let server = ControllerServer::new(config);
    server.run().await?;

    Ok(())
}
