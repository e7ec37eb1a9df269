//! Example: A Yar RPC server
//!
//! Serves `echo`, `add` and `stats` over TCP until Ctrl-C. Configuration is
//! read from the environment (`YAR_SERVER_ADDRESS`, `YAR_MAX_CONNECTIONS`, ...)
//! or from a TOML file given as the first argument.
//!
//! Run with: `cargo run --example echo_server [config.toml]`

use serde::Deserialize;
use serde_json::json;
use tracing::info;
use yar_protocol::config::NetworkConfig;
use yar_protocol::error::ProtocolError;
use yar_protocol::utils::{global_metrics, init_logging};
use yar_protocol::Server;

#[derive(Deserialize)]
struct AddParams {
    a: i64,
    b: i64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => NetworkConfig::from_file(path)?,
        None => NetworkConfig::from_env()?,
    };
    config.validate_strict()?;
    init_logging(&config.logging)?;

    let server = Server::new(config);
    server.register("echo", |params| Ok(params))?;
    server.register("add", |params| {
        let AddParams { a, b } = serde_json::from_value(params)
            .map_err(|e| ProtocolError::DeserializeError(e.to_string()))?;
        Ok(json!(a + b))
    })?;
    server.register("stats", |_| {
        let snapshot = global_metrics().snapshot();
        Ok(json!({
            "connections_active": snapshot.connections_active,
            "frames_received": snapshot.frames_received,
            "responses_sent": snapshot.responses_sent,
        }))
    })?;

    let listener = server.bind().await?;
    info!(addr = %listener.local_addr()?, "Yar server ready, press Ctrl-C to stop");

    server
        .serve_with_shutdown(listener, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    global_metrics().log_metrics();
    Ok(())
}
