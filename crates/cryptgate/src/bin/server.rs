//! Standalone server binary.
//!
//! Binds on `CRYPTGATE_ADDR` (default `0.0.0.0:8080`) with the in-memory
//! store and opens one starter room so a freshly launched server is
//! immediately joinable — the code is in the startup log.

use cryptgate::{CryptgateError, ServerBuilder};
use cryptgate_store::MemoryStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), CryptgateError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("CRYPTGATE_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let server = ServerBuilder::new()
        .bind(&addr)
        .build(MemoryStore::new())
        .await?;

    let room = server.create_room().await?;
    tracing::info!(code = %room.code, "starter room open");

    server.run().await
}
