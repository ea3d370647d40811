//! Triviarena server binary.
//!
//! Runs with the built-in question pool and no win persistence. Set
//! `TRIVIARENA_ADDR` to change the bind address and `RUST_LOG` to tune
//! log output.

use tracing_subscriber::EnvFilter;
use triviarena_game::NoopRankingStore;
use triviarena_protocol::JsonCodec;
use triviarena_questions::StaticPool;
use triviarena_server::{ServerError, TriviarenaServer};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("TRIVIARENA_ADDR").unwrap_or_else(|_| "127.0.0.1:9000".to_string());

    let server = TriviarenaServer::<StaticPool, NoopRankingStore, JsonCodec>::builder()
        .bind(&addr)
        .build(StaticPool::with_default_questions(), NoopRankingStore)
        .await?;

    tracing::info!(addr = %server.local_addr()?, "listening");

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            server.close().await;
            Ok(())
        }
    }
}
