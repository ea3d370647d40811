//! `TriviarenaServer` builder and accept loop.
//!
//! This is the entry point for running a trivia server. It ties together
//! all the layers: socket → protocol → connection handler → lobby registry.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use triviarena_game::{GameConfig, LobbyRegistry, RankingStore};
use triviarena_protocol::{Codec, JsonCodec};
use triviarena_questions::QuestionSource;

use crate::handler::handle_connection;
use crate::ServerError;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// registry sits behind a `Mutex`; lobby actors run on their own tasks
/// and never take this lock, so holding it across an actor round trip
/// cannot deadlock.
pub(crate) struct ServerState<S: QuestionSource, R: RankingStore, C: Codec> {
    pub(crate) registry: Mutex<LobbyRegistry<S, R>>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Triviarena server.
///
/// # Example
///
/// ```rust,ignore
/// use triviarena_server::TriviarenaServer;
///
/// let server = TriviarenaServer::builder()
///     .bind("0.0.0.0:9000")
///     .build(my_source, my_ranking)
///     .await?;
/// server.run().await
/// ```
pub struct TriviarenaServerBuilder {
    bind_addr: String,
    game_config: GameConfig,
}

impl TriviarenaServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:9000".to_string(),
            game_config: GameConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the game configuration every lobby will run with.
    pub fn game_config(mut self, config: GameConfig) -> Self {
        self.game_config = config;
        self
    }

    /// Builds the server with the given question source and win store.
    ///
    /// Uses `JsonCodec` as the default wire format (MVP).
    pub async fn build<S, R>(
        self,
        source: S,
        ranking: R,
    ) -> Result<TriviarenaServer<S, R, JsonCodec>, ServerError>
    where
        S: QuestionSource,
        R: RankingStore,
    {
        let listener = TcpListener::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: Mutex::new(LobbyRegistry::new(
                self.game_config,
                Arc::new(source),
                Arc::new(ranking),
            )),
            codec: JsonCodec,
        });

        Ok(TriviarenaServer { listener, state })
    }
}

impl Default for TriviarenaServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Triviarena server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct TriviarenaServer<S: QuestionSource, R: RankingStore, C: Codec> {
    listener: TcpListener,
    state: Arc<ServerState<S, R, C>>,
}

impl<S, R, C> TriviarenaServer<S, R, C>
where
    S: QuestionSource,
    R: RankingStore,
    C: Codec,
{
    /// Creates a new builder.
    pub fn builder() -> TriviarenaServerBuilder {
        TriviarenaServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming sockets and spawns a handler task for each one.
    /// Runs until the future is dropped.
    pub async fn run(&self) -> Result<(), ServerError> {
        tracing::info!("Triviarena server running");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, state).await {
                            tracing::debug!(
                                %peer,
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }

    /// Closes every lobby, notifying seated players. For server stop;
    /// the accept loop itself ends when the [`run()`](Self::run) future
    /// is dropped.
    pub async fn close(&self) {
        self.state.registry.lock().await.close_all().await;
    }
}
