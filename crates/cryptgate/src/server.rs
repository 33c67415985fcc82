//! `Server` builder and accept loop.
//!
//! Ties the layers together: listener → per-connection handler → lobby →
//! supervisor → registry, all sharing one `ServerState`.

use std::sync::Arc;

use cryptgate_protocol::Room;
use cryptgate_registry::Registry;
use cryptgate_sim::SimConfig;
use cryptgate_store::RoomStore;
use tokio::net::TcpListener;

use crate::handler::handle_connection;
use crate::lobby::LobbyService;
use crate::supervisor::RoomSupervisor;
use crate::CryptgateError;

/// Shared server state passed to each connection handler task.
pub struct ServerState<S: RoomStore> {
    pub store: Arc<S>,
    pub registry: Arc<Registry>,
    pub supervisor: Arc<RoomSupervisor<S>>,
    pub lobby: LobbyService<S>,
}

/// Builder for configuring and starting a Cryptgate server.
///
/// # Example
///
/// ```rust,no_run
/// use cryptgate::ServerBuilder;
/// use cryptgate_store::MemoryStore;
///
/// # async fn run() -> Result<(), cryptgate::CryptgateError> {
/// let server = ServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(MemoryStore::new())
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ServerBuilder {
    bind_addr: String,
    config: SimConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            config: SimConfig::default(),
        }
    }

    /// Sets the address to bind the listener to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Overrides the gameplay configuration.
    pub fn sim_config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and wires up the layers around the given store.
    pub async fn build<S: RoomStore>(
        self,
        store: S,
    ) -> Result<Server<S>, CryptgateError> {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        tracing::info!(addr = %self.bind_addr, "listening");

        let store = Arc::new(store);
        let registry = Arc::new(Registry::new());
        let supervisor = Arc::new(RoomSupervisor::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            self.config.clone(),
        ));
        let lobby = LobbyService::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&supervisor),
            self.config,
        );

        Ok(Server {
            listener,
            state: Arc::new(ServerState {
                store,
                registry,
                supervisor,
                lobby,
            }),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Cryptgate server. Call [`run()`](Self::run) to start
/// accepting connections.
pub struct Server<S: RoomStore> {
    listener: TcpListener,
    state: Arc<ServerState<S>>,
}

impl<S: RoomStore> Server<S> {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// The local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Creates a room and returns its record (including the join code).
    /// Room creation is an administrative operation, not a socket one.
    pub async fn create_room(&self) -> Result<Room, CryptgateError> {
        Ok(self.state.store.create_room().await?)
    }

    /// Runs the accept loop until the process is terminated. One faulty
    /// connection never takes down another: every handler is its own task.
    pub async fn run(self) -> Result<(), CryptgateError> {
        tracing::info!("cryptgate server running");
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    tracing::debug!(%addr, "incoming connection");
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, state).await {
                            tracing::debug!(
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
}
