//! Connection registry and acceptor
//!
//! Tracks every live connection, bounds how many may exist at once, and owns
//! their reclamation: a periodic reaper closes connections that are idle or
//! already dead, and duplicate logins for the same player evict the older
//! connection.
//!
//! Lock order: the registry lock is always taken before any client record
//! lock, never the other way around. Client locks are short parking_lot
//! sections and are never held across an await point.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use parking_lot::RwLock;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{NetworkError, Result};
use crate::net::client::{Client, ClientState};

/// Default interval between reaper sweeps
const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(30);

/// Message written to connections rejected at the capacity bound
const SERVER_FULL_MESSAGE: &[u8] = b"Server is full. Please try again later.\r\n";

/// Handler invoked once per accepted connection, on its own task
#[async_trait]
pub trait ClientHandler: Send + Sync {
    async fn handle_client(&self, client: Arc<Client>, manager: Arc<ConnectionManager>);
}

#[derive(Default)]
struct Registry {
    /// All connections, keyed by connection id
    clients: HashMap<String, Arc<Client>>,
    /// Authenticated connections only, keyed by player id
    players: HashMap<String, Arc<Client>>,
}

/// Connection counts derived from a registry snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStats {
    pub total: usize,
    pub authenticated: usize,
    pub in_game: usize,
}

/// Thread-safe connection manager
pub struct ConnectionManager {
    registry: RwLock<Registry>,
    handler: Arc<dyn ClientHandler>,
    running: AtomicBool,
    max_clients: usize,
    idle_timeout: Duration,
    cleanup_interval: Duration,
    shutdown: broadcast::Sender<()>,
}

impl ConnectionManager {
    /// Create a new connection manager
    pub fn new(
        handler: Arc<dyn ClientHandler>,
        max_clients: usize,
        idle_timeout: Duration,
    ) -> Self {
        Self::with_cleanup_interval(handler, max_clients, idle_timeout, DEFAULT_CLEANUP_INTERVAL)
    }

    /// Create a connection manager with a custom reaper interval
    pub fn with_cleanup_interval(
        handler: Arc<dyn ClientHandler>,
        max_clients: usize,
        idle_timeout: Duration,
        cleanup_interval: Duration,
    ) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            registry: RwLock::new(Registry::default()),
            handler,
            running: AtomicBool::new(false),
            max_clients,
            idle_timeout,
            cleanup_interval,
            shutdown,
        }
    }

    /// Bind the listener and accept connections until stopped
    pub async fn start(self: Arc<Self>, address: &str) -> Result<()> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| NetworkError::Bind(address.to_string(), e.to_string()))?;
        info!(address = %address, "Server listening");
        self.serve(listener).await
    }

    /// Accept connections from an already-bound listener until stopped
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        Arc::clone(&self).spawn_reaper();

        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, address)) => {
                            Arc::clone(&self).accept_connection(stream, address).await;
                        }
                        Err(e) => {
                            if !self.is_running() {
                                break;
                            }
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
            if !self.is_running() {
                break;
            }
        }

        info!("Accept loop stopped");
        Ok(())
    }

    async fn accept_connection(self: Arc<Self>, mut stream: TcpStream, address: SocketAddr) {
        if self.client_count() >= self.max_clients {
            warn!(address = %address, "Connection rejected: server is full");
            let _ = stream.write_all(SERVER_FULL_MESSAGE).await;
            let _ = stream.shutdown().await;
            return;
        }

        let id = Uuid::new_v4().to_string();
        let client = Arc::new(Client::new(id.clone(), address, stream));
        self.register_client(Arc::clone(&client));
        info!(client_id = %id, address = %address, "New client connected");

        let handler = Arc::clone(&self.handler);
        tokio::spawn(async move {
            handler
                .handle_client(Arc::clone(&client), Arc::clone(&self))
                .await;
            client.shutdown().await;
            self.remove_client(client.id());
        });
    }

    /// Stop the server: end the accept loop and reaper, close every
    /// registered connection. Safe to call more than once.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Stopping connection manager");
        let _ = self.shutdown.send(());

        let clients: Vec<Arc<Client>> = self.registry.read().clients.values().cloned().collect();
        for client in clients {
            client.close();
        }
    }

    /// Check whether the accept loop should keep running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Add a connection to the registry
    pub fn register_client(&self, client: Arc<Client>) {
        let mut registry = self.registry.write();
        registry.clients.insert(client.id().to_string(), client);
    }

    /// Bind an authenticated connection to a player id, evicting any
    /// connection already registered for that player.
    pub fn register_player_connection(&self, player_id: &str, client: &Arc<Client>) {
        let mut registry = self.registry.write();

        if let Some(existing) = registry.players.get(player_id) {
            if !Arc::ptr_eq(existing, client) {
                debug!(
                    player_id = %player_id,
                    evicted_client = %existing.id(),
                    "Evicting existing connection for player"
                );
                existing.close();
            }
        }

        registry
            .players
            .insert(player_id.to_string(), Arc::clone(client));
        client.set_player_id(player_id);
    }

    /// Remove a connection from both indices and close it. Idempotent.
    pub fn remove_client(&self, client_id: &str) {
        let client = {
            let mut registry = self.registry.write();
            let Some(client) = registry.clients.remove(client_id) else {
                return;
            };

            // Only clear the player index entry if it still points at this
            // exact connection; a newer login may have replaced it.
            if let Some(player_id) = client.player_id() {
                if registry
                    .players
                    .get(&player_id)
                    .is_some_and(|current| Arc::ptr_eq(current, &client))
                {
                    registry.players.remove(&player_id);
                }
            }
            client
        };

        client.close();
        info!(client_id = %client_id, "Client disconnected");
    }

    /// Get a connection by id
    pub fn get_client(&self, client_id: &str) -> Option<Arc<Client>> {
        self.registry.read().clients.get(client_id).cloned()
    }

    /// Get the connection registered for a player id
    pub fn get_player_client(&self, player_id: &str) -> Option<Arc<Client>> {
        self.registry.read().players.get(player_id).cloned()
    }

    /// Get the number of registered connections
    pub fn client_count(&self) -> usize {
        self.registry.read().clients.len()
    }

    /// Send a message to every connected client
    pub async fn broadcast_all(&self, message: &str) {
        let targets: Vec<Arc<Client>> = {
            let registry = self.registry.read();
            registry
                .clients
                .values()
                .filter(|c| c.is_connected())
                .cloned()
                .collect()
        };
        // Sends happen outside the registry lock so a slow socket cannot
        // stall registration or removal.
        let _ = join_all(targets.iter().map(|c| c.send(message))).await;
    }

    /// Send a message to every in-game client.
    // TODO: narrow to the given room once the registry can ask the character
    // store where each in-game character currently is.
    pub async fn broadcast_room(&self, _room_id: &str, message: &str) {
        let targets: Vec<Arc<Client>> = {
            let registry = self.registry.read();
            registry
                .clients
                .values()
                .filter(|c| c.is_connected() && c.state() == ClientState::InGame)
                .cloned()
                .collect()
        };
        let _ = join_all(targets.iter().map(|c| c.send(message))).await;
    }

    /// Get connection counts from a registry snapshot
    pub fn stats(&self) -> ConnectionStats {
        let registry = self.registry.read();
        let mut stats = ConnectionStats {
            total: registry.clients.len(),
            authenticated: 0,
            in_game: 0,
        };

        for client in registry.clients.values() {
            let state = client.state();
            if state.is_authenticated() {
                stats.authenticated += 1;
            }
            if state == ClientState::InGame {
                stats.in_game += 1;
            }
        }

        stats
    }

    fn spawn_reaper(self: Arc<Self>) {
        let mut shutdown_rx = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.cleanup_interval);
            // The first tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !self.is_running() {
                            break;
                        }
                        self.reap_stale_clients();
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
            debug!("Reaper stopped");
        });
    }

    /// Remove connections that are disconnected or idle past the timeout.
    /// The scan collects ids first; removal never mutates the registry while
    /// iterating it.
    pub fn reap_stale_clients(&self) {
        let stale: Vec<String> = {
            let registry = self.registry.read();
            registry
                .clients
                .values()
                .filter(|c| !c.is_connected() || c.is_idle(self.idle_timeout))
                .map(|c| c.id().to_string())
                .collect()
        };

        for client_id in stale {
            debug!(client_id = %client_id, "Reaping stale client");
            self.remove_client(&client_id);
        }
    }
}
