//! Network module
//!
//! Contains the connection transport, the connection registry/acceptor, the
//! per-session protocol driver, and the few telnet bytes the protocol needs.

pub mod client;
pub mod handler;
pub mod manager;
pub mod telnet;

pub use client::{Client, ClientState};
pub use handler::SessionHandler;
pub use manager::{ClientHandler, ConnectionManager, ConnectionStats};
