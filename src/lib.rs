//! IronMUD Game Server Library
//!
//! Core functionality for the IronMUD server: the line-oriented connection
//! layer, the session state machine, the game domain model, and persistence.
//!
//! ## Modules
//!
//! - `auth` - credential hashing
//! - `config` - server configuration management
//! - `error` - error types and result definitions
//! - `game` - players, characters, and the command engine
//! - `net` - connection transport, registry, and the session driver
//! - `persistence` - player and character repositories

pub mod auth;
pub mod config;
pub mod error;
pub mod game;
pub mod net;
pub mod persistence;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{IronmudError, Result};

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
