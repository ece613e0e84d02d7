//! Error handling module
//!
//! Defines custom error types for the IronMUD server.

use thiserror::Error;

/// Main error type for the IronMUD server
#[derive(Error, Debug)]
pub enum IronmudError {
    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Repository errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Network-specific errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Client is disconnected")]
    ClientDisconnected,

    #[error("Failed to bind {0}: {1}")]
    Bind(String, String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Read error: {0}")]
    ReadError(String),

    #[error("Write error: {0}")]
    WriteError(String),
}

/// Authentication-specific errors
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account suspended")]
    AccountSuspended,

    #[error("Account banned")]
    AccountBanned,

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

/// Repository errors shared by every store implementation
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Player not found: {0}")]
    PlayerNotFound(String),

    #[error("Character not found: {0}")]
    CharacterNotFound(String),

    #[error("Username already taken: {0}")]
    DuplicateUsername(String),

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("Character name already taken: {0}")]
    DuplicateCharacterName(String),
}

/// Result type alias for IronMUD operations
pub type Result<T> = std::result::Result<T, IronmudError>;

impl IronmudError {
    /// True when the error is a not-found lookup rather than a real failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            IronmudError::Store(StoreError::PlayerNotFound(_))
                | IronmudError::Store(StoreError::CharacterNotFound(_))
        )
    }
}
