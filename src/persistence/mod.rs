//! Persistence module
//!
//! Repository contracts for player accounts and characters, with two
//! implementations: PostgreSQL for real deployments and an in-memory
//! variant for tests and database-less development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::game::character::Character;
use crate::game::player::Player;

mod memory;
mod postgres;

pub use memory::{MemoryCharacterRepository, MemoryPlayerRepository};
pub use postgres::{PgCharacterRepository, PgPlayerRepository};

/// Player account store
#[async_trait]
pub trait PlayerRepository: Send + Sync {
    async fn create_player(&self, player: &Player) -> Result<()>;
    async fn get_player(&self, player_id: &str) -> Result<Player>;
    async fn get_player_by_username(&self, username: &str) -> Result<Player>;
    async fn get_player_by_email(&self, email: &str) -> Result<Player>;
    async fn update_player(&self, player: &Player) -> Result<()>;
    async fn update_last_login(&self, player_id: &str) -> Result<()>;
}

/// Character store
#[async_trait]
pub trait CharacterRepository: Send + Sync {
    async fn create_character(&self, character: &Character) -> Result<()>;
    async fn get_character(&self, character_id: &str) -> Result<Character>;
    /// Summaries for every character owned by a player, ordered by name
    async fn get_characters_by_player(&self, player_id: &str) -> Result<Vec<CharacterSummary>>;
    async fn update_character(&self, character: &Character) -> Result<()>;
    async fn delete_character(&self, character_id: &str) -> Result<()>;
}

/// The character-list view shown at the selection menu
#[derive(Debug, Clone)]
pub struct CharacterSummary {
    pub id: String,
    pub name: String,
    pub race: String,
    pub class: String,
    pub level: i32,
    pub is_alive: bool,
    pub last_played: DateTime<Utc>,
}
