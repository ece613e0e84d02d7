//! In-memory repositories
//!
//! Same contracts and error semantics as the PostgreSQL stores, backed by
//! concurrent maps. Used by the test suite and by development mode when no
//! database is configured; nothing survives a restart.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::error::{Result, StoreError};
use crate::game::character::{Character, Class, Race};
use crate::game::player::Player;
use crate::persistence::{CharacterRepository, CharacterSummary, PlayerRepository};

/// In-memory player store keyed by player id
#[derive(Default)]
pub struct MemoryPlayerRepository {
    players: DashMap<String, Player>,
}

impl MemoryPlayerRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlayerRepository for MemoryPlayerRepository {
    async fn create_player(&self, player: &Player) -> Result<()> {
        for existing in self.players.iter() {
            if existing.username.eq_ignore_ascii_case(&player.username) {
                return Err(StoreError::DuplicateUsername(player.username.clone()).into());
            }
            if existing.email.eq_ignore_ascii_case(&player.email) {
                return Err(StoreError::DuplicateEmail(player.email.clone()).into());
            }
        }
        self.players.insert(player.id.clone(), player.clone());
        Ok(())
    }

    async fn get_player(&self, player_id: &str) -> Result<Player> {
        self.players
            .get(player_id)
            .map(|p| p.clone())
            .ok_or_else(|| StoreError::PlayerNotFound(player_id.to_string()).into())
    }

    async fn get_player_by_username(&self, username: &str) -> Result<Player> {
        self.players
            .iter()
            .find(|p| p.username.eq_ignore_ascii_case(username))
            .map(|p| p.clone())
            .ok_or_else(|| StoreError::PlayerNotFound(username.to_string()).into())
    }

    async fn get_player_by_email(&self, email: &str) -> Result<Player> {
        self.players
            .iter()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .map(|p| p.clone())
            .ok_or_else(|| StoreError::PlayerNotFound(email.to_string()).into())
    }

    async fn update_player(&self, player: &Player) -> Result<()> {
        if !self.players.contains_key(&player.id) {
            return Err(StoreError::PlayerNotFound(player.id.clone()).into());
        }
        self.players.insert(player.id.clone(), player.clone());
        Ok(())
    }

    async fn update_last_login(&self, player_id: &str) -> Result<()> {
        let mut player = self
            .players
            .get_mut(player_id)
            .ok_or_else(|| StoreError::PlayerNotFound(player_id.to_string()))?;
        player.last_login = Utc::now();
        Ok(())
    }
}

/// In-memory character store keyed by character id
#[derive(Default)]
pub struct MemoryCharacterRepository {
    characters: DashMap<String, Character>,
}

impl MemoryCharacterRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CharacterRepository for MemoryCharacterRepository {
    async fn create_character(&self, character: &Character) -> Result<()> {
        let taken = self.characters.iter().any(|existing| {
            existing.player_id == character.player_id
                && existing.name.eq_ignore_ascii_case(&character.name)
        });
        if taken {
            return Err(StoreError::DuplicateCharacterName(character.name.clone()).into());
        }
        self.characters
            .insert(character.id.clone(), character.clone());
        Ok(())
    }

    async fn get_character(&self, character_id: &str) -> Result<Character> {
        self.characters
            .get(character_id)
            .map(|c| c.clone())
            .ok_or_else(|| StoreError::CharacterNotFound(character_id.to_string()).into())
    }

    async fn get_characters_by_player(&self, player_id: &str) -> Result<Vec<CharacterSummary>> {
        let mut summaries: Vec<CharacterSummary> = self
            .characters
            .iter()
            .filter(|c| c.player_id == player_id)
            .map(|c| CharacterSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                race: Race::label(&c.race_id),
                class: Class::label(&c.class_id),
                level: c.level,
                is_alive: c.is_alive(),
                last_played: c.last_played,
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    async fn update_character(&self, character: &Character) -> Result<()> {
        if !self.characters.contains_key(&character.id) {
            return Err(StoreError::CharacterNotFound(character.id.clone()).into());
        }
        self.characters
            .insert(character.id.clone(), character.clone());
        Ok(())
    }

    async fn delete_character(&self, character_id: &str) -> Result<()> {
        self.characters
            .remove(character_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::CharacterNotFound(character_id.to_string()).into())
    }
}
