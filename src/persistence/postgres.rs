//! PostgreSQL repositories
//!
//! Runtime-checked sqlx queries over the `players` and `characters` tables
//! (see `migrations/`). Not-found lookups and unique-constraint violations
//! are mapped onto [`StoreError`] so callers never see raw database errors
//! for expected conflicts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{IronmudError, Result, StoreError};
use crate::game::character::{Character, CharacterStats, Class, Race};
use crate::game::player::{AccountStatus, Player};
use crate::persistence::{CharacterRepository, CharacterSummary, PlayerRepository};

/// PostgreSQL-backed player store
pub struct PgPlayerRepository {
    pool: PgPool,
}

impl PgPlayerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct PlayerRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    last_login: DateTime<Utc>,
    account_status: i16,
    max_characters: i32,
}

impl From<PlayerRow> for Player {
    fn from(row: PlayerRow) -> Self {
        Player {
            id: row.id.to_string(),
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at,
            last_login: row.last_login,
            status: AccountStatus::from_i16(row.account_status),
            max_characters: row.max_characters.max(0) as u32,
        }
    }
}

const PLAYER_COLUMNS: &str =
    "id, username, email, password_hash, created_at, last_login, account_status, max_characters";

#[async_trait]
impl PlayerRepository for PgPlayerRepository {
    async fn create_player(&self, player: &Player) -> Result<()> {
        let query = "INSERT INTO players \
             (id, username, email, password_hash, created_at, last_login, account_status, max_characters) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";
        sqlx::query(query)
            .bind(parse_player_id(&player.id)?)
            .bind(&player.username)
            .bind(&player.email)
            .bind(&player.password_hash)
            .bind(player.created_at)
            .bind(player.last_login)
            .bind(player.status.as_i16())
            .bind(player.max_characters as i32)
            .execute(&self.pool)
            .await
            .map_err(|e| map_player_conflict(e, player))?;
        Ok(())
    }

    async fn get_player(&self, player_id: &str) -> Result<Player> {
        let query = format!("SELECT {} FROM players WHERE id = $1", PLAYER_COLUMNS);
        let row: Option<PlayerRow> = sqlx::query_as(&query)
            .bind(parse_player_id(player_id)?)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Player::from)
            .ok_or_else(|| StoreError::PlayerNotFound(player_id.to_string()).into())
    }

    async fn get_player_by_username(&self, username: &str) -> Result<Player> {
        let query = format!(
            "SELECT {} FROM players WHERE lower(username) = lower($1)",
            PLAYER_COLUMNS
        );
        let row: Option<PlayerRow> = sqlx::query_as(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Player::from)
            .ok_or_else(|| StoreError::PlayerNotFound(username.to_string()).into())
    }

    async fn get_player_by_email(&self, email: &str) -> Result<Player> {
        let query = format!(
            "SELECT {} FROM players WHERE lower(email) = lower($1)",
            PLAYER_COLUMNS
        );
        let row: Option<PlayerRow> = sqlx::query_as(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Player::from)
            .ok_or_else(|| StoreError::PlayerNotFound(email.to_string()).into())
    }

    async fn update_player(&self, player: &Player) -> Result<()> {
        let query = "UPDATE players SET username = $2, email = $3, password_hash = $4, \
             last_login = $5, account_status = $6, max_characters = $7 WHERE id = $1";
        let result = sqlx::query(query)
            .bind(parse_player_id(&player.id)?)
            .bind(&player.username)
            .bind(&player.email)
            .bind(&player.password_hash)
            .bind(player.last_login)
            .bind(player.status.as_i16())
            .bind(player.max_characters as i32)
            .execute(&self.pool)
            .await
            .map_err(|e| map_player_conflict(e, player))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::PlayerNotFound(player.id.clone()).into());
        }
        Ok(())
    }

    async fn update_last_login(&self, player_id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE players SET last_login = NOW() WHERE id = $1")
            .bind(parse_player_id(player_id)?)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::PlayerNotFound(player_id.to_string()).into());
        }
        Ok(())
    }
}

/// PostgreSQL-backed character store
pub struct PgCharacterRepository {
    pool: PgPool,
}

impl PgCharacterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct CharacterRow {
    id: Uuid,
    player_id: Uuid,
    name: String,
    race_id: String,
    class_id: String,
    stats: Json<CharacterStats>,
    level: i32,
    experience: i64,
    alive: bool,
    created_at: DateTime<Utc>,
    last_played: DateTime<Utc>,
}

impl From<CharacterRow> for Character {
    fn from(row: CharacterRow) -> Self {
        Character {
            id: row.id.to_string(),
            player_id: row.player_id.to_string(),
            name: row.name,
            race_id: row.race_id,
            class_id: row.class_id,
            stats: row.stats.0,
            level: row.level,
            experience: row.experience,
            alive: row.alive,
            created_at: row.created_at,
            last_played: row.last_played,
        }
    }
}

#[derive(FromRow)]
struct SummaryRow {
    id: Uuid,
    name: String,
    race_id: String,
    class_id: String,
    level: i32,
    alive: bool,
    last_played: DateTime<Utc>,
}

const CHARACTER_COLUMNS: &str = "id, player_id, name, race_id, class_id, stats, level, \
     experience, alive, created_at, last_played";

#[async_trait]
impl CharacterRepository for PgCharacterRepository {
    async fn create_character(&self, character: &Character) -> Result<()> {
        let query = "INSERT INTO characters \
             (id, player_id, name, race_id, class_id, stats, level, experience, alive, created_at, last_played) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)";
        sqlx::query(query)
            .bind(parse_character_id(&character.id)?)
            .bind(parse_player_id(&character.player_id)?)
            .bind(&character.name)
            .bind(&character.race_id)
            .bind(&character.class_id)
            .bind(Json(&character.stats))
            .bind(character.level)
            .bind(character.experience)
            .bind(character.alive)
            .bind(character.created_at)
            .bind(character.last_played)
            .execute(&self.pool)
            .await
            .map_err(|e| map_character_conflict(e, &character.name))?;
        Ok(())
    }

    async fn get_character(&self, character_id: &str) -> Result<Character> {
        let query = format!("SELECT {} FROM characters WHERE id = $1", CHARACTER_COLUMNS);
        let row: Option<CharacterRow> = sqlx::query_as(&query)
            .bind(parse_character_id(character_id)?)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Character::from)
            .ok_or_else(|| StoreError::CharacterNotFound(character_id.to_string()).into())
    }

    async fn get_characters_by_player(&self, player_id: &str) -> Result<Vec<CharacterSummary>> {
        let query = "SELECT id, name, race_id, class_id, level, alive, last_played \
             FROM characters WHERE player_id = $1 ORDER BY name";
        let rows: Vec<SummaryRow> = sqlx::query_as(query)
            .bind(parse_player_id(player_id)?)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| CharacterSummary {
                id: row.id.to_string(),
                name: row.name,
                race: Race::label(&row.race_id),
                class: Class::label(&row.class_id),
                level: row.level,
                is_alive: row.alive,
                last_played: row.last_played,
            })
            .collect())
    }

    async fn update_character(&self, character: &Character) -> Result<()> {
        let query = "UPDATE characters SET name = $2, stats = $3, level = $4, \
             experience = $5, alive = $6, last_played = $7 WHERE id = $1";
        let result = sqlx::query(query)
            .bind(parse_character_id(&character.id)?)
            .bind(&character.name)
            .bind(Json(&character.stats))
            .bind(character.level)
            .bind(character.experience)
            .bind(character.alive)
            .bind(character.last_played)
            .execute(&self.pool)
            .await
            .map_err(|e| map_character_conflict(e, &character.name))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::CharacterNotFound(character.id.clone()).into());
        }
        Ok(())
    }

    async fn delete_character(&self, character_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM characters WHERE id = $1")
            .bind(parse_character_id(character_id)?)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::CharacterNotFound(character_id.to_string()).into());
        }
        Ok(())
    }
}

fn parse_player_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| StoreError::PlayerNotFound(id.to_string()).into())
}

fn parse_character_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| StoreError::CharacterNotFound(id.to_string()).into())
}

fn map_player_conflict(e: sqlx::Error, player: &Player) -> IronmudError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let constraint = db.constraint().unwrap_or_default();
            if constraint.contains("email") {
                return StoreError::DuplicateEmail(player.email.clone()).into();
            }
            return StoreError::DuplicateUsername(player.username.clone()).into();
        }
    }
    e.into()
}

fn map_character_conflict(e: sqlx::Error, name: &str) -> IronmudError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::DuplicateCharacterName(name.to_string()).into();
        }
    }
    e.into()
}
