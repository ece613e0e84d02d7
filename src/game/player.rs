//! Player account model

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Default number of characters an account may hold
pub const DEFAULT_MAX_CHARACTERS: u32 = 5;

/// Account standing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Suspended,
    Banned,
}

impl AccountStatus {
    /// Encode for storage
    pub fn as_i16(self) -> i16 {
        match self {
            AccountStatus::Active => 0,
            AccountStatus::Suspended => 1,
            AccountStatus::Banned => 2,
        }
    }

    /// Decode from storage; unknown values are treated as active
    pub fn from_i16(value: i16) -> Self {
        match value {
            1 => AccountStatus::Suspended,
            2 => AccountStatus::Banned,
            _ => AccountStatus::Active,
        }
    }
}

/// A player account
#[derive(Debug, Clone)]
pub struct Player {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
    pub status: AccountStatus,
    pub max_characters: u32,
}

impl Player {
    /// Create a new active account
    pub fn new(username: &str, email: &str, password_hash: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
            last_login: now,
            status: AccountStatus::Active,
            max_characters: DEFAULT_MAX_CHARACTERS,
        }
    }

    /// Check whether the account may log in
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_player_is_active() {
        let player = Player::new("alice", "alice@example.com", "$argon2...");
        assert!(player.is_active());
        assert_eq!(player.max_characters, DEFAULT_MAX_CHARACTERS);
        assert!(!player.id.is_empty());
    }

    #[test]
    fn test_suspended_and_banned_are_inactive() {
        let mut player = Player::new("bob", "bob@example.com", "hash");
        player.status = AccountStatus::Suspended;
        assert!(!player.is_active());
        player.status = AccountStatus::Banned;
        assert!(!player.is_active());
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            AccountStatus::Active,
            AccountStatus::Suspended,
            AccountStatus::Banned,
        ] {
            assert_eq!(AccountStatus::from_i16(status.as_i16()), status);
        }
        assert_eq!(AccountStatus::from_i16(99), AccountStatus::Active);
    }
}
