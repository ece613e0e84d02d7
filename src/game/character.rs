//! Character model and the static race/class tables

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-stat adjustments a race applies on top of the base line
#[derive(Debug, Clone, Copy, Default)]
pub struct StatModifiers {
    pub strength: i32,
    pub dexterity: i32,
    pub intelligence: i32,
    pub constitution: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

/// A playable race
#[derive(Debug, Clone)]
pub struct Race {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub modifiers: StatModifiers,
}

/// A playable class
#[derive(Debug, Clone)]
pub struct Class {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub hit_die: i32,
}

static RACES: Lazy<HashMap<&'static str, Race>> = Lazy::new(|| {
    let mut races = HashMap::new();
    races.insert(
        "human",
        Race {
            id: "human",
            name: "Human",
            description: "Adaptable and ambitious, at home anywhere.",
            modifiers: StatModifiers::default(),
        },
    );
    races.insert(
        "elf",
        Race {
            id: "elf",
            name: "Elf",
            description: "Graceful and long-lived, quick of hand and mind.",
            modifiers: StatModifiers {
                dexterity: 2,
                intelligence: 1,
                constitution: -1,
                ..StatModifiers::default()
            },
        },
    );
    races.insert(
        "dwarf",
        Race {
            id: "dwarf",
            name: "Dwarf",
            description: "Stout mountain folk, hard to move and harder to kill.",
            modifiers: StatModifiers {
                strength: 1,
                constitution: 2,
                charisma: -1,
                ..StatModifiers::default()
            },
        },
    );
    races
});

static CLASSES: Lazy<HashMap<&'static str, Class>> = Lazy::new(|| {
    let mut classes = HashMap::new();
    classes.insert(
        "warrior",
        Class {
            id: "warrior",
            name: "Warrior",
            description: "A front-line fighter living by steel and shield.",
            hit_die: 10,
        },
    );
    classes.insert(
        "mage",
        Class {
            id: "mage",
            name: "Mage",
            description: "A student of the arcane, fragile but devastating.",
            hit_die: 6,
        },
    );
    classes.insert(
        "rogue",
        Class {
            id: "rogue",
            name: "Rogue",
            description: "A knife in the dark and a hand in your pocket.",
            hit_die: 8,
        },
    );
    classes
});

impl Race {
    /// Look up a race by its lowercase id
    pub fn by_id(id: &str) -> Option<&'static Race> {
        RACES.get(id)
    }

    /// Resolve an id to its display label, falling back to the raw id
    pub fn label(id: &str) -> String {
        Race::by_id(id).map_or_else(|| id.to_string(), |race| race.name.to_string())
    }
}

impl Class {
    /// Look up a class by its lowercase id
    pub fn by_id(id: &str) -> Option<&'static Class> {
        CLASSES.get(id)
    }

    /// Resolve an id to its display label, falling back to the raw id
    pub fn label(id: &str) -> String {
        Class::by_id(id).map_or_else(|| id.to_string(), |class| class.name.to_string())
    }
}

/// Rolled stats plus the derived pools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterStats {
    pub strength: i32,
    pub dexterity: i32,
    pub intelligence: i32,
    pub constitution: i32,
    pub wisdom: i32,
    pub charisma: i32,
    pub health: i32,
    pub max_health: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub stamina: i32,
    pub max_stamina: i32,
}

/// A player character
#[derive(Debug, Clone)]
pub struct Character {
    pub id: String,
    pub player_id: String,
    pub name: String,
    pub race_id: String,
    pub class_id: String,
    pub stats: CharacterStats,
    pub level: i32,
    pub experience: i64,
    pub alive: bool,
    pub created_at: DateTime<Utc>,
    pub last_played: DateTime<Utc>,
}

impl Character {
    /// Create a level-one character with starting stats derived from the race
    pub fn new(player_id: &str, name: &str, race: &Race, class: &Class) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            player_id: player_id.to_string(),
            name: name.to_string(),
            race_id: race.id.to_string(),
            class_id: class.id.to_string(),
            stats: starting_stats(race),
            level: 1,
            experience: 0,
            alive: true,
            created_at: now,
            last_played: now,
        }
    }

    /// Check whether the character can act in the world
    pub fn is_alive(&self) -> bool {
        self.alive && self.stats.health > 0
    }

    /// The race's display name
    pub fn race_label(&self) -> String {
        Race::label(&self.race_id)
    }

    /// The class's display name
    pub fn class_label(&self) -> String {
        Class::label(&self.class_id)
    }
}

/// Base line of 10 in every stat, shifted by the race, with pools derived
/// from constitution and intelligence.
fn starting_stats(race: &Race) -> CharacterStats {
    let m = race.modifiers;
    let constitution = 10 + m.constitution;
    let intelligence = 10 + m.intelligence;

    let max_health = constitution * 10;
    let max_mana = intelligence * 5;
    let max_stamina = constitution * 5;

    CharacterStats {
        strength: 10 + m.strength,
        dexterity: 10 + m.dexterity,
        intelligence,
        constitution,
        wisdom: 10 + m.wisdom,
        charisma: 10 + m.charisma,
        health: max_health,
        max_health,
        mana: max_mana,
        max_mana,
        stamina: max_stamina,
        max_stamina,
    }
}
