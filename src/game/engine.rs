//! Game engine
//!
//! The session driver talks to the world through the narrow [`GameEngine`]
//! contract. The default [`Engine`] validates the acting character against
//! the character store, parses the line, and dispatches to per-verb
//! handlers. World simulation (rooms, items, combat) is not modeled here;
//! the handlers answer with the character's own data or flavor text.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::Result;
use crate::game::character::Character;
use crate::game::parser::{Command, Parser};
use crate::persistence::CharacterRepository;

/// Contract between the session driver and the game world
#[async_trait]
pub trait GameEngine: Send + Sync {
    /// Process one input line for a character; each returned string is one
    /// response line.
    async fn process_command(&self, character_id: &str, input: &str) -> Result<Vec<String>>;

    /// Load the character's current state
    async fn character_state(&self, character_id: &str) -> Result<Character>;
}

/// Default command engine backed by the character store
pub struct Engine {
    characters: Arc<dyn CharacterRepository>,
    parser: Parser,
}

impl Engine {
    pub fn new(characters: Arc<dyn CharacterRepository>) -> Self {
        Self {
            characters,
            parser: Parser::new(),
        }
    }

    async fn dispatch(&self, character: Character, command: Command) -> Result<Vec<String>> {
        let args = command.args;
        let lines = match command.verb.as_str() {
            "north" | "south" | "east" | "west" | "up" | "down" => {
                vec![format!("You attempt to move {}.", command.verb)]
            }
            "say" => vec![format!("You say: {}", args.join(" "))],
            "yell" => vec![format!("You yell: {}", args.join(" "))],
            "emote" => vec![format!("{} {}", character.name, args.join(" "))],
            "look" => {
                if args.is_empty() {
                    vec![
                        "A Simple Room".to_string(),
                        "You are in a basic room with stone walls and a dirt floor.".to_string(),
                        "There are exits to the north, south, east, and west.".to_string(),
                    ]
                } else {
                    vec![format!("You look at {}.", args.join(" "))]
                }
            }
            "examine" => vec![format!("You examine {} closely.", args.join(" "))],
            "who" => vec![
                "Players currently online:".to_string(),
                format!(
                    "  {} ({} {}, Level {})",
                    character.name,
                    character.race_label(),
                    character.class_label(),
                    character.level
                ),
                String::new(),
                "1 player online.".to_string(),
            ],
            "score" => vec![
                format!("Name: {}", character.name),
                format!(
                    "Race: {}, Class: {}",
                    character.race_label(),
                    character.class_label()
                ),
                format!(
                    "Level: {}, Experience: {}",
                    character.level, character.experience
                ),
                format!(
                    "Health: {}/{}",
                    character.stats.health, character.stats.max_health
                ),
                format!("Mana: {}/{}", character.stats.mana, character.stats.max_mana),
                format!(
                    "Stamina: {}/{}",
                    character.stats.stamina, character.stats.max_stamina
                ),
            ],
            "time" => vec!["It is midday in the realm.".to_string()],
            "help" => self.help_lines(args.first().map(String::as_str)),
            "commands" => {
                let verbs: Vec<&str> = self
                    .parser
                    .commands_sorted()
                    .iter()
                    .map(|(verb, _)| *verb)
                    .collect();
                vec![
                    "Available commands:".to_string(),
                    format!("  {}", verbs.join(", ")),
                ]
            }
            "save" => {
                let mut character = character;
                character.last_played = Utc::now();
                self.characters.update_character(&character).await?;
                vec!["Character saved.".to_string()]
            }
            "quit" => vec!["There is no escape that way. Leave through the character menu.".to_string()],
            _ => vec![format!("Command '{}' is not implemented yet.", command.verb)],
        };
        Ok(lines)
    }

    fn help_lines(&self, topic: Option<&str>) -> Vec<String> {
        if let Some(topic) = topic {
            let topic = topic.to_lowercase();
            return match self.parser.info(&topic) {
                Some(info) => vec![
                    format!("{} - {}", info.usage, info.description),
                ],
                None => vec![format!("No help available for '{}'.", topic)],
            };
        }

        let mut lines = vec!["Available commands:".to_string()];
        for (_, info) in self.parser.commands_sorted() {
            lines.push(format!("  {:<18} {}", info.usage, info.description));
        }
        lines
    }
}

#[async_trait]
impl GameEngine for Engine {
    async fn process_command(&self, character_id: &str, input: &str) -> Result<Vec<String>> {
        // Validates the character exists before anything else runs.
        let character = self.characters.get_character(character_id).await?;

        let Some(command) = self.parser.parse(input) else {
            return Ok(vec!["What?".to_string()]);
        };

        let Some(info) = self.parser.info(&command.verb) else {
            return Ok(vec![format!("Unknown command: {}", command.verb)]);
        };

        if !info.accepts(command.args.len()) {
            return Ok(vec![
                "Invalid command syntax. Type 'help' for usage information.".to_string(),
            ]);
        }

        self.dispatch(character, command).await
    }

    async fn character_state(&self, character_id: &str) -> Result<Character> {
        self.characters.get_character(character_id).await
    }
}
