//! In-game command parsing
//!
//! A verb registry with aliases and argument-count bounds. Parsing only
//! splits and normalizes; execution lives in the engine.

use std::collections::HashMap;

/// A parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Canonical verb, lowercased and alias-resolved
    pub verb: String,
    pub args: Vec<String>,
}

/// Registry entry for a known verb
#[derive(Debug, Clone)]
pub struct CommandInfo {
    pub description: &'static str,
    pub usage: &'static str,
    pub min_args: usize,
    /// None means unbounded
    pub max_args: Option<usize>,
}

impl CommandInfo {
    /// Check an argument count against the registered bounds
    pub fn accepts(&self, argc: usize) -> bool {
        argc >= self.min_args && self.max_args.map_or(true, |max| argc <= max)
    }
}

/// Command parser with a fixed verb registry
pub struct Parser {
    commands: HashMap<&'static str, CommandInfo>,
    aliases: HashMap<&'static str, &'static str>,
}

impl Parser {
    pub fn new() -> Self {
        let mut parser = Self {
            commands: HashMap::new(),
            aliases: HashMap::new(),
        };
        parser.register_commands();
        parser
    }

    /// Split an input line into a command; None for blank input
    pub fn parse(&self, input: &str) -> Option<Command> {
        let mut parts = input.split_whitespace();
        let verb = parts.next()?.to_lowercase();
        let args: Vec<String> = parts.map(str::to_string).collect();

        let verb = match self.aliases.get(verb.as_str()) {
            Some(canonical) => canonical.to_string(),
            None => verb,
        };

        Some(Command { verb, args })
    }

    /// Look up the registry entry for a canonical verb
    pub fn info(&self, verb: &str) -> Option<&CommandInfo> {
        self.commands.get(verb)
    }

    /// All registered verbs with their entries, sorted by verb
    pub fn commands_sorted(&self) -> Vec<(&'static str, &CommandInfo)> {
        let mut entries: Vec<_> = self.commands.iter().map(|(v, i)| (*v, i)).collect();
        entries.sort_by_key(|(verb, _)| *verb);
        entries
    }

    fn add(
        &mut self,
        verb: &'static str,
        description: &'static str,
        usage: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        aliases: &[&'static str],
    ) {
        self.commands.insert(
            verb,
            CommandInfo {
                description,
                usage,
                min_args,
                max_args,
            },
        );
        for alias in aliases {
            self.aliases.insert(alias, verb);
        }
    }

    fn register_commands(&mut self) {
        // Movement
        self.add("north", "Move north", "north", 0, Some(0), &["n"]);
        self.add("south", "Move south", "south", 0, Some(0), &["s"]);
        self.add("east", "Move east", "east", 0, Some(0), &["e"]);
        self.add("west", "Move west", "west", 0, Some(0), &["w"]);
        self.add("up", "Move up", "up", 0, Some(0), &["u"]);
        self.add("down", "Move down", "down", 0, Some(0), &["d"]);

        // Communication
        self.add("say", "Say something to the room", "say <message>", 1, None, &[]);
        self.add("yell", "Yell across the area", "yell <message>", 1, None, &[]);
        self.add("emote", "Perform an emote", "emote <action>", 1, None, &["em"]);

        // Information
        self.add("look", "Look at surroundings", "look [target]", 0, Some(1), &["l"]);
        self.add(
            "examine",
            "Examine something closely",
            "examine <target>",
            1,
            Some(1),
            &["ex"],
        );
        self.add("who", "List online players", "who", 0, Some(0), &[]);
        self.add("score", "Show character stats", "score", 0, Some(0), &["sc"]);
        self.add("time", "Show game time", "time", 0, Some(0), &[]);

        // System
        self.add("help", "Show help", "help [command]", 0, Some(1), &["h"]);
        self.add("commands", "List available commands", "commands", 0, Some(0), &["cmd"]);
        self.add("save", "Save character", "save", 0, Some(0), &[]);
        self.add("quit", "Leave the game", "quit", 0, Some(0), &["q"]);
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}
