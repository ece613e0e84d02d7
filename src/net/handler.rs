//! Session handler module
//!
//! Drives the per-connection state machine: username, password, account
//! creation, character selection, and finally in-game command forwarding.
//! One `handle_client` call owns a connection for its whole lifetime and
//! returns when the transport reports the connection closed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::auth;
use crate::error::Result;
use crate::game::character::{Character, Class, Race};
use crate::game::engine::GameEngine;
use crate::game::player::Player;
use crate::net::client::{Client, ClientState};
use crate::net::manager::{ClientHandler, ConnectionManager};
use crate::persistence::{CharacterRepository, PlayerRepository};

/// Minimum accepted password length for new accounts
const MIN_PASSWORD_LEN: usize = 6;

/// Per-connection protocol driver
pub struct SessionHandler {
    players: Arc<dyn PlayerRepository>,
    characters: Arc<dyn CharacterRepository>,
    engine: Arc<dyn GameEngine>,
}

#[async_trait]
impl ClientHandler for SessionHandler {
    async fn handle_client(&self, client: Arc<Client>, manager: Arc<ConnectionManager>) {
        if self.greet(&client).await.is_err() {
            client.close();
            return;
        }

        while client.is_connected() {
            // The driver is the only task that mutates state, so the value
            // read here is the state the next line will be handled in.
            let state = client.state();

            let line = match state {
                ClientState::Authenticating | ClientState::ConfirmingPassword => {
                    client.read_password().await
                }
                _ => client.read_line().await,
            };
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    debug!(client_id = %client.id(), error = %e, "Read failed, ending session");
                    break;
                }
            };

            let result = match state {
                ClientState::Connected => self.handle_login(&client, &line).await,
                ClientState::Authenticating => {
                    self.handle_password_auth(&client, &manager, &line).await
                }
                ClientState::CreatingAccount => self.handle_email(&client, &line).await,
                ClientState::ConfirmingPassword => {
                    self.handle_password_setup(&client, &manager, &line).await
                }
                ClientState::CharacterSelection => {
                    self.handle_character_selection(&client, &line).await
                }
                ClientState::InGame => self.handle_game_command(&client, &line).await,
                ClientState::Disconnecting => break,
            };

            if let Err(e) = result {
                warn!(client_id = %client.id(), error = %e, "Session error");
                break;
            }
        }

        client.close();
    }
}

impl SessionHandler {
    /// Create a new session handler
    pub fn new(
        players: Arc<dyn PlayerRepository>,
        characters: Arc<dyn CharacterRepository>,
        engine: Arc<dyn GameEngine>,
    ) -> Self {
        Self {
            players,
            characters,
            engine,
        }
    }

    async fn greet(&self, client: &Arc<Client>) -> Result<()> {
        client.send("Welcome to IronMUD!").await?;
        client.send("Please enter your username:").await?;
        client.send_prompt("> ").await
    }

    /// Connected: the line is a username. Known accounts move on to the
    /// password prompt; unknown usernames start account creation.
    async fn handle_login(&self, client: &Arc<Client>, input: &str) -> Result<()> {
        let username = input.trim();
        if username.is_empty() {
            client
                .send("Username cannot be empty. Please enter your username:")
                .await?;
            return client.send_prompt("> ").await;
        }

        match self.players.get_player_by_username(username).await {
            Ok(player) => {
                if !player.is_active() {
                    client
                        .send("Your account has been suspended. Please contact an administrator.")
                        .await?;
                    client.close();
                    return Ok(());
                }

                client.set_player_id(&player.id);
                client.set_state(ClientState::Authenticating);
                client.send("Please enter your password:").await?;
                client.send_prompt("Password: ").await
            }
            Err(e) if e.is_not_found() => {
                client.begin_registration(username.to_string());
                client.set_state(ClientState::CreatingAccount);
                client
                    .send(&format!("No account found for '{}'. Let's create one.", username))
                    .await?;
                client.send("Please enter your email address:").await?;
                client.send_prompt("Email: ").await
            }
            Err(e) => {
                warn!(client_id = %client.id(), error = %e, "Player lookup failed");
                client
                    .send("Unable to look up that account right now. Please try again later.")
                    .await?;
                client.close();
                Ok(())
            }
        }
    }

    /// Authenticating: the line is the password for a known account.
    /// A mismatch closes the connection; there is no retry.
    async fn handle_password_auth(
        &self,
        client: &Arc<Client>,
        manager: &Arc<ConnectionManager>,
        input: &str,
    ) -> Result<()> {
        let password = input.trim();
        if password.is_empty() {
            client
                .send("Password cannot be empty. Please enter your password:")
                .await?;
            return client.send_prompt("Password: ").await;
        }

        let Some(player_id) = client.player_id() else {
            // Authenticating is only ever entered with a player id set.
            client.send("Authentication failed.").await?;
            client.close();
            return Ok(());
        };

        let player = match self.players.get_player(&player_id).await {
            Ok(player) => player,
            Err(e) => {
                warn!(client_id = %client.id(), error = %e, "Player load failed during auth");
                client.send("Authentication failed.").await?;
                client.close();
                return Ok(());
            }
        };

        if !auth::verify_password(password, &player.password_hash) {
            client.send("Invalid password.").await?;
            client.close();
            return Ok(());
        }

        if let Err(e) = self.players.update_last_login(&player.id).await {
            warn!(client_id = %client.id(), error = %e, "Failed to record login time");
        }

        manager.register_player_connection(&player.id, client);
        client.set_state(ClientState::CharacterSelection);
        client
            .send(&format!("Welcome back, {}!", player.username))
            .await?;
        self.show_character_menu(client).await
    }

    /// CreatingAccount: the line is the email for a new account.
    async fn handle_email(&self, client: &Arc<Client>, input: &str) -> Result<()> {
        let email = input.trim();
        if email.is_empty() {
            client
                .send("Email cannot be empty. Please enter your email address:")
                .await?;
            return client.send_prompt("Email: ").await;
        }

        if !validator::validate_email(email) {
            client
                .send("That does not look like a valid email address. Please try again:")
                .await?;
            return client.send_prompt("Email: ").await;
        }

        match self.players.get_player_by_email(email).await {
            Ok(_) => {
                client.send("That email address is already registered.").await?;
                client.close();
                return Ok(());
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                warn!(client_id = %client.id(), error = %e, "Email lookup failed");
                client
                    .send("Unable to verify that email right now. Please try again later.")
                    .await?;
                client.close();
                return Ok(());
            }
        }

        client.set_pending_email(email.to_string());
        client.set_state(ClientState::ConfirmingPassword);
        client
            .send(&format!(
                "Please choose a password (at least {} characters):",
                MIN_PASSWORD_LEN
            ))
            .await?;
        client.send_prompt("Password: ").await
    }

    /// ConfirmingPassword: the first line is the chosen password, the second
    /// confirms it. A mismatch restarts only the password step; the validated
    /// email survives.
    async fn handle_password_setup(
        &self,
        client: &Arc<Client>,
        manager: &Arc<ConnectionManager>,
        input: &str,
    ) -> Result<()> {
        let password = input.trim();

        let Some(pending) = client.pending_registration() else {
            return self.restart_registration(client).await;
        };

        match pending.password {
            None => {
                if password.len() < MIN_PASSWORD_LEN {
                    client
                        .send(&format!(
                            "Password must be at least {} characters. Please choose a password:",
                            MIN_PASSWORD_LEN
                        ))
                        .await?;
                    return client.send_prompt("Password: ").await;
                }

                client.set_pending_password(password.to_string());
                client.send("Please confirm your password:").await?;
                client.send_prompt("Password: ").await
            }
            Some(first) => {
                if password != first {
                    client.clear_pending_password();
                    client
                        .send("Passwords do not match. Please choose a password:")
                        .await?;
                    return client.send_prompt("Password: ").await;
                }

                let Some(email) = pending.email else {
                    return self.restart_registration(client).await;
                };
                self.create_account(client, manager, &pending.username, &email, &first)
                    .await
            }
        }
    }

    async fn restart_registration(&self, client: &Arc<Client>) -> Result<()> {
        client.clear_registration();
        client.set_state(ClientState::Connected);
        client
            .send("Something went wrong with your registration. Let's start over.")
            .await?;
        client.send("Please enter your username:").await?;
        client.send_prompt("> ").await
    }

    async fn create_account(
        &self,
        client: &Arc<Client>,
        manager: &Arc<ConnectionManager>,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<()> {
        let password_hash = match auth::hash_password(password) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(client_id = %client.id(), error = %e, "Password hashing failed");
                client.clear_registration();
                client
                    .send("Account creation failed. Please try again later.")
                    .await?;
                client.close();
                return Ok(());
            }
        };

        let player = Player::new(username, email, &password_hash);
        if let Err(e) = self.players.create_player(&player).await {
            warn!(client_id = %client.id(), error = %e, "Account creation failed");
            client.clear_registration();
            client
                .send("Account creation failed. The username may already be taken.")
                .await?;
            client.close();
            return Ok(());
        }

        client.clear_registration();
        manager.register_player_connection(&player.id, client);
        client.set_state(ClientState::CharacterSelection);
        client
            .send(&format!("Account created. Welcome, {}!", player.username))
            .await?;
        self.show_character_menu(client).await
    }

    /// CharacterSelection: list / select / create / delete / quit.
    async fn handle_character_selection(&self, client: &Arc<Client>, input: &str) -> Result<()> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.is_empty() {
            return self.show_character_menu(client).await;
        }

        match parts[0].to_lowercase().as_str() {
            "list" | "l" => self.list_characters(client).await?,
            "select" | "s" => {
                if parts.len() < 2 {
                    client.send("Usage: select <character_name>").await?;
                } else {
                    self.select_character(client, parts[1]).await?;
                }
            }
            "create" | "c" => {
                if parts.len() < 4 {
                    client.send("Usage: create <name> <race> <class>").await?;
                } else {
                    self.create_character(client, parts[1], parts[2], parts[3])
                        .await?;
                }
            }
            "delete" | "d" => {
                if parts.len() < 2 {
                    client.send("Usage: delete <character_name>").await?;
                } else {
                    self.delete_character(client, parts[1]).await?;
                }
            }
            "quit" | "q" => {
                client.send("Goodbye!").await?;
                client.close();
            }
            _ => {
                client
                    .send("Unknown command. Type 'list' to see your characters.")
                    .await?;
            }
        }

        if client.state() == ClientState::CharacterSelection {
            client.send_prompt("Character> ").await?;
        }
        Ok(())
    }

    /// InGame: forward the line to the game engine and write back every
    /// response line. Engine errors surface as a single line and the client
    /// stays in-game.
    async fn handle_game_command(&self, client: &Arc<Client>, input: &str) -> Result<()> {
        let Some(character_id) = client.character_id() else {
            client.send("Error: No character selected.").await?;
            client.set_state(ClientState::CharacterSelection);
            return self.show_character_menu(client).await;
        };

        match self.engine.process_command(&character_id, input).await {
            Ok(responses) => {
                for response in responses.iter().filter(|r| !r.is_empty()) {
                    client.send(response).await?;
                }
            }
            Err(e) => {
                client.send(&format!("Error: {}", e)).await?;
            }
        }

        client.send_prompt("> ").await
    }

    async fn show_character_menu(&self, client: &Arc<Client>) -> Result<()> {
        client.send("").await?;
        client.send("--- Character Selection ---").await?;
        client.send("Commands:").await?;
        client
            .send("  list (l)                 - List your characters")
            .await?;
        client
            .send("  select (s) <name>        - Enter game with character")
            .await?;
        client
            .send("  create (c) <name> <race> <class> - Create new character")
            .await?;
        client
            .send("  delete (d) <name>        - Delete character")
            .await?;
        client
            .send("  quit (q)                 - Disconnect")
            .await?;
        client.send("").await?;
        client.send_prompt("Character> ").await
    }

    async fn list_characters(&self, client: &Arc<Client>) -> Result<()> {
        let Some(player_id) = client.player_id() else {
            return client.send("Error retrieving characters.").await;
        };

        let characters = match self.characters.get_characters_by_player(&player_id).await {
            Ok(characters) => characters,
            Err(e) => {
                warn!(client_id = %client.id(), error = %e, "Character list failed");
                return client.send("Error retrieving characters.").await;
            }
        };

        if characters.is_empty() {
            return client
                .send("You have no characters. Use 'create <name> <race> <class>' to create one.")
                .await;
        }

        client.send("").await?;
        client.send("Your Characters:").await?;
        client
            .send("Name           Race      Class     Level  Status    Last Played")
            .await?;
        client
            .send("--------------------------------------------------------------")
            .await?;
        for character in &characters {
            let status = if character.is_alive { "Alive" } else { "Dead" };
            client
                .send(&format!(
                    "{:<14} {:<9} {:<9} {:<6} {:<9} {}",
                    character.name,
                    character.race,
                    character.class,
                    character.level,
                    status,
                    character.last_played.format("%Y-%m-%d %H:%M")
                ))
                .await?;
        }
        client.send("").await
    }

    async fn select_character(&self, client: &Arc<Client>, name: &str) -> Result<()> {
        let Some(player_id) = client.player_id() else {
            return client.send("Error retrieving characters.").await;
        };

        let characters = match self.characters.get_characters_by_player(&player_id).await {
            Ok(characters) => characters,
            Err(e) => {
                warn!(client_id = %client.id(), error = %e, "Character list failed");
                return client.send("Error retrieving characters.").await;
            }
        };

        let Some(character) = characters
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
        else {
            return client
                .send(&format!("Character '{}' not found.", name))
                .await;
        };

        client.set_character_id(&character.id);
        client.set_state(ClientState::InGame);
        client
            .send(&format!("Welcome, {}!", character.name))
            .await?;
        client.send("You enter the game world...").await?;
        client.send_prompt("> ").await
    }

    async fn create_character(
        &self,
        client: &Arc<Client>,
        name: &str,
        race_id: &str,
        class_id: &str,
    ) -> Result<()> {
        let Some(player_id) = client.player_id() else {
            return client.send("Error retrieving characters.").await;
        };

        let Some(race) = Race::by_id(&race_id.to_lowercase()) else {
            client.send(&format!("Invalid race: {}", race_id)).await?;
            return client.send("Available races: human, elf, dwarf").await;
        };

        let Some(class) = Class::by_id(&class_id.to_lowercase()) else {
            client.send(&format!("Invalid class: {}", class_id)).await?;
            return client.send("Available classes: warrior, mage, rogue").await;
        };

        let character = Character::new(&player_id, name, race, class);
        match self.characters.create_character(&character).await {
            Ok(()) => {
                client
                    .send(&format!("Character '{}' created successfully!", name))
                    .await
            }
            Err(e) => {
                debug!(client_id = %client.id(), error = %e, "Character creation failed");
                client
                    .send("Error creating character. Name might already be taken.")
                    .await
            }
        }
    }

    async fn delete_character(&self, client: &Arc<Client>, name: &str) -> Result<()> {
        let Some(player_id) = client.player_id() else {
            return client.send("Error retrieving characters.").await;
        };

        let characters = match self.characters.get_characters_by_player(&player_id).await {
            Ok(characters) => characters,
            Err(e) => {
                warn!(client_id = %client.id(), error = %e, "Character list failed");
                return client.send("Error retrieving characters.").await;
            }
        };

        let Some(character) = characters
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
        else {
            return client
                .send(&format!("Character '{}' not found.", name))
                .await;
        };

        match self.characters.delete_character(&character.id).await {
            Ok(()) => {
                client
                    .send(&format!("Character '{}' has been deleted.", character.name))
                    .await
            }
            Err(e) => {
                warn!(client_id = %client.id(), error = %e, "Character deletion failed");
                client.send("Error deleting character.").await
            }
        }
    }
}
