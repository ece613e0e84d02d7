//! End-to-end session protocol tests
//!
//! Each test drives a real session driver over an in-memory transport (or
//! real TCP for the acceptor-level cases) and asserts on the exact protocol
//! exchange: prompts, state transitions, registry effects.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{duplex, AsyncRead, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::net::{TcpListener, TcpStream};
use uuid::Uuid;

use ironmud::auth;
use ironmud::game::engine::Engine;
use ironmud::game::player::{AccountStatus, Player};
use ironmud::net::client::{Client, ClientState};
use ironmud::net::handler::SessionHandler;
use ironmud::net::manager::ConnectionManager;
use ironmud::persistence::{
    CharacterRepository, MemoryCharacterRepository, MemoryPlayerRepository, PlayerRepository,
};

struct TestServer {
    handler: Arc<SessionHandler>,
    manager: Arc<ConnectionManager>,
    players: Arc<MemoryPlayerRepository>,
    characters: Arc<MemoryCharacterRepository>,
}

fn test_server() -> TestServer {
    test_server_with_limits(100, Duration::from_secs(1800))
}

fn test_server_with_limits(max_clients: usize, idle_timeout: Duration) -> TestServer {
    let players = Arc::new(MemoryPlayerRepository::new());
    let characters = Arc::new(MemoryCharacterRepository::new());
    let engine = Arc::new(Engine::new(
        Arc::clone(&characters) as Arc<dyn CharacterRepository>
    ));
    let handler = Arc::new(SessionHandler::new(
        Arc::clone(&players) as Arc<dyn PlayerRepository>,
        Arc::clone(&characters) as Arc<dyn CharacterRepository>,
        engine,
    ));
    let manager = Arc::new(ConnectionManager::new(
        Arc::clone(&handler) as Arc<dyn ironmud::net::manager::ClientHandler>,
        max_clients,
        idle_timeout,
    ));
    TestServer {
        handler,
        manager,
        players,
        characters,
    }
}

impl TestServer {
    /// Register a duplex-backed client and run the session driver on it,
    /// the way the acceptor would for a real socket.
    fn connect(&self) -> (Arc<Client>, DuplexStream) {
        let (local, remote) = duplex(8192);
        let (reader, writer) = tokio::io::split(local);
        let client = Arc::new(Client::from_parts(
            Uuid::new_v4().to_string(),
            "127.0.0.1:0".parse().unwrap(),
            reader,
            writer,
        ));
        self.manager.register_client(Arc::clone(&client));

        let handler = Arc::clone(&self.handler);
        let manager = Arc::clone(&self.manager);
        let task_client = Arc::clone(&client);
        tokio::spawn(async move {
            use ironmud::net::manager::ClientHandler;
            handler
                .handle_client(Arc::clone(&task_client), Arc::clone(&manager))
                .await;
            manager.remove_client(task_client.id());
        });

        (client, remote)
    }

    async fn seed_player(&self, username: &str, password: &str) -> Player {
        let hash = auth::hash_password(password).unwrap();
        let player = Player::new(username, &format!("{}@example.com", username), &hash);
        self.players.create_player(&player).await.unwrap();
        player
    }
}

/// Read from the stream until the expected text shows up; panics with the
/// collected output on timeout.
async fn expect<S: AsyncRead + Unpin>(stream: &mut S, needle: &str) -> String {
    let mut collected: Vec<u8> = Vec::new();
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            // Read a single byte at a time so we stop exactly at the needle and
            // leave any following bytes buffered in the transport for the next
            // `expect` call (reading larger chunks would discard them).
            let mut chunk = [0u8; 1];
            let n = match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            collected.extend_from_slice(&chunk[..n]);
            if String::from_utf8_lossy(&collected).contains(needle) {
                break;
            }
        }
    })
    .await;

    let text = String::from_utf8_lossy(&collected).into_owned();
    assert!(
        result.is_ok() && text.contains(needle),
        "expected {:?} in server output, got {:?}",
        needle,
        text
    );
    text
}

async fn send_line(remote: &mut DuplexStream, line: &str) {
    remote.write_all(line.as_bytes()).await.unwrap();
    remote.write_all(b"\r\n").await.unwrap();
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "condition not met within timeout");
}

#[tokio::test]
async fn new_account_creation_flow() {
    let server = test_server();
    let (client, mut remote) = server.connect();

    expect(&mut remote, "Please enter your username:").await;
    send_line(&mut remote, "alice").await;

    expect(&mut remote, "email").await;
    send_line(&mut remote, "a@b.com").await;

    expect(&mut remote, "choose a password").await;
    send_line(&mut remote, "secret1").await;

    expect(&mut remote, "confirm").await;
    send_line(&mut remote, "secret1").await;

    expect(&mut remote, "Account created").await;
    expect(&mut remote, "Character>").await;

    assert_eq!(client.state(), ClientState::CharacterSelection);
    assert!(client.pending_registration().is_none());

    let player = server.players.get_player_by_username("alice").await.unwrap();
    assert_eq!(player.email, "a@b.com");
    assert!(auth::verify_password("secret1", &player.password_hash));

    let registered = server.manager.get_player_client(&player.id).unwrap();
    assert!(Arc::ptr_eq(&registered, &client));
}

#[tokio::test]
async fn confirmation_mismatch_restarts_only_the_password_step() {
    let server = test_server();
    let (_client, mut remote) = server.connect();

    expect(&mut remote, "username").await;
    send_line(&mut remote, "alice").await;
    expect(&mut remote, "email").await;
    send_line(&mut remote, "alice@example.com").await;

    expect(&mut remote, "choose a password").await;
    send_line(&mut remote, "secret1").await;
    expect(&mut remote, "confirm").await;
    send_line(&mut remote, "different1").await;

    // Back to choosing a password, without re-asking for the email.
    let output = expect(&mut remote, "Passwords do not match").await;
    assert!(!output.contains("email address"));

    send_line(&mut remote, "secret2").await;
    expect(&mut remote, "confirm").await;
    send_line(&mut remote, "secret2").await;
    expect(&mut remote, "Account created").await;

    let player = server.players.get_player_by_username("alice").await.unwrap();
    assert_eq!(player.email, "alice@example.com");
    assert!(auth::verify_password("secret2", &player.password_hash));
}

#[tokio::test]
async fn short_password_is_reprompted() {
    let server = test_server();
    let (client, mut remote) = server.connect();

    expect(&mut remote, "username").await;
    send_line(&mut remote, "alice").await;
    expect(&mut remote, "email").await;
    send_line(&mut remote, "alice@example.com").await;
    expect(&mut remote, "choose a password").await;

    send_line(&mut remote, "abc").await;
    expect(&mut remote, "at least 6 characters").await;
    assert_eq!(client.state(), ClientState::ConfirmingPassword);
    assert!(client.is_connected());
}

#[tokio::test]
async fn invalid_email_is_reprompted() {
    let server = test_server();
    let (client, mut remote) = server.connect();

    expect(&mut remote, "username").await;
    send_line(&mut remote, "alice").await;
    expect(&mut remote, "email").await;

    send_line(&mut remote, "not-an-email").await;
    expect(&mut remote, "valid email address").await;
    assert_eq!(client.state(), ClientState::CreatingAccount);

    send_line(&mut remote, "alice@example.com").await;
    expect(&mut remote, "choose a password").await;
}

#[tokio::test]
async fn already_registered_email_closes_the_connection() {
    let server = test_server();
    server.seed_player("taken", "secret99").await;

    let (client, mut remote) = server.connect();
    expect(&mut remote, "username").await;
    send_line(&mut remote, "newcomer").await;
    expect(&mut remote, "email").await;
    send_line(&mut remote, "taken@example.com").await;

    expect(&mut remote, "already registered").await;
    wait_until(|| !client.is_connected()).await;
}

#[tokio::test]
async fn empty_username_is_reprompted() {
    let server = test_server();
    let (client, mut remote) = server.connect();

    expect(&mut remote, "username").await;
    send_line(&mut remote, "").await;
    expect(&mut remote, "Username cannot be empty").await;
    assert_eq!(client.state(), ClientState::Connected);
    assert!(client.is_connected());
}

#[tokio::test]
async fn wrong_password_closes_without_retry() {
    let server = test_server();
    server.seed_player("bob", "correct1").await;

    let (client, mut remote) = server.connect();
    expect(&mut remote, "username").await;
    send_line(&mut remote, "bob").await;
    expect(&mut remote, "Password:").await;
    send_line(&mut remote, "wrong1").await;

    expect(&mut remote, "Invalid password.").await;
    wait_until(|| !client.is_connected()).await;
    wait_until(|| server.manager.get_client(client.id()).is_none()).await;
}

#[tokio::test]
async fn suspended_account_is_turned_away() {
    let server = test_server();
    let mut player = server.seed_player("mallory", "secret99").await;
    player.status = AccountStatus::Suspended;
    server.players.update_player(&player).await.unwrap();

    let (client, mut remote) = server.connect();
    expect(&mut remote, "username").await;
    send_line(&mut remote, "mallory").await;

    expect(&mut remote, "suspended").await;
    wait_until(|| !client.is_connected()).await;
}

#[tokio::test]
async fn login_create_select_and_play() {
    let server = test_server();
    let player = server.seed_player("carol", "secret99").await;

    let (client, mut remote) = server.connect();
    expect(&mut remote, "username").await;
    send_line(&mut remote, "carol").await;
    expect(&mut remote, "Password:").await;
    send_line(&mut remote, "secret99").await;

    expect(&mut remote, "Welcome back, carol!").await;
    expect(&mut remote, "Character>").await;
    assert_eq!(client.state(), ClientState::CharacterSelection);

    send_line(&mut remote, "create Bob human warrior").await;
    expect(&mut remote, "created successfully").await;

    let summaries = server
        .characters
        .get_characters_by_player(&player.id)
        .await
        .unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].name, "Bob");

    send_line(&mut remote, "select bob").await;
    expect(&mut remote, "You enter the game world").await;
    wait_until(|| client.state() == ClientState::InGame).await;
    assert_eq!(client.character_id().as_deref(), Some(summaries[0].id.as_str()));

    send_line(&mut remote, "say hello").await;
    expect(&mut remote, "You say: hello").await;

    send_line(&mut remote, "score").await;
    expect(&mut remote, "Race: Human, Class: Warrior").await;
    assert_eq!(client.state(), ClientState::InGame);
}

#[tokio::test]
async fn engine_errors_keep_the_session_in_game() {
    let server = test_server();
    server.seed_player("erin", "secret99").await;

    let (client, mut remote) = server.connect();
    expect(&mut remote, "username").await;
    send_line(&mut remote, "erin").await;
    expect(&mut remote, "Password:").await;
    send_line(&mut remote, "secret99").await;
    expect(&mut remote, "Character>").await;

    send_line(&mut remote, "create Zoe elf rogue").await;
    expect(&mut remote, "created successfully").await;
    send_line(&mut remote, "select Zoe").await;
    expect(&mut remote, "You enter the game world").await;

    // Delete the character out from under the session; the engine now fails
    // but the connection stays in-game.
    let summaries = server
        .characters
        .get_characters_by_player(&server.players.get_player_by_username("erin").await.unwrap().id)
        .await
        .unwrap();
    server
        .characters
        .delete_character(&summaries[0].id)
        .await
        .unwrap();

    send_line(&mut remote, "look").await;
    expect(&mut remote, "Error:").await;
    assert_eq!(client.state(), ClientState::InGame);
    assert!(client.is_connected());
}

#[tokio::test]
async fn character_selection_rejects_bad_input() {
    let server = test_server();
    server.seed_player("frank", "secret99").await;

    let (client, mut remote) = server.connect();
    expect(&mut remote, "username").await;
    send_line(&mut remote, "frank").await;
    expect(&mut remote, "Password:").await;
    send_line(&mut remote, "secret99").await;
    expect(&mut remote, "Character>").await;

    send_line(&mut remote, "select Nobody").await;
    expect(&mut remote, "Character 'Nobody' not found.").await;

    send_line(&mut remote, "create Bob orc warrior").await;
    expect(&mut remote, "Invalid race: orc").await;

    send_line(&mut remote, "create Bob human bard").await;
    expect(&mut remote, "Invalid class: bard").await;

    send_line(&mut remote, "select").await;
    expect(&mut remote, "Usage: select <character_name>").await;

    send_line(&mut remote, "frobnicate").await;
    expect(&mut remote, "Unknown command").await;
    assert_eq!(client.state(), ClientState::CharacterSelection);

    send_line(&mut remote, "quit").await;
    expect(&mut remote, "Goodbye!").await;
    wait_until(|| !client.is_connected()).await;
}

#[tokio::test]
async fn duplicate_character_name_reprompts() {
    let server = test_server();
    server.seed_player("gina", "secret99").await;

    let (client, mut remote) = server.connect();
    expect(&mut remote, "username").await;
    send_line(&mut remote, "gina").await;
    expect(&mut remote, "Password:").await;
    send_line(&mut remote, "secret99").await;
    expect(&mut remote, "Character>").await;

    send_line(&mut remote, "create Bob human warrior").await;
    expect(&mut remote, "created successfully").await;
    send_line(&mut remote, "create bob dwarf mage").await;
    expect(&mut remote, "Name might already be taken").await;
    assert_eq!(client.state(), ClientState::CharacterSelection);
    assert!(client.is_connected());
}

#[tokio::test]
async fn delete_removes_an_owned_character() {
    let server = test_server();
    let player = server.seed_player("hank", "secret99").await;

    let (_client, mut remote) = server.connect();
    expect(&mut remote, "username").await;
    send_line(&mut remote, "hank").await;
    expect(&mut remote, "Password:").await;
    send_line(&mut remote, "secret99").await;
    expect(&mut remote, "Character>").await;

    send_line(&mut remote, "create Doomed elf mage").await;
    expect(&mut remote, "created successfully").await;
    send_line(&mut remote, "delete doomed").await;
    expect(&mut remote, "has been deleted").await;

    let summaries = server
        .characters
        .get_characters_by_player(&player.id)
        .await
        .unwrap();
    assert!(summaries.is_empty());
}

#[tokio::test]
async fn second_login_for_the_same_player_evicts_the_first() {
    let server = test_server();
    let player = server.seed_player("dave", "secret99").await;

    let (first, mut remote1) = server.connect();
    expect(&mut remote1, "username").await;
    send_line(&mut remote1, "dave").await;
    expect(&mut remote1, "Password:").await;
    send_line(&mut remote1, "secret99").await;
    expect(&mut remote1, "Character>").await;
    assert!(first.is_connected());

    let (second, mut remote2) = server.connect();
    expect(&mut remote2, "username").await;
    send_line(&mut remote2, "dave").await;
    expect(&mut remote2, "Password:").await;
    send_line(&mut remote2, "secret99").await;
    expect(&mut remote2, "Character>").await;

    wait_until(|| !first.is_connected()).await;
    assert!(second.is_connected());

    let registered = server.manager.get_player_client(&player.id).unwrap();
    assert!(Arc::ptr_eq(&registered, &second));
}

#[tokio::test]
async fn capacity_bound_rejects_excess_connections() {
    let server = test_server_with_limits(1, Duration::from_secs(1800));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    let serve_manager = Arc::clone(&server.manager);
    tokio::spawn(async move {
        serve_manager.serve(listener).await.unwrap();
    });

    let mut first = TcpStream::connect(address).await.unwrap();
    expect(&mut first, "Welcome to IronMUD!").await;
    wait_until(|| server.manager.client_count() == 1).await;

    let mut second = TcpStream::connect(address).await.unwrap();
    let mut rejection = Vec::new();
    second.read_to_end(&mut rejection).await.unwrap();
    assert!(String::from_utf8_lossy(&rejection).contains("Server is full"));
    assert_eq!(server.manager.client_count(), 1);

    server.manager.stop();
}

#[tokio::test]
async fn stats_track_session_states() {
    let server = test_server();
    server.seed_player("ivy", "secret99").await;

    let (_connected, _r1) = server.connect();
    let (_authed, mut remote2) = server.connect();
    expect(&mut remote2, "username").await;
    send_line(&mut remote2, "ivy").await;
    expect(&mut remote2, "Password:").await;
    send_line(&mut remote2, "secret99").await;
    expect(&mut remote2, "Character>").await;

    wait_until(|| {
        let stats = server.manager.stats();
        stats.total == 2 && stats.authenticated == 1 && stats.in_game == 0
    })
    .await;
}

#[tokio::test]
async fn broadcast_reaches_connected_clients() {
    let server = test_server();
    let (_c1, mut remote1) = server.connect();
    let (_c2, mut remote2) = server.connect();
    expect(&mut remote1, "username").await;
    expect(&mut remote2, "username").await;

    server.manager.broadcast_all("The server is restarting soon.").await;
    expect(&mut remote1, "restarting soon").await;
    expect(&mut remote2, "restarting soon").await;
}
