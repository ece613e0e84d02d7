//! Client connection module
//!
//! Wraps one player's byte stream in a line-oriented transport:
//! - line reads and password-mode reads (telnet echo suppression)
//! - serialized line/prompt writes
//! - lock-guarded session identity (state, player, character, registration)
//! - an idempotent `close()` that unblocks an in-flight read from any task

use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tracing::debug;

use crate::error::{IronmudError, NetworkError, Result};
use crate::net::telnet;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Session state in the connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
    /// Initial state - waiting for a username
    Connected,
    /// Known account - waiting for the password
    Authenticating,
    /// New account - waiting for the email address
    CreatingAccount,
    /// New account - choosing and confirming the password
    ConfirmingPassword,
    /// Authenticated - picking or managing characters
    CharacterSelection,
    /// Playing with a selected character
    InGame,
    /// Connection is going away
    Disconnecting,
}

impl ClientState {
    /// Check if the client is still active (not on the way out)
    pub fn is_active(&self) -> bool {
        !matches!(self, ClientState::Disconnecting)
    }

    /// Check if the client has authenticated as a player
    pub fn is_authenticated(&self) -> bool {
        matches!(self, ClientState::CharacterSelection | ClientState::InGame)
    }

    /// Get a human-readable name for the state
    pub fn name(&self) -> &'static str {
        match self {
            ClientState::Connected => "Connected",
            ClientState::Authenticating => "Authenticating",
            ClientState::CreatingAccount => "CreatingAccount",
            ClientState::ConfirmingPassword => "ConfirmingPassword",
            ClientState::CharacterSelection => "CharacterSelection",
            ClientState::InGame => "InGame",
            ClientState::Disconnecting => "Disconnecting",
        }
    }
}

impl std::fmt::Display for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Scratch data collected across the multi-step account creation flow
#[derive(Debug, Clone)]
pub struct PendingRegistration {
    /// Username given at the login prompt
    pub username: String,
    /// Email, once validated
    pub email: Option<String>,
    /// First password entry, awaiting confirmation
    pub password: Option<String>,
}

/// Mutable session identity, guarded by the record lock
struct Ident {
    state: ClientState,
    player_id: Option<String>,
    character_id: Option<String>,
    pending: Option<PendingRegistration>,
    last_active: Instant,
    connected: bool,
}

/// A connected client
pub struct Client {
    id: String,
    address: SocketAddr,
    reader: Mutex<BufReader<BoxedReader>>,
    writer: Mutex<BufWriter<BoxedWriter>>,
    ident: RwLock<Ident>,
    /// Flipped to true exactly once by `close()`; reads select against it.
    closed: watch::Sender<bool>,
}

impl Client {
    /// Create a client from an accepted TCP stream
    pub fn new(id: String, address: SocketAddr, stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self::from_parts(id, address, reader, writer)
    }

    /// Create a client from separate read/write halves (used by tests with
    /// in-memory transports)
    pub fn from_parts<R, W>(id: String, address: SocketAddr, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (closed, _) = watch::channel(false);
        Self {
            id,
            address,
            reader: Mutex::new(BufReader::new(Box::new(reader) as BoxedReader)),
            writer: Mutex::new(BufWriter::new(Box::new(writer) as BoxedWriter)),
            ident: RwLock::new(Ident {
                state: ClientState::Connected,
                player_id: None,
                character_id: None,
                pending: None,
                last_active: Instant::now(),
                connected: true,
            }),
            closed,
        }
    }

    /// Get the connection id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the remote address
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Send a message followed by a line terminator
    pub async fn send(&self, message: &str) -> Result<()> {
        self.write_line(message, true).await
    }

    /// Send a prompt without a line terminator
    pub async fn send_prompt(&self, prompt: &str) -> Result<()> {
        self.write_line(prompt, false).await
    }

    async fn write_line(&self, text: &str, terminate: bool) -> Result<()> {
        if !self.is_connected() {
            return Err(NetworkError::ClientDisconnected.into());
        }

        let mut writer = self.writer.lock().await;
        writer
            .write_all(text.as_bytes())
            .await
            .map_err(write_err)?;
        if terminate {
            writer.write_all(b"\r\n").await.map_err(write_err)?;
        }
        writer.flush().await.map_err(write_err)?;
        Ok(())
    }

    async fn write_raw(&self, bytes: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await.map_err(write_err)?;
        writer.flush().await.map_err(write_err)?;
        Ok(())
    }

    /// Read one line, blocking the calling task until a full line arrives or
    /// the stream fails. Trailing line-ending characters are stripped.
    pub async fn read_line(&self) -> Result<String> {
        let mut closed_rx = self.closed.subscribe();
        if *closed_rx.borrow() {
            return Err(NetworkError::ClientDisconnected.into());
        }

        let mut reader = self.reader.lock().await;
        let mut line = String::new();
        let read = tokio::select! {
            res = reader.read_line(&mut line) => res.map_err(read_err)?,
            _ = closed_rx.changed() => return Err(NetworkError::ClientDisconnected.into()),
        };
        if read == 0 {
            return Err(NetworkError::ConnectionClosed.into());
        }

        if line.ends_with('\n') {
            line.pop();
        }
        if line.ends_with('\r') {
            line.pop();
        }

        self.touch();
        Ok(line)
    }

    /// Read one line in password mode.
    ///
    /// Echo suppression is requested before reading and handed back after,
    /// including on the error path, so a failed read never leaves the remote
    /// terminal without local echo. Telnet negotiation sequences arriving
    /// mid-password are consumed, never returned as password content.
    pub async fn read_password(&self) -> Result<String> {
        self.write_raw(&telnet::SUPPRESS_ECHO).await?;

        let result = self.read_password_line().await;
        let restored = self.restore_echo().await;

        let line = result?;
        restored?;
        self.touch();
        Ok(line)
    }

    async fn restore_echo(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(&telnet::RESTORE_ECHO)
            .await
            .map_err(write_err)?;
        // Nothing was echoed, so advance the client's cursor for it.
        writer.write_all(b"\r\n").await.map_err(write_err)?;
        writer.flush().await.map_err(write_err)?;
        Ok(())
    }

    async fn read_password_line(&self) -> Result<String> {
        let mut closed_rx = self.closed.subscribe();
        if *closed_rx.borrow() {
            return Err(NetworkError::ClientDisconnected.into());
        }

        let mut reader = self.reader.lock().await;
        tokio::select! {
            res = Self::read_password_bytes(&mut reader) => res,
            _ = closed_rx.changed() => Err(NetworkError::ClientDisconnected.into()),
        }
    }

    async fn read_password_bytes(reader: &mut BufReader<BoxedReader>) -> Result<String> {
        let mut bytes = Vec::new();
        loop {
            let byte = reader.read_u8().await.map_err(read_err)?;
            match byte {
                telnet::IAC => {
                    // Negotiation, not input: the command byte carries two
                    // argument bytes, swallow both.
                    reader.read_u8().await.map_err(read_err)?;
                    reader.read_u8().await.map_err(read_err)?;
                }
                b'\n' => break,
                b'\r' => {}
                _ => bytes.push(byte),
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Check whether the connection is still open
    pub fn is_connected(&self) -> bool {
        self.ident.read().connected
    }

    /// Close the connection. Idempotent, callable from any task; an
    /// in-flight read observes the closure and returns an error.
    pub fn close(&self) {
        {
            let mut ident = self.ident.write();
            if !ident.connected {
                return;
            }
            ident.connected = false;
            ident.state = ClientState::Disconnecting;
        }
        self.closed.send_replace(true);
        debug!(client_id = %self.id, "Client closed");
    }

    /// Flush and shut down the write half; best effort, used at teardown.
    pub async fn shutdown(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }

    /// Get the current session state
    pub fn state(&self) -> ClientState {
        self.ident.read().state
    }

    /// Set the session state
    pub fn set_state(&self, new_state: ClientState) {
        let old_state = {
            let mut ident = self.ident.write();
            let old = ident.state;
            ident.state = new_state;
            old
        };
        debug!(
            client_id = %self.id,
            old_state = %old_state,
            new_state = %new_state,
            "Client state changed"
        );
    }

    /// Get the authenticated player id
    pub fn player_id(&self) -> Option<String> {
        self.ident.read().player_id.clone()
    }

    /// Set the authenticated player id
    pub fn set_player_id(&self, player_id: &str) {
        self.ident.write().player_id = Some(player_id.to_string());
    }

    /// Get the selected character id
    pub fn character_id(&self) -> Option<String> {
        self.ident.read().character_id.clone()
    }

    /// Set the selected character id
    pub fn set_character_id(&self, character_id: &str) {
        self.ident.write().character_id = Some(character_id.to_string());
    }

    /// Start an account registration for the given username
    pub fn begin_registration(&self, username: String) {
        self.ident.write().pending = Some(PendingRegistration {
            username,
            email: None,
            password: None,
        });
    }

    /// Get a snapshot of the in-progress registration
    pub fn pending_registration(&self) -> Option<PendingRegistration> {
        self.ident.read().pending.clone()
    }

    /// Record the validated registration email
    pub fn set_pending_email(&self, email: String) {
        if let Some(pending) = self.ident.write().pending.as_mut() {
            pending.email = Some(email);
        }
    }

    /// Record the first password entry, awaiting confirmation
    pub fn set_pending_password(&self, password: String) {
        if let Some(pending) = self.ident.write().pending.as_mut() {
            pending.password = Some(password);
        }
    }

    /// Drop the first password entry after a failed confirmation
    pub fn clear_pending_password(&self) {
        if let Some(pending) = self.ident.write().pending.as_mut() {
            pending.password = None;
        }
    }

    /// Drop all registration scratch data
    pub fn clear_registration(&self) {
        self.ident.write().pending = None;
    }

    /// Update the last activity timestamp
    pub fn touch(&self) {
        self.ident.write().last_active = Instant::now();
    }

    /// Get the last activity time
    pub fn last_active(&self) -> Instant {
        self.ident.read().last_active
    }

    /// Get the duration since last activity
    pub fn idle_duration(&self) -> Duration {
        self.last_active().elapsed()
    }

    /// Check if the client has been idle longer than the given timeout
    pub fn is_idle(&self, max_idle: Duration) -> bool {
        self.idle_duration() > max_idle
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("state", &self.state())
            .field("connected", &self.is_connected())
            .field("idle_duration", &self.idle_duration())
            .finish()
    }
}

fn read_err(e: io::Error) -> IronmudError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        NetworkError::ConnectionClosed.into()
    } else {
        NetworkError::ReadError(e.to_string()).into()
    }
}

fn write_err(e: io::Error) -> IronmudError {
    NetworkError::WriteError(e.to_string()).into()
}
