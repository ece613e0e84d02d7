//! Telnet control sequences
//!
//! Only the handful of bytes the server actually emits or strips. Echo
//! suppression for password entry works by announcing `IAC WILL ECHO`
//! (the server claims responsibility for echoing, so the client stops) and
//! handing it back with `IAC WONT ECHO` afterwards. Negotiation sequences a
//! client sends in the meantime are three bytes long: the IAC marker, a
//! command byte, and an option byte.

/// Interpret As Command marker
pub const IAC: u8 = 255;

/// Sender wants to enable an option on its side
pub const WILL: u8 = 251;

/// Sender refuses to enable an option on its side
pub const WONT: u8 = 252;

/// The ECHO option (RFC 857)
pub const ECHO: u8 = 1;

/// Announce that the server handles echo; the client stops local echo.
pub const SUPPRESS_ECHO: [u8; 3] = [IAC, WILL, ECHO];

/// Hand echo back to the client.
pub const RESTORE_ECHO: [u8; 3] = [IAC, WONT, ECHO];
