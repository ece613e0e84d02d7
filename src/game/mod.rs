//! Game domain module
//!
//! Player accounts, characters with their race/class tables, and the command
//! engine the session driver forwards in-game input to.

pub mod character;
pub mod engine;
pub mod parser;
pub mod player;

pub use character::{Character, Class, Race};
pub use engine::{Engine, GameEngine};
pub use player::{AccountStatus, Player};
