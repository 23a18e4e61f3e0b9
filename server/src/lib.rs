//! # Durak Server Library
//!
//! This library provides the authoritative server for a multiplayer Durak
//! card game. It enforces the rules, rotates attacker and defender roles,
//! manages the deck and the cards on the table, and pushes the table to every
//! connected player after each accepted move.
//!
//! ## Architecture Design
//!
//! ### Single Coordinator
//! All game and membership state is owned by one task, the coordinator loop in
//! [`network::Server::run`]. Connection tasks never touch that state; they
//! send [`network::ServerMessage`]s into a bounded queue and the coordinator
//! handles them one at a time in arrival order. The rules engine and the hub
//! are therefore plain synchronous code without locks.
//!
//! ### Per-Connection Workers
//! Each WebSocket connection gets a reader task that decodes JSON commands and
//! a writer task that relays outbound payloads. A broken socket or a malformed
//! message ends the session and unregisters the player.
//!
//! ### Slow Consumers
//! Broadcasts never wait. A session whose outbound queue is full is dropped
//! instead of holding up everyone else.
//!
//! ## Module Organization
//!
//! - [`ring`]: constant-time turn-order ring of player handles
//! - [`hub`]: session registry and non-blocking broadcaster
//! - [`deck`]: draw pile
//! - [`game`]: the rules state machine
//! - [`session`]: per-connection read and write workers
//! - [`network`]: listener, accept loop and coordinator
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod deck;
pub mod game;
pub mod hub;
pub mod network;
pub mod ring;
pub mod session;

use std::fmt;

/// Opaque handle for one connected player, assigned by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", self.0)
    }
}
