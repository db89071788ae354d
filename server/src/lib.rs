//! # Session Server Library
//!
//! Relay server for two-player fighting-game sessions over UDP. The server does not
//! simulate anything: it admits up to two players, announces the match once both
//! have joined, and forwards inputs and match-flow messages between them.
//!
//! ## Responsibilities
//!
//! ### Connection Registry
//! Tracks each player by source address together with their id, display name,
//! host flag and last-heard time. A full registry rejects further CONNECTs with
//! "Server full"; an id already in use is rejected as well.
//!
//! ### Relay
//! INPUT is rebroadcast to every player as INPUT_BROADCAST, the sender included.
//! GAME_CONFIG, PAUSE_GAME and RESUME_GAME go to everyone. REMATCH, NEXT_ROUND and
//! WAITING_FOR_HOST go to the other player only. STATE_UPDATE is stored as the
//! sender's latest snapshot and not forwarded.
//!
//! ### Liveness
//! Any packet from a registered address counts as proof of life. A sweep runs every
//! second and evicts connections that have been silent for longer than the heartbeat
//! timeout, announcing each eviction with PLAYER_DISCONNECTED.
//!
//! ## Module Organization
//!
//! - `registry`: connection records, admission and eviction
//! - `session`: packet handling; turns each received packet into outgoing messages
//! - `network`: UDP socket, receiver/sender/sweeper tasks and the main loop
//! - `config`: bind address and timing knobs
//! - `error`: startup and socket errors
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::new("0.0.0.0:5555")).await?;
//!     let shutdown = server.shutdown_handle();
//!
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         shutdown.trigger();
//!     });
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod network;
pub mod registry;
pub mod session;

pub use config::ServerConfig;
pub use error::ServerError;
pub use network::Server;
pub use session::{GameMessage, SessionManager};
