//! # Session Client Library
//!
//! Client side of the two-player session protocol. A game embeds a
//! [`NetworkClient`], calls its `send_*` methods from gameplay code and drains
//! [`NetworkClient::poll_events`] once per frame to receive callbacks.
//!
//! ## Module Organization
//!
//! ### Session Module (`session`)
//! The connection state machine:
//! - `Disconnected → Connecting → Connected`
//! - then `ConfiguringGame` for the host or `AwaitingConfig` for the peer
//! - then `InGame`, toggling with `Paused`
//!
//! It also owns the host/non-host authorization checks, which run before anything
//! is sent.
//!
//! ### Events Module (`events`)
//! [`ClientEvent`] values produced by the state machine and the [`SessionCallbacks`]
//! trait they are dispatched to.
//!
//! ### Input Module (`input`)
//! Rate limiting for outgoing INPUT packets, one per 16ms by default.
//!
//! ### Network Module (`network`)
//! UDP socket plus three tasks per connection: a sender draining the outgoing queue,
//! a receiver filling the inbound queue, and a heartbeat timer. All three stop when
//! the connection is torn down.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::{ClientConfig, NetworkClient, SessionCallbacks};
//! use shared::InputBits;
//!
//! struct Game;
//!
//! impl SessionCallbacks for Game {
//!     fn on_input_received(&mut self, player_id: &str, frame: i64, bits: InputBits) {
//!         println!("{} pressed {} on frame {}", player_id, bits, frame);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = NetworkClient::new(ClientConfig::new("P2", "Bob"));
//!     client.connect("127.0.0.1:5555".parse()?).await?;
//!
//!     let mut game = Game;
//!     loop {
//!         client.poll_events(&mut game);
//!         if client.is_connected() {
//!             client.send_input(InputBits::RIGHT)?;
//!         }
//!         tokio::time::sleep(std::time::Duration::from_millis(16)).await;
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod input;
pub mod network;
pub mod session;

pub use config::ClientConfig;
pub use error::ClientError;
pub use events::{ClientEvent, SessionCallbacks};
pub use network::NetworkClient;
pub use session::{Session, SessionState};
