//! Session events and the callback surface the embedding game implements.
//!
//! Network tasks never call into game code directly. Packets are queued, turned into
//! [`ClientEvent`]s by the session state machine, and dispatched to a
//! [`SessionCallbacks`] implementation from the game's own update loop via
//! [`crate::NetworkClient::poll_events`].

use shared::{GameConfig, InputBits};

/// Callbacks invoked on the game's update loop. Every method defaults to a no-op.
pub trait SessionCallbacks {
    /// The server accepted our CONNECT.
    fn on_connected(&mut self) {}

    /// The connection ended: rejected, timed out or lost.
    fn on_disconnected(&mut self, _reason: &str) {}

    /// Both players have joined. The host should now send the game config.
    fn on_game_start(&mut self, _player_ids: &[String]) {}

    fn on_input_received(&mut self, _player_id: &str, _frame_number: i64, _input_bits: InputBits) {}

    fn on_player_disconnected(&mut self, _player_id: &str) {}

    fn on_game_config(&mut self, _config: &GameConfig) {}

    fn on_pause_game(&mut self, _paused_by: &str) {}

    fn on_resume_game(&mut self) {}

    /// Non-host only.
    fn on_rematch_request(&mut self) {}

    /// Non-host only.
    fn on_next_round(&mut self, _round: i32, _p1_wins: i32, _p2_wins: i32) {}

    /// Host only.
    fn on_waiting_for_host(&mut self) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected,
    Disconnected {
        reason: String,
    },
    GameStart {
        player_ids: Vec<String>,
    },
    InputReceived {
        player_id: String,
        frame_number: i64,
        input_bits: InputBits,
    },
    PlayerDisconnected {
        player_id: String,
    },
    GameConfig(GameConfig),
    PauseGame {
        paused_by: String,
    },
    ResumeGame,
    RematchRequest,
    NextRound {
        round: i32,
        p1_wins: i32,
        p2_wins: i32,
    },
    WaitingForHost,
}

impl ClientEvent {
    pub fn dispatch(&self, callbacks: &mut dyn SessionCallbacks) {
        match self {
            ClientEvent::Connected => callbacks.on_connected(),
            ClientEvent::Disconnected { reason } => callbacks.on_disconnected(reason),
            ClientEvent::GameStart { player_ids } => callbacks.on_game_start(player_ids),
            ClientEvent::InputReceived {
                player_id,
                frame_number,
                input_bits,
            } => callbacks.on_input_received(player_id, *frame_number, *input_bits),
            ClientEvent::PlayerDisconnected { player_id } => {
                callbacks.on_player_disconnected(player_id)
            }
            ClientEvent::GameConfig(config) => callbacks.on_game_config(config),
            ClientEvent::PauseGame { paused_by } => callbacks.on_pause_game(paused_by),
            ClientEvent::ResumeGame => callbacks.on_resume_game(),
            ClientEvent::RematchRequest => callbacks.on_rematch_request(),
            ClientEvent::NextRound {
                round,
                p1_wins,
                p2_wins,
            } => callbacks.on_next_round(*round, *p1_wins, *p2_wins),
            ClientEvent::WaitingForHost => callbacks.on_waiting_for_host(),
        }
    }
}
