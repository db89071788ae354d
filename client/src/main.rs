use clap::Parser;
use client::{ClientConfig, NetworkClient, SessionCallbacks, SessionState};
use log::{error, info, warn};
use rand::Rng;
use shared::{GameConfig, InputBits, PlayerState, MAX_HEALTH, STAGE_WIDTH};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:5555")]
    server: String,

    /// Player id; P1 is the host
    #[arg(short = 'i', long, default_value = "P1")]
    player_id: String,

    /// Display name sent with CONNECT
    #[arg(short = 'n', long, default_value = "Bot")]
    name: String,

    /// Stop after this many frames in game (0 runs until Ctrl+C)
    #[arg(short = 'f', long, default_value = "600")]
    frames: u64,

    /// Player one character, sent when hosting
    #[arg(long, default_value = "RYU")]
    p1_char: String,

    /// Player two character, sent when hosting
    #[arg(long, default_value = "KEN")]
    p2_char: String,

    /// Stage file, sent when hosting
    #[arg(long, default_value = "map1")]
    map: String,
}

/// Logs every callback and records what the main loop needs to act on
#[derive(Default)]
struct Bot {
    game_started: bool,
    disconnected: bool,
}

impl SessionCallbacks for Bot {
    fn on_connected(&mut self) {
        info!("Connected");
    }

    fn on_disconnected(&mut self, reason: &str) {
        warn!("Disconnected: {}", reason);
        self.disconnected = true;
    }

    fn on_game_start(&mut self, player_ids: &[String]) {
        info!("Game start: {}", player_ids.join(" vs "));
        self.game_started = true;
    }

    fn on_input_received(&mut self, player_id: &str, frame_number: i64, input_bits: InputBits) {
        if frame_number % 60 == 0 {
            info!("{} frame {}: {}", player_id, frame_number, input_bits);
        }
    }

    fn on_player_disconnected(&mut self, player_id: &str) {
        info!("{} left", player_id);
    }

    fn on_game_config(&mut self, config: &GameConfig) {
        info!(
            "Fight: {} vs {} on {}",
            config.p1_character, config.p2_character, config.map_file
        );
    }

    fn on_pause_game(&mut self, paused_by: &str) {
        info!("Paused by {}", paused_by);
    }

    fn on_resume_game(&mut self) {
        info!("Resumed");
    }

    fn on_rematch_request(&mut self) {
        info!("Host asked for a rematch");
    }

    fn on_next_round(&mut self, round: i32, p1_wins: i32, p2_wins: i32) {
        info!("Round {} ({}-{})", round, p1_wins, p2_wins);
    }

    fn on_waiting_for_host(&mut self) {
        info!("Peer is waiting for us");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let server_addr = args.server.parse()?;

    info!("Starting client...");
    info!("Connecting to: {} as {}", args.server, args.player_id);

    let mut client = NetworkClient::new(ClientConfig::new(&args.player_id, &args.name));
    client.set_launch_handler(|config| {
        info!("Launching fight on {}", config.map_file);
    });
    client.connect(server_addr).await?;

    let mut bot = Bot::default();
    let mut rng = rand::thread_rng();
    let mut ticker = interval(Duration::from_millis(16));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut frames_played = 0u64;
    let mut x = STAGE_WIDTH / 2.0;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut ctrl_c => {
                info!("Received Ctrl+C, shutting down gracefully...");
                break;
            }
        }

        client.poll_events(&mut bot);
        if bot.disconnected {
            break;
        }

        if bot.game_started {
            bot.game_started = false;
            let result = if client.is_host() {
                client.send_game_config(GameConfig::new(&args.p1_char, &args.p2_char, &args.map))
            } else {
                client.send_waiting_for_host()
            };
            if let Err(e) = result {
                error!("Failed to send lobby message: {}", e);
            }
        }

        if client.state() != SessionState::InGame {
            continue;
        }

        let bits = InputBits::from_bits(rng.gen_range(0..0x200));
        if let Err(e) = client.send_input(bits) {
            error!("Failed to send input: {}", e);
        }

        if bits.contains(InputBits::LEFT) {
            x -= 4.0;
        }
        if bits.contains(InputBits::RIGHT) {
            x += 4.0;
        }
        x = x.clamp(0.0, STAGE_WIDTH);

        frames_played += 1;
        if frames_played % 30 == 0 {
            let state = PlayerState::new(x, 0.0, MAX_HEALTH, "idle", (frames_played % 8) as i32);
            if let Err(e) = client.send_state_update(state) {
                error!("Failed to send state update: {}", e);
            }
        }

        if args.frames > 0 && frames_played >= args.frames {
            info!("Played {} frames", frames_played);
            break;
        }
    }

    client.disconnect().await?;
    Ok(())
}
