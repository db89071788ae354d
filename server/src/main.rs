use clap::Parser;
use log::{error, info};
use server::{Server, ServerConfig};
use shared::DEFAULT_PORT;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Milliseconds of silence before a player is dropped
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut config = ServerConfig::new(format!("{}:{}", args.host, args.port));
    config.heartbeat_timeout = Duration::from_millis(args.timeout_ms);

    info!("Starting server...");
    info!("Heartbeat timeout: {}ms", args.timeout_ms);

    let server = Server::bind(config).await?;
    let shutdown = server.shutdown_handle();
    let mut running = tokio::spawn(server.run());

    tokio::select! {
        result = &mut running => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task panicked: {}", e),
            }
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    shutdown.trigger();
    match running.await {
        Ok(result) => result?,
        Err(e) => error!("Server task panicked: {}", e),
    }

    Ok(())
}
