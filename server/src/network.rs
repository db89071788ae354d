//! Server network layer handling UDP communications and the heartbeat sweep

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::session::{GameMessage, SessionManager};
use log::{debug, error, info, warn};
use shared::{decode, encode, shutdown, Packet, Shutdown, ShutdownHandle, MAX_PACKET_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
}

/// Two-player session server
pub struct Server {
    socket: Arc<UdpSocket>,
    session: Arc<RwLock<SessionManager>>,
    config: ServerConfig,
    shutdown: ShutdownHandle,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let socket = UdpSocket::bind(&config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = shutdown::channel();

        Ok(Server {
            socket: Arc::new(socket),
            session: Arc::new(RwLock::new(SessionManager::new(
                config.max_players,
                config.heartbeat_timeout,
            ))),
            config,
            shutdown,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    /// Handle that stops [`Server::run`] from any task
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Shared view of the session state, for inspection
    pub fn session(&self) -> Arc<RwLock<SessionManager>> {
        Arc::clone(&self.session)
    }

    /// Spawns task that listens for incoming packets, waking every `recv_timeout`
    /// to check for shutdown
    fn spawn_network_receiver(&self) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();
        let shutdown = self.shutdown.subscribe();
        let recv_timeout = self.config.recv_timeout;

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];

            while !shutdown.is_triggered() {
                let received = timeout(recv_timeout, socket.recv_from(&mut buffer)).await;
                let (len, addr) = match received {
                    Err(_) => continue,
                    Ok(Ok(received)) => received,
                    Ok(Err(e)) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        continue;
                    }
                };

                match decode(&buffer[..len]) {
                    Ok(packet) => {
                        if server_tx
                            .send(ServerMessage::PacketReceived { packet, addr })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => warn!("Dropping datagram from {}: {}", addr, e),
                }
            }
            debug!("Network receiver stopped");
        })
    }

    /// Spawns task that processes the outgoing packet queue
    fn spawn_network_sender(&mut self) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    message = game_rx.recv() => message,
                    _ = shutdown.wait() => None,
                };
                let Some(message) = message else {
                    break;
                };

                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        send_to_all(&socket, &packet, &[addr]).await;
                    }
                    GameMessage::BroadcastPacket { packet, recipients } => {
                        send_to_all(&socket, &packet, &recipients).await;
                    }
                }
            }
            debug!("Network sender stopped");
        })
    }

    /// Spawns task that evicts silent connections every `sweep_interval`
    fn spawn_heartbeat_sweeper(&self) -> JoinHandle<()> {
        let session = Arc::clone(&self.session);
        let game_tx = self.game_tx.clone();
        let mut shutdown = self.shutdown.subscribe();
        let sweep_interval = self.config.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.wait() => break,
                }

                let messages = session.write().await.sweep(Instant::now());
                for message in messages {
                    if game_tx.send(message).is_err() {
                        return;
                    }
                }
            }
            debug!("Heartbeat sweeper stopped");
        })
    }

    /// Main server loop: dispatches received packets until shutdown
    pub async fn run(mut self) -> Result<(), ServerError> {
        let tasks = vec![
            self.spawn_network_receiver(),
            self.spawn_network_sender(),
            self.spawn_heartbeat_sweeper(),
        ];
        let mut shutdown: Shutdown = self.shutdown.subscribe();

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            debug!("{} from {}", packet.packet_type(), addr);
                            let messages = self
                                .session
                                .write()
                                .await
                                .handle_packet(packet, addr, Instant::now());
                            for message in messages {
                                if let Err(e) = self.game_tx.send(message) {
                                    error!("Failed to queue packet for sending: {}", e);
                                }
                            }
                        }
                        None => break,
                    }
                },
                _ = shutdown.wait() => break,
            }
        }

        info!("Server shutting down");
        self.shutdown.trigger();
        for task in tasks {
            if let Err(e) = task.await {
                error!("Server task failed: {}", e);
            }
        }

        Ok(())
    }
}

async fn send_to_all(socket: &UdpSocket, packet: &Packet, recipients: &[SocketAddr]) {
    let data = match encode(packet) {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to encode {}: {}", packet.packet_type(), e);
            return;
        }
    };

    for addr in recipients {
        if let Err(e) = socket.send_to(&data, addr).await {
            error!("Failed to send {} to {}: {}", packet.packet_type(), addr, e);
        }
    }
}
