use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::events::{ClientEvent, SessionCallbacks};
use crate::input::InputThrottle;
use crate::session::{Session, SessionState};
use log::{debug, error, info, warn};
use shared::{
    decode, encode, shutdown, GameConfig, InputBits, Packet, PlayerState, Shutdown,
    ShutdownHandle, MAX_PACKET_SIZE,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

type LaunchHandler = Box<dyn FnMut(&GameConfig) + Send>;

/// Socket and tasks belonging to one connection attempt
struct Link {
    server_addr: SocketAddr,
    local_addr: SocketAddr,
    outgoing: Option<mpsc::UnboundedSender<Packet>>,
    inbound: mpsc::UnboundedReceiver<Packet>,
    shutdown: ShutdownHandle,
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for Link {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Client side of a session: owns the socket tasks and the session state machine.
///
/// Network tasks only move packets. Everything the game sees comes out of
/// [`NetworkClient::poll_events`], called from the game's update loop.
pub struct NetworkClient {
    config: ClientConfig,
    session: Session,
    throttle: InputThrottle,
    link: Option<Link>,
    launch_handler: Option<LaunchHandler>,
}

impl NetworkClient {
    pub fn new(config: ClientConfig) -> Self {
        let session = Session::new(config.player_id.clone(), config.player_name.clone());
        let throttle = InputThrottle::new(config.input_interval);
        Self {
            config,
            session,
            throttle,
            link: None,
            launch_handler: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_host(&self) -> bool {
        self.session.is_host()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.link.as_ref().map(|link| link.server_addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.link.as_ref().map(|link| link.local_addr)
    }

    /// Called with the host's config when a non-host receives GAME_CONFIG, so the
    /// embedding game can switch from lobby to fight.
    pub fn set_launch_handler(&mut self, handler: impl FnMut(&GameConfig) + Send + 'static) {
        self.launch_handler = Some(Box::new(handler));
    }

    /// Opens a socket, starts the network tasks and sends CONNECT.
    pub async fn connect(&mut self, server_addr: SocketAddr) -> Result<(), ClientError> {
        if self.link.is_some() || self.session.state() != SessionState::Disconnected {
            return Err(ClientError::AlreadyConnected);
        }

        let bind_addr = if server_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
        let local_addr = socket.local_addr()?;

        let connect = self.session.begin_connect(Instant::now())?;
        self.throttle.reset();

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = shutdown::channel();

        let tasks = vec![
            spawn_sender(Arc::clone(&socket), server_addr, outgoing_rx),
            spawn_receiver(
                socket,
                server_addr,
                inbound_tx,
                shutdown.subscribe(),
                self.config.recv_timeout,
            ),
            spawn_heartbeat(
                outgoing_tx.clone(),
                self.session.player_id().to_string(),
                self.config.heartbeat_interval,
                shutdown.subscribe(),
            ),
        ];

        info!("Connecting to {} from {}", server_addr, local_addr);
        let link = Link {
            server_addr,
            local_addr,
            outgoing: Some(outgoing_tx),
            inbound: inbound_rx,
            shutdown,
            tasks,
        };
        self.link = Some(link);

        self.send(connect)
    }

    /// Drains received packets through the session and dispatches the resulting
    /// events. Returns how many events were dispatched.
    pub fn poll_events(&mut self, callbacks: &mut dyn SessionCallbacks) -> usize {
        if self
            .session
            .connect_timed_out(Instant::now(), self.config.connect_timeout)
        {
            warn!(
                "No answer from server after {}ms",
                self.config.connect_timeout.as_millis()
            );
            self.drop_connection();
            ClientEvent::Disconnected {
                reason: "Connection timed out".to_string(),
            }
            .dispatch(callbacks);
            return 1;
        }

        let mut dispatched = 0;
        loop {
            let received = match self.link.as_mut() {
                Some(link) => link.inbound.try_recv(),
                None => break,
            };

            let packet = match received {
                Ok(packet) => packet,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    error!("Network receiver stopped unexpectedly");
                    self.drop_connection();
                    ClientEvent::Disconnected {
                        reason: "Connection lost".to_string(),
                    }
                    .dispatch(callbacks);
                    dispatched += 1;
                    break;
                }
            };

            let Some(event) = self.session.apply(packet) else {
                continue;
            };

            if self.session.state() == SessionState::Disconnected {
                // Rejected: release the socket so connect can be retried
                self.link = None;
            }

            event.dispatch(callbacks);
            dispatched += 1;

            if let ClientEvent::GameConfig(config) = &event {
                if !self.session.is_host() {
                    if let Some(handler) = self.launch_handler.as_mut() {
                        handler(config);
                    }
                }
            }
        }

        dispatched
    }

    /// Sends an INPUT for the next frame. Returns `Ok(false)` when the send was
    /// skipped by the rate limit; the frame number only advances on a real send.
    pub fn send_input(&mut self, input_bits: InputBits) -> Result<bool, ClientError> {
        self.session.require_connected()?;

        if !self.throttle.try_acquire(Instant::now()) {
            return Ok(false);
        }

        let frame_number = self.session.next_frame();
        self.send(Packet::Input {
            player_id: self.session.player_id().to_string(),
            frame_number,
            input_bits,
        })?;
        Ok(true)
    }

    pub fn send_state_update(&mut self, state: PlayerState) -> Result<(), ClientError> {
        self.session.require_connected()?;
        self.send(Packet::StateUpdate {
            player_id: self.session.player_id().to_string(),
            state,
        })
    }

    pub fn send_game_config(&mut self, config: GameConfig) -> Result<(), ClientError> {
        self.session.authorize_host_only("send_game_config")?;
        self.session.require_connected()?;
        info!(
            "Sending game config: {} vs {} on {}",
            config.p1_character, config.p2_character, config.map_file
        );
        self.send(Packet::GameConfig(config))
    }

    pub fn send_pause_request(&mut self) -> Result<(), ClientError> {
        self.session
            .require_state("send_pause_request", SessionState::InGame)?;
        self.send(Packet::PauseGame {
            player_id: self.session.player_id().to_string(),
        })
    }

    pub fn send_resume_request(&mut self) -> Result<(), ClientError> {
        self.session
            .require_state("send_resume_request", SessionState::Paused)?;
        self.send(Packet::ResumeGame {
            player_id: self.session.player_id().to_string(),
        })
    }

    pub fn send_rematch_request(&mut self) -> Result<(), ClientError> {
        self.session.authorize_host_only("send_rematch_request")?;
        self.session.require_connected()?;
        self.send(Packet::Rematch {
            player_id: self.session.player_id().to_string(),
        })
    }

    pub fn send_next_round(
        &mut self,
        round: i32,
        p1_wins: i32,
        p2_wins: i32,
    ) -> Result<(), ClientError> {
        self.session.authorize_host_only("send_next_round")?;
        self.session.require_connected()?;
        self.send(Packet::NextRound {
            player_id: self.session.player_id().to_string(),
            round,
            p1_wins,
            p2_wins,
        })
    }

    pub fn send_waiting_for_host(&mut self) -> Result<(), ClientError> {
        self.session
            .authorize_non_host_only("send_waiting_for_host")?;
        self.session.require_connected()?;
        self.send(Packet::WaitingForHost {
            player_id: self.session.player_id().to_string(),
        })
    }

    /// Sends DISCONNECT, stops the network tasks and closes the socket.
    /// Does nothing if there is no connection.
    pub async fn disconnect(&mut self) -> Result<(), ClientError> {
        let Some(mut link) = self.link.take() else {
            self.session.reset();
            return Ok(());
        };

        if let Some(outgoing) = link.outgoing.take() {
            let packet = Packet::Disconnect {
                player_id: self.session.player_id().to_string(),
            };
            if outgoing.send(packet).is_err() {
                warn!("Could not queue DISCONNECT; sender already stopped");
            }
        }

        link.shutdown.trigger();
        for task in std::mem::take(&mut link.tasks) {
            if let Err(e) = task.await {
                error!("Client task failed: {}", e);
            }
        }

        info!("Disconnected from {}", link.server_addr);
        self.session.reset();
        Ok(())
    }

    fn send(&self, packet: Packet) -> Result<(), ClientError> {
        let outgoing = self
            .link
            .as_ref()
            .and_then(|link| link.outgoing.as_ref())
            .ok_or(ClientError::NotConnected)?;
        outgoing.send(packet).map_err(|_| ClientError::NotConnected)
    }

    fn drop_connection(&mut self) {
        self.link = None;
        self.session.reset();
    }
}

/// Encodes and sends queued packets until every sender handle is gone, so a
/// DISCONNECT queued before shutdown still goes out.
fn spawn_sender(
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
    mut outgoing: mpsc::UnboundedReceiver<Packet>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(packet) = outgoing.recv().await {
            let data = match encode(&packet) {
                Ok(data) => data,
                Err(e) => {
                    error!("Failed to encode {}: {}", packet.packet_type(), e);
                    continue;
                }
            };

            if let Err(e) = socket.send_to(&data, server_addr).await {
                error!("Failed to send {}: {}", packet.packet_type(), e);
            }
        }
        debug!("Client sender stopped");
    })
}

fn spawn_receiver(
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
    inbound: mpsc::UnboundedSender<Packet>,
    shutdown: Shutdown,
    recv_timeout: Duration,
) -> JoinHandle<()> {
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

            if addr != server_addr {
                debug!("Ignoring datagram from {}", addr);
                continue;
            }

            match decode(&buffer[..len]) {
                Ok(packet) => {
                    if inbound.send(packet).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Dropping datagram from server: {}", e),
            }
        }
        debug!("Client receiver stopped");
    })
}

fn spawn_heartbeat(
    outgoing: mpsc::UnboundedSender<Packet>,
    player_id: String,
    heartbeat_interval: Duration,
    mut shutdown: Shutdown,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip the first tick since it fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.wait() => break,
            }

            let heartbeat = Packet::Heartbeat {
                player_id: player_id.clone(),
            };
            if outgoing.send(heartbeat).is_err() {
                break;
            }
        }
        debug!("Heartbeat stopped");
    })
}
