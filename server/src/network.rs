//! Server network layer handling UDP communication and room routing

use crate::client_manager::ClientManager;
use crate::config::SimulationConfig;
use crate::game::Simulation;
use crate::registry::{LeaveOutcome, RoomError, RoomRegistry, StartedRoom};
use crate::scheduler::{RoomOutput, TickScheduler};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{sanitize_name, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION, TICK_RATE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

pub type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Runtime settings for [`Server`].
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Interval between room ticks.
    pub tick_duration: Duration,
    pub max_clients: usize,
    pub max_room_players: usize,
    /// Template every new room's simulation is created from.
    pub simulation: SimulationConfig,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_secs_f64(1.0 / TICK_RATE as f64),
            max_clients: 32,
            max_room_players: 4,
            simulation: SimulationConfig::default(),
        }
    }
}

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32 },
    Shutdown,
}

/// Messages sent from the main loop to the network sender
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    SendToClients {
        packet: Packet,
        client_ids: Vec<u32>,
    },
}

/// Main server routing clients into rooms and room output back to clients
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    rooms: RoomRegistry,
    scheduler: TickScheduler,
    simulation_config: SimulationConfig,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
    room_tx: mpsc::UnboundedSender<RoomOutput>,
    room_rx: mpsc::UnboundedReceiver<RoomOutput>,
}

impl Server {
    pub async fn new(addr: &str, options: ServerOptions) -> ServerResult<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();
        let (room_tx, room_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(options.max_clients))),
            rooms: RoomRegistry::new(options.max_room_players),
            scheduler: TickScheduler::new(options.tick_duration),
            simulation_config: options.simulation,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
            room_tx,
            room_rx,
        })
    }

    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Handle for stopping [`Server::run`] from another task.
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes the outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::SendToClients { packet, client_ids } => {
                        let addrs: Vec<(u32, SocketAddr)> = {
                            let clients_guard = clients.read().await;
                            client_ids
                                .iter()
                                .filter_map(|id| {
                                    clients_guard.get_client_addr(*id).map(|addr| (*id, addr))
                                })
                                .collect()
                        };

                        for (client_id, addr) in addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> ServerResult<()> {
        let data = serialize(packet)?;
        if data.len() > MAX_PACKET_SIZE {
            warn!(
                "Packet of {} bytes to {} exceeds {} bytes",
                data.len(),
                addr,
                MAX_PACKET_SIZE
            );
        }
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn send_to_clients(&self, packet: Packet, client_ids: Vec<u32>) {
        if client_ids.is_empty() {
            return;
        }
        if let Err(e) = self
            .game_tx
            .send(GameMessage::SendToClients { packet, client_ids })
        {
            error!("Failed to queue packet for clients: {}", e);
        }
    }

    fn send_error(&self, message: String, addr: SocketAddr) {
        self.send_packet(Packet::Error { message }, addr);
    }

    async fn client_for(&self, addr: SocketAddr) -> Option<u32> {
        let mut clients = self.clients.write().await;
        let client_id = clients.find_client_by_addr(addr)?;
        clients.touch(client_id);
        Some(client_id)
    }

    /// Processes one incoming packet
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if let Packet::Connect {
            client_version,
            name,
        } = packet
        {
            self.handle_connect(client_version, name, addr).await;
            return;
        }

        let Some(client_id) = self.client_for(addr).await else {
            debug!("Ignoring packet from unknown address {}", addr);
            return;
        };

        match packet {
            Packet::JoinRoom { room } => {
                let room = room.trim().to_string();
                if room.is_empty() {
                    self.send_error("Room name must not be empty".to_string(), addr);
                    return;
                }

                let name = {
                    let clients = self.clients.read().await;
                    clients.name_of(client_id).unwrap_or_default().to_string()
                };

                match self.rooms.join(client_id, &name, &room) {
                    Ok(players) => {
                        let members = self.rooms.members(&room);
                        self.send_to_clients(Packet::RoomJoined { room, players }, members);
                    }
                    Err(e) => self.send_error(e.to_string(), addr),
                }
            }

            Packet::StartGame => self.handle_start(client_id, addr),

            Packet::Input { sequence, input } => {
                let accepted = {
                    let mut clients = self.clients.write().await;
                    clients.accept_input(client_id, sequence)
                };

                if !accepted {
                    debug!(
                        "Dropped stale input {} from client {}",
                        sequence, client_id
                    );
                    return;
                }

                if let Err(e) = self.rooms.forward_input(client_id, input) {
                    debug!("Input from client {} not forwarded: {}", client_id, e);
                }
            }

            Packet::LeaveRoom => {
                if let Err(e) = self.handle_leave(client_id) {
                    self.send_error(e.to_string(), addr);
                }
            }

            Packet::Disconnect => {
                let _ = self.handle_leave(client_id);
                let mut clients = self.clients.write().await;
                clients.remove_client(&client_id);
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    async fn handle_connect(&mut self, client_version: u32, name: String, addr: SocketAddr) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            self.send_packet(
                Packet::Disconnected {
                    reason: format!(
                        "Protocol version mismatch: server {}, client {}",
                        PROTOCOL_VERSION, client_version
                    ),
                },
                addr,
            );
            return;
        }

        // Replace an existing session from the same address
        let existing_client_id = {
            let clients = self.clients.read().await;
            clients.find_client_by_addr(addr)
        };
        if let Some(existing_id) = existing_client_id {
            info!("Removing existing client {} from {}", existing_id, addr);
            let _ = self.handle_leave(existing_id);
            let mut clients = self.clients.write().await;
            clients.remove_client(&existing_id);
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            let client_id = clients.add_client(addr, name.clone());
            if let Some(id) = client_id {
                clients.set_name(id, sanitize_name(&name, id));
            }
            client_id
        };

        match client_id {
            Some(client_id) => self.send_packet(Packet::Connected { client_id }, addr),
            None => self.send_packet(
                Packet::Disconnected {
                    reason: "Server full".to_string(),
                },
                addr,
            ),
        }
    }

    fn handle_start(&mut self, client_id: u32, addr: SocketAddr) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let StartedRoom {
            room,
            generation,
            players,
        } = match self.rooms.start(client_id, command_tx) {
            Ok(started) => started,
            Err(e) => {
                self.send_error(e.to_string(), addr);
                return;
            }
        };

        // A finished loop may still hold the slot
        self.scheduler.cancel(&room);

        let simulation = Simulation::new(&players, self.simulation_config.clone());
        self.scheduler.start(
            room.clone(),
            generation,
            simulation,
            command_rx,
            self.room_tx.clone(),
        );

        let members = self.rooms.members(&room);
        self.send_to_clients(Packet::GameStarted { room }, members);
    }

    /// Removes a client from its room and stops the room's loop if it emptied.
    fn handle_leave(&mut self, client_id: u32) -> Result<LeaveOutcome, RoomError> {
        let outcome = self.rooms.leave(client_id)?;

        match &outcome {
            LeaveOutcome::Destroyed { room } => {
                self.scheduler.cancel(room);
            }
            LeaveOutcome::Left { room } => {
                let players = self.rooms.member_names(room);
                let members = self.rooms.members(room);
                self.send_to_clients(
                    Packet::RoomJoined {
                        room: room.clone(),
                        players,
                    },
                    members,
                );
            }
        }

        Ok(outcome)
    }

    fn handle_room_output(&mut self, output: RoomOutput) {
        match output {
            RoomOutput::Snapshot {
                room,
                generation,
                recipients,
                tick,
                snapshot,
            } => {
                if !self.rooms.is_current(&room, generation) {
                    debug!("Dropping snapshot from stale loop of room {}", room);
                    return;
                }
                let packet = Packet::GameState {
                    tick,
                    timestamp: timestamp_millis(),
                    snapshot,
                };
                self.send_to_clients(packet, recipients);
            }
            RoomOutput::Finished {
                room,
                generation,
                recipients,
                result,
            } => {
                if !self.rooms.finish(&room, generation) {
                    debug!(
                        "Ignoring result of room {} generation {}",
                        room, generation
                    );
                    return;
                }
                self.scheduler.prune();
                self.send_to_clients(Packet::GameOver { result }, recipients);
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> ServerResult<()> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut stats_interval = interval(STATS_INTERVAL);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("Client {} timed out", client_id);
                            let _ = self.handle_leave(client_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                Some(output) = self.room_rx.recv() => {
                    self.handle_room_output(output);
                },

                _ = stats_interval.tick() => {
                    let client_count = {
                        let clients = self.clients.read().await;
                        clients.len()
                    };

                    if client_count > 0 {
                        debug!(
                            "{} clients, {} rooms, {} running",
                            client_count,
                            self.rooms.room_count(),
                            self.scheduler.running_rooms()
                        );
                    }
                },
            }
        }

        self.scheduler.shutdown();
        Ok(())
    }
}

/// Milliseconds since the Unix epoch, saturating.
pub fn timestamp_millis() -> u64 {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    timestamp.min(u64::MAX as u128) as u64
}
