//! # Dungeon Survival Server Library
//!
//! Authoritative server for a cooperative top-down survival game. Players
//! share a procedurally generated dungeon and fight escalating waves of
//! pursuers that path-find toward them. Every room runs its own simulation;
//! clients only send inputs and render the snapshots they receive.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Movement, wall collision, combat, scoring and wave progression all happen
//! on the server. A room's [`game::Simulation`] is owned by exactly one task
//! and is never shared.
//!
//! ### Rooms
//! Clients join named rooms, start them from the lobby and leave at any time.
//! A room whose last member leaves is destroyed together with its tick loop.
//!
//! ### State Broadcasting
//! After every tick the room's snapshot (players, pursuers, projectiles,
//! score, wave) is sent to each player in that room.
//!
//! ## Architecture
//!
//! ```text
//! UDP receiver ──> main loop (ClientManager, RoomRegistry) ──> room commands
//!                     ^                                            |
//!                     |                                            v
//! UDP sender <── room output <──────────── per-room tick loop (Simulation)
//! ```
//!
//! - **Network Receiver**: deserializes packets and forwards them to the main loop
//! - **Main Loop**: sessions, room membership, starting and stopping rooms
//! - **Room Tick Loops**: one task per running room, driven by a fixed interval
//!   that uses the measured wall-clock delta
//! - **Network Sender**: delivers queued packets to client addresses
//! - **Timeout Checker**: drops silent clients
//!
//! ## Module Organization
//!
//! ### Simulation (`map`, `flow_field`, `physics`, `entity`, `spawner`, `game`)
//! - Room-and-corridor dungeon generation on a square grid
//! - Breadth-first cost field toward the tracked player, shared by all pursuers
//! - Circle-versus-wall-cell collision resolution
//! - Player, pursuer and projectile records
//! - Pluggable wave spawn strategies
//! - The per-tick update and snapshot
//!
//! ### Configuration (`config`)
//! Every tunable with a default, loadable from a RON file.
//!
//! ### Server Shell (`client_manager`, `registry`, `scheduler`, `network`)
//! Sessions, rooms, per-room tick tasks and UDP transport.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = Server::new("127.0.0.1:8080", ServerOptions::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! Running a simulation without the network:
//!
//! ```rust
//! use server::config::SimulationConfig;
//! use server::game::Simulation;
//!
//! let config = SimulationConfig { seed: Some(7), ..Default::default() };
//! let mut sim = Simulation::new(&[(1, "ada".to_string())], config);
//! sim.advance(1.0 / 30.0);
//! assert_eq!(sim.snapshot().wave, 1);
//! ```

pub mod client_manager;
pub mod config;
pub mod entity;
pub mod flow_field;
pub mod game;
pub mod map;
pub mod network;
pub mod physics;
pub mod registry;
pub mod scheduler;
pub mod spawner;
