//! Room registry
//!
//! Maps client sessions to named rooms and tracks each room's phase:
//!
//! ```text
//! lobby --start--> playing --all players dead--> gameOver --start--> playing
//!   \                 \                              \
//!    +-----------------+--- last member leaves ------+--> destroyed
//! ```
//!
//! A room in `playing` holds the command sender of its tick loop; membership
//! changes and inputs are forwarded through it. Every start bumps the room's
//! generation, and loop output is only honoured for the current generation.
//! The registry itself never touches a simulation.

use crate::scheduler::RoomCommand;
use log::{debug, info};
use shared::InputState;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("room {0} not found")]
    RoomNotFound(String),
    #[error("room {0} is already running")]
    RoomAlreadyRunning(String),
    #[error("room {0} is full")]
    RoomFull(String),
    #[error("room {0} has finished")]
    RoomFinished(String),
    #[error("client {0} is not in a room")]
    NotInRoom(u32),
    #[error("already in room {0}")]
    AlreadyInRoom(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Lobby,
    Playing,
    GameOver,
}

#[derive(Debug)]
pub struct Room {
    pub id: String,
    pub phase: RoomPhase,
    /// Client id to display name.
    pub members: BTreeMap<u32, String>,
    /// Start counter of the loop that currently owns this room.
    pub generation: u64,
    commands: Option<UnboundedSender<RoomCommand>>,
}

impl Room {
    fn new(id: String) -> Self {
        Self {
            id,
            phase: RoomPhase::Lobby,
            members: BTreeMap::new(),
            generation: 0,
            commands: None,
        }
    }

    fn send(&self, command: RoomCommand) {
        if let Some(commands) = &self.commands {
            if commands.send(command).is_err() {
                debug!("Room {} tick loop is gone, command dropped", self.id);
            }
        }
    }

    pub fn member_names(&self) -> Vec<String> {
        self.members.values().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The client left; other members remain.
    Left { room: String },
    /// The client was the last member and the room was removed.
    Destroyed { room: String },
}

/// A room that was just moved to `playing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedRoom {
    pub room: String,
    pub generation: u64,
    pub players: Vec<(u32, String)>,
}

#[derive(Debug)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    membership: HashMap<u32, String>,
    max_players_per_room: usize,
    next_generation: u64,
}

impl RoomRegistry {
    pub fn new(max_players_per_room: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            membership: HashMap::new(),
            max_players_per_room,
            next_generation: 1,
        }
    }

    /// Joins `room_id`, creating it in the lobby phase if needed.
    ///
    /// Joining a room that is already playing adds the client to the running
    /// simulation. Returns the member names after the join.
    pub fn join(
        &mut self,
        client_id: u32,
        name: &str,
        room_id: &str,
    ) -> Result<Vec<String>, RoomError> {
        if let Some(current) = self.membership.get(&client_id) {
            if current != room_id {
                return Err(RoomError::AlreadyInRoom(current.clone()));
            }
            return self
                .rooms
                .get(room_id)
                .map(Room::member_names)
                .ok_or_else(|| RoomError::RoomNotFound(room_id.to_string()));
        }

        let room = self.rooms.entry(room_id.to_string()).or_insert_with(|| {
            info!("Created room {}", room_id);
            Room::new(room_id.to_string())
        });

        if room.phase == RoomPhase::GameOver {
            return Err(RoomError::RoomFinished(room_id.to_string()));
        }
        if room.members.len() >= self.max_players_per_room {
            return Err(RoomError::RoomFull(room_id.to_string()));
        }

        room.members.insert(client_id, name.to_string());
        if room.phase == RoomPhase::Playing {
            room.send(RoomCommand::AddPlayer {
                id: client_id,
                name: name.to_string(),
            });
        }
        self.membership.insert(client_id, room_id.to_string());

        info!(
            "Client {} joined room {} ({} members)",
            client_id,
            room_id,
            room.members.len()
        );
        Ok(room.member_names())
    }

    /// Moves the caller's room to `playing` and installs its command sender.
    ///
    /// Returns the room id, its new generation and its members for building
    /// the simulation.
    pub fn start(
        &mut self,
        client_id: u32,
        commands: UnboundedSender<RoomCommand>,
    ) -> Result<StartedRoom, RoomError> {
        let room_id = self
            .membership
            .get(&client_id)
            .ok_or(RoomError::NotInRoom(client_id))?;
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;

        if room.phase == RoomPhase::Playing {
            return Err(RoomError::RoomAlreadyRunning(room_id.clone()));
        }

        room.phase = RoomPhase::Playing;
        room.commands = Some(commands);
        room.generation = self.next_generation;
        self.next_generation += 1;
        info!(
            "Room {} started by client {} (generation {})",
            room_id, client_id, room.generation
        );

        let players = room
            .members
            .iter()
            .map(|(id, name)| (*id, name.clone()))
            .collect();
        Ok(StartedRoom {
            room: room_id.clone(),
            generation: room.generation,
            players,
        })
    }

    /// Removes the client from its room, destroying the room when it empties.
    pub fn leave(&mut self, client_id: u32) -> Result<LeaveOutcome, RoomError> {
        let room_id = self
            .membership
            .remove(&client_id)
            .ok_or(RoomError::NotInRoom(client_id))?;
        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;

        room.members.remove(&client_id);
        room.send(RoomCommand::RemovePlayer { id: client_id });
        info!("Client {} left room {}", client_id, room_id);

        if room.members.is_empty() {
            self.rooms.remove(&room_id);
            info!("Room {} is empty and was removed", room_id);
            return Ok(LeaveOutcome::Destroyed { room: room_id });
        }

        Ok(LeaveOutcome::Left { room: room_id })
    }

    /// Marks a room's game as over and drops its command sender.
    ///
    /// Only the loop of the current generation can finish a playing room;
    /// results from cancelled loops are ignored and return false.
    pub fn finish(&mut self, room_id: &str, generation: u64) -> bool {
        match self.rooms.get_mut(room_id) {
            Some(room) if room.phase == RoomPhase::Playing && room.generation == generation => {
                room.phase = RoomPhase::GameOver;
                room.commands = None;
                true
            }
            _ => false,
        }
    }

    /// Whether `generation` is the loop currently playing `room_id`.
    pub fn is_current(&self, room_id: &str, generation: u64) -> bool {
        self.rooms
            .get(room_id)
            .map(|room| room.phase == RoomPhase::Playing && room.generation == generation)
            .unwrap_or(false)
    }

    /// Forwards input to the client's running room. Inputs for rooms that are
    /// not playing are ignored.
    pub fn forward_input(&self, client_id: u32, input: InputState) -> Result<(), RoomError> {
        let room_id = self
            .membership
            .get(&client_id)
            .ok_or(RoomError::NotInRoom(client_id))?;
        let room = self
            .rooms
            .get(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;

        if room.phase == RoomPhase::Playing {
            room.send(RoomCommand::Input {
                id: client_id,
                input,
            });
        }
        Ok(())
    }

    pub fn room_of(&self, client_id: u32) -> Option<&str> {
        self.membership.get(&client_id).map(String::as_str)
    }

    pub fn members(&self, room_id: &str) -> Vec<u32> {
        self.rooms
            .get(room_id)
            .map(|room| room.members.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn member_names(&self, room_id: &str) -> Vec<String> {
        self.rooms
            .get(room_id)
            .map(Room::member_names)
            .unwrap_or_default()
    }

    pub fn phase(&self, room_id: &str) -> Option<RoomPhase> {
        self.rooms.get(room_id).map(|room| room.phase)
    }

    pub fn generation(&self, room_id: &str) -> Option<u64> {
        self.rooms.get(room_id).map(|room| room.generation)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn channel() -> (UnboundedSender<RoomCommand>, UnboundedReceiver<RoomCommand>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_join_creates_lobby() {
        let mut registry = RoomRegistry::new(4);

        let names = registry.join(1, "ada", "alpha").unwrap();

        assert_eq!(names, vec!["ada".to_string()]);
        assert_eq!(registry.phase("alpha"), Some(RoomPhase::Lobby));
        assert_eq!(registry.room_of(1), Some("alpha"));
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn test_join_same_room_twice_is_harmless() {
        let mut registry = RoomRegistry::new(4);
        registry.join(1, "ada", "alpha").unwrap();

        assert_eq!(registry.join(1, "ada", "alpha").unwrap().len(), 1);
        assert_eq!(
            registry.join(1, "ada", "beta"),
            Err(RoomError::AlreadyInRoom("alpha".to_string()))
        );
    }

    #[test]
    fn test_room_full() {
        let mut registry = RoomRegistry::new(2);
        registry.join(1, "a", "alpha").unwrap();
        registry.join(2, "b", "alpha").unwrap();

        assert_eq!(
            registry.join(3, "c", "alpha"),
            Err(RoomError::RoomFull("alpha".to_string()))
        );
        assert_eq!(registry.room_of(3), None);
    }

    #[test]
    fn test_start_returns_members() {
        let mut registry = RoomRegistry::new(4);
        registry.join(2, "bo", "alpha").unwrap();
        registry.join(1, "ada", "alpha").unwrap();
        let (tx, _rx) = channel();

        let started = registry.start(1, tx).unwrap();

        assert_eq!(started.room, "alpha");
        assert_eq!(started.generation, 1);
        assert_eq!(
            started.players,
            vec![(1, "ada".to_string()), (2, "bo".to_string())]
        );
        assert_eq!(registry.phase("alpha"), Some(RoomPhase::Playing));
    }

    #[test]
    fn test_start_errors() {
        let mut registry = RoomRegistry::new(4);
        let (tx, _rx) = channel();
        assert_eq!(registry.start(9, tx.clone()), Err(RoomError::NotInRoom(9)));

        registry.join(1, "ada", "alpha").unwrap();
        registry.start(1, tx.clone()).unwrap();
        assert_eq!(
            registry.start(1, tx),
            Err(RoomError::RoomAlreadyRunning("alpha".to_string()))
        );
    }

    #[test]
    fn test_join_running_room_adds_player() {
        let mut registry = RoomRegistry::new(4);
        registry.join(1, "ada", "alpha").unwrap();
        let (tx, mut rx) = channel();
        registry.start(1, tx).unwrap();

        registry.join(2, "bo", "alpha").unwrap();

        match rx.try_recv() {
            Ok(RoomCommand::AddPlayer { id, name }) => {
                assert_eq!(id, 2);
                assert_eq!(name, "bo");
            }
            other => panic!("expected AddPlayer, got {:?}", other),
        }
    }

    #[test]
    fn test_forward_input_only_while_playing() {
        let mut registry = RoomRegistry::new(4);
        registry.join(1, "ada", "alpha").unwrap();
        let (tx, mut rx) = channel();

        registry.forward_input(1, InputState::default()).unwrap();
        assert_eq!(
            registry.forward_input(7, InputState::default()),
            Err(RoomError::NotInRoom(7))
        );

        registry.start(1, tx).unwrap();
        registry.forward_input(1, InputState::default()).unwrap();

        assert!(matches!(rx.try_recv(), Ok(RoomCommand::Input { id: 1, .. })));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_leave_and_destroy() {
        let mut registry = RoomRegistry::new(4);
        registry.join(1, "ada", "alpha").unwrap();
        registry.join(2, "bo", "alpha").unwrap();
        let (tx, mut rx) = channel();
        registry.start(1, tx).unwrap();

        assert_eq!(
            registry.leave(1),
            Ok(LeaveOutcome::Left {
                room: "alpha".to_string()
            })
        );
        assert!(matches!(rx.try_recv(), Ok(RoomCommand::RemovePlayer { id: 1 })));

        assert_eq!(
            registry.leave(2),
            Ok(LeaveOutcome::Destroyed {
                room: "alpha".to_string()
            })
        );
        assert_eq!(registry.room_count(), 0);
        assert_eq!(registry.leave(2), Err(RoomError::NotInRoom(2)));
    }

    #[test]
    fn test_finished_room_rejects_joins_and_restarts() {
        let mut registry = RoomRegistry::new(4);
        registry.join(1, "ada", "alpha").unwrap();
        let (tx, _rx) = channel();
        let generation = registry.start(1, tx).unwrap().generation;

        assert!(registry.finish("alpha", generation));
        assert!(!registry.finish("alpha", generation));
        assert!(!registry.finish("missing", generation));
        assert_eq!(registry.phase("alpha"), Some(RoomPhase::GameOver));
        assert_eq!(
            registry.join(2, "bo", "alpha"),
            Err(RoomError::RoomFinished("alpha".to_string()))
        );

        let (tx, _rx) = channel();
        let restarted = registry.start(1, tx).unwrap();
        assert!(restarted.generation > generation);
        assert_eq!(registry.phase("alpha"), Some(RoomPhase::Playing));
    }

    #[test]
    fn test_result_of_destroyed_room_ignored_by_successor() {
        let mut registry = RoomRegistry::new(4);
        registry.join(1, "ada", "alpha").unwrap();
        let (tx, _rx) = channel();
        let old = registry.start(1, tx).unwrap().generation;
        registry.leave(1).unwrap();

        registry.join(2, "bo", "alpha").unwrap();
        assert!(!registry.is_current("alpha", old));
        assert!(!registry.finish("alpha", old));
        assert_eq!(registry.phase("alpha"), Some(RoomPhase::Lobby));

        let (tx, _rx) = channel();
        let new = registry.start(2, tx).unwrap().generation;
        assert!(!registry.finish("alpha", old));
        assert!(registry.is_current("alpha", new));
        assert_eq!(registry.phase("alpha"), Some(RoomPhase::Playing));
        assert_eq!(registry.join(3, "cy", "alpha").unwrap().len(), 2);
    }

    #[test]
    fn test_members_sorted() {
        let mut registry = RoomRegistry::new(4);
        registry.join(5, "e", "alpha").unwrap();
        registry.join(3, "c", "alpha").unwrap();

        assert_eq!(registry.members("alpha"), vec![3, 5]);
        assert!(registry.members("missing").is_empty());
    }
}
