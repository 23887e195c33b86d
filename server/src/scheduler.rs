//! Per-room tick loops
//!
//! Every running room gets its own tokio task that owns the room's
//! [`Simulation`]. Joins, leaves and inputs arrive on the room's command
//! channel and are drained at the start of each tick; snapshots and the final
//! result leave on a shared output channel toward the network sender.

use crate::game::Simulation;
use log::{debug, info, warn};
use shared::{FinalScore, InputState, Snapshot};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Requests delivered to a running room.
#[derive(Debug, Clone)]
pub enum RoomCommand {
    AddPlayer { id: u32, name: String },
    RemovePlayer { id: u32 },
    Input { id: u32, input: InputState },
}

/// What a room loop reports back after ticking.
///
/// `generation` identifies the start that spawned the loop, so output from a
/// cancelled loop can be told apart from its room's successor.
#[derive(Debug, Clone)]
pub enum RoomOutput {
    Snapshot {
        room: String,
        generation: u64,
        recipients: Vec<u32>,
        tick: u64,
        snapshot: Snapshot,
    },
    Finished {
        room: String,
        generation: u64,
        recipients: Vec<u32>,
        result: FinalScore,
    },
}

/// Owns the tick task of every running room.
pub struct TickScheduler {
    tasks: HashMap<String, JoinHandle<()>>,
    tick_duration: Duration,
}

impl TickScheduler {
    pub fn new(tick_duration: Duration) -> Self {
        Self {
            tasks: HashMap::new(),
            tick_duration,
        }
    }

    /// Spawns the tick loop for `room`. Returns false if one is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        &mut self,
        room: String,
        generation: u64,
        simulation: Simulation,
        commands: mpsc::UnboundedReceiver<RoomCommand>,
        output: mpsc::UnboundedSender<RoomOutput>,
    ) -> bool {
        if self.is_running(&room) {
            warn!("Room {} already has a tick loop", room);
            return false;
        }

        info!("Starting tick loop for room {} (generation {})", room, generation);
        let handle = tokio::spawn(run_room_loop(
            room.clone(),
            generation,
            simulation,
            commands,
            output,
            self.tick_duration,
        ));
        self.tasks.insert(room, handle);
        true
    }

    /// Stops a room's loop. Returns false if it was not running.
    pub fn cancel(&mut self, room: &str) -> bool {
        match self.tasks.remove(room) {
            Some(handle) => {
                let was_running = !handle.is_finished();
                handle.abort();
                if was_running {
                    info!("Cancelled tick loop for room {}", room);
                }
                was_running
            }
            None => false,
        }
    }

    pub fn is_running(&self, room: &str) -> bool {
        self.tasks
            .get(room)
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn running_rooms(&self) -> usize {
        self.tasks
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Drops handles of loops that ended on their own.
    pub fn prune(&mut self) {
        self.tasks.retain(|_, handle| !handle.is_finished());
    }

    pub fn shutdown(&mut self) {
        for (room, handle) in self.tasks.drain() {
            debug!("Aborting tick loop for room {}", room);
            handle.abort();
        }
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Ticks one room until its game ends, its command channel closes, or the
/// output channel is gone.
pub async fn run_room_loop(
    room: String,
    generation: u64,
    mut simulation: Simulation,
    mut commands: mpsc::UnboundedReceiver<RoomCommand>,
    output: mpsc::UnboundedSender<RoomOutput>,
    tick_duration: Duration,
) {
    let mut ticker = interval(tick_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        loop {
            match commands.try_recv() {
                Ok(command) => apply_command(&mut simulation, command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("Room {} closed, stopping tick loop", room);
                    return;
                }
            }
        }

        simulation.tick();

        let recipients: Vec<u32> = simulation.players().map(|p| p.id).collect();
        let snapshot = RoomOutput::Snapshot {
            room: room.clone(),
            generation,
            recipients: recipients.clone(),
            tick: simulation.tick_count(),
            snapshot: simulation.snapshot(),
        };
        if output.send(snapshot).is_err() {
            warn!("Output channel closed, stopping room {}", room);
            return;
        }

        if simulation.tick_count() % 300 == 0 {
            debug!(
                "Room {} tick {}: wave {}, {} pursuers",
                room,
                simulation.tick_count(),
                simulation.wave(),
                simulation.pursuer_count()
            );
        }

        if simulation.is_over() {
            let result = simulation.final_score();
            info!(
                "Room {} finished: score {}, wave {}",
                room, result.final_score, result.final_wave
            );
            let _ = output.send(RoomOutput::Finished {
                room,
                generation,
                recipients,
                result,
            });
            return;
        }
    }
}

fn apply_command(simulation: &mut Simulation, command: RoomCommand) {
    match command {
        RoomCommand::AddPlayer { id, name } => simulation.add_player(id, name),
        RoomCommand::RemovePlayer { id } => {
            simulation.remove_player(id);
        }
        RoomCommand::Input { id, input } => simulation.handle_input(id, input),
    }
}
