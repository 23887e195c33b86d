use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const TICK_RATE: u32 = 30;
pub const MAX_PACKET_SIZE: usize = 16 * 1024;
pub const MAX_NAME_LEN: usize = 24;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
        name: String,
    },
    JoinRoom {
        room: String,
    },
    StartGame,
    Input {
        sequence: u32,
        input: InputState,
    },
    LeaveRoom,
    Disconnect,

    Connected {
        client_id: u32,
    },
    RoomJoined {
        room: String,
        players: Vec<String>,
    },
    GameStarted {
        room: String,
    },
    GameState {
        tick: u64,
        timestamp: u64,
        snapshot: Snapshot,
    },
    GameOver {
        result: FinalScore,
    },
    Error {
        message: String,
    },
    Disconnected {
        reason: String,
    },
}

/// Most recent control state sent by a client.
///
/// `move_x`/`move_y` is the desired movement direction and is clamped to unit
/// length by the server. `shoot_x`/`shoot_y` is the aim direction.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InputState {
    pub move_x: f32,
    pub move_y: f32,
    pub shoot_x: f32,
    pub shoot_y: f32,
    pub is_shooting: bool,
}

impl InputState {
    /// Movement vector clamped to unit length. Non-finite input is treated as idle.
    pub fn clamped_movement(&self) -> (f32, f32) {
        if !self.move_x.is_finite() || !self.move_y.is_finite() {
            return (0.0, 0.0);
        }

        let length = (self.move_x * self.move_x + self.move_y * self.move_y).sqrt();
        if length > 1.0 {
            (self.move_x / length, self.move_y / length)
        } else {
            (self.move_x, self.move_y)
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub name: String,
    pub health: f32,
    pub kills: u32,
    pub shoot_x: f32,
    pub shoot_y: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PursuerSnapshot {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub max_health: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProjectileSnapshot {
    pub id: u32,
    pub x: f32,
    pub y: f32,
}

/// Read-only view of a room broadcast to every client after each tick.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub players: Vec<PlayerSnapshot>,
    pub pursuers: Vec<PursuerSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub score: u32,
    pub wave: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FinalScore {
    pub final_score: u32,
    pub final_wave: u32,
}

/// Trims a requested display name and falls back to `Player <id>` when empty.
pub fn sanitize_name(name: &str, client_id: u32) -> String {
    let trimmed: String = name
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_LEN)
        .collect();

    if trimmed.is_empty() {
        format!("Player {}", client_id)
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_clamped_movement_long_vector() {
        let input = InputState {
            move_x: 3.0,
            move_y: 4.0,
            ..Default::default()
        };

        let (x, y) = input.clamped_movement();
        assert_approx_eq!(x, 0.6, 1e-6);
        assert_approx_eq!(y, 0.8, 1e-6);
    }

    #[test]
    fn test_clamped_movement_short_vector_untouched() {
        let input = InputState {
            move_x: 0.3,
            move_y: -0.4,
            ..Default::default()
        };

        assert_eq!(input.clamped_movement(), (0.3, -0.4));
    }

    #[test]
    fn test_clamped_movement_rejects_nan() {
        let input = InputState {
            move_x: f32::NAN,
            move_y: 1.0,
            ..Default::default()
        };

        assert_eq!(input.clamped_movement(), (0.0, 0.0));
    }

    #[test]
    fn test_snapshot_json_field_names() {
        let snapshot = Snapshot {
            players: vec![PlayerSnapshot {
                id: 1,
                x: 10.0,
                y: 20.0,
                name: "ada".to_string(),
                health: 100.0,
                kills: 2,
                shoot_x: 1.0,
                shoot_y: 0.0,
            }],
            pursuers: vec![PursuerSnapshot {
                id: 7,
                x: 1.0,
                y: 2.0,
                health: 20.0,
                max_health: 30.0,
            }],
            projectiles: vec![ProjectileSnapshot {
                id: 9,
                x: 3.0,
                y: 4.0,
            }],
            score: 40,
            wave: 3,
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        let player = &value["players"][0];
        for key in ["id", "x", "y", "name", "health", "kills", "shootX", "shootY"] {
            assert!(player.get(key).is_some(), "missing player field {}", key);
        }
        assert!(value["pursuers"][0].get("maxHealth").is_some());
        assert!(value["projectiles"][0].get("id").is_some());
        assert_eq!(value["score"], 40);
        assert_eq!(value["wave"], 3);
    }

    #[test]
    fn test_final_score_json_field_names() {
        let result = FinalScore {
            final_score: 250,
            final_wave: 4,
        };

        let value = serde_json::to_value(result).unwrap();
        assert_eq!(value["finalScore"], 250);
        assert_eq!(value["finalWave"], 4);
    }

    #[test]
    fn test_packet_serialization_game_state() {
        let packet = Packet::GameState {
            tick: 42,
            timestamp: 123456789,
            snapshot: Snapshot {
                score: 10,
                wave: 2,
                ..Default::default()
            },
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::GameState {
                tick,
                timestamp,
                snapshot,
            } => {
                assert_eq!(tick, 42);
                assert_eq!(timestamp, 123456789);
                assert_eq!(snapshot.score, 10);
                assert_eq!(snapshot.wave, 2);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("  ada  ", 3), "ada");
        assert_eq!(sanitize_name("", 3), "Player 3");
        assert_eq!(sanitize_name("\n\t", 5), "Player 5");

        let long = "x".repeat(100);
        assert_eq!(sanitize_name(&long, 1).len(), MAX_NAME_LEN);
    }
}
