//! Tunables for a room's simulation.
//!
//! Every value has a default, and the whole tree deserializes from RON with
//! `#[serde(default)]`, so a config file only needs the keys it overrides:
//!
//! ```ron
//! (
//!     seed: Some(42),
//!     map: (grid_size: 80, room_count: 9),
//!     waves: (wave_multiplier: 2.0, strategy: BossCore),
//! )
//! ```

use crate::spawner::wave_size;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for map generation and spawn placement. `None` draws from entropy.
    pub seed: Option<u64>,
    /// Largest wall-clock delta (seconds) a single tick may apply.
    pub max_delta: f32,
    pub map: MapConfig,
    pub player: PlayerConfig,
    pub pursuer: PursuerConfig,
    pub projectile: ProjectileConfig,
    pub waves: WaveConfig,
    pub boss: BossCoreConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            max_delta: 0.25,
            map: MapConfig::default(),
            player: PlayerConfig::default(),
            pursuer: PursuerConfig::default(),
            projectile: ProjectileConfig::default(),
            waves: WaveConfig::default(),
            boss: BossCoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Grid width and height in cells.
    pub grid_size: usize,
    /// Cell edge length in world units.
    pub cell_size: f32,
    pub room_count: usize,
    pub corridor_width: usize,
    pub min_room_size: usize,
    pub max_room_size: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            grid_size: 60,
            cell_size: 40.0,
            room_count: 6,
            corridor_width: 3,
            min_room_size: 5,
            max_room_size: 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub radius: f32,
    /// World units per second.
    pub speed: f32,
    pub max_health: f32,
    /// Seconds between shots.
    pub fire_cooldown: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            radius: 15.0,
            speed: 200.0,
            max_health: 100.0,
            fire_cooldown: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PursuerConfig {
    pub radius: f32,
    pub speed: f32,
    pub max_health: f32,
    pub damage: f32,
    /// Seconds between melee hits.
    pub attack_cooldown: f32,
    /// Extra reach on top of the two radii.
    pub melee_buffer: f32,
}

impl Default for PursuerConfig {
    fn default() -> Self {
        Self {
            radius: 14.0,
            speed: 90.0,
            max_health: 30.0,
            damage: 10.0,
            attack_cooldown: 1.0,
            melee_buffer: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileConfig {
    pub radius: f32,
    pub speed: f32,
    pub damage: f32,
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self {
            radius: 4.0,
            speed: 600.0,
            damage: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpawnStrategyKind {
    /// `floor(wave * multiplier + initial)` pursuers at the start of each wave.
    #[default]
    Escalation,
    /// A stationary core per wave that bursts and then trickles minions.
    BossCore,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    pub initial_pursuer_count: u32,
    pub wave_multiplier: f32,
    pub kill_reward: u32,
    pub wave_bonus: u32,
    /// Minimum spawn distance from any living player, in cells.
    pub spawn_min_distance: f32,
    pub strategy: SpawnStrategyKind,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            initial_pursuer_count: 10,
            wave_multiplier: 1.5,
            kill_reward: 10,
            wave_bonus: 100,
            spawn_min_distance: 8.0,
            strategy: SpawnStrategyKind::Escalation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BossCoreConfig {
    pub base_health: f32,
    pub health_per_wave: f32,
    pub radius: f32,
    pub burst_size: u32,
    pub burst_interval: f32,
    pub burst_duration: f32,
    pub trickle_interval: f32,
    pub max_minions_per_wave: u32,
}

impl Default for BossCoreConfig {
    fn default() -> Self {
        Self {
            base_health: 200.0,
            health_per_wave: 100.0,
            radius: 24.0,
            burst_size: 4,
            burst_interval: 1.0,
            burst_duration: 5.0,
            trickle_interval: 3.0,
            max_minions_per_wave: 40,
        }
    }
}

impl SimulationConfig {
    /// Reads and validates a RON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&contents)
    }

    pub fn from_ron(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let map = &self.map;
        if map.grid_size < 5 {
            return Err(invalid(format!(
                "map.grid_size must be at least 5, got {}",
                map.grid_size
            )));
        }
        if !(map.cell_size > 0.0) {
            return Err(invalid("map.cell_size must be positive"));
        }
        if map.room_count == 0 {
            return Err(invalid("map.room_count must be at least 1"));
        }
        if map.corridor_width == 0 || map.corridor_width > map.grid_size - 2 {
            return Err(invalid(format!(
                "map.corridor_width must be between 1 and {}",
                map.grid_size - 2
            )));
        }
        if map.min_room_size == 0 || map.min_room_size > map.max_room_size {
            return Err(invalid(
                "map.min_room_size must be at least 1 and no larger than map.max_room_size",
            ));
        }

        if !(self.max_delta > 0.0) {
            return Err(invalid("max_delta must be positive"));
        }

        let positive = [
            ("player.radius", self.player.radius),
            ("player.max_health", self.player.max_health),
            ("pursuer.radius", self.pursuer.radius),
            ("pursuer.max_health", self.pursuer.max_health),
            ("projectile.radius", self.projectile.radius),
            ("projectile.speed", self.projectile.speed),
            ("boss.radius", self.boss.radius),
            ("boss.burst_interval", self.boss.burst_interval),
            ("boss.trickle_interval", self.boss.trickle_interval),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(invalid(format!("{} must be positive, got {}", name, value)));
            }
        }

        let non_negative = [
            ("player.speed", self.player.speed),
            ("player.fire_cooldown", self.player.fire_cooldown),
            ("pursuer.speed", self.pursuer.speed),
            ("pursuer.damage", self.pursuer.damage),
            ("pursuer.attack_cooldown", self.pursuer.attack_cooldown),
            ("pursuer.melee_buffer", self.pursuer.melee_buffer),
            ("projectile.damage", self.projectile.damage),
            ("waves.wave_multiplier", self.waves.wave_multiplier),
            ("waves.spawn_min_distance", self.waves.spawn_min_distance),
            ("boss.base_health", self.boss.base_health),
            ("boss.health_per_wave", self.boss.health_per_wave),
            ("boss.burst_duration", self.boss.burst_duration),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(invalid(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }

        // Wave sizes never shrink, so a non-empty first wave keeps every wave non-empty.
        if self.waves.strategy == SpawnStrategyKind::Escalation
            && wave_size(1, self.waves.wave_multiplier, self.waves.initial_pursuer_count) == 0
        {
            return Err(invalid(
                "waves.initial_pursuer_count and waves.wave_multiplier give an empty first wave",
            ));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = SimulationConfig::from_ron(
            "(seed: Some(9), map: (grid_size: 40), waves: (strategy: BossCore))",
        )
        .unwrap();

        assert_eq!(config.seed, Some(9));
        assert_eq!(config.map.grid_size, 40);
        assert_eq!(config.map.room_count, MapConfig::default().room_count);
        assert_eq!(config.waves.strategy, SpawnStrategyKind::BossCore);
        assert_eq!(config.player, PlayerConfig::default());
    }

    #[test]
    fn test_parse_error() {
        let result = SimulationConfig::from_ron("(map: (grid_size: \"big\"))");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_corridor_wider_than_grid_rejected() {
        let mut config = SimulationConfig::default();
        config.map.grid_size = 10;
        config.map.corridor_width = 9;

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_room_size_bounds_rejected() {
        let mut config = SimulationConfig::default();
        config.map.min_room_size = 8;
        config.map.max_room_size = 4;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_speed_rejected() {
        let mut config = SimulationConfig::default();
        config.pursuer.speed = -1.0;

        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("pursuer.speed"));
    }

    #[test]
    fn test_empty_escalation_wave_rejected() {
        let mut config = SimulationConfig::default();
        config.waves.initial_pursuer_count = 0;
        config.waves.wave_multiplier = 0.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.waves.wave_multiplier = 1.0;
        assert!(config.validate().is_ok());

        config.waves.wave_multiplier = 0.0;
        config.waves.strategy = SpawnStrategyKind::BossCore;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let path = Path::new("/definitely/not/here/simulation.ron");
        match SimulationConfig::load(path) {
            Err(ConfigError::Io { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected Io error, got {:?}", other),
        }
    }
}
