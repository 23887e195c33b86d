//! Wave spawn policies.
//!
//! The simulation asks its [`SpawnStrategy`] for a batch when a wave begins
//! and, every tick while the wave runs, for any extra spawns. The strategy
//! only decides *what* appears; placement on the map stays with the
//! simulation.

use crate::config::{BossCoreConfig, SpawnStrategyKind, WaveConfig};
use log::debug;
use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpawnRequest {
    /// A regular pursuer at a safe floor cell.
    Walker,
    /// A stationary boss with the given health at a safe floor cell.
    Core { health: f32 },
    /// A regular pursuer placed at the living core.
    Minion,
}

pub trait SpawnStrategy: Send + Debug {
    /// Batch for the start of `wave` (1-based).
    fn begin_wave(&mut self, wave: u32) -> Vec<SpawnRequest>;

    /// Extra spawns while the current wave runs.
    fn during_wave(&mut self, _dt: f32, _core_alive: bool) -> Vec<SpawnRequest> {
        Vec::new()
    }
}

/// Pursuer count for a wave: `floor(wave * multiplier + initial)`.
pub fn wave_size(wave: u32, multiplier: f32, initial: u32) -> u32 {
    (wave as f64 * multiplier as f64 + initial as f64).floor() as u32
}

pub fn from_config(waves: &WaveConfig, boss: &BossCoreConfig) -> Box<dyn SpawnStrategy> {
    match waves.strategy {
        SpawnStrategyKind::Escalation => Box::new(WaveEscalation::new(
            waves.initial_pursuer_count,
            waves.wave_multiplier,
        )),
        SpawnStrategyKind::BossCore => Box::new(BossCore::new(*boss)),
    }
}

/// Geometric escalation: every wave is one batch sized by [`wave_size`].
#[derive(Debug, Clone)]
pub struct WaveEscalation {
    initial: u32,
    multiplier: f32,
}

impl WaveEscalation {
    pub fn new(initial: u32, multiplier: f32) -> Self {
        Self {
            initial,
            multiplier,
        }
    }
}

impl SpawnStrategy for WaveEscalation {
    fn begin_wave(&mut self, wave: u32) -> Vec<SpawnRequest> {
        let count = wave_size(wave, self.multiplier, self.initial);
        debug!("Wave {} escalation batch: {} pursuers", wave, count);
        vec![SpawnRequest::Walker; count as usize]
    }
}

/// One core per wave. While it lives it emits minions in bursts, then at a
/// slower trickle, up to a per-wave cap.
#[derive(Debug, Clone)]
pub struct BossCore {
    config: BossCoreConfig,
    wave_elapsed: f32,
    burst_timer: f32,
    trickle_timer: f32,
    minions_spawned: u32,
}

impl BossCore {
    pub fn new(config: BossCoreConfig) -> Self {
        Self {
            config,
            wave_elapsed: 0.0,
            burst_timer: 0.0,
            trickle_timer: 0.0,
            minions_spawned: 0,
        }
    }

    pub fn core_health(&self, wave: u32) -> f32 {
        self.config.base_health + wave as f32 * self.config.health_per_wave
    }

    fn remaining(&self) -> u32 {
        self.config
            .max_minions_per_wave
            .saturating_sub(self.minions_spawned)
    }
}

impl SpawnStrategy for BossCore {
    fn begin_wave(&mut self, wave: u32) -> Vec<SpawnRequest> {
        self.wave_elapsed = 0.0;
        self.burst_timer = 0.0;
        self.trickle_timer = 0.0;
        self.minions_spawned = 0;

        let health = self.core_health(wave);
        debug!("Wave {} boss core with {} health", wave, health);
        vec![SpawnRequest::Core { health }]
    }

    fn during_wave(&mut self, dt: f32, core_alive: bool) -> Vec<SpawnRequest> {
        if !core_alive {
            return Vec::new();
        }

        self.wave_elapsed += dt;
        let mut count = 0;

        if self.wave_elapsed <= self.config.burst_duration {
            self.burst_timer += dt;
            while self.burst_timer >= self.config.burst_interval {
                self.burst_timer -= self.config.burst_interval;
                count += self.config.burst_size;
            }
        } else {
            self.trickle_timer += dt;
            while self.trickle_timer >= self.config.trickle_interval {
                self.trickle_timer -= self.config.trickle_interval;
                count += 1;
            }
        }

        let count = count.min(self.remaining());
        self.minions_spawned += count;
        vec![SpawnRequest::Minion; count as usize]
    }
}
