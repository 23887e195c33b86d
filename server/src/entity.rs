use crate::config::{BossCoreConfig, PlayerConfig, ProjectileConfig, PursuerConfig};
use crate::physics::Vector2;
use shared::{InputState, PlayerSnapshot, ProjectileSnapshot, PursuerSnapshot};

// Player representation
#[derive(Debug, Clone)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub position: Vector2,
    pub radius: f32,
    pub speed: f32,
    pub health: f32,
    pub max_health: f32,
    pub kills: u32,
    pub input: InputState,
    /// Simulation time of the last shot.
    pub last_shot: Option<f64>,
}

impl Player {
    pub fn new(id: u32, name: String, position: Vector2, config: &PlayerConfig) -> Self {
        Player {
            id,
            name,
            position,
            radius: config.radius,
            speed: config.speed,
            health: config.max_health,
            max_health: config.max_health,
            kills: 0,
            input: InputState::default(),
            last_shot: None,
        }
    }

    /// Dead players keep their slot until they leave but no longer act.
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    /// Applies damage, keeping health within `[0, max_health]`.
    pub fn take_damage(&mut self, amount: f32) {
        self.health = (self.health - amount).clamp(0.0, self.max_health);
    }

    pub fn can_fire(&self, now: f64, cooldown: f32) -> bool {
        match self.last_shot {
            Some(last) => now - last >= cooldown as f64,
            None => true,
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            name: self.name.clone(),
            health: self.health,
            kills: self.kills,
            shoot_x: self.input.shoot_x,
            shoot_y: self.input.shoot_y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PursuerKind {
    /// Follows the flow field and attacks in melee range.
    Walker,
    /// Stationary boss that anchors minion spawns.
    Core,
}

#[derive(Debug, Clone)]
pub struct Pursuer {
    pub id: u32,
    pub kind: PursuerKind,
    pub position: Vector2,
    pub radius: f32,
    pub speed: f32,
    pub health: f32,
    pub max_health: f32,
    pub damage: f32,
    pub attack_cooldown: f32,
    pub last_attack: Option<f64>,
}

impl Pursuer {
    pub fn walker(id: u32, position: Vector2, config: &PursuerConfig) -> Self {
        Pursuer {
            id,
            kind: PursuerKind::Walker,
            position,
            radius: config.radius,
            speed: config.speed,
            health: config.max_health,
            max_health: config.max_health,
            damage: config.damage,
            attack_cooldown: config.attack_cooldown,
            last_attack: None,
        }
    }

    pub fn core(
        id: u32,
        position: Vector2,
        health: f32,
        boss: &BossCoreConfig,
        config: &PursuerConfig,
    ) -> Self {
        Pursuer {
            id,
            kind: PursuerKind::Core,
            position,
            radius: boss.radius,
            speed: 0.0,
            health,
            max_health: health,
            damage: config.damage,
            attack_cooldown: config.attack_cooldown,
            last_attack: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    pub fn can_attack(&self, now: f64) -> bool {
        match self.last_attack {
            Some(last) => now - last >= self.attack_cooldown as f64,
            None => true,
        }
    }

    /// Returns true if this hit killed the pursuer.
    pub fn take_damage(&mut self, amount: f32) -> bool {
        let was_alive = self.is_alive();
        self.health = (self.health - amount).max(0.0);
        was_alive && !self.is_alive()
    }

    pub fn snapshot(&self) -> PursuerSnapshot {
        PursuerSnapshot {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            health: self.health,
            max_health: self.max_health,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: u32,
    pub position: Vector2,
    /// Unit vector.
    pub direction: Vector2,
    pub speed: f32,
    pub damage: f32,
    pub radius: f32,
    pub owner: u32,
}

impl Projectile {
    pub fn new(
        id: u32,
        position: Vector2,
        direction: Vector2,
        owner: u32,
        config: &ProjectileConfig,
    ) -> Self {
        Projectile {
            id,
            position,
            direction: direction.normalize(),
            speed: config.speed,
            damage: config.damage,
            radius: config.radius,
            owner,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.position = self
            .position
            .add(&self.direction.scale(self.speed * dt));
    }

    pub fn snapshot(&self) -> ProjectileSnapshot {
        ProjectileSnapshot {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
        }
    }
}
