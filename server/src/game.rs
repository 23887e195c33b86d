use crate::config::SimulationConfig;
use crate::entity::{Player, Projectile, Pursuer, PursuerKind};
use crate::flow_field::FlowField;
use crate::map::{GameMap, GridPos};
use crate::physics::{resolve_wall_collisions, Vector2};
use crate::spawner::{self, SpawnRequest, SpawnStrategy};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{FinalScore, InputState, Snapshot};
use std::collections::BTreeMap;
use std::time::Instant;

/// Redraws when a spawn lands on a cell another pursuer already stands on.
const OCCUPIED_SPAWN_RETRIES: usize = 3;

/// One room's authoritative game world.
///
/// Entity maps are keyed by id so iteration order, and with it goal selection
/// and combat resolution, is deterministic for a given seed and delta sequence.
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    map: GameMap,
    rng: StdRng,
    players: BTreeMap<u32, Player>,
    pursuers: BTreeMap<u32, Pursuer>,
    projectiles: BTreeMap<u32, Projectile>,
    flow_field: Option<FlowField>,
    tracked_goal: Option<GridPos>,
    field_rebuilds: u32,
    spawner: Box<dyn SpawnStrategy>,
    score: u32,
    wave: u32,
    tick: u64,
    /// Seconds of simulated time.
    clock: f64,
    last_tick: Instant,
    next_entity_id: u32,
    over: bool,
}

impl Simulation {
    /// Generates a map and spawns the first wave.
    pub fn new(players: &[(u32, String)], config: SimulationConfig) -> Self {
        let mut rng = seeded_rng(config.seed);
        let map = GameMap::generate(&config.map, &mut rng);
        Self::build(players, config, map, rng)
    }

    /// Like [`Simulation::new`] but on a prepared map.
    pub fn with_map(players: &[(u32, String)], config: SimulationConfig, map: GameMap) -> Self {
        let rng = seeded_rng(config.seed);
        Self::build(players, config, map, rng)
    }

    fn build(
        players: &[(u32, String)],
        config: SimulationConfig,
        map: GameMap,
        rng: StdRng,
    ) -> Self {
        let spawner = spawner::from_config(&config.waves, &config.boss);
        let mut sim = Self {
            config,
            map,
            rng,
            players: BTreeMap::new(),
            pursuers: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            flow_field: None,
            tracked_goal: None,
            field_rebuilds: 0,
            spawner,
            score: 0,
            wave: 1,
            tick: 0,
            clock: 0.0,
            last_tick: Instant::now(),
            next_entity_id: 1,
            over: false,
        };

        for (id, name) in players {
            sim.add_player(*id, name.clone());
        }

        let batch = sim.spawner.begin_wave(sim.wave);
        sim.spawn(&batch);
        info!(
            "Simulation started with {} players and {} pursuers",
            sim.players.len(),
            sim.pursuers.len()
        );

        sim
    }

    /// Adds a player at the spawn point. Does nothing if the id is taken.
    pub fn add_player(&mut self, id: u32, name: String) {
        if self.players.contains_key(&id) {
            return;
        }

        let spawn = self.map.spawn_point();
        let player = Player::new(id, name, spawn, &self.config.player);

        info!(
            "Added player {} ({}) at ({}, {})",
            id, player.name, spawn.x, spawn.y
        );
        self.players.insert(id, player);
    }

    pub fn remove_player(&mut self, id: u32) -> bool {
        let removed = self.players.remove(&id).is_some();
        if removed {
            info!("Removed player {}", id);
        }
        removed
    }

    /// Stores the latest input for a living player. Later inputs overwrite earlier ones.
    pub fn handle_input(&mut self, id: u32, input: InputState) {
        if let Some(player) = self.players.get_mut(&id) {
            if player.is_alive() {
                player.input = input;
            }
        }
    }

    /// Advances by the wall-clock time since the previous tick, capped at `max_delta`.
    pub fn tick(&mut self) {
        let now = Instant::now();
        let mut dt = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;

        if dt > self.config.max_delta {
            warn!(
                "Tick delta {:.3}s exceeds {:.3}s, clamping",
                dt, self.config.max_delta
            );
            dt = self.config.max_delta;
        }

        self.advance(dt);
    }

    /// Advances by an explicit delta in seconds. No-op once the game is over.
    pub fn advance(&mut self, dt: f32) {
        if self.over {
            return;
        }

        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.tick += 1;
        self.clock += dt as f64;

        self.update_goal();
        self.update_players(dt);
        self.update_pursuers(dt);
        self.fire_projectiles();
        self.update_projectiles(dt);
        self.run_spawner(dt);
        self.check_wave_cleared();
        self.check_game_over();
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            players: self.players.values().map(Player::snapshot).collect(),
            pursuers: self.pursuers.values().map(Pursuer::snapshot).collect(),
            projectiles: self.projectiles.values().map(Projectile::snapshot).collect(),
            score: self.score,
            wave: self.wave,
        }
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    pub fn final_score(&self) -> FinalScore {
        FinalScore {
            final_score: self.score,
            final_wave: self.wave,
        }
    }

    pub fn map(&self) -> &GameMap {
        &self.map
    }

    pub fn flow_field(&self) -> Option<&FlowField> {
        self.flow_field.as_ref()
    }

    /// How many times the flow field has been computed.
    pub fn field_rebuilds(&self) -> u32 {
        self.field_rebuilds
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn wave(&self) -> u32 {
        self.wave
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn pursuers(&self) -> impl Iterator<Item = &Pursuer> {
        self.pursuers.values()
    }

    pub fn pursuer_count(&self) -> usize {
        self.pursuers.len()
    }

    pub fn projectiles(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.values()
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_entity_id;
        self.next_entity_id = self.next_entity_id.wrapping_add(1);
        id
    }

    /// Follows the first living player; the field is rebuilt only when that
    /// player's cell changes.
    fn update_goal(&mut self) {
        let goal = self
            .players
            .values()
            .find(|p| p.is_alive())
            .map(|p| self.map.world_to_grid(p.position));

        match goal {
            None => {
                self.flow_field = None;
                self.tracked_goal = None;
            }
            Some(cell) if self.tracked_goal != Some(cell) || self.flow_field.is_none() => {
                debug!("Rebuilding flow field toward {:?}", cell);
                self.flow_field = Some(FlowField::compute(&self.map, cell));
                self.tracked_goal = Some(cell);
                self.field_rebuilds += 1;
            }
            Some(_) => {}
        }
    }

    fn update_players(&mut self, dt: f32) {
        let map = &self.map;

        for player in self.players.values_mut() {
            if !player.is_alive() {
                continue;
            }

            let (move_x, move_y) = player.input.clamped_movement();

            player.position.x += move_x * player.speed * dt;
            resolve_wall_collisions(&mut player.position, player.radius, map);

            player.position.y += move_y * player.speed * dt;
            resolve_wall_collisions(&mut player.position, player.radius, map);
        }
    }

    fn update_pursuers(&mut self, dt: f32) {
        let Self {
            config,
            map,
            players,
            pursuers,
            flow_field,
            clock,
            ..
        } = self;
        let now = *clock;

        for pursuer in pursuers.values_mut() {
            if !pursuer.is_alive() {
                continue;
            }

            let Some(target) = nearest_living_player(players, pursuer.position) else {
                continue;
            };

            // In reach but cooling down: keep closing in.
            let reach = pursuer.radius + target.radius + config.pursuer.melee_buffer;
            let in_reach = pursuer.position.distance_squared(&target.position) <= reach * reach;
            if in_reach && pursuer.can_attack(now) {
                if let Some(player) = players.get_mut(&target.id) {
                    player.take_damage(pursuer.damage);
                    debug!(
                        "Pursuer {} hit player {} ({} health left)",
                        pursuer.id, player.id, player.health
                    );
                }
                pursuer.last_attack = Some(now);
                continue;
            }

            if pursuer.speed <= 0.0 {
                continue;
            }

            let destination = match flow_field.as_ref() {
                Some(field) => {
                    let cell = map.world_to_grid(pursuer.position);
                    if !field.is_reachable(cell) {
                        continue;
                    }
                    match field.next_step(map, cell) {
                        Some(next) => map.grid_to_world(next),
                        None => target.position,
                    }
                }
                None => target.position,
            };

            let offset = destination.sub(&pursuer.position);
            let travel = (pursuer.speed * dt).min(offset.magnitude());
            pursuer.position = pursuer.position.add(&offset.normalize().scale(travel));
            resolve_wall_collisions(&mut pursuer.position, pursuer.radius, map);
        }
    }

    fn fire_projectiles(&mut self) {
        let now = self.clock;
        let cooldown = self.config.player.fire_cooldown;
        let muzzle_gap = self.config.projectile.radius;
        let mut shots = Vec::new();

        for player in self.players.values_mut() {
            if !player.is_alive() || !player.input.is_shooting {
                continue;
            }

            let aim = Vector2::new(player.input.shoot_x, player.input.shoot_y).normalize();
            if aim == Vector2::ZERO || !player.can_fire(now, cooldown) {
                continue;
            }

            player.last_shot = Some(now);
            let origin = player
                .position
                .add(&aim.scale(player.radius + muzzle_gap));
            shots.push((player.id, origin, aim));
        }

        for (owner, origin, aim) in shots {
            let id = self.next_id();
            let projectile = Projectile::new(id, origin, aim, owner, &self.config.projectile);
            self.projectiles.insert(id, projectile);
        }
    }

    /// Moves projectiles and resolves hits. Removals are collected first and
    /// applied once every projectile has been processed.
    fn update_projectiles(&mut self, dt: f32) {
        let Self {
            config,
            map,
            players,
            pursuers,
            projectiles,
            score,
            ..
        } = self;

        let mut spent = Vec::new();
        let mut killed = Vec::new();

        for projectile in projectiles.values_mut() {
            projectile.advance(dt);

            let cell = map.world_to_grid(projectile.position);
            if !map.is_walkable(cell.x, cell.y) {
                spent.push(projectile.id);
                continue;
            }

            let hit = pursuers.values_mut().find(|p| {
                let reach = p.radius + projectile.radius;
                p.is_alive() && p.position.distance_squared(&projectile.position) < reach * reach
            });
            let Some(pursuer) = hit else {
                continue;
            };

            spent.push(projectile.id);
            if pursuer.take_damage(projectile.damage) {
                killed.push(pursuer.id);
                *score += config.waves.kill_reward;
                if let Some(owner) = players.get_mut(&projectile.owner) {
                    owner.kills += 1;
                }
                debug!(
                    "Pursuer {} killed by player {}",
                    pursuer.id, projectile.owner
                );
            }
        }

        for id in spent {
            projectiles.remove(&id);
        }
        for id in killed {
            pursuers.remove(&id);
        }
    }

    fn run_spawner(&mut self, dt: f32) {
        let core_alive = self
            .pursuers
            .values()
            .any(|p| p.kind == PursuerKind::Core && p.is_alive());

        let requests = self.spawner.during_wave(dt, core_alive);
        if !requests.is_empty() {
            self.spawn(&requests);
        }
    }

    fn check_wave_cleared(&mut self) {
        if !self.pursuers.is_empty() || !self.players.values().any(Player::is_alive) {
            return;
        }

        self.wave += 1;
        self.score += self.config.waves.wave_bonus;

        let batch = self.spawner.begin_wave(self.wave);
        self.spawn(&batch);
        info!(
            "Wave {} started with {} pursuers (score {})",
            self.wave,
            self.pursuers.len(),
            self.score
        );
    }

    fn check_game_over(&mut self) {
        if self.players.is_empty() || self.players.values().any(Player::is_alive) {
            return;
        }

        self.over = true;
        info!(
            "Game over at wave {} with score {}",
            self.wave, self.score
        );
    }

    fn spawn(&mut self, requests: &[SpawnRequest]) {
        for request in requests {
            match *request {
                SpawnRequest::Walker => {
                    let position = self.open_spawn_cell();
                    let id = self.next_id();
                    self.pursuers
                        .insert(id, Pursuer::walker(id, position, &self.config.pursuer));
                }
                SpawnRequest::Core { health } => {
                    let position = self.open_spawn_cell();
                    let id = self.next_id();
                    let core = Pursuer::core(
                        id,
                        position,
                        health,
                        &self.config.boss,
                        &self.config.pursuer,
                    );
                    self.pursuers.insert(id, core);
                }
                SpawnRequest::Minion => {
                    let Some(position) = self
                        .pursuers
                        .values()
                        .find(|p| p.kind == PursuerKind::Core && p.is_alive())
                        .map(|p| p.position)
                    else {
                        continue;
                    };
                    let id = self.next_id();
                    self.pursuers
                        .insert(id, Pursuer::walker(id, position, &self.config.pursuer));
                }
            }
        }
    }

    /// A floor cell away from living players, preferring one no pursuer stands on.
    fn open_spawn_cell(&mut self) -> Vector2 {
        let exclude: Vec<Vector2> = self
            .players
            .values()
            .filter(|p| p.is_alive())
            .map(|p| p.position)
            .collect();
        let min_distance = self.config.waves.spawn_min_distance;

        let mut candidate = self
            .map
            .random_open_cell(&exclude, min_distance, &mut self.rng);
        for _ in 0..OCCUPIED_SPAWN_RETRIES {
            let occupied = self
                .pursuers
                .values()
                .any(|p| p.position.distance_squared(&candidate) < 1.0);
            if !occupied {
                break;
            }
            candidate = self
                .map
                .random_open_cell(&exclude, min_distance, &mut self.rng);
        }

        candidate
    }
}

/// Snapshot of the nearest target so the player map can be borrowed mutably afterwards.
struct Target {
    id: u32,
    position: Vector2,
    radius: f32,
}

fn nearest_living_player(players: &BTreeMap<u32, Player>, from: Vector2) -> Option<Target> {
    players
        .values()
        .filter(|p| p.is_alive())
        .map(|p| (p, p.position.distance_squared(&from)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(p, _)| Target {
            id: p.id,
            position: p.position,
            radius: p.radius,
        })
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
