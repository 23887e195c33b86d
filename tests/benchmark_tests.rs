//! Performance benchmarks for critical simulation systems

use rand::rngs::StdRng;
use rand::SeedableRng;
use server::config::{MapConfig, SimulationConfig};
use server::flow_field::FlowField;
use server::game::Simulation;
use server::map::GameMap;
use server::physics::{resolve_wall_collisions, Vector2};
use shared::InputState;
use std::time::Instant;

/// Benchmarks dungeon generation at the default size
#[test]
fn benchmark_map_generation() {
    let config = MapConfig::default();
    let iterations = 50;
    let start = Instant::now();

    for seed in 0..iterations {
        let mut rng = StdRng::seed_from_u64(seed);
        let map = GameMap::generate(&config, &mut rng);
        assert!(map.floor_count() > 0);
    }

    let duration = start.elapsed();
    println!(
        "Map generation: {} maps in {:?} ({:.2} μs/map)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks flow field construction toward varying goals
#[test]
fn benchmark_flow_field_compute() {
    let mut rng = StdRng::seed_from_u64(3);
    let map = GameMap::generate(&MapConfig::default(), &mut rng);
    let goals: Vec<_> = map.rooms().iter().map(|room| room.center()).collect();

    let iterations = 200;
    let start = Instant::now();

    for i in 0..iterations {
        let field = FlowField::compute(&map, goals[i % goals.len()]);
        assert!(field.goal().is_some());
    }

    let duration = start.elapsed();
    println!(
        "Flow field: {} fields in {:?} ({:.2} μs/field)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks wall collision resolution across the whole map
#[test]
fn benchmark_wall_collisions() {
    let mut rng = StdRng::seed_from_u64(5);
    let map = GameMap::generate(&MapConfig::default(), &mut rng);
    let extent = map.size() as f32 * map.cell_size();

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let t = i as f32 / iterations as f32;
        let mut position = Vector2::new(t * extent, (t * 37.0).fract() * extent);
        resolve_wall_collisions(&mut position, 12.0, &map);
    }

    let duration = start.elapsed();
    println!(
        "Wall collisions: {} resolutions in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks full room ticks with four moving, shooting players
#[test]
fn benchmark_simulation_ticks() {
    let players: Vec<(u32, String)> = (1..=4).map(|id| (id, format!("p{}", id))).collect();
    let config = SimulationConfig {
        seed: Some(17),
        ..Default::default()
    };
    let mut sim = Simulation::new(&players, config);

    let iterations = 1800;
    let start = Instant::now();

    for step in 0..iterations {
        let angle = step as f32 * 0.05;
        for (id, _) in &players {
            sim.handle_input(
                *id,
                InputState {
                    move_x: angle.cos(),
                    move_y: angle.sin(),
                    shoot_x: angle.sin(),
                    shoot_y: -angle.cos(),
                    is_shooting: true,
                },
            );
        }
        sim.advance(1.0 / 30.0);
    }

    let duration = start.elapsed();
    println!(
        "Simulation: {} ticks in {:?} ({:.2} μs/tick, {} field rebuilds)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64,
        sim.field_rebuilds()
    );

    // Should complete in under 10 seconds
    assert!(duration.as_millis() < 10_000);
}

/// Benchmarks snapshot packet serialization
#[test]
fn benchmark_snapshot_serialization() {
    use bincode::{deserialize, serialize};
    use shared::Packet;

    let players: Vec<(u32, String)> = (1..=4).map(|id| (id, format!("p{}", id))).collect();
    let config = SimulationConfig {
        seed: Some(23),
        ..Default::default()
    };
    let mut sim = Simulation::new(&players, config);
    for _ in 0..60 {
        sim.advance(1.0 / 30.0);
    }

    let packet = Packet::GameState {
        tick: sim.tick_count(),
        timestamp: 1234567890,
        snapshot: sim.snapshot(),
    };

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let serialized = serialize(&packet).unwrap();
        let _deserialized: Packet = deserialize(&serialized).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot serialization: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}
