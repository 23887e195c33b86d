use crate::map::{GameMap, GridPos};
use log::{debug, warn};
use std::collections::VecDeque;

/// Cost held by walls and cells with no path to the goal.
pub const UNREACHABLE: f32 = f32::INFINITY;
/// How far (in cells, per cardinal direction) a wall goal is moved to open floor.
pub const GOAL_SEARCH_RADIUS: i32 = 5;

const DIAGONAL_COST: f32 = std::f32::consts::SQRT_2;
const CARDINALS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];
const NEIGHBORS: [(i32, i32); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

/// Cost-to-goal field over the map grid, shared by every pursuer in a room.
///
/// # Algorithm
///
/// Breadth-first expansion from a single goal over the 8-neighbourhood.
/// Cardinal steps cost 1 and diagonal steps cost √2. A cell is re-queued
/// whenever its cost improves, so once the queue drains every reachable cell
/// holds its exact shortest-path cost and satisfies
/// `cost(c) = min(cost(n) + step(c, n))` over its walkable neighbours.
///
/// Diagonal steps are only allowed when both orthogonal side cells are
/// walkable, so paths never cut wall corners.
///
/// Agents descend the field with [`FlowField::next_step`]. A field is built
/// once per goal cell and replaced, never edited, when the goal moves.
#[derive(Debug, Clone)]
pub struct FlowField {
    size: usize,
    goal: Option<GridPos>,
    costs: Vec<f32>,
}

impl FlowField {
    /// Computes the field toward `requested_goal`.
    ///
    /// A goal on a wall is replaced by the nearest floor cell found along the
    /// four cardinal directions within [`GOAL_SEARCH_RADIUS`]. If there is none,
    /// every cell is [`UNREACHABLE`].
    pub fn compute(map: &GameMap, requested_goal: GridPos) -> Self {
        let size = map.size();
        let mut field = Self {
            size,
            goal: None,
            costs: vec![UNREACHABLE; size * size],
        };

        let Some(goal) = effective_goal(map, requested_goal) else {
            warn!(
                "No walkable cell within {} of goal {:?}, flow field is empty",
                GOAL_SEARCH_RADIUS, requested_goal
            );
            return field;
        };
        if goal != requested_goal {
            debug!("Goal {:?} is a wall, using {:?}", requested_goal, goal);
        }

        let Some(goal_index) = field.index(goal) else {
            return field;
        };
        field.goal = Some(goal);
        field.costs[goal_index] = 0.0;

        let mut queue = VecDeque::new();
        queue.push_back(goal);

        while let Some(cell) = queue.pop_front() {
            let Some(current_index) = field.index(cell) else {
                continue;
            };
            let current_cost = field.costs[current_index];

            for (dx, dy) in NEIGHBORS {
                if !can_step(map, cell, dx, dy) {
                    continue;
                }

                let next = cell.offset(dx, dy);
                let Some(next_index) = field.index(next) else {
                    continue;
                };

                let candidate = current_cost + step_cost(dx, dy);
                if candidate < field.costs[next_index] {
                    field.costs[next_index] = candidate;
                    queue.push_back(next);
                }
            }
        }

        field
    }

    /// The goal the field was built toward, after wall substitution.
    pub fn goal(&self) -> Option<GridPos> {
        self.goal
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Cost at `cell`; [`UNREACHABLE`] for walls, disconnected and out-of-bounds cells.
    pub fn cost(&self, cell: GridPos) -> f32 {
        self.index(cell)
            .and_then(|i| self.costs.get(i).copied())
            .unwrap_or(UNREACHABLE)
    }

    pub fn is_reachable(&self, cell: GridPos) -> bool {
        self.cost(cell).is_finite()
    }

    /// The neighbour with the lowest cost strictly below `from`'s cost.
    ///
    /// `None` at the goal, at an unreachable cell, or at a local minimum.
    pub fn next_step(&self, map: &GameMap, from: GridPos) -> Option<GridPos> {
        let current = self.cost(from);
        if !current.is_finite() {
            return None;
        }

        let mut best: Option<(GridPos, f32)> = None;
        for (dx, dy) in NEIGHBORS {
            if !can_step(map, from, dx, dy) {
                continue;
            }

            let next = from.offset(dx, dy);
            let cost = self.cost(next);
            let threshold = best.map_or(current, |(_, best_cost)| best_cost);
            if cost < threshold {
                best = Some((next, cost));
            }
        }

        best.map(|(cell, _)| cell)
    }

    fn index(&self, cell: GridPos) -> Option<usize> {
        let n = self.size as i32;
        if cell.x < 0 || cell.y < 0 || cell.x >= n || cell.y >= n {
            return None;
        }
        Some(cell.y as usize * self.size + cell.x as usize)
    }
}

fn effective_goal(map: &GameMap, goal: GridPos) -> Option<GridPos> {
    if map.is_walkable(goal.x, goal.y) {
        return Some(goal);
    }

    for radius in 1..=GOAL_SEARCH_RADIUS {
        for (dx, dy) in CARDINALS {
            let candidate = goal.offset(dx * radius, dy * radius);
            if map.is_walkable(candidate.x, candidate.y) {
                return Some(candidate);
            }
        }
    }

    None
}

/// Whether an agent may move from `from` by `(dx, dy)` without entering or
/// clipping a wall.
fn can_step(map: &GameMap, from: GridPos, dx: i32, dy: i32) -> bool {
    let to = from.offset(dx, dy);
    if !map.is_walkable(to.x, to.y) {
        return false;
    }

    if dx != 0 && dy != 0 {
        return map.is_walkable(from.x + dx, from.y) && map.is_walkable(from.x, from.y + dy);
    }

    true
}

fn step_cost(dx: i32, dy: i32) -> f32 {
    if dx != 0 && dy != 0 {
        DIAGONAL_COST
    } else {
        1.0
    }
}
