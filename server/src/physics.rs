use crate::map::GameMap;

///Represents a vector in 2D world space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector2 {
    ///Value along the x-axis.
    /// Positive direction is to the right.
    pub x: f32,
    ///Value along the y-axis.
    /// Positive direction is down, matching grid rows.
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Vector2 { x, y }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        self.magnitude_squared().sqrt()
    }

    pub fn magnitude_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    ///Returns the normalized vector, or zero for degenerate input.
    pub fn normalize(&self) -> Vector2 {
        let mag = self.magnitude();
        if mag.is_finite() && mag > f32::EPSILON {
            Vector2 {
                x: self.x / mag,
                y: self.y / mag,
            }
        } else {
            Vector2::ZERO
        }
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    ///Returns `self - other`.
    pub fn sub(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    pub fn distance_squared(&self, other: &Vector2) -> f32 {
        self.sub(other).magnitude_squared()
    }
}

/// Pushes a circle out of every wall cell in the 3x3 neighbourhood around it.
///
/// For each wall cell whose square overlaps the circle, the circle is moved
/// directly away from the wall cell's centre by the penetration depth. A centre
/// that ended up inside a wall square is moved out through its nearest edge
/// instead. This is
/// a single pass: callers run it once per movement axis, which is enough for
/// the small per-tick displacements the simulation produces. Out-of-bounds
/// cells count as walls, which keeps entities inside the map.
///
/// Returns true if any push was applied.
pub fn resolve_wall_collisions(position: &mut Vector2, radius: f32, map: &GameMap) -> bool {
    let center_cell = map.world_to_grid(*position);
    let half = map.cell_size() / 2.0;
    let mut collided = false;

    for dy in -1..=1 {
        for dx in -1..=1 {
            let cell = center_cell.offset(dx, dy);
            if map.is_walkable(cell.x, cell.y) {
                continue;
            }

            let wall_center = map.grid_to_world(cell);
            let closest = Vector2::new(
                position.x.clamp(wall_center.x - half, wall_center.x + half),
                position.y.clamp(wall_center.y - half, wall_center.y + half),
            );

            if closest == *position {
                *position = exit_through_nearest_edge(*position, wall_center, half, radius);
                collided = true;
                continue;
            }

            let distance_squared = position.distance_squared(&closest);
            if distance_squared >= radius * radius {
                continue;
            }

            let penetration = radius - distance_squared.sqrt();
            let away = position.sub(&wall_center).normalize();
            *position = position.add(&away.scale(penetration));
            collided = true;
        }
    }

    collided
}

// Centre is inside the wall square: leave along the shallowest axis.
fn exit_through_nearest_edge(position: Vector2, wall_center: Vector2, half: f32, radius: f32) -> Vector2 {
    let left = position.x - (wall_center.x - half);
    let right = (wall_center.x + half) - position.x;
    let up = position.y - (wall_center.y - half);
    let down = (wall_center.y + half) - position.y;

    let shallowest = left.min(right).min(up).min(down);
    if shallowest == right {
        Vector2::new(wall_center.x + half + radius, position.y)
    } else if shallowest == left {
        Vector2::new(wall_center.x - half - radius, position.y)
    } else if shallowest == down {
        Vector2::new(position.x, wall_center.y + half + radius)
    } else {
        Vector2::new(position.x, wall_center.y - half - radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn open_room() -> GameMap {
        GameMap::from_ascii(
            &["#####", "#...#", "#...#", "#...#", "#####"],
            10.0,
        )
        .unwrap()
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(Vector2::ZERO.normalize(), Vector2::ZERO);
        assert_eq!(Vector2::new(f32::NAN, 1.0).normalize(), Vector2::ZERO);
    }

    #[test]
    fn test_normalize_unit_length() {
        let v = Vector2::new(3.0, -4.0).normalize();
        assert_approx_eq!(v.magnitude(), 1.0, 1e-6);
        assert_approx_eq!(v.x, 0.6, 1e-6);
    }

    #[test]
    fn test_no_push_in_open_space() {
        let map = open_room();
        let mut position = Vector2::new(25.0, 25.0);

        assert!(!resolve_wall_collisions(&mut position, 4.0, &map));
        assert_eq!(position, Vector2::new(25.0, 25.0));
    }

    #[test]
    fn test_push_out_of_left_wall() {
        let map = open_room();
        // Left wall column spans x in [0, 10); circle of radius 4 at x = 12 overlaps by 2.
        let mut position = Vector2::new(12.0, 25.0);

        assert!(resolve_wall_collisions(&mut position, 4.0, &map));
        assert_approx_eq!(position.x, 14.0, 1e-4);
        assert_approx_eq!(position.y, 25.0, 1e-4);
    }

    #[test]
    fn test_centre_inside_wall_exits_nearest_edge() {
        let map = open_room();
        // Inside the left wall, 2 units from its right edge.
        let mut position = Vector2::new(8.0, 25.0);

        assert!(resolve_wall_collisions(&mut position, 4.0, &map));
        assert_approx_eq!(position.x, 14.0, 1e-4);
        assert_approx_eq!(position.y, 25.0, 1e-4);
    }

    #[test]
    fn test_corner_push_moves_away_from_both_walls() {
        let map = open_room();
        let mut position = Vector2::new(11.0, 11.0);

        resolve_wall_collisions(&mut position, 4.0, &map);

        assert!(position.x > 11.0);
        assert!(position.y > 11.0);
    }
}
