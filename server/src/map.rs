//! Procedural dungeon generation and grid/world coordinate queries.
//!
//! The map is a square occupancy grid carved from solid wall:
//!
//! 1. **Rooms:** rectangles placed by rejection sampling within a fixed
//!    attempt budget, never overlapping (one wall cell of padding between them)
//! 2. **Corridors:** each room is linked to the previous one by an L-shaped
//!    corridor of the configured width
//! 3. **Extra links:** a few random room pairs get additional corridors so the
//!    layout has loops
//!
//! The outermost ring of cells is always wall, and the grid always holds at
//! least one floor cell: if no room could be placed, a fallback room is carved
//! in the centre.

use crate::config::MapConfig;
use crate::physics::Vector2;
use log::{debug, warn};
use rand::Rng;

/// Placement tries per requested room before generation gives up.
pub const PLACEMENT_ATTEMPTS_PER_ROOM: usize = 30;
/// Random draws `random_open_cell` makes before relaxing its distance rule.
pub const SPAWN_SEARCH_ATTEMPTS: usize = 100;
const ROOM_PADDING: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Wall,
    Floor,
}

/// Integer cell coordinate. Signed so neighbour offsets can step off the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Axis-aligned rectangle of floor cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Room {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Room {
    pub fn center(&self) -> GridPos {
        GridPos::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    fn intersects(&self, other: &Room, padding: i32) -> bool {
        self.x - padding < other.x + other.width
            && self.x + self.width + padding > other.x
            && self.y - padding < other.y + other.height
            && self.y + self.height + padding > other.y
    }
}

#[derive(Debug, Clone)]
pub struct GameMap {
    size: usize,
    cell_size: f32,
    cells: Vec<Cell>,
    rooms: Vec<Room>,
    /// Floor cells in row-major order; doubles as the full-grid scan.
    floor_cells: Vec<GridPos>,
}

impl GameMap {
    /// Generates a room-and-corridor dungeon.
    ///
    /// `config` is expected to have passed `SimulationConfig::validate`; sizes
    /// are still clamped so a small grid degrades to fewer, smaller rooms.
    pub fn generate<R: Rng + ?Sized>(config: &MapConfig, rng: &mut R) -> Self {
        let size = config.grid_size.max(3);
        let mut map = Self::filled(size, config.cell_size);
        let n = size as i32;

        let max_room = (config.max_room_size as i32).clamp(1, n - 2);
        let min_room = (config.min_room_size as i32).clamp(1, max_room);

        let mut rooms: Vec<Room> = Vec::with_capacity(config.room_count);
        let attempts = config.room_count * PLACEMENT_ATTEMPTS_PER_ROOM;

        for _ in 0..attempts {
            if rooms.len() >= config.room_count {
                break;
            }

            let width = rng.gen_range(min_room..=max_room);
            let height = rng.gen_range(min_room..=max_room);
            let room = Room {
                x: rng.gen_range(1..=n - width - 1),
                y: rng.gen_range(1..=n - height - 1),
                width,
                height,
            };

            if rooms.iter().any(|other| room.intersects(other, ROOM_PADDING)) {
                continue;
            }

            map.carve_room(&room);
            rooms.push(room);
        }

        if rooms.len() < config.room_count {
            warn!(
                "Placed {} of {} rooms after {} attempts",
                rooms.len(),
                config.room_count,
                attempts
            );
        }

        if rooms.is_empty() {
            let width = min_room;
            let room = Room {
                x: (n - width) / 2,
                y: (n - width) / 2,
                width,
                height: width,
            };
            warn!("No rooms placed, carving fallback room at {:?}", room);
            map.carve_room(&room);
            rooms.push(room);
        }

        for pair in rooms.windows(2) {
            let horizontal_first = rng.gen_bool(0.5);
            map.carve_corridor(
                pair[0].center(),
                pair[1].center(),
                config.corridor_width,
                horizontal_first,
            );
        }

        if rooms.len() > 2 {
            let extra_links = (rooms.len() / 3).max(1);
            for _ in 0..extra_links {
                let a = rng.gen_range(0..rooms.len());
                let b = rng.gen_range(0..rooms.len());
                if a == b {
                    continue;
                }
                let horizontal_first = rng.gen_bool(0.5);
                map.carve_corridor(
                    rooms[a].center(),
                    rooms[b].center(),
                    config.corridor_width,
                    horizontal_first,
                );
            }
        }

        map.rooms = rooms;
        map.refresh_floor_cells();

        debug!(
            "Generated {}x{} map with {} rooms and {} floor cells",
            size,
            size,
            map.rooms.len(),
            map.floor_cells.len()
        );

        map
    }

    /// Builds a map from rows of `#` (wall) and any other character (floor).
    ///
    /// Returns `None` unless the rows form a non-empty square.
    pub fn from_ascii(rows: &[&str], cell_size: f32) -> Option<Self> {
        let size = rows.len();
        if size == 0 || rows.iter().any(|row| row.chars().count() != size) {
            return None;
        }

        let cells = rows
            .iter()
            .flat_map(|row| row.chars())
            .map(|c| if c == '#' { Cell::Wall } else { Cell::Floor })
            .collect();

        let mut map = Self {
            size,
            cell_size,
            cells,
            rooms: Vec::new(),
            floor_cells: Vec::new(),
        };
        map.refresh_floor_cells();
        Some(map)
    }

    fn filled(size: usize, cell_size: f32) -> Self {
        Self {
            size,
            cell_size,
            cells: vec![Cell::Wall; size * size],
            rooms: Vec::new(),
            floor_cells: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn floor_count(&self) -> usize {
        self.floor_cells.len()
    }

    pub fn cell(&self, pos: GridPos) -> Cell {
        self.index(pos)
            .and_then(|i| self.cells.get(i).copied())
            .unwrap_or(Cell::Wall)
    }

    /// Bounds-checked floor test.
    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.cell(GridPos::new(x, y)) == Cell::Floor
    }

    pub fn world_to_grid(&self, position: Vector2) -> GridPos {
        GridPos::new(
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
        )
    }

    /// Centre of the cell in world coordinates.
    pub fn grid_to_world(&self, cell: GridPos) -> Vector2 {
        Vector2::new(
            (cell.x as f32 + 0.5) * self.cell_size,
            (cell.y as f32 + 0.5) * self.cell_size,
        )
    }

    /// Centre of the first placed room, or the first floor cell of a row-major scan.
    pub fn spawn_point(&self) -> Vector2 {
        if let Some(room) = self.rooms.first() {
            return self.grid_to_world(room.center());
        }

        match self.floor_cells.first() {
            Some(&cell) => self.grid_to_world(cell),
            None => {
                let middle = (self.size / 2) as i32;
                self.grid_to_world(GridPos::new(middle, middle))
            }
        }
    }

    /// Picks a random floor cell at least `min_distance_cells` away from every
    /// excluded world position.
    ///
    /// After `SPAWN_SEARCH_ATTEMPTS` failed draws the distance rule is dropped
    /// and any floor cell is returned; a map without floor falls back to the
    /// spawn point.
    pub fn random_open_cell<R: Rng + ?Sized>(
        &self,
        exclude: &[Vector2],
        min_distance_cells: f32,
        rng: &mut R,
    ) -> Vector2 {
        if self.floor_cells.is_empty() {
            return self.spawn_point();
        }

        let min_distance = min_distance_cells * self.cell_size;
        let min_distance_squared = min_distance * min_distance;

        for _ in 0..SPAWN_SEARCH_ATTEMPTS {
            let cell = self.floor_cells[rng.gen_range(0..self.floor_cells.len())];
            let candidate = self.grid_to_world(cell);
            if exclude
                .iter()
                .all(|p| p.distance_squared(&candidate) >= min_distance_squared)
            {
                return candidate;
            }
        }

        debug!(
            "No floor cell {} cells from {} positions, using any open cell",
            min_distance_cells,
            exclude.len()
        );
        let cell = self.floor_cells[rng.gen_range(0..self.floor_cells.len())];
        self.grid_to_world(cell)
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        let n = self.size as i32;
        if pos.x < 0 || pos.y < 0 || pos.x >= n || pos.y >= n {
            return None;
        }
        Some(pos.y as usize * self.size + pos.x as usize)
    }

    /// Turns a cell into floor, leaving the border ring intact.
    fn carve(&mut self, x: i32, y: i32) {
        let n = self.size as i32;
        if x < 1 || y < 1 || x >= n - 1 || y >= n - 1 {
            return;
        }
        if let Some(i) = self.index(GridPos::new(x, y)) {
            self.cells[i] = Cell::Floor;
        }
    }

    fn carve_room(&mut self, room: &Room) {
        for y in room.y..room.y + room.height {
            for x in room.x..room.x + room.width {
                self.carve(x, y);
            }
        }
    }

    fn carve_corridor(&mut self, from: GridPos, to: GridPos, width: usize, horizontal_first: bool) {
        let width = width.max(1) as i32;
        let lo = -((width - 1) / 2);
        let hi = width / 2;

        let corner = if horizontal_first {
            GridPos::new(to.x, from.y)
        } else {
            GridPos::new(from.x, to.y)
        };

        self.carve_band(from, corner, lo, hi);
        self.carve_band(corner, to, lo, hi);
    }

    /// Carves a straight axis-aligned band between two cells sharing a row or column.
    fn carve_band(&mut self, a: GridPos, b: GridPos, lo: i32, hi: i32) {
        let (min_x, max_x) = (a.x.min(b.x), a.x.max(b.x));
        let (min_y, max_y) = (a.y.min(b.y), a.y.max(b.y));

        for y in (min_y + lo)..=(max_y + hi) {
            for x in (min_x + lo)..=(max_x + hi) {
                self.carve(x, y);
            }
        }
    }

    fn refresh_floor_cells(&mut self) {
        let n = self.size as i32;
        self.floor_cells = (0..n)
            .flat_map(|y| (0..n).map(move |x| GridPos::new(x, y)))
            .filter(|&pos| self.cell(pos) == Cell::Floor)
            .collect();
    }
}
