//! # Dungeon Generation
//!
//! Room-and-corridor layouts encoded as tile bitmasks.
//!
//! The generator:
//! 1. Places rectangular rooms with collision detection
//! 2. Connects consecutive rooms with L-shaped corridors, turning crossed
//!    walls into doors
//! 3. Adds stairs in the first and last rooms
//! 4. Verifies every room floor is reachable from the spawn point

use crate::{
    room_id_bits, tiles, DelverError, DelverResult, GenerationConfig, Generator, Position, Room,
    TileFlags, NOTHING,
};
use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::{HashSet, VecDeque};

/// A fully known dungeon level, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedDungeon {
    pub width: u32,
    pub height: u32,
    tiles: Vec<u32>,
    pub rooms: Vec<Room>,
    pub spawn: Position,
}

impl GeneratedDungeon {
    /// Creates a level filled with [`NOTHING`].
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tiles: vec![NOTHING; (width * height) as usize],
            rooms: Vec::new(),
            spawn: Position::origin(),
        }
    }

    /// Builds a level from rows of characters:
    /// `*` wall, `#` solid rock, ` ` floor, `1`-`9` floor of a numbered room,
    /// `.` corridor, `+` door, `>` stairs down.
    pub fn from_rows(rows: &[&str]) -> Self {
        let height = rows.len() as u32;
        let width = rows.iter().map(|row| row.chars().count()).max().unwrap_or(0) as u32;
        let mut dungeon = Self::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                let value = match c {
                    '*' => TileFlags::PERIMETER.bits(),
                    ' ' => TileFlags::ROOM.bits(),
                    '.' => TileFlags::CORRIDOR.bits(),
                    '+' => TileFlags::DOOR1.bits(),
                    '>' => (TileFlags::ROOM | TileFlags::STAIR_DOWN).bits(),
                    '1'..='9' => {
                        TileFlags::ROOM.bits() | room_id_bits(c.to_digit(10).unwrap_or(0))
                    }
                    _ => NOTHING,
                };
                dungeon.set_tile(Position::new(x as i32, y as i32), value);
            }
        }
        dungeon
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    /// Tile value at `pos`; [`NOTHING`] outside the level.
    pub fn tile(&self, pos: Position) -> u32 {
        if !self.in_bounds(pos) {
            return NOTHING;
        }
        self.tiles[self.index(pos)]
    }

    pub fn set_tile(&mut self, pos: Position, value: u32) {
        if self.in_bounds(pos) {
            let index = self.index(pos);
            self.tiles[index] = value;
        }
    }

    pub fn is_walkable(&self, pos: Position) -> bool {
        self.in_bounds(pos) && tiles::is_walkable(self.tile(pos))
    }

    /// Walkable room tiles, in row-major order.
    pub fn floor_positions(&self) -> Vec<Position> {
        self.positions()
            .filter(|pos| {
                self.is_walkable(*pos)
                    && TileFlags::from_bits_retain(self.tile(*pos)).contains(TileFlags::ROOM)
            })
            .collect()
    }

    /// First tile carrying the stairs-down flag, in row-major order.
    pub fn stairs_down(&self) -> Option<Position> {
        self.positions()
            .find(|pos| TileFlags::from_bits_retain(self.tile(*pos)).contains(TileFlags::STAIR_DOWN))
    }

    fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height as i32)
            .flat_map(move |y| (0..self.width as i32).map(move |x| Position::new(x, y)))
    }

    fn index(&self, pos: Position) -> usize {
        pos.y as usize * self.width as usize + pos.x as usize
    }
}

/// Room-and-corridor dungeon generator.
#[derive(Debug, Clone)]
pub struct DungeonGenerator {
    /// Maximum attempts to place a room before giving up
    pub max_placement_attempts: u32,
}

impl DungeonGenerator {
    /// Creates a new dungeon generator with default settings.
    ///
    /// # Examples
    ///
    /// ```
    /// use delver::{DungeonGenerator, GenerationConfig, Generator};
    ///
    /// let config = GenerationConfig::for_testing(3);
    /// let dungeon = DungeonGenerator::new()
    ///     .generate(&config, &mut config.rng())
    ///     .unwrap();
    /// assert!(dungeon.is_walkable(dungeon.spawn));
    /// ```
    pub fn new() -> Self {
        Self {
            max_placement_attempts: 100,
        }
    }

    /// Places rooms without overlaps. Room ids start at 1.
    fn place_rooms(&self, config: &GenerationConfig, rng: &mut StdRng) -> DelverResult<Vec<Room>> {
        let mut rooms: Vec<Room> = Vec::new();
        let room_count = rng.gen_range(config.min_rooms..=config.max_rooms);

        for _ in 0..room_count {
            let id = rooms.len() as u32 + 1;
            if let Some(room) = self.try_place_room(config, rng, id, &rooms) {
                rooms.push(room);
            }
        }

        if rooms.is_empty() {
            return Err(DelverError::GenerationFailed(
                "Failed to place any rooms".to_string(),
            ));
        }

        Ok(rooms)
    }

    fn try_place_room(
        &self,
        config: &GenerationConfig,
        rng: &mut StdRng,
        id: u32,
        existing_rooms: &[Room],
    ) -> Option<Room> {
        for _ in 0..self.max_placement_attempts {
            let width = rng.gen_range(config.min_room_size..=config.max_room_size);
            let height = rng.gen_range(config.min_room_size..=config.max_room_size);
            let x = rng.gen_range(1..(config.width as i32 - width as i32 - 1));
            let y = rng.gen_range(1..(config.height as i32 - height as i32 - 1));
            let room = Room::new(id, Position::new(x, y), width, height);

            if !existing_rooms.iter().any(|existing| room.overlaps(existing)) {
                return Some(room);
            }
        }
        None
    }

    fn carve_room(&self, dungeon: &mut GeneratedDungeon, room: &Room) {
        let interior = room.interior();
        for pos in room.bounds().positions() {
            let value = if interior.contains(pos) {
                TileFlags::ROOM.bits() | room_id_bits(room.id)
            } else {
                TileFlags::PERIMETER.bits()
            };
            dungeon.set_tile(pos, value);
        }
    }

    /// Connects each room to the next one, plus a few random extra links.
    fn connect_rooms(
        &self,
        dungeon: &mut GeneratedDungeon,
        rooms: &[Room],
        config: &GenerationConfig,
        rng: &mut StdRng,
    ) {
        for pair in rooms.windows(2) {
            self.carve_l_corridor(dungeon, pair[0].center(), pair[1].center());
        }

        if rooms.len() < 2 {
            return;
        }
        let extra_connections = (rooms.len() as f64 * config.extra_connection_chance) as usize;
        for _ in 0..extra_connections {
            let first = rng.gen_range(0..rooms.len());
            let second = rng.gen_range(0..rooms.len());
            if first != second {
                self.carve_l_corridor(dungeon, rooms[first].center(), rooms[second].center());
            }
        }
    }

    /// Carves an L-shaped corridor, horizontal leg first.
    fn carve_l_corridor(&self, dungeon: &mut GeneratedDungeon, start: Position, end: Position) {
        for x in start.x.min(end.x)..=start.x.max(end.x) {
            carve_corridor_cell(dungeon, Position::new(x, start.y));
        }
        for y in start.y.min(end.y)..=start.y.max(end.y) {
            carve_corridor_cell(dungeon, Position::new(end.x, y));
        }
    }

    fn add_stairs(&self, dungeon: &mut GeneratedDungeon, rooms: &[Room], rng: &mut StdRng) {
        let mut mark = |room: &Room, flag: TileFlags| {
            let floor = room.floor_positions();
            if floor.is_empty() {
                return;
            }
            let pos = floor[rng.gen_range(0..floor.len())];
            let value = dungeon.tile(pos) | flag.bits();
            dungeon.set_tile(pos, value);
        };

        if let Some(first) = rooms.first() {
            mark(first, TileFlags::STAIR_UP);
        }
        if rooms.len() > 1 {
            if let Some(last) = rooms.last() {
                mark(last, TileFlags::STAIR_DOWN);
            }
        }
    }

    /// Verifies every room floor is reachable from the spawn point.
    fn validate_connectivity(&self, dungeon: &GeneratedDungeon) -> DelverResult<()> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(dungeon.spawn);
        queue.push_back(dungeon.spawn);

        while let Some(pos) = queue.pop_front() {
            for neighbor in pos.neighbors() {
                if dungeon.is_walkable(neighbor) && visited.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }

        for room in &dungeon.rooms {
            if room.floor_positions().iter().any(|pos| !visited.contains(pos)) {
                return Err(DelverError::GenerationFailed(format!(
                    "Room {} is not connected to other rooms",
                    room.id
                )));
            }
        }
        Ok(())
    }
}

/// Corridors turn rock into corridor and walls into doors; floors stay.
fn carve_corridor_cell(dungeon: &mut GeneratedDungeon, pos: Position) {
    let value = dungeon.tile(pos);
    if value == NOTHING {
        dungeon.set_tile(pos, TileFlags::CORRIDOR.bits());
    } else if TileFlags::from_bits_retain(value).contains(TileFlags::PERIMETER) {
        dungeon.set_tile(pos, TileFlags::DOOR1.bits());
    }
}

impl Generator<GeneratedDungeon> for DungeonGenerator {
    fn generate(&self, config: &GenerationConfig, rng: &mut StdRng) -> DelverResult<GeneratedDungeon> {
        config.validate()?;
        let mut dungeon = GeneratedDungeon::new(config.width, config.height);

        let rooms = self.place_rooms(config, rng)?;
        for room in &rooms {
            self.carve_room(&mut dungeon, room);
        }
        self.connect_rooms(&mut dungeon, &rooms, config, rng);
        self.add_stairs(&mut dungeon, &rooms, rng);

        dungeon.spawn = rooms[0].center();
        dungeon.rooms = rooms;
        self.validate_connectivity(&dungeon)?;

        debug!(
            "{} built a {}x{} level with {} rooms",
            self.generator_type(),
            dungeon.width,
            dungeon.height,
            dungeon.rooms.len()
        );
        Ok(dungeon)
    }

    fn generator_type(&self) -> &'static str {
        "DungeonGenerator"
    }
}

impl Default for DungeonGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_connected_and_seeded() {
        let generator = DungeonGenerator::new();
        for seed in 0..20 {
            let config = GenerationConfig::for_testing(seed);
            let dungeon = generator.generate(&config, &mut config.rng()).unwrap();
            assert!(!dungeon.rooms.is_empty());
            assert!(dungeon.is_walkable(dungeon.spawn));
            assert_eq!(dungeon.width, config.width);
            if dungeon.rooms.len() > 1 {
                assert!(dungeon.stairs_down().is_some());
            }

            let again = generator.generate(&config, &mut config.rng()).unwrap();
            assert_eq!(dungeon, again);
        }
    }

    #[test]
    fn test_room_tiles_carry_room_id() {
        let config = GenerationConfig::for_testing(5);
        let dungeon = DungeonGenerator::new()
            .generate(&config, &mut config.rng())
            .unwrap();
        let room = &dungeon.rooms[0];
        assert_eq!(tiles::room_id(dungeon.tile(room.center())), room_id_bits(room.id));
    }

    #[test]
    fn test_l_corridor_opens_doors() {
        let generator = DungeonGenerator::new();
        let mut dungeon = GeneratedDungeon::new(20, 10);
        let left = Room::new(1, Position::new(1, 1), 5, 5);
        let right = Room::new(2, Position::new(12, 1), 5, 5);
        generator.carve_room(&mut dungeon, &left);
        generator.carve_room(&mut dungeon, &right);

        generator.carve_l_corridor(&mut dungeon, left.center(), right.center());

        assert_eq!(dungeon.tile(Position::new(5, 3)), TileFlags::DOOR1.bits());
        assert_eq!(dungeon.tile(Position::new(8, 3)), TileFlags::CORRIDOR.bits());
        assert_eq!(dungeon.tile(Position::new(12, 3)), TileFlags::DOOR1.bits());
        assert!(dungeon.is_walkable(Position::new(5, 3)));
        assert!(!dungeon.is_walkable(Position::new(5, 2)));
    }

    #[test]
    fn test_from_rows() {
        let dungeon = GeneratedDungeon::from_rows(&["*****", "* > *", "*****"]);
        assert_eq!(dungeon.width, 5);
        assert_eq!(dungeon.stairs_down(), Some(Position::new(2, 1)));
        assert_eq!(dungeon.floor_positions().len(), 3);
        assert!(!dungeon.is_walkable(Position::new(-1, 1)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = GenerationConfig::for_testing(1);
        config.min_rooms = 0;
        assert!(DungeonGenerator::new()
            .generate(&config, &mut config.rng())
            .is_err());
    }
}
