//! # Generation Module
//!
//! Procedural dungeon layouts for the simulated game server.
//!
//! Generated dungeons use the same tile bitmask encoding a live server
//! reports, so agents explore them exactly as they would a remote level.

pub mod dungeon;

pub use dungeon::*;

use crate::{Bounds, DelverError, DelverResult, Position};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Configuration for procedural generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Random seed for reproducible generation
    pub seed: u64,
    /// Level width in tiles
    pub width: u32,
    /// Level height in tiles
    pub height: u32,
    /// Minimum room size (including walls)
    pub min_room_size: u32,
    /// Maximum room size (including walls)
    pub max_room_size: u32,
    /// Minimum number of rooms per level
    pub min_rooms: u32,
    /// Maximum number of rooms per level
    pub max_rooms: u32,
    /// Probability of extra connections between rooms (0.0 to 1.0)
    pub extra_connection_chance: f64,
    /// Monsters placed on the level
    pub monster_count: u32,
    /// Boulders placed on the level
    pub boulder_count: u32,
}

impl GenerationConfig {
    /// Creates a default generation configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use delver::GenerationConfig;
    ///
    /// let config = GenerationConfig::new(7);
    /// assert!(config.min_room_size >= 3);
    /// assert!(config.max_room_size >= config.min_room_size);
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            width: 60,
            height: 30,
            min_room_size: 5,
            max_room_size: 10,
            min_rooms: 4,
            max_rooms: 8,
            extra_connection_chance: 0.15,
            monster_count: 4,
            boulder_count: 2,
        }
    }

    /// Creates a configuration for testing with smaller, simpler levels.
    pub fn for_testing(seed: u64) -> Self {
        Self {
            seed,
            width: 30,
            height: 20,
            min_room_size: 4,
            max_room_size: 7,
            min_rooms: 2,
            max_rooms: 4,
            extra_connection_chance: 0.0,
            monster_count: 0,
            boulder_count: 0,
        }
    }

    /// Rejects layouts the generator cannot produce.
    pub fn validate(&self) -> DelverResult<()> {
        if self.min_room_size < 3 {
            return Err(DelverError::InvalidConfig(
                "min_room_size must be at least 3".to_string(),
            ));
        }
        if self.max_room_size < self.min_room_size {
            return Err(DelverError::InvalidConfig(
                "max_room_size must not be below min_room_size".to_string(),
            ));
        }
        if self.min_rooms == 0 || self.max_rooms < self.min_rooms {
            return Err(DelverError::InvalidConfig(
                "room count range is empty".to_string(),
            ));
        }
        if self.width < self.max_room_size + 3 || self.height < self.max_room_size + 3 {
            return Err(DelverError::InvalidConfig(format!(
                "{}x{} level cannot hold rooms of size {}",
                self.width, self.height, self.max_room_size
            )));
        }
        if !(0.0..=1.0).contains(&self.extra_connection_chance) {
            return Err(DelverError::InvalidConfig(
                "extra_connection_chance must be within 0.0..=1.0".to_string(),
            ));
        }
        Ok(())
    }

    /// Creates a seeded random number generator from the config.
    pub fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::new(42)
    }
}

/// A rectangular room. Its outer ring of tiles is the wall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Room number, encoded into the tiles' room id field
    pub id: u32,
    pub top_left: Position,
    /// Width including walls
    pub width: u32,
    /// Height including walls
    pub height: u32,
}

impl Room {
    /// # Examples
    ///
    /// ```
    /// use delver::{Position, Room};
    ///
    /// let room = Room::new(1, Position::new(5, 5), 10, 8);
    /// assert!(room.contains(Position::new(7, 7)));
    /// assert!(!room.interior().contains(Position::new(5, 7)));
    /// ```
    pub fn new(id: u32, top_left: Position, width: u32, height: u32) -> Self {
        Self {
            id,
            top_left,
            width,
            height,
        }
    }

    /// Every tile of the room, walls included.
    pub fn bounds(&self) -> Bounds {
        Bounds {
            min: self.top_left,
            max: Position::new(
                self.top_left.x + self.width as i32 - 1,
                self.top_left.y + self.height as i32 - 1,
            ),
        }
    }

    /// The walkable tiles inside the wall.
    pub fn interior(&self) -> Bounds {
        self.bounds().grown(-1)
    }

    pub fn center(&self) -> Position {
        Position::new(
            self.top_left.x + self.width as i32 / 2,
            self.top_left.y + self.height as i32 / 2,
        )
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.bounds().contains(pos)
    }

    /// Whether the two rooms share any tile, walls included.
    pub fn overlaps(&self, other: &Room) -> bool {
        self.bounds().overlaps(&other.bounds())
    }

    pub fn floor_positions(&self) -> Vec<Position> {
        self.interior().positions().collect()
    }
}

/// Trait for procedural generators.
pub trait Generator<T> {
    /// Generates content using the provided configuration and random number generator.
    fn generate(&self, config: &GenerationConfig, rng: &mut StdRng) -> DelverResult<T>;

    /// Gets the generator type name for logging and debugging.
    fn generator_type(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_geometry() {
        let room = Room::new(1, Position::new(2, 3), 5, 4);
        assert_eq!(room.center(), Position::new(4, 5));
        assert_eq!(room.floor_positions().len(), 3 * 2);
        assert_eq!(room.bounds().positions().count(), 5 * 4);
        assert!(room.contains(Position::new(2, 3)));
        assert!(!room.interior().contains(Position::new(2, 3)));
        assert!(room.interior().contains(Position::new(3, 4)));
        assert_eq!(room.interior().max, Position::new(5, 5));
    }

    #[test]
    fn test_room_overlap() {
        let a = Room::new(1, Position::new(0, 0), 5, 5);
        let b = Room::new(2, Position::new(4, 4), 5, 5);
        let c = Room::new(3, Position::new(5, 0), 5, 5);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        // Shared corner tile (5, 4).
        assert!(c.overlaps(&b));
        assert!(!a.overlaps(&Room::new(4, Position::new(0, 5), 3, 3)));
    }

    #[test]
    fn test_config_validation() {
        assert!(GenerationConfig::new(1).validate().is_ok());
        assert!(GenerationConfig::for_testing(1).validate().is_ok());

        let mut config = GenerationConfig::for_testing(1);
        config.min_room_size = 2;
        assert!(config.validate().is_err());

        let mut config = GenerationConfig::for_testing(1);
        config.width = config.max_room_size;
        assert!(config.validate().is_err());

        let mut config = GenerationConfig::for_testing(1);
        config.max_rooms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_seed_same_rng() {
        use rand::Rng;
        let config = GenerationConfig::new(99);
        let a: u64 = config.rng().gen();
        let b: u64 = config.rng().gen();
        assert_eq!(a, b);
    }
}
