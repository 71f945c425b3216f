//! # Game Module
//!
//! The navigation core: coordinates, tile maps, agent state and the
//! coordinator that turns them into movement decisions.
//!
//! This module contains the fundamental building blocks of Delver:
//! - Grid coordinates and movement directions
//! - Tile bitmask interpretation and the sparse tile map
//! - Per-agent goal and mode state
//! - Goal coordination, frontier exploration and the agent polling loop
//! - Room tours, following a party member and retreating

pub mod agent;
pub mod autoexplore;
pub mod blocking;
pub mod map;
pub mod observation;
pub mod runner;
pub mod state;
pub mod tactics;
pub mod tiles;

pub use agent::*;
pub use autoexplore::*;
pub use blocking::*;
pub use map::*;
pub use observation::*;
pub use runner::*;
pub use state::*;
pub use tactics::*;
pub use tiles::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a 2D coordinate on an unbounded dungeon grid.
///
/// `y` grows downwards, so [`Direction::Up`] decreases `y`.
///
/// # Examples
///
/// ```
/// use delver::Position;
///
/// let pos = Position::new(10, 5);
/// assert_eq!(pos.chebyshev_distance(Position::new(13, 1)), 4);
/// assert_eq!(pos.neighbors().len(), 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// Creates a new position with the given coordinates.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the origin position (0, 0).
    pub fn origin() -> Self {
        Self::new(0, 0)
    }

    /// Chebyshev distance: the number of 8-directional steps between two
    /// positions on an open grid. Exact over the whole `i32` range.
    pub fn chebyshev_distance(self, other: Position) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// Returns all 8 adjacent positions (orthogonal first, then diagonal).
    ///
    /// Coordinates saturate at the edge of the `i32` range, so a position on
    /// that edge reports itself in place of the missing neighbors.
    pub fn neighbors(self) -> [Position; 8] {
        let (n, s) = (self.y.saturating_sub(1), self.y.saturating_add(1));
        let (e, w) = (self.x.saturating_add(1), self.x.saturating_sub(1));
        [
            Position::new(self.x, n),
            Position::new(e, self.y),
            Position::new(self.x, s),
            Position::new(w, self.y),
            Position::new(e, n),
            Position::new(e, s),
            Position::new(w, n),
            Position::new(w, s),
        ]
    }

    /// Whether `other` is one of the 8 neighbors of this position.
    pub fn is_adjacent(self, other: Position) -> bool {
        self.chebyshev_distance(other) == 1
    }

    /// Direction that moves from this position towards `target`.
    ///
    /// Only the signs of the deltas matter, so any target maps to one of
    /// the 8 directions; `target == self` yields [`Direction::None`].
    pub fn direction_to(self, target: Position) -> Direction {
        let sign = |from: i32, to: i32| to.cmp(&from) as i32;
        Direction::from_delta(sign(self.x, target.x), sign(self.y, target.y))
    }

    /// The position one step away in `direction`, saturating at the edge of
    /// the `i32` range.
    pub fn step(self, direction: Direction) -> Position {
        let (dx, dy) = direction.delta();
        Position::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl std::ops::Add for Position {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::Sub for Position {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

/// Movement directions understood by the game server.
///
/// `None` is a real command value ("stay"), not a missing direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
    #[default]
    None,
}

impl Direction {
    /// All 8 moving directions.
    pub const MOVES: [Direction; 8] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
        Direction::UpLeft,
        Direction::UpRight,
        Direction::DownLeft,
        Direction::DownRight,
    ];

    /// Converts a direction to an `(dx, dy)` delta.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::UpLeft => (-1, -1),
            Direction::UpRight => (1, -1),
            Direction::DownLeft => (-1, 1),
            Direction::DownRight => (1, 1),
            Direction::None => (0, 0),
        }
    }

    /// Maps the signs of a delta to a direction.
    pub fn from_delta(dx: i32, dy: i32) -> Direction {
        match (dx.signum(), dy.signum()) {
            (0, -1) => Direction::Up,
            (0, 1) => Direction::Down,
            (-1, 0) => Direction::Left,
            (1, 0) => Direction::Right,
            (-1, -1) => Direction::UpLeft,
            (1, -1) => Direction::UpRight,
            (-1, 1) => Direction::DownLeft,
            (1, 1) => Direction::DownRight,
            _ => Direction::None,
        }
    }

    /// Whether this direction actually moves the agent.
    pub fn is_move(self) -> bool {
        self != Direction::None
    }

    /// Lowercase command name used on the wire.
    pub fn as_command(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::UpLeft => "upleft",
            Direction::UpRight => "upright",
            Direction::DownLeft => "downleft",
            Direction::DownRight => "downright",
            Direction::None => "none",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_command())
    }
}

/// Identifier the game server assigns to a character.
pub type AgentId = String;
