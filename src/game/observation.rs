//! # Observations
//!
//! What the game server reports back after a scan or a move.

use crate::{Health, Position, VisibleThing};
use serde::{Deserialize, Serialize};

/// A single scan of the surroundings of one agent.
///
/// `area` is a row-major rectangle of raw tile values whose top-left cell
/// sits at `origin` (the server's `bx`/`by`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Name of the area/level the agent is on
    pub map_name: String,
    /// Confirmed agent position
    pub position: Position,
    /// Map coordinate of `area[0][0]`
    pub origin: Position,
    /// Observed tile values, `area[row][column]`
    pub area: Vec<Vec<u32>>,
    /// Items lying in view
    pub items: Vec<VisibleThing>,
    /// Monsters and characters in view
    pub entities: Vec<VisibleThing>,
    /// Free-form game messages attached to the result
    pub messages: Vec<String>,
    /// Hit points of the observing agent, when reported
    #[serde(default)]
    pub health: Option<Health>,
}

impl Observation {
    /// Creates an observation with no visible things or messages.
    pub fn new(
        map_name: impl Into<String>,
        position: Position,
        origin: Position,
        area: Vec<Vec<u32>>,
    ) -> Self {
        Self {
            map_name: map_name.into(),
            position,
            origin,
            area,
            items: Vec::new(),
            entities: Vec::new(),
            messages: Vec::new(),
            health: None,
        }
    }

    /// Every covered cell with its map coordinate.
    pub fn cells(&self) -> impl Iterator<Item = (Position, u32)> + '_ {
        self.area.iter().enumerate().flat_map(move |(row, columns)| {
            columns.iter().enumerate().map(move |(column, &value)| {
                (
                    Position::new(self.origin.x + column as i32, self.origin.y + row as i32),
                    value,
                )
            })
        })
    }
}

/// Answer of the game server to a move command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MoveOutcome {
    /// The move happened; the observation carries the new position.
    Moved(Observation),
    /// The server refused the move.
    Rejected { reason: String },
}

impl MoveOutcome {
    /// Whether the server confirmed the move.
    pub fn is_success(&self) -> bool {
        matches!(self, MoveOutcome::Moved(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cells_are_offset_by_origin() {
        let obs = Observation::new(
            "level-1",
            Position::new(11, 21),
            Position::new(10, 20),
            vec![vec![1, 2, 3], vec![4, 5, 6]],
        );
        let cells: Vec<_> = obs.cells().collect();
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[0], (Position::new(10, 20), 1));
        assert_eq!(cells[2], (Position::new(12, 20), 3));
        assert_eq!(cells[5], (Position::new(12, 21), 6));
    }

    #[test]
    fn test_ragged_rows_are_supported() {
        let obs = Observation::new(
            "level-1",
            Position::origin(),
            Position::new(-1, -1),
            vec![vec![7], vec![8, 9]],
        );
        let cells: Vec<_> = obs.cells().collect();
        assert_eq!(
            cells,
            vec![
                (Position::new(-1, -1), 7),
                (Position::new(-1, 0), 8),
                (Position::new(0, 0), 9),
            ]
        );
    }
}
