//! # Tile Map
//!
//! Sparse knowledge of one named dungeon area.
//!
//! Positions that were never observed are absent from the map and read as
//! [`UNKNOWN`]. The map tracks whether anything changed since the last
//! successful persistence so callers only store maps that need it.

use crate::{tiles, Observation, Position, TileFlags, UNKNOWN};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeSet, HashMap};

/// Inclusive rectangle of positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: Position,
    pub max: Position,
}

impl Bounds {
    /// The single-tile rectangle at `pos`.
    pub fn around(pos: Position) -> Self {
        Self { min: pos, max: pos }
    }

    pub fn contains(&self, pos: Position) -> bool {
        (self.min.x..=self.max.x).contains(&pos.x) && (self.min.y..=self.max.y).contains(&pos.y)
    }

    /// Smallest rectangle covering both `self` and `pos`.
    pub fn including(self, pos: Position) -> Self {
        Self {
            min: Position::new(self.min.x.min(pos.x), self.min.y.min(pos.y)),
            max: Position::new(self.max.x.max(pos.x), self.max.y.max(pos.y)),
        }
    }

    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    /// Positions in row-major order; empty if the rectangle is inverted.
    pub fn positions(self) -> impl Iterator<Item = Position> {
        (self.min.y..=self.max.y)
            .flat_map(move |y| (self.min.x..=self.max.x).map(move |x| Position::new(x, y)))
    }

    /// The rectangle grown by `margin` tiles on every side (shrunk if negative).
    pub fn grown(self, margin: i32) -> Self {
        Self {
            min: Position::new(
                self.min.x.saturating_sub(margin),
                self.min.y.saturating_sub(margin),
            ),
            max: Position::new(
                self.max.x.saturating_add(margin),
                self.max.y.saturating_add(margin),
            ),
        }
    }
}

/// Known tiles of one area, keyed by position.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMap {
    name: String,
    tiles: HashMap<Position, u32>,
    dirty: bool,
}

impl TileMap {
    /// Creates an empty map; every tile reads as [`UNKNOWN`].
    ///
    /// # Examples
    ///
    /// ```
    /// use delver::{Position, TileMap, UNKNOWN};
    ///
    /// let map = TileMap::new("level-1");
    /// assert_eq!(map.get_tile(Position::new(4, 2)), UNKNOWN);
    /// assert!(!map.has_changes());
    /// ```
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tiles: HashMap::new(),
            dirty: false,
        }
    }

    /// Rebuilds a map from stored tiles. The result has no pending changes.
    pub fn from_tiles(
        name: impl Into<String>,
        tiles: impl IntoIterator<Item = (Position, u32)>,
    ) -> Self {
        Self {
            name: name.into(),
            tiles: tiles.into_iter().collect(),
            dirty: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stored tiles.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Stores a tile value. The change flag is raised only when the value
    /// differs from what was stored before (absence counts as `UNKNOWN`).
    pub fn set_tile(&mut self, pos: Position, value: u32) {
        let previous = self.tiles.insert(pos, value).unwrap_or(UNKNOWN);
        if previous != value {
            self.dirty = true;
        }
    }

    /// Tile value at `pos`, [`UNKNOWN`] if never written.
    pub fn get_tile(&self, pos: Position) -> u32 {
        self.tiles.get(&pos).copied().unwrap_or(UNKNOWN)
    }

    /// Whether terrain at `pos` can be entered (unknown tiles count as open).
    pub fn is_walkable(&self, pos: Position) -> bool {
        tiles::is_walkable(self.get_tile(pos))
    }

    /// Room identifier bits at `pos`; zero outside numbered rooms.
    pub fn room_id_of(&self, pos: Position) -> u32 {
        tiles::room_id(self.get_tile(pos))
    }

    /// Whether any tile changed since the last [`acknowledge_changes`](Self::acknowledge_changes).
    pub fn has_changes(&self) -> bool {
        self.dirty
    }

    /// Marks the current contents as persisted.
    pub fn acknowledge_changes(&mut self) {
        self.dirty = false;
    }

    /// Folds every cell of an observation into the map.
    ///
    /// Cells holding the `UNKNOWN` sentinel carry no information and are
    /// skipped, so an observation never erases knowledge. Other values
    /// overwrite whatever was stored (last write wins).
    pub fn apply_observation(&mut self, observation: &Observation) {
        for (pos, value) in observation.cells() {
            if tiles::is_known(value) {
                self.set_tile(pos, value);
            }
        }
    }

    /// All stored tiles.
    pub fn tiles(&self) -> impl Iterator<Item = (Position, u32)> + '_ {
        self.tiles.iter().map(|(pos, value)| (*pos, *value))
    }

    /// Positions holding an observed (non-`UNKNOWN`) value.
    pub fn known_positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.tiles
            .iter()
            .filter(|(_, value)| tiles::is_known(**value))
            .map(|(pos, _)| *pos)
    }

    /// Distinct non-zero room ids among known tiles.
    pub fn known_room_ids(&self) -> BTreeSet<u32> {
        self.tiles
            .values()
            .map(|value| tiles::room_id(*value))
            .filter(|id| *id != 0)
            .collect()
    }

    /// Known positions belonging to the given room.
    pub fn positions_in_room(&self, room_id: u32) -> Vec<Position> {
        let mut positions: Vec<Position> = self
            .known_positions()
            .filter(|pos| self.room_id_of(*pos) == room_id)
            .collect();
        positions.sort();
        positions
    }

    /// Known positions whose tile carries all of `flags`.
    pub fn positions_with(&self, flags: TileFlags) -> Vec<Position> {
        let mut positions: Vec<Position> = self
            .tiles
            .iter()
            .filter(|(_, value)| {
                tiles::is_known(**value) && TileFlags::from_bits_retain(**value).contains(flags)
            })
            .map(|(pos, _)| *pos)
            .collect();
        positions.sort();
        positions
    }

    /// Known, walkable tile with at least one unknown neighbor.
    pub fn is_frontier(&self, pos: Position) -> bool {
        let value = self.get_tile(pos);
        tiles::is_known(value)
            && tiles::is_walkable(value)
            && pos
                .neighbors()
                .iter()
                .any(|n| !tiles::is_known(self.get_tile(*n)))
    }

    /// Nearest frontier tile (Chebyshev distance from `from`) accepted by
    /// `reachable`.
    ///
    /// Raw distance says nothing about walls in between, so candidates are
    /// tried in distance order until `reachable` accepts one. Equidistant
    /// candidates are tried in row-major order.
    pub fn frontier_candidate<F>(&self, from: Position, mut reachable: F) -> Option<Position>
    where
        F: FnMut(Position) -> bool,
    {
        let mut candidates: Vec<Position> = self
            .known_positions()
            .filter(|pos| self.is_frontier(*pos))
            .collect();
        candidates.sort_by_key(|pos| (pos.chebyshev_distance(from), pos.y, pos.x));
        candidates.into_iter().find(|pos| reachable(*pos))
    }

    /// Uniformly random known walkable position accepted by `reachable`.
    ///
    /// Used once nothing is left to explore.
    pub fn random_walkable_position<R, F>(&self, rng: &mut R, mut reachable: F) -> Option<Position>
    where
        R: Rng + ?Sized,
        F: FnMut(Position) -> bool,
    {
        let mut candidates: Vec<Position> = self
            .known_positions()
            .filter(|pos| self.is_walkable(*pos))
            .collect();
        // Sort first so a seeded rng gives the same pick regardless of hash order.
        candidates.sort();
        candidates.shuffle(rng);
        candidates.into_iter().find(|pos| reachable(*pos))
    }

    /// Bounding box of every known tile, `None` for a map with no knowledge.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut known = self.known_positions();
        let first = Bounds::around(known.next()?);
        Some(known.fold(first, Bounds::including))
    }

    /// Renders the known part of the map, one glyph per tile, for debug logs.
    pub fn to_ascii(&self) -> String {
        let Some(bounds) = self.bounds() else {
            return String::new();
        };

        let mut out = String::new();
        for y in bounds.min.y..=bounds.max.y {
            for x in bounds.min.x..=bounds.max.x {
                out.push(tiles::glyph(self.get_tile(Position::new(x, y))));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::NOTHING;

    /// Builds a map from rows of characters:
    /// `*` perimeter, `#` nothing, ` ` room, `+` door, `?` unknown.
    pub fn map_from_rows(rows: &[&str]) -> TileMap {
        let mut map = TileMap::new("TestMap");
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                let value = match c {
                    '*' => TileFlags::PERIMETER.bits(),
                    '#' => NOTHING,
                    ' ' => TileFlags::ROOM.bits(),
                    '+' => TileFlags::DOOR1.bits(),
                    _ => UNKNOWN,
                };
                map.set_tile(Position::new(x as i32, y as i32), value);
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::map_from_rows;
    use super::*;
    use crate::{room_id_bits, NOTHING};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_unwritten_tiles_are_unknown() {
        let mut map = TileMap::new("level-1");
        map.set_tile(Position::new(0, 0), TileFlags::ROOM.bits());
        assert_eq!(map.get_tile(Position::new(1, 0)), UNKNOWN);
        assert_eq!(map.get_tile(Position::new(0, 0)), TileFlags::ROOM.bits());
    }

    #[test]
    fn test_dirty_flag_tracks_real_changes() {
        let mut map = TileMap::new("level-1");
        let pos = Position::new(2, 3);

        map.set_tile(pos, UNKNOWN);
        assert!(!map.has_changes(), "writing UNKNOWN over absence is no change");

        map.set_tile(pos, TileFlags::CORRIDOR.bits());
        assert!(map.has_changes());
        map.acknowledge_changes();
        assert!(!map.has_changes());

        map.set_tile(pos, TileFlags::CORRIDOR.bits());
        assert!(!map.has_changes(), "same value again is no change");

        map.set_tile(pos, NOTHING);
        assert!(map.has_changes());
    }

    #[test]
    fn test_from_tiles_starts_clean() {
        let map = TileMap::from_tiles("stored", vec![(Position::new(1, 1), NOTHING)]);
        assert!(!map.has_changes());
        assert_eq!(map.len(), 1);
        assert_eq!(map.get_tile(Position::new(1, 1)), NOTHING);
    }

    #[test]
    fn test_observation_skips_unknown_cells() {
        let mut map = TileMap::new("level-1");
        map.set_tile(Position::new(5, 5), TileFlags::ROOM.bits());
        map.acknowledge_changes();

        let obs = Observation::new(
            "level-1",
            Position::new(5, 5),
            Position::new(5, 5),
            vec![vec![UNKNOWN, TileFlags::PERIMETER.bits()]],
        );
        map.apply_observation(&obs);

        assert_eq!(map.get_tile(Position::new(5, 5)), TileFlags::ROOM.bits());
        assert_eq!(map.get_tile(Position::new(6, 5)), TileFlags::PERIMETER.bits());
        assert!(map.has_changes());
    }

    #[test]
    fn test_room_queries() {
        let mut map = TileMap::new("level-1");
        let room = TileFlags::ROOM.bits() | room_id_bits(3);
        map.set_tile(Position::new(1, 1), room);
        map.set_tile(Position::new(2, 1), room);
        map.set_tile(Position::new(3, 1), TileFlags::CORRIDOR.bits());

        assert_eq!(map.room_id_of(Position::new(1, 1)), 3 << 6);
        assert_eq!(map.room_id_of(Position::new(3, 1)), 0);
        assert_eq!(map.known_room_ids().into_iter().collect::<Vec<_>>(), vec![3 << 6]);
        assert_eq!(
            map.positions_in_room(3 << 6),
            vec![Position::new(1, 1), Position::new(2, 1)]
        );
    }

    #[test]
    fn test_positions_with_flags() {
        let mut map = TileMap::new("level-1");
        map.set_tile(
            Position::new(4, 4),
            (TileFlags::ROOM | TileFlags::STAIR_DOWN).bits(),
        );
        map.set_tile(Position::new(5, 4), TileFlags::ROOM.bits());
        assert_eq!(
            map.positions_with(TileFlags::STAIR_DOWN),
            vec![Position::new(4, 4)]
        );
    }

    #[test]
    fn test_corridor_frontier_is_nearest_tile() {
        let map = map_from_rows(&["?####?", "?    ?", "?####?"]);
        let start = Position::new(0, 1);
        assert_eq!(
            map.frontier_candidate(start, |_| true),
            Some(Position::new(1, 1))
        );
    }

    #[test]
    fn test_frontier_respects_reachability() {
        let map = map_from_rows(&["?####?", "?    ?", "?####?"]);
        let start = Position::new(0, 1);
        let far_end = Position::new(4, 1);
        assert_eq!(map.frontier_candidate(start, |p| p == far_end), Some(far_end));
        assert_eq!(map.frontier_candidate(start, |_| false), None);
    }

    #[test]
    fn test_fully_explored_map_has_no_frontier() {
        let map = map_from_rows(&["*****", "*   *", "*****"]);
        assert_eq!(map.frontier_candidate(Position::new(2, 1), |_| true), None);
    }

    #[test]
    fn test_random_walkable_position() {
        let map = map_from_rows(&["*****", "*   *", "*****"]);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let pos = map.random_walkable_position(&mut rng, |_| true).unwrap();
            assert_eq!(pos.y, 1);
            assert!((1..=3).contains(&pos.x));
        }
        assert_eq!(map.random_walkable_position(&mut rng, |_| false), None);
        let only = Position::new(3, 1);
        assert_eq!(
            map.random_walkable_position(&mut rng, |p| p == only),
            Some(only)
        );
    }

    #[test]
    fn test_bounds_cover_known_tiles_only() {
        let mut map = TileMap::new("level-1");
        assert_eq!(map.bounds(), None);

        map.set_tile(Position::new(-2, 5), TileFlags::ROOM.bits());
        map.set_tile(Position::new(3, 1), NOTHING);
        map.set_tile(Position::new(40, 40), UNKNOWN);
        let bounds = map.bounds().unwrap();
        assert_eq!(bounds.min, Position::new(-2, 1));
        assert_eq!(bounds.max, Position::new(3, 5));

        let grown = bounds.grown(1);
        assert!(grown.contains(Position::new(4, 6)));
        assert!(!grown.contains(Position::new(5, 6)));
        assert!(!grown.contains(Position::new(40, 40)));
    }

    #[test]
    fn test_bounds_positions_row_major() {
        let bounds = Bounds::around(Position::new(1, 1)).including(Position::new(2, 2));
        let positions: Vec<Position> = bounds.positions().collect();
        assert_eq!(
            positions,
            vec![
                Position::new(1, 1),
                Position::new(2, 1),
                Position::new(1, 2),
                Position::new(2, 2)
            ]
        );
        assert_eq!(bounds.grown(-1).positions().count(), 0);
    }

    #[test]
    fn test_ascii_dump() {
        let map = map_from_rows(&["***", "*+*"]);
        assert_eq!(map.to_ascii(), "###\n#+#\n");
    }
}
