//! # Pathfinding Algorithms
//!
//! A* over the 8-connected grid. Diagonal steps cost the same as orthogonal
//! ones, so both the step cost and the heuristic are the Chebyshev distance.
//!
//! The walkability predicate is evaluated on every call and never cached:
//! callers fold the obstacles they can currently see into it, which is how
//! moving monsters and party members are respected.

use crate::Position;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Stateless A* path search.
pub struct PathFinder;

impl PathFinder {
    /// Finds a shortest path from `start` to `goal`.
    ///
    /// The returned path starts with `start` and ends with `goal`. An empty
    /// path means the goal cannot be reached; `start == goal` yields
    /// `[start]`. The start tile itself is never tested for walkability, the
    /// goal must pass `is_walkable` like any other tile.
    ///
    /// There is no node budget: an unreachable goal explores the whole
    /// reachable component before giving up.
    ///
    /// # Examples
    ///
    /// ```
    /// use delver::{PathFinder, Position};
    ///
    /// let path = PathFinder::find_path(Position::new(0, 0), Position::new(3, 1), |_| true);
    /// assert_eq!(path.len(), 4);
    /// assert_eq!(path[0], Position::new(0, 0));
    /// assert_eq!(path[3], Position::new(3, 1));
    /// ```
    pub fn find_path<F>(start: Position, goal: Position, mut is_walkable: F) -> Vec<Position>
    where
        F: FnMut(Position) -> bool,
    {
        let mut open_set = BinaryHeap::new();
        let mut came_from: HashMap<Position, Position> = HashMap::new();
        let mut g_score: HashMap<Position, u32> = HashMap::new();
        let mut closed: HashSet<Position> = HashSet::new();
        let mut sequence = 0u64;

        g_score.insert(start, 0);
        open_set.push(AStarNode {
            position: start,
            f_score: start.chebyshev_distance(goal),
            sequence,
        });

        while let Some(current_node) = open_set.pop() {
            let current = current_node.position;
            if !closed.insert(current) {
                // Stale heap entry, the position was already expanded.
                continue;
            }

            if current == goal {
                return reconstruct_path(&came_from, goal);
            }

            let current_g = g_score.get(&current).copied().unwrap_or(0);
            for neighbor in current.neighbors() {
                if closed.contains(&neighbor) || !is_walkable(neighbor) {
                    continue;
                }

                let tentative_g_score = current_g + 1;
                if tentative_g_score < g_score.get(&neighbor).copied().unwrap_or(u32::MAX) {
                    came_from.insert(neighbor, current);
                    g_score.insert(neighbor, tentative_g_score);
                    sequence += 1;
                    open_set.push(AStarNode {
                        position: neighbor,
                        f_score: tentative_g_score + neighbor.chebyshev_distance(goal),
                        sequence,
                    });
                }
            }
        }

        Vec::new()
    }

    /// The first step of a shortest path, if the goal is reachable and not
    /// the start itself.
    pub fn next_step<F>(start: Position, goal: Position, is_walkable: F) -> Option<Position>
    where
        F: FnMut(Position) -> bool,
    {
        Self::find_path(start, goal, is_walkable).get(1).copied()
    }

    /// Whether any path from `start` to `goal` exists.
    pub fn is_reachable<F>(start: Position, goal: Position, is_walkable: F) -> bool
    where
        F: FnMut(Position) -> bool,
    {
        !Self::find_path(start, goal, is_walkable).is_empty()
    }
}

fn reconstruct_path(came_from: &HashMap<Position, Position>, goal: Position) -> Vec<Position> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

/// Open-set entry: lowest `f_score` first, then earliest insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AStarNode {
    position: Position,
    f_score: u32,
    sequence: u64,
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior in BinaryHeap
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}
