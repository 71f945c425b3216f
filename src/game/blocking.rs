//! # Blocking Policy
//!
//! Which tiles an agent may plan through right now. Terrain comes from the
//! tile map; visible things add obstacles depending on the agent's modes:
//!
//! | obstacle | blocks when |
//! |---|---|
//! | party member, boulder | always |
//! | hostile player character | PvP mode off |
//! | monster | attack mode off |
//!
//! An incorporeal agent ignores terrain but not obstacles.
//!
//! Unknown tiles count as open, but only within one tile of the known area
//! (stretched to cover the agent, its goals and the party). Path searches therefore
//! stay finite even when the goal is sealed off and the agent stands at the
//! edge of unexplored space.

use crate::{AgentState, Bounds, Position, TileMap};
use std::collections::HashSet;

/// Walkability predicate for one agent at one moment.
#[derive(Debug)]
pub struct BlockingPolicy<'a> {
    map: &'a TileMap,
    obstacles: HashSet<Position>,
    area: Bounds,
    incorporeal: bool,
}

/// Unknown tiles searched beyond the edge of the known area.
const SEARCH_MARGIN: i32 = 1;

impl<'a> BlockingPolicy<'a> {
    /// Builds the policy for `agent` on `map`.
    ///
    /// `party` holds the ids and positions of every registered agent on the
    /// same map; the agent's own entry is ignored.
    pub fn for_agent(agent: &AgentState, map: &'a TileMap, party: &[(String, Position)]) -> Self {
        Self {
            map,
            obstacles: obstacles_for(agent, party),
            area: search_area(agent, map, party),
            incorporeal: agent.modes.incorporeal,
        }
    }

    /// Whether the agent may step onto `pos`.
    pub fn can_walk(&self, pos: Position) -> bool {
        if !self.area.contains(pos) || self.obstacles.contains(&pos) {
            return false;
        }
        self.incorporeal || self.map.is_walkable(pos)
    }

    /// Looser check used to verify incorporeal moves: only obstacles count,
    /// terrain is ignored.
    pub fn is_clear_of_obstacles(&self, pos: Position) -> bool {
        !self.obstacles.contains(&pos)
    }

    /// Positions currently treated as obstacles.
    pub fn obstacles(&self) -> &HashSet<Position> {
        &self.obstacles
    }

    /// Rectangle outside of which nothing is walkable.
    pub fn search_area(&self) -> Bounds {
        self.area
    }
}

fn search_area(agent: &AgentState, map: &TileMap, party: &[(String, Position)]) -> Bounds {
    let mut area = map
        .bounds()
        .map_or(Bounds::around(agent.position), |known| {
            known.including(agent.position)
        });
    let goals = [agent.goals.primary, agent.goals.tactical];
    for pos in goals.into_iter().flatten().chain(party.iter().map(|(_, pos)| *pos)) {
        area = area.including(pos);
    }
    area.grown(SEARCH_MARGIN)
}

fn obstacles_for(agent: &AgentState, party: &[(String, Position)]) -> HashSet<Position> {
    let is_party = |id: &str| party.iter().any(|(member, _)| member == id);
    let mut obstacles: HashSet<Position> = party
        .iter()
        .filter(|(id, _)| *id != agent.id)
        .map(|(_, pos)| *pos)
        .collect();

    obstacles.extend(
        agent
            .visible_items
            .iter()
            .filter(|item| item.is_boulder())
            .map(|item| item.position),
    );

    for entity in &agent.visible_entities {
        if entity.id == agent.id {
            continue;
        }
        let blocks = if entity.is_boulder() {
            true
        } else if entity.is_character() {
            is_party(&entity.id) || !agent.modes.pvp
        } else if entity.is_monster() {
            !agent.modes.attacking
        } else {
            false
        };
        if blocks {
            obstacles.insert(entity.position);
        }
    }

    obstacles
}
