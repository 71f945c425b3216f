//! # Autoexplore Module
//!
//! Goal selection on top of the [`NavigationCoordinator`]: frontier-based
//! scouting of partially known maps and picking hostile targets to engage.
//!
//! Scouting is a small state machine evaluated once per tick:
//!
//! 1. The agent already has a primary goal: keep it.
//! 2. A reachable frontier tile exists: head for the nearest one.
//! 3. Nothing left to explore: mark the map explored and wander to a random
//!    reachable walkable tile.

use crate::{NavigationCoordinator, PathFinder, Position};
use log::debug;

impl NavigationCoordinator {
    /// Picks an exploration goal for the agent if it has none.
    ///
    /// Returns `true` while the agent's map still has something to explore,
    /// `false` once it is fully explored or the agent is unknown.
    pub fn scout(&self, id: &str) -> bool {
        let Some(agent) = self.agent(id) else {
            debug!("Not scouting for unknown agent {}", id);
            return false;
        };

        if agent.goals.primary.is_some() {
            return !self.is_fully_explored(&agent.map_name);
        }

        let start = agent.position;
        let frontier = self
            .with_policy(id, |_, map, policy| {
                map.frontier_candidate(start, |target| {
                    PathFinder::is_reachable(start, target, |pos| policy.can_walk(pos))
                })
            })
            .flatten();

        if let Some(target) = frontier {
            self.set_goal(id, target);
            return true;
        }

        self.mark_fully_explored(&agent.map_name);

        let fallback = self
            .with_policy(id, |_, map, policy| {
                let mut rng = self.rng();
                map.random_walkable_position(&mut *rng, |target| {
                    PathFinder::is_reachable(start, target, |pos| policy.can_walk(pos))
                })
            })
            .flatten();

        match fallback {
            Some(target) => self.set_goal(id, target),
            None => debug!("Agent {} has nowhere to wander", id),
        }
        false
    }

    /// Points the agent's tactical goal at the nearest reachable hostile.
    ///
    /// Monsters count as hostile in attack mode, other players' characters
    /// in PvP mode. Party members never do. Candidates are ranked by
    /// Chebyshev distance, ties in row-major order. Returns the target, or
    /// `None` (leaving goals untouched) when nothing qualifies.
    pub fn engage_nearest_hostile(&self, id: &str) -> Option<Position> {
        let party = self.party();
        let target = self
            .with_policy(id, |agent, _, policy| {
                let mut hostiles: Vec<Position> = agent
                    .visible_entities
                    .iter()
                    .filter(|entity| entity.id != agent.id && !party.contains(&entity.id))
                    .filter(|entity| {
                        (entity.is_monster() && agent.modes.attacking)
                            || (entity.is_character() && agent.modes.pvp)
                    })
                    .map(|entity| entity.position)
                    .collect();
                hostiles.sort_by_key(|pos| (pos.chebyshev_distance(agent.position), pos.y, pos.x));
                hostiles.into_iter().find(|target| {
                    PathFinder::is_reachable(agent.position, *target, |pos| policy.can_walk(pos))
                })
            })
            .flatten()?;

        if self.tactical_goal(id) != Some(target) {
            self.set_tactical_goal(id, target);
        }
        Some(target)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        AgentState, Direction, NavigationCoordinator, Observation, Position, TileFlags,
        VisibleThing, UNKNOWN,
    };

    /// `*` perimeter, ` ` room, `?` unknown.
    fn observation(position: Position, rows: &[&str]) -> Observation {
        let area = rows
            .iter()
            .map(|row| {
                row.chars()
                    .map(|c| match c {
                        '*' => TileFlags::PERIMETER.bits(),
                        ' ' => TileFlags::ROOM.bits(),
                        _ => UNKNOWN,
                    })
                    .collect()
            })
            .collect();
        Observation::new("level-1", position, Position::origin(), area)
    }

    fn setup(position: Position, rows: &[&str]) -> NavigationCoordinator {
        let coordinator = NavigationCoordinator::in_memory().with_rng_seed(42);
        coordinator.add_agent(AgentState::new("a1", "Alice", "level-1", position));
        coordinator.apply_observation("a1", &observation(position, rows));
        coordinator
    }

    #[test]
    fn test_scout_heads_for_nearest_frontier() {
        let coordinator = setup(Position::new(1, 1), &["*****?", "*    ?", "*****?"]);
        assert!(coordinator.scout("a1"));
        assert_eq!(coordinator.goal("a1"), Some(Position::new(4, 1)));
        assert_eq!(coordinator.next_direction("a1"), Direction::Right);
    }

    #[test]
    fn test_scout_keeps_existing_goal() {
        let coordinator = setup(Position::new(1, 1), &["*****?", "*    ?", "*****?"]);
        coordinator.set_goal("a1", Position::new(2, 1));
        assert!(coordinator.scout("a1"));
        assert_eq!(coordinator.goal("a1"), Some(Position::new(2, 1)));
    }

    #[test]
    fn test_scout_skips_unreachable_frontier() {
        // The unknown column on the right sits behind a wall.
        let coordinator = setup(
            Position::new(1, 1),
            &["*******", "*  *  ?", "*******"],
        );
        assert!(!coordinator.scout("a1"));
        assert!(coordinator.is_fully_explored("level-1"));
    }

    #[test]
    fn test_scout_passes_over_sealed_pocket() {
        // (2, 1) is unknown but walled in; the bottom gap leads into the
        // unexplored rest of the level.
        let coordinator = setup(
            Position::new(2, 3),
            &[
                "*******", "* ? ***", "*******", "*     *", "*     *", "*     *", "*** ***",
            ],
        );
        assert!(coordinator.scout("a1"));
        assert_eq!(coordinator.goal("a1"), Some(Position::new(3, 6)));
        assert_eq!(coordinator.next_direction("a1"), Direction::Down);
        assert!(!coordinator.is_fully_explored("level-1"));
    }

    #[test]
    fn test_explored_map_falls_back_to_random_goal() {
        let coordinator = setup(Position::new(1, 1), &["*****", "*   *", "*****"]);
        assert!(!coordinator.scout("a1"));
        assert!(coordinator.is_fully_explored("level-1"));

        let goal = coordinator.goal("a1").expect("fallback goal");
        assert_eq!(goal.y, 1);
        assert!((1..=3).contains(&goal.x));

        // A second pass keeps the fallback and still reports explored.
        assert!(!coordinator.scout("a1"));
        assert_eq!(
            coordinator
                .messages()
                .iter()
                .filter(|m| m.contains("fully explored"))
                .count(),
            1
        );
    }

    #[test]
    fn test_scout_unknown_agent() {
        let coordinator = NavigationCoordinator::in_memory();
        assert!(!coordinator.scout("ghost"));
    }

    #[test]
    fn test_engage_requires_matching_mode() {
        let coordinator = setup(Position::new(1, 1), &["******", "*    *", "*    *", "******"]);
        let mut obs = observation(
            Position::new(1, 1),
            &["******", "*    *", "*    *", "******"],
        );
        obs.entities.push(VisibleThing::new("m1", 4, 2, "monster", "rat"));
        obs.entities.push(VisibleThing::new("m2", 3, 1, "monster", "bat"));
        obs.entities.push(VisibleThing::new("p1", 2, 1, "character", "Rival"));
        coordinator.apply_observation("a1", &obs);

        assert_eq!(coordinator.engage_nearest_hostile("a1"), None);
        assert_eq!(coordinator.tactical_goal("a1"), None);

        coordinator.toggle_attack_mode("a1");
        assert_eq!(
            coordinator.engage_nearest_hostile("a1"),
            Some(Position::new(3, 1))
        );
        assert_eq!(coordinator.tactical_goal("a1"), Some(Position::new(3, 1)));

        coordinator.toggle_pvp_mode("a1");
        assert_eq!(
            coordinator.engage_nearest_hostile("a1"),
            Some(Position::new(2, 1))
        );
    }

    #[test]
    fn test_party_members_are_never_targets() {
        let coordinator = setup(Position::new(1, 1), &["*****", "*   *", "*****"]);
        coordinator.add_agent(AgentState::new("a2", "Bob", "level-1", Position::new(3, 1)));
        let mut obs = observation(Position::new(1, 1), &["*****", "*   *", "*****"]);
        obs.entities.push(VisibleThing::new("a2", 3, 1, "character", "Bob"));
        coordinator.apply_observation("a1", &obs);

        coordinator.toggle_pvp_mode("a1");
        assert_eq!(coordinator.engage_nearest_hostile("a1"), None);
    }
}
