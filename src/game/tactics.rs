//! # Tactics
//!
//! Behaviours on top of the [`NavigationCoordinator`] besides frontier
//! exploration: touring the rooms of a level, trailing a party member and
//! withdrawing from a fight.

use crate::{Direction, NavigationCoordinator, PathFinder, Position, Retreat};
use log::{debug, info};
use rand::seq::SliceRandom;

impl NavigationCoordinator {
    /// Sends the agent to the nearest reachable known tile of a room.
    ///
    /// `room_id` is the unshifted room id field of the room's tiles. On
    /// success the room is recorded and the tile becomes the primary goal.
    /// Returns `None`, leaving goals untouched, when no tile of the room can
    /// be reached.
    pub fn set_room_goal(&self, id: &str, room_id: u32) -> Option<Position> {
        if room_id == 0 {
            return None;
        }
        let target = self
            .with_policy(id, |agent, map, policy| {
                let start = agent.position;
                let mut candidates = map.positions_in_room(room_id);
                candidates.retain(|pos| *pos != start && map.is_walkable(*pos));
                candidates.sort_by_key(|pos| (pos.chebyshev_distance(start), pos.y, pos.x));
                candidates.into_iter().find(|target| {
                    PathFinder::is_reachable(start, *target, |pos| policy.can_walk(pos))
                })
            })
            .flatten()?;

        self.update_agent(id, |agent| {
            info!(
                "Agent {} ({}) walking to room {:#x} at {}",
                agent.name, agent.id, room_id, target
            );
            agent.goals.room = Some(room_id);
            agent.goals.primary = Some(target);
        });
        Some(target)
    }

    /// The room the agent is walking to.
    pub fn room_goal(&self, id: &str) -> Option<u32> {
        self.agent(id).and_then(|agent| agent.goals.room)
    }

    pub fn clear_room_goal(&self, id: &str) {
        self.update_agent(id, |agent| agent.goals.room = None);
    }

    /// Tours the known rooms of the agent's map one after another.
    ///
    /// While a primary goal is set the tour waits for it. Otherwise the room
    /// goal is pursued until the agent stands inside that room, then another
    /// known room is drawn at random. Returns the room being walked to, or
    /// `None` when no other known room is reachable.
    pub fn walk_rooms(&self, id: &str) -> Option<u32> {
        let Some(agent) = self.agent(id) else {
            debug!("Not walking rooms for unknown agent {}", id);
            return None;
        };
        if agent.goals.primary.is_some() {
            return agent.goals.room;
        }

        let (here, mut rooms) = self.with_policy(id, |agent, map, _| {
            let rooms: Vec<u32> = map.known_room_ids().into_iter().collect();
            (map.room_id_of(agent.position), rooms)
        })?;

        if let Some(room) = agent.goals.room.filter(|room| *room != here) {
            if self.set_room_goal(id, room).is_some() {
                return Some(room);
            }
        }

        rooms.retain(|room| *room != here && Some(*room) != agent.goals.room);
        rooms.shuffle(&mut *self.rng());
        for room in rooms {
            if self.set_room_goal(id, room).is_some() {
                return Some(room);
            }
        }

        debug!("Agent {} has no room left to walk to", id);
        self.clear_room_goal(id);
        None
    }

    /// Direction that keeps the agent close to `leader`.
    ///
    /// A leader with a tactical goal is fighting: the agent takes over the
    /// leader's attack and PvP modes and closes in on that goal. Otherwise
    /// the agent's combat modes are switched off and it approaches the
    /// leader until it is within `keep` tiles (at least one, the leader's
    /// own tile is occupied).
    pub fn follow(&self, id: &str, leader: &str, keep: u32) -> Direction {
        let Some(leader_state) = self.agent(leader).filter(|_| leader != id) else {
            debug!("Agent {} has no leader {} to follow", id, leader);
            return Direction::None;
        };

        let engaging = leader_state.goals.tactical;
        if engaging.is_some() {
            self.set_combat_modes(id, leader_state.modes.attacking, leader_state.modes.pvp);
        } else {
            self.set_combat_modes(id, false, false);
        }
        let (target, keep) = match engaging {
            Some(goal) => (goal, 0),
            None => (leader_state.position, keep.max(1)),
        };

        self.with_policy(id, |agent, _, policy| {
            if agent.map_name != leader_state.map_name
                || agent.position.chebyshev_distance(target) <= keep
            {
                return Direction::None;
            }
            PathFinder::next_step(agent.position, target, |pos| {
                pos == target || policy.can_walk(pos)
            })
            .map(|next| agent.position.direction_to(next))
            .unwrap_or(Direction::None)
        })
        .unwrap_or(Direction::None)
    }

    fn set_combat_modes(&self, id: &str, attacking: bool, pvp: bool) {
        self.update_agent(id, |agent| {
            if agent.modes.attacking != attacking || agent.modes.pvp != pvp {
                debug!(
                    "Agent {} attack mode: {}, PvP mode: {}",
                    agent.id, attacking, pvp
                );
                agent.modes.attacking = attacking;
                agent.modes.pvp = pvp;
                agent.goals.tactical = None;
            }
        });
    }

    /// Withdraws the agent from combat.
    ///
    /// The first call puts attack and PvP mode aside, drops both goals and
    /// heads for a random reachable walkable tile. Later calls keep that
    /// refuge. Returns the refuge, `None` once it is reached or when
    /// nothing is reachable.
    pub fn retreat(&self, id: &str) -> Option<Position> {
        let started = self.update_agent(id, |agent| {
            if agent.retreat.is_some() {
                return false;
            }
            info!("Agent {} ({}) is retreating", agent.name, agent.id);
            agent.retreat = Some(Retreat {
                resume_attacking: agent.modes.attacking,
                resume_pvp: agent.modes.pvp,
            });
            agent.modes.attacking = false;
            agent.modes.pvp = false;
            agent.goals.primary = None;
            agent.goals.tactical = None;
            true
        })?;
        if !started {
            return self.goal(id);
        }

        let refuge = self
            .with_policy(id, |agent, map, policy| {
                let start = agent.position;
                let mut rng = self.rng();
                map.random_walkable_position(&mut *rng, |target| {
                    target != start
                        && PathFinder::is_reachable(start, target, |pos| policy.can_walk(pos))
                })
            })
            .flatten();

        match refuge {
            Some(target) => self.set_goal(id, target),
            None => debug!("Agent {} has nowhere to retreat to", id),
        }
        refuge
    }

    /// Ends a retreat: the combat modes come back and the refuge goal is
    /// dropped. Returns whether the agent was retreating.
    pub fn end_retreat(&self, id: &str) -> bool {
        self.update_agent(id, |agent| {
            let Some(retreat) = agent.retreat.take() else {
                return false;
            };
            info!("Agent {} ({}) rejoins the fight", agent.name, agent.id);
            agent.modes.attacking = retreat.resume_attacking;
            agent.modes.pvp = retreat.resume_pvp;
            agent.goals.primary = None;
            true
        })
        .unwrap_or(false)
    }

    pub fn is_retreating(&self, id: &str) -> bool {
        self.agent(id).is_some_and(|agent| agent.retreat.is_some())
    }
}
