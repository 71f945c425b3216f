//! # Simulated Dungeon
//!
//! In-process [`GameClient`] over a fully known level. It plays the game
//! server for the demo binary and for tests: square scan windows, party
//! characters, static monsters that die after a few hits, boulders and
//! terrain checks on every move.

use crate::game::state::lock;
use crate::{
    config, tiles, AgentState, DelverError, DelverResult, Direction, DungeonGenerator, GameClient,
    GeneratedDungeon, GenerationConfig, Generator, Health, MoveOutcome, Observation, Position,
    TileMap, VisibleThing,
};
use log::{debug, info};
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

const MONSTER_HIT_POINTS: u32 = 2;
const MONSTER_NAMES: [&str; 5] = ["rat", "goblin", "kobold", "bat", "jackal"];

#[derive(Debug, Clone)]
struct Character {
    name: String,
    position: Position,
    health: Option<Health>,
}

#[derive(Debug, Clone)]
struct Monster {
    name: String,
    position: Position,
    hit_points: u32,
}

#[derive(Debug)]
struct World {
    dungeon: GeneratedDungeon,
    characters: BTreeMap<String, Character>,
    monsters: BTreeMap<String, Monster>,
    boulders: BTreeMap<String, Position>,
    /// Remaining moves through solid terrain, per character
    phasing: HashMap<String, u32>,
}

impl World {
    fn is_occupied(&self, pos: Position) -> bool {
        self.characters.values().any(|c| c.position == pos)
            || self.monsters.values().any(|m| m.position == pos)
            || self.boulders.values().any(|b| *b == pos)
    }

    /// Nearest free walkable tile, breadth first from `from`.
    fn free_tile_near(&self, from: Position) -> Option<Position> {
        let mut visited = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);
        while let Some(pos) = queue.pop_front() {
            if self.dungeon.is_walkable(pos) && !self.is_occupied(pos) {
                return Some(pos);
            }
            for neighbor in pos.neighbors() {
                if self.dungeon.is_walkable(neighbor) && visited.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        None
    }

    fn monster_at(&self, pos: Position) -> Option<String> {
        self.monsters
            .iter()
            .find(|(_, monster)| monster.position == pos)
            .map(|(id, _)| id.clone())
    }

    fn attack(&mut self, monster_id: &str) -> MoveOutcome {
        let Some(monster) = self.monsters.get_mut(monster_id) else {
            return rejected("There is nothing to attack");
        };
        monster.hit_points = monster.hit_points.saturating_sub(1);
        if monster.hit_points > 0 {
            return rejected(format!("You hit the {}", monster.name));
        }
        let name = monster.name.clone();
        self.monsters.remove(monster_id);
        info!("The {} was slain", name);
        rejected(format!("You kill the {}", name))
    }
}

fn rejected(reason: impl Into<String>) -> MoveOutcome {
    MoveOutcome::Rejected {
        reason: reason.into(),
    }
}

fn unknown_character(id: &str) -> DelverError {
    DelverError::Client(format!("unknown character {}", id))
}

/// A single simulated level acting as the game server.
#[derive(Debug)]
pub struct SimulatedDungeon {
    map_name: String,
    scan_radius: i32,
    world: Mutex<World>,
}

impl SimulatedDungeon {
    /// Wraps an existing level with no characters, monsters or boulders.
    pub fn new(map_name: impl Into<String>, dungeon: GeneratedDungeon) -> Self {
        Self {
            map_name: map_name.into(),
            scan_radius: config::DEFAULT_SCAN_RADIUS,
            world: Mutex::new(World {
                dungeon,
                characters: BTreeMap::new(),
                monsters: BTreeMap::new(),
                boulders: BTreeMap::new(),
                phasing: HashMap::new(),
            }),
        }
    }

    /// Generates a level and scatters monsters and boulders over room
    /// floors, away from the spawn point.
    pub fn generate(map_name: impl Into<String>, config: &GenerationConfig) -> DelverResult<Self> {
        let mut rng = config.rng();
        let dungeon = DungeonGenerator::new().generate(config, &mut rng)?;
        let spawn = dungeon.spawn;
        let mut spots = dungeon.floor_positions();
        spots.retain(|pos| pos.chebyshev_distance(spawn) > 1);
        spots.shuffle(&mut rng);
        let mut spots = spots.into_iter();

        let simulation = Self::new(map_name, dungeon);
        for index in 0..config.monster_count as usize {
            if let Some(pos) = spots.next() {
                simulation.add_monster(MONSTER_NAMES[index % MONSTER_NAMES.len()], pos);
            }
        }
        for _ in 0..config.boulder_count {
            if let Some(pos) = spots.next() {
                simulation.add_boulder(pos);
            }
        }
        Ok(simulation)
    }

    /// Sets the half-width of the square returned by scans.
    pub fn with_scan_radius(mut self, radius: i32) -> Self {
        self.scan_radius = radius.max(0);
        self
    }

    pub fn map_name(&self) -> &str {
        &self.map_name
    }

    /// Places a new character on the free tile nearest to the spawn point.
    pub fn spawn_agent(&self, name: &str) -> DelverResult<AgentState> {
        let id = Uuid::new_v4().to_string();
        let mut world = lock(&self.world);
        let position = world
            .free_tile_near(world.dungeon.spawn)
            .ok_or_else(|| DelverError::Client(format!("no free tile to spawn {}", name)))?;
        world.characters.insert(
            id.clone(),
            Character {
                name: name.to_string(),
                position,
                health: None,
            },
        );
        info!("Spawned {} ({}) at {}", name, id, position);
        Ok(AgentState::new(id, name, self.map_name.clone(), position))
    }

    /// Places a character with a fixed id at `position`.
    pub fn add_agent_at(&self, id: &str, name: &str, position: Position) -> AgentState {
        lock(&self.world).characters.insert(
            id.to_string(),
            Character {
                name: name.to_string(),
                position,
                health: None,
            },
        );
        AgentState::new(id, name, self.map_name.clone(), position)
    }

    /// Places a monster and returns its id.
    pub fn add_monster(&self, name: &str, position: Position) -> String {
        let id = Uuid::new_v4().to_string();
        lock(&self.world).monsters.insert(
            id.clone(),
            Monster {
                name: name.to_string(),
                position,
                hit_points: MONSTER_HIT_POINTS,
            },
        );
        id
    }

    /// Places a boulder and returns its id.
    pub fn add_boulder(&self, position: Position) -> String {
        let id = Uuid::new_v4().to_string();
        lock(&self.world).boulders.insert(id.clone(), position);
        id
    }

    /// Lets a character pass through solid terrain for the next `moves`
    /// such moves.
    pub fn grant_incorporeal(&self, id: &str, moves: u32) {
        lock(&self.world).phasing.insert(id.to_string(), moves);
    }

    /// Makes scans and moves of a character report these hit points.
    pub fn set_agent_health(&self, id: &str, hit_points: i32, max_hit_points: i32) {
        if let Some(character) = lock(&self.world).characters.get_mut(id) {
            character.health = Some(Health::new(hit_points, max_hit_points));
        }
    }

    pub fn agent_position(&self, id: &str) -> Option<Position> {
        lock(&self.world).characters.get(id).map(|c| c.position)
    }

    pub fn monster_count(&self) -> usize {
        lock(&self.world).monsters.len()
    }

    /// The whole level as a tile map, for comparison with agent knowledge.
    pub fn ground_truth(&self) -> TileMap {
        let world = lock(&self.world);
        let dungeon = &world.dungeon;
        let tiles = (0..dungeon.height as i32)
            .flat_map(|y| (0..dungeon.width as i32).map(move |x| Position::new(x, y)))
            .map(|pos| (pos, dungeon.tile(pos)));
        TileMap::from_tiles(self.map_name.clone(), tiles)
    }

    fn observe(&self, world: &World, id: &str) -> DelverResult<Observation> {
        let (center, health) = world
            .characters
            .get(id)
            .map(|c| (c.position, c.health))
            .ok_or_else(|| unknown_character(id))?;
        let radius = self.scan_radius;
        let origin = Position::new(center.x - radius, center.y - radius);
        let area = (0..=2 * radius)
            .map(|dy| {
                (0..=2 * radius)
                    .map(|dx| world.dungeon.tile(Position::new(origin.x + dx, origin.y + dy)))
                    .collect()
            })
            .collect();

        let in_view = |pos: Position| pos.chebyshev_distance(center) <= radius as u32;
        let mut observation = Observation::new(self.map_name.clone(), center, origin, area);
        observation.health = health;
        observation.items = world
            .boulders
            .iter()
            .filter(|(_, pos)| in_view(**pos))
            .map(|(boulder_id, pos)| VisibleThing::new(boulder_id.clone(), pos.x, pos.y, "item", "boulder"))
            .collect();
        observation.entities = world
            .characters
            .iter()
            .filter(|(_, c)| in_view(c.position))
            .map(|(cid, c)| VisibleThing::new(cid.clone(), c.position.x, c.position.y, "character", c.name.clone()))
            .chain(
                world
                    .monsters
                    .iter()
                    .filter(|(_, m)| in_view(m.position))
                    .map(|(mid, m)| VisibleThing::new(mid.clone(), m.position.x, m.position.y, "monster", m.name.clone())),
            )
            .collect();
        Ok(observation)
    }
}

impl GameClient for SimulatedDungeon {
    fn scan(&self, agent_id: &str) -> DelverResult<Observation> {
        let world = lock(&self.world);
        self.observe(&world, agent_id)
    }

    fn move_agent(&self, agent_id: &str, direction: Direction) -> DelverResult<MoveOutcome> {
        let mut world = lock(&self.world);
        let from = world
            .characters
            .get(agent_id)
            .map(|c| c.position)
            .ok_or_else(|| unknown_character(agent_id))?;

        if !direction.is_move() {
            return Ok(MoveOutcome::Moved(self.observe(&world, agent_id)?));
        }

        let to = from.step(direction);
        if world.boulders.values().any(|pos| *pos == to) {
            return Ok(rejected("There is a boulder in the way"));
        }
        if let Some(monster_id) = world.monster_at(to) {
            return Ok(world.attack(&monster_id));
        }
        if let Some(other) = world.characters.values().find(|c| c.position == to) {
            return Ok(rejected(format!("{} is in the way", other.name)));
        }
        if !tiles::is_walkable(world.dungeon.tile(to)) {
            let charges = world.phasing.get(agent_id).copied().unwrap_or(0);
            if charges == 0 || !world.dungeon.in_bounds(to) {
                return Ok(rejected("You bump into a wall"));
            }
            world.phasing.insert(agent_id.to_string(), charges - 1);
        }

        if let Some(character) = world.characters.get_mut(agent_id) {
            character.position = to;
        }
        debug!("{} moved {} to {}", agent_id, direction, to);
        Ok(MoveOutcome::Moved(self.observe(&world, agent_id)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_room() -> SimulatedDungeon {
        SimulatedDungeon::new(
            "sim",
            GeneratedDungeon::from_rows(&["******", "*    *", "*    *", "******"]),
        )
        .with_scan_radius(1)
    }

    fn reason(outcome: MoveOutcome) -> String {
        match outcome {
            MoveOutcome::Rejected { reason } => reason,
            MoveOutcome::Moved(obs) => panic!("unexpected move to {}", obs.position),
        }
    }

    #[test]
    fn test_scan_window() {
        let sim = small_room();
        sim.add_agent_at("a1", "Alice", Position::new(1, 1));
        let obs = sim.scan("a1").unwrap();
        assert_eq!(obs.origin, Position::new(0, 0));
        assert_eq!(obs.area.len(), 3);
        assert!(obs.area.iter().all(|row| row.len() == 3));
        assert_eq!(obs.area[1][1], crate::TileFlags::ROOM.bits());
        assert_eq!(obs.entities.len(), 1, "the scanning character sees itself");
    }

    #[test]
    fn test_moves_are_validated() {
        let sim = small_room();
        sim.add_agent_at("a1", "Alice", Position::new(1, 1));

        let wall = sim.move_agent("a1", Direction::Up).unwrap();
        assert_eq!(reason(wall), "You bump into a wall");
        assert_eq!(sim.agent_position("a1"), Some(Position::new(1, 1)));

        match sim.move_agent("a1", Direction::DownRight).unwrap() {
            MoveOutcome::Moved(obs) => assert_eq!(obs.position, Position::new(2, 2)),
            other => panic!("expected move, got {:?}", other),
        }
        assert_eq!(sim.agent_position("a1"), Some(Position::new(2, 2)));
    }

    #[test]
    fn test_obstacles_reject_moves() {
        let sim = small_room();
        sim.add_agent_at("a1", "Alice", Position::new(1, 1));
        sim.add_agent_at("a2", "Bob", Position::new(1, 2));
        sim.add_boulder(Position::new(2, 1));

        assert_eq!(
            reason(sim.move_agent("a1", Direction::Right).unwrap()),
            "There is a boulder in the way"
        );
        assert_eq!(
            reason(sim.move_agent("a1", Direction::Down).unwrap()),
            "Bob is in the way"
        );
        let obs = sim.scan("a1").unwrap();
        assert_eq!(obs.items.len(), 1);
        assert!(obs.items[0].is_boulder());
    }

    #[test]
    fn test_monsters_die_after_hits() {
        let sim = small_room();
        sim.add_agent_at("a1", "Alice", Position::new(1, 1));
        sim.add_monster("rat", Position::new(2, 2));

        assert_eq!(
            reason(sim.move_agent("a1", Direction::DownRight).unwrap()),
            "You hit the rat"
        );
        assert_eq!(
            reason(sim.move_agent("a1", Direction::DownRight).unwrap()),
            "You kill the rat"
        );
        assert_eq!(sim.monster_count(), 0);
        assert!(sim.move_agent("a1", Direction::DownRight).unwrap().is_success());
    }

    #[test]
    fn test_phasing_runs_out() {
        let sim = small_room();
        sim.add_agent_at("a1", "Alice", Position::new(1, 1));
        sim.grant_incorporeal("a1", 1);

        assert!(sim.move_agent("a1", Direction::Up).unwrap().is_success());
        assert_eq!(sim.agent_position("a1"), Some(Position::new(1, 0)));
        assert!(!sim.move_agent("a1", Direction::Up).unwrap().is_success());
    }

    #[test]
    fn test_health_is_reported_once_set() {
        let sim = small_room();
        sim.add_agent_at("a1", "Alice", Position::new(1, 1));
        assert_eq!(sim.scan("a1").unwrap().health, None);

        sim.set_agent_health("a1", 3, 10);
        assert_eq!(sim.scan("a1").unwrap().health, Some(Health::new(3, 10)));
        match sim.move_agent("a1", Direction::Right).unwrap() {
            MoveOutcome::Moved(obs) => assert_eq!(obs.health, Some(Health::new(3, 10))),
            other => panic!("expected move, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_character_is_client_error() {
        let sim = small_room();
        assert!(matches!(sim.scan("ghost"), Err(DelverError::Client(_))));
        assert!(sim.move_agent("ghost", Direction::Up).is_err());
    }

    #[test]
    fn test_generated_world_spawns_party() {
        let mut config = GenerationConfig::for_testing(11);
        config.monster_count = 2;
        config.boulder_count = 1;
        let sim = SimulatedDungeon::generate("sim", &config).unwrap();
        assert_eq!(sim.monster_count(), 2);

        let a = sim.spawn_agent("Alice").unwrap();
        let b = sim.spawn_agent("Bob").unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.position, b.position);
        let truth = sim.ground_truth();
        assert!(truth.is_walkable(a.position));
        assert!(truth.is_walkable(b.position));
    }
}
