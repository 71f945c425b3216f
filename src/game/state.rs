//! # Navigation Coordinator
//!
//! Central coordination between agents, the maps they share and the game
//! server.
//!
//! The coordinator owns one [`AgentState`] per registered agent and one
//! [`TileMap`] per dungeon area. It folds observations into both, keeps
//! goals in sync with confirmed positions, persists maps that changed and
//! reduces a goal to a single [`Direction`] per tick.
//!
//! All operations take `&self`, so a coordinator behind an `Arc` can serve
//! one task per agent. Maps are guarded per area: observation writes are
//! serialized while path searches read concurrently. Unknown agent ids make
//! every operation a logged no-op.

use crate::{
    AgentId, AgentState, BlockingPolicy, DelverError, DelverResult, Direction, GameClient, MapStorage,
    MemoryMapStorage, MoveOutcome, Observation, PathFinder, Position, TileMap,
};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A tile map shared by every agent on that area.
pub type SharedMap = Arc<RwLock<TileMap>>;

/// Newest-first log of game messages with consecutive duplicates dropped.
#[derive(Debug, Clone)]
pub struct MessageLog {
    messages: VecDeque<String>,
    capacity: usize,
}

impl MessageLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            capacity,
        }
    }

    /// Adds a message unless it is empty or repeats the latest one.
    pub fn push(&mut self, message: &str) {
        if message.is_empty() || self.messages.front().map(String::as_str) == Some(message) {
            return;
        }
        self.messages.push_front(message.to_string());
        self.messages.truncate(self.capacity);
    }

    /// Messages, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(crate::config::MAX_MESSAGES)
    }
}

/// Goal, mode and map bookkeeping for a party of agents.
pub struct NavigationCoordinator {
    agents: RwLock<HashMap<AgentId, AgentState>>,
    maps: RwLock<HashMap<String, SharedMap>>,
    explored: Mutex<HashSet<String>>,
    messages: Mutex<MessageLog>,
    storage: Mutex<Box<dyn MapStorage>>,
    rng: Mutex<StdRng>,
}

impl NavigationCoordinator {
    /// Creates a coordinator and loads every map the storage knows.
    pub fn new(storage: Box<dyn MapStorage>) -> DelverResult<Self> {
        let maps = storage
            .get_all()?
            .into_iter()
            .map(|map| (map.name().to_string(), Arc::new(RwLock::new(map))))
            .collect::<HashMap<_, _>>();
        info!("Loaded {} stored map(s)", maps.len());

        Ok(Self {
            agents: RwLock::new(HashMap::new()),
            maps: RwLock::new(maps),
            explored: Mutex::new(HashSet::new()),
            messages: Mutex::new(MessageLog::default()),
            storage: Mutex::new(storage),
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    /// Creates a coordinator that keeps maps in memory only.
    pub fn in_memory() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            maps: RwLock::new(HashMap::new()),
            explored: Mutex::new(HashSet::new()),
            messages: Mutex::new(MessageLog::default()),
            storage: Mutex::new(Box::new(MemoryMapStorage::new())),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Makes fallback goal selection reproducible.
    pub fn with_rng_seed(self, seed: u64) -> Self {
        *lock(&self.rng) = StdRng::seed_from_u64(seed);
        self
    }

    // ------------------------------------------------------------------
    // Party
    // ------------------------------------------------------------------

    /// Registers (or replaces) an agent. Registered agents form the party.
    pub fn add_agent(&self, agent: AgentState) {
        info!(
            "Agent {} ({}) joined on {} at {}",
            agent.name, agent.id, agent.map_name, agent.position
        );
        write(&self.agents).insert(agent.id.clone(), agent);
    }

    pub fn remove_agent(&self, id: &str) -> Option<AgentState> {
        write(&self.agents).remove(id)
    }

    /// Snapshot of one agent.
    pub fn agent(&self, id: &str) -> Option<AgentState> {
        read(&self.agents).get(id).cloned()
    }

    /// Ids of all registered agents, sorted.
    pub fn party(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = read(&self.agents).keys().cloned().collect();
        ids.sort();
        ids
    }

    fn party_on_map(&self, map_name: &str) -> Vec<(AgentId, Position)> {
        read(&self.agents)
            .values()
            .filter(|agent| agent.map_name == map_name)
            .map(|agent| (agent.id.clone(), agent.position))
            .collect()
    }

    /// Applies `f` to a registered agent; unknown ids are logged and skipped.
    pub(crate) fn update_agent<R>(&self, id: &str, f: impl FnOnce(&mut AgentState) -> R) -> Option<R> {
        let mut agents = write(&self.agents);
        match agents.get_mut(id) {
            Some(agent) => Some(f(agent)),
            None => {
                debug!("Ignoring request for unknown agent {}", id);
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Maps
    // ------------------------------------------------------------------

    /// The map of the named area, if it was ever referenced.
    pub fn map(&self, name: &str) -> Option<SharedMap> {
        read(&self.maps).get(name).cloned()
    }

    /// Copy of the named map's current contents.
    pub fn map_snapshot(&self, name: &str) -> Option<TileMap> {
        self.map(name).map(|map| read(&*map).clone())
    }

    /// Names of all known maps, sorted.
    pub fn map_names(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.maps).keys().cloned().collect();
        names.sort();
        names
    }

    /// The map of the named area, created empty on first reference.
    pub fn map_or_insert(&self, name: &str) -> SharedMap {
        if let Some(map) = self.map(name) {
            return map;
        }
        write(&self.maps)
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("Created map {}", name);
                Arc::new(RwLock::new(TileMap::new(name)))
            })
            .clone()
    }

    /// Whether scouting already ran out of frontier on this map.
    pub fn is_fully_explored(&self, map_name: &str) -> bool {
        lock(&self.explored).contains(map_name)
    }

    pub(crate) fn mark_fully_explored(&self, map_name: &str) {
        if lock(&self.explored).insert(map_name.to_string()) {
            info!("Map {} is fully explored", map_name);
            self.add_message(&format!("{} is fully explored", map_name));
        }
    }

    /// Stores the map if it changed; the change flag is cleared only after
    /// a successful store.
    fn persist_if_changed(&self, map: &mut TileMap) {
        if !map.has_changes() {
            return;
        }
        let result = lock(&self.storage).store(map);
        match result {
            Ok(()) => map.acknowledge_changes(),
            Err(e) => {
                warn!("Failed to store map {}: {}", map.name(), e);
                self.add_message(&format!("Failed to store map {}: {}", map.name(), e));
            }
        }
    }

    // ------------------------------------------------------------------
    // Observations
    // ------------------------------------------------------------------

    /// Folds a confirmed observation into the agent and its map.
    ///
    /// The agent's position only ever changes here. Goals the agent now
    /// stands on are cleared, and the map is persisted if it changed.
    pub fn apply_observation(&self, id: &str, observation: &Observation) {
        let updated = self.update_agent(id, |agent| {
            agent.apply_observation(observation);
            let (primary, tactical) = agent.clear_reached_goals();
            if let Some(goal) = primary {
                info!("Agent {} ({}) reached goal {}", agent.name, agent.id, goal);
            }
            if let Some(goal) = tactical {
                debug!("Agent {} ({}) reached tactical goal {}", agent.name, agent.id, goal);
            }
        });
        if updated.is_none() {
            return;
        }

        let map = self.map_or_insert(&observation.map_name);
        {
            let mut map = write(&*map);
            map.apply_observation(observation);
            self.persist_if_changed(&mut map);
        }

        for message in &observation.messages {
            self.add_message(message);
        }
    }

    /// Scans for the agent and folds the result in.
    pub fn scan_and_update(&self, client: &dyn GameClient, id: &str) -> DelverResult<()> {
        if self.agent(id).is_none() {
            debug!("Not scanning for unknown agent {}", id);
            return Ok(());
        }
        let observation = client
            .scan(id)
            .map_err(|e| self.client_failure(id, "scan", e))?;
        self.apply_observation(id, &observation);
        Ok(())
    }

    fn client_failure(&self, id: &str, command: &str, error: DelverError) -> DelverError {
        warn!("{} for agent {} failed: {}", command, id, error);
        self.add_message(&error.to_string());
        error
    }

    /// Issues a move and folds in the server's answer.
    ///
    /// A rejected move leaves the agent where it was. For an incorporeal
    /// agent, a rejection onto a tile with no visible obstacle means the
    /// phasing effect is gone, and incorporeal mode is switched off.
    pub fn move_agent(
        &self,
        client: &dyn GameClient,
        id: &str,
        direction: Direction,
    ) -> DelverResult<MoveOutcome> {
        let Some(agent) = self.agent(id) else {
            debug!("Not moving unknown agent {}", id);
            return Ok(MoveOutcome::Rejected {
                reason: format!("unknown agent {}", id),
            });
        };

        let destination = agent.position.step(direction);
        let expect_clear = (agent.modes.incorporeal && direction.is_move())
            .then(|| {
                self.with_policy(id, |_, _, policy| policy.is_clear_of_obstacles(destination))
            })
            .flatten()
            .unwrap_or(false);

        let outcome = client
            .move_agent(id, direction)
            .map_err(|e| self.client_failure(id, "move", e))?;
        match &outcome {
            MoveOutcome::Moved(observation) => self.apply_observation(id, observation),
            MoveOutcome::Rejected { reason } => {
                warn!(
                    "Move {} of {} ({}) rejected: {}",
                    direction, agent.name, agent.id, reason
                );
                self.add_message(reason);
                if expect_clear {
                    info!(
                        "Agent {} ({}) is no longer incorporeal",
                        agent.name, agent.id
                    );
                    self.set_incorporeal(id, false);
                }
            }
        }
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Goals
    // ------------------------------------------------------------------

    /// Sets the primary goal.
    pub fn set_goal(&self, id: &str, goal: Position) {
        self.update_agent(id, |agent| {
            info!("Agent {} ({}) heading for {}", agent.name, agent.id, goal);
            agent.goals.primary = Some(goal);
        });
    }

    /// The primary goal.
    pub fn goal(&self, id: &str) -> Option<Position> {
        read(&self.agents).get(id).and_then(|agent| agent.goals.primary)
    }

    pub fn clear_goal(&self, id: &str) {
        self.update_agent(id, |agent| agent.goals.primary = None);
    }

    /// Sets a short-lived goal that overrides the primary goal until reached.
    pub fn set_tactical_goal(&self, id: &str, goal: Position) {
        self.update_agent(id, |agent| {
            debug!("Agent {} ({}) engaging at {}", agent.name, agent.id, goal);
            agent.goals.tactical = Some(goal);
        });
    }

    pub fn tactical_goal(&self, id: &str) -> Option<Position> {
        read(&self.agents).get(id).and_then(|agent| agent.goals.tactical)
    }

    pub fn clear_tactical_goal(&self, id: &str) {
        self.update_agent(id, |agent| agent.goals.tactical = None);
    }

    // ------------------------------------------------------------------
    // Modes
    // ------------------------------------------------------------------

    /// Flips attack mode and drops the tactical goal. Returns the new mode.
    pub fn toggle_attack_mode(&self, id: &str) -> bool {
        self.update_agent(id, |agent| {
            agent.modes.attacking = !agent.modes.attacking;
            agent.goals.tactical = None;
            debug!("Agent {} attack mode: {}", agent.id, agent.modes.attacking);
            agent.modes.attacking
        })
        .unwrap_or(false)
    }

    /// Flips PvP mode and drops the tactical goal. Returns the new mode.
    pub fn toggle_pvp_mode(&self, id: &str) -> bool {
        self.update_agent(id, |agent| {
            agent.modes.pvp = !agent.modes.pvp;
            agent.goals.tactical = None;
            debug!("Agent {} PvP mode: {}", agent.id, agent.modes.pvp);
            agent.modes.pvp
        })
        .unwrap_or(false)
    }

    pub fn set_incorporeal(&self, id: &str, incorporeal: bool) {
        self.update_agent(id, |agent| agent.modes.incorporeal = incorporeal);
    }

    pub fn has_attack_mode(&self, id: &str) -> bool {
        read(&self.agents)
            .get(id)
            .is_some_and(|agent| agent.modes.attacking)
    }

    pub fn has_pvp_mode(&self, id: &str) -> bool {
        read(&self.agents).get(id).is_some_and(|agent| agent.modes.pvp)
    }

    pub fn is_incorporeal(&self, id: &str) -> bool {
        read(&self.agents)
            .get(id)
            .is_some_and(|agent| agent.modes.incorporeal)
    }

    // ------------------------------------------------------------------
    // Decisions
    // ------------------------------------------------------------------

    /// Runs `f` with a consistent snapshot of the agent, its map and its
    /// blocking policy. The agent table is not locked while `f` runs.
    pub(crate) fn with_policy<R>(
        &self,
        id: &str,
        f: impl FnOnce(&AgentState, &TileMap, &BlockingPolicy<'_>) -> R,
    ) -> Option<R> {
        let agent = self.agent(id)?;
        let party = self.party_on_map(&agent.map_name);
        let map = self.map_or_insert(&agent.map_name);
        let map = read(&*map);
        let policy = BlockingPolicy::for_agent(&agent, &map, &party);
        Some(f(&agent, &map, &policy))
    }

    /// Whether the agent may currently step onto `pos`.
    pub fn player_can_walk_here(&self, id: &str, pos: Position) -> bool {
        self.with_policy(id, |_, _, policy| policy.can_walk(pos))
            .unwrap_or(false)
    }

    /// Direction of the first step towards the agent's effective goal.
    ///
    /// Returns [`Direction::None`] without a goal, at the goal, or when the
    /// goal cannot be reached right now.
    pub fn next_direction(&self, id: &str) -> Direction {
        self.with_policy(id, |agent, _, policy| {
            let Some(goal) = agent.goals.effective() else {
                return Direction::None;
            };
            PathFinder::next_step(agent.position, goal, |pos| policy.can_walk(pos))
                .map(|next| agent.position.direction_to(next))
                .unwrap_or(Direction::None)
        })
        .unwrap_or(Direction::None)
    }

    pub(crate) fn rng(&self) -> MutexGuard<'_, StdRng> {
        lock(&self.rng)
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    pub fn add_message(&self, message: &str) {
        lock(&self.messages).push(message);
    }

    /// Game messages, newest first.
    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).iter().map(str::to_string).collect()
    }
}

impl Default for NavigationCoordinator {
    fn default() -> Self {
        Self::in_memory()
    }
}

// Tile knowledge only grows more specific, so data behind a poisoned lock
// is still usable.
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
