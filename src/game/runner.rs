//! # Agent Runner
//!
//! One polling task per agent: observe, pick targets, decide, move, sleep.
//!
//! Goals come from one of three sources per tick: a retreat while the agent
//! is hurt, the followed party member, or hunting, room walking and
//! scouting. Iterations run on the blocking thread pool and always run to
//! completion. A stop request is only looked at between iterations, so an
//! agent never stops halfway through a move.

use crate::{AgentId, AgentLoopConfig, DelverError, DelverResult, GameClient, NavigationCoordinator};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// What one agent loop did before it stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub agent_id: AgentId,
    /// Completed iterations
    pub ticks: u64,
    /// Moves the server confirmed
    pub moves: u64,
    /// Moves the server refused (attacks included)
    pub rejected_moves: u64,
    /// Scans or moves that failed at the transport level
    pub client_errors: u64,
    /// Primary goals given up after too many ticks without progress
    pub dropped_goals: u64,
}

/// Handle to a running agent loop.
pub struct AgentRunner {
    agent_id: AgentId,
    stop: watch::Sender<bool>,
    handle: JoinHandle<RunSummary>,
}

impl AgentRunner {
    /// Starts the loop for an agent already registered with `coordinator`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        coordinator: Arc<NavigationCoordinator>,
        client: Arc<dyn GameClient>,
        agent_id: impl Into<AgentId>,
        config: AgentLoopConfig,
    ) -> Self {
        let agent_id = agent_id.into();
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            coordinator,
            client,
            agent_id.clone(),
            config,
            stop_rx,
        ));
        Self {
            agent_id,
            stop,
            handle,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Requests a stop; the loop finishes its current iteration first.
    pub fn stop(&self) {
        // A closed channel means the loop already ended.
        let _ = self.stop.send(true);
    }

    /// Waits for the loop to end on its own.
    pub async fn join(self) -> DelverResult<RunSummary> {
        self.handle.await.map_err(|e| {
            DelverError::Client(format!("agent task {} failed: {}", self.agent_id, e))
        })
    }

    pub async fn stop_and_join(self) -> DelverResult<RunSummary> {
        self.stop();
        self.join().await
    }
}

async fn run_loop(
    coordinator: Arc<NavigationCoordinator>,
    client: Arc<dyn GameClient>,
    agent_id: AgentId,
    config: AgentLoopConfig,
    mut stop: watch::Receiver<bool>,
) -> RunSummary {
    let interval = Duration::from_millis(config.tick_interval_ms);
    let config = Arc::new(config);
    let mut summary = RunSummary {
        agent_id: agent_id.clone(),
        ..RunSummary::default()
    };
    let mut stalled = 0u32;

    info!("Agent loop for {} started", agent_id);
    loop {
        if *stop.borrow() {
            break;
        }
        if config.max_ticks.is_some_and(|max| summary.ticks >= max) {
            break;
        }

        // Client calls block and path searches can be long: keep both off
        // the async workers.
        let job = {
            let coordinator = coordinator.clone();
            let client = client.clone();
            let agent_id = agent_id.clone();
            let config = config.clone();
            let mut progress = (stalled, summary.clone());
            move || {
                let (stalled, summary) = &mut progress;
                tick(&coordinator, client.as_ref(), &agent_id, &config, stalled, summary);
                progress
            }
        };
        match tokio::task::spawn_blocking(job).await {
            Ok((now_stalled, now_summary)) => {
                stalled = now_stalled;
                summary = now_summary;
            }
            Err(e) => {
                warn!("Agent loop for {} aborted: {}", agent_id, e);
                break;
            }
        }
        summary.ticks += 1;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    info!(
        "Agent loop for {} stopped after {} ticks ({} moves)",
        agent_id, summary.ticks, summary.moves
    );
    summary
}

fn tick(
    coordinator: &NavigationCoordinator,
    client: &dyn GameClient,
    agent_id: &str,
    config: &AgentLoopConfig,
    stalled: &mut u32,
    summary: &mut RunSummary,
) {
    if let Err(e) = coordinator.scan_and_update(client, agent_id) {
        debug!("Skipping tick for {}: {}", agent_id, e);
        summary.client_errors += 1;
        return;
    }
    let Some(agent) = coordinator.agent(agent_id) else {
        return;
    };

    let hurt = agent.health.is_some_and(|health| health.is_low());
    let direction = if config.retreat && hurt {
        coordinator.retreat(agent_id);
        coordinator.next_direction(agent_id)
    } else {
        if agent.retreat.is_some() {
            coordinator.end_retreat(agent_id);
        }
        match &config.follow {
            Some(leader) => coordinator.follow(agent_id, leader, config.follow_distance),
            None => {
                if config.hunt {
                    coordinator.engage_nearest_hostile(agent_id);
                }
                if config.walk_rooms
                    && (!config.scout || coordinator.is_fully_explored(&agent.map_name))
                {
                    coordinator.walk_rooms(agent_id);
                }
                if config.scout {
                    coordinator.scout(agent_id);
                }
                coordinator.next_direction(agent_id)
            }
        }
    };

    if direction.is_move() {
        match coordinator.move_agent(client, agent_id, direction) {
            Ok(outcome) if outcome.is_success() => {
                summary.moves += 1;
                *stalled = 0;
            }
            Ok(_) => {
                summary.rejected_moves += 1;
                *stalled += 1;
            }
            Err(_) => {
                summary.client_errors += 1;
                return;
            }
        }
    } else {
        *stalled += 1;
    }

    if config.max_stalled_ticks > 0 && *stalled >= config.max_stalled_ticks {
        *stalled = 0;
        if let Some(goal) = coordinator.goal(agent_id) {
            warn!(
                "Agent {} made no progress towards {} for {} ticks, dropping it",
                agent_id, goal, config.max_stalled_ticks
            );
            coordinator.clear_goal(agent_id);
            summary.dropped_goals += 1;
        }
    }
}
