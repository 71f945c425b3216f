//! # Delver
//!
//! Navigation and decision engine for autonomous agents crawling a
//! partially observed, changing dungeon grid.
//!
//! ## Architecture Overview
//!
//! Delver keeps a persistent mental model of the dungeon and turns it into
//! one movement decision per agent per tick:
//!
//! - **Tile Maps**: sparse, per-area tile bitmask storage with walkability,
//!   room and frontier queries
//! - **Path Finding**: A* over an 8-connected grid with per-call obstacle sets
//! - **Navigation Coordinator**: per-agent goals, combat modes, blocking policy
//!   and direction resolution
//! - **Agent Runner**: one polling task per agent (observe, decide, move, sleep)
//!
//! The remote game server, map persistence and any rendering live behind
//! the [`client::GameClient`] and [`storage::MapStorage`] traits.

pub mod client;
pub mod game;
pub mod generation;
pub mod storage;
pub mod utils;

// Core module re-exports
pub use client::*;
pub use game::*;
pub use generation::*;
pub use storage::*;
pub use utils::*;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Core error type for the Delver engine.
#[derive(thiserror::Error, Debug)]
pub enum DelverError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The remote game client failed to answer
    #[error("Game client error: {0}")]
    Client(String),

    /// Map storage failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generation failed
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
}

/// Result type used throughout the Delver codebase.
pub type DelverResult<T> = Result<T, DelverError>;

/// Version information for the engine.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine configuration constants.
pub mod config {
    /// Default delay between two agent loop iterations, in milliseconds
    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 500;

    /// Default half-width of the square an agent observes per scan
    pub const DEFAULT_SCAN_RADIUS: i32 = 4;

    /// Maximum number of messages kept in the message log
    pub const MAX_MESSAGES: usize = 200;

    /// Ticks without progress before a runner drops an unreachable goal
    pub const DEFAULT_MAX_STALLED_TICKS: u32 = 10;

    /// Distance a follower keeps from a leader that is not fighting
    pub const DEFAULT_FOLLOW_DISTANCE: u32 = 2;
}

/// Settings for a single agent polling loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentLoopConfig {
    /// Delay between iterations in milliseconds
    pub tick_interval_ms: u64,
    /// Stop after this many iterations (runs until stopped when `None`)
    pub max_ticks: Option<u64>,
    /// Pick frontier targets when the agent has no goal
    pub scout: bool,
    /// Chase visible hostiles allowed by the agent's modes
    pub hunt: bool,
    /// Tour known rooms once the map is explored (or always without `scout`)
    pub walk_rooms: bool,
    /// Trail this party member instead of picking goals
    pub follow: Option<AgentId>,
    /// Distance kept from the followed agent while it is not fighting
    pub follow_distance: u32,
    /// Withdraw to a random tile while below half hit points
    pub retreat: bool,
    /// Consecutive ticks without a move before the primary goal is dropped
    /// (`0` disables the check)
    pub max_stalled_ticks: u32,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: config::DEFAULT_TICK_INTERVAL_MS,
            max_ticks: None,
            scout: true,
            hunt: false,
            walk_rooms: false,
            follow: None,
            follow_distance: config::DEFAULT_FOLLOW_DISTANCE,
            retreat: false,
            max_stalled_ticks: config::DEFAULT_MAX_STALLED_TICKS,
        }
    }
}

/// Top-level configuration, loadable from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelverConfig {
    /// Simulated dungeon layout
    pub generation: GenerationConfig,
    /// Agent loop behaviour
    pub agent_loop: AgentLoopConfig,
    /// Seed for the coordinator's fallback-goal randomness
    pub rng_seed: Option<u64>,
}

impl Default for DelverConfig {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::new(12345),
            agent_loop: AgentLoopConfig::default(),
            rng_seed: None,
        }
    }
}

impl DelverConfig {
    /// Loads a configuration from a JSON file; missing fields keep their defaults.
    pub fn load(path: &Path) -> DelverResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: DelverConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> DelverResult<()> {
        self.generation.validate()?;
        if self.agent_loop.tick_interval_ms == 0 {
            return Err(DelverError::InvalidConfig(
                "tick_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
