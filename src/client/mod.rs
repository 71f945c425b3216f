//! # Game Client
//!
//! Boundary to the game server. The engine issues two commands, scan and
//! move, and never assumes a move happened until the server confirms it.

pub mod simulated;

pub use simulated::*;

use crate::{DelverResult, Direction, MoveOutcome, Observation};

/// Remote game server as seen by the navigation engine.
///
/// `Err` is reserved for transport failures. A move the server refuses is a
/// regular [`MoveOutcome::Rejected`].
pub trait GameClient: Send + Sync {
    /// Observes the surroundings of an agent.
    fn scan(&self, agent_id: &str) -> DelverResult<Observation>;

    /// Asks the server to move an agent one step.
    fn move_agent(&self, agent_id: &str, direction: Direction) -> DelverResult<MoveOutcome>;
}
