//! # Utilities Module
//!
//! Grid search algorithms used by the navigation core.

pub mod pathfinding;

pub use pathfinding::*;
