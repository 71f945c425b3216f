//! # Agent State
//!
//! One record per controlled character: where it is, what it sees, where it
//! wants to go and which combat modes are active.

use crate::{AgentId, Observation, Position};
use serde::{Deserialize, Serialize};

/// Category of a visible item or entity, parsed from the server's type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThingKind {
    Monster,
    Character,
    Item,
    Other(String),
}

impl ThingKind {
    /// Parses the server's free-form type string.
    pub fn parse(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "monster" => ThingKind::Monster,
            "character" | "player" => ThingKind::Character,
            "item" => ThingKind::Item,
            other => ThingKind::Other(other.to_string()),
        }
    }
}

/// An item or entity seen in the last observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibleThing {
    pub id: String,
    pub position: Position,
    pub kind: ThingKind,
    pub name: String,
}

impl VisibleThing {
    /// Creates a visible thing from the server's raw fields.
    pub fn new(id: impl Into<String>, x: i32, y: i32, kind: &str, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            position: Position::new(x, y),
            kind: ThingKind::parse(kind),
            name: name.into(),
        }
    }

    /// Boulders block movement for everyone, whatever the mode.
    pub fn is_boulder(&self) -> bool {
        matches!(&self.kind, ThingKind::Other(tag) if tag == "boulder")
            || self.name.to_ascii_lowercase().contains("boulder")
    }

    pub fn is_monster(&self) -> bool {
        self.kind == ThingKind::Monster
    }

    pub fn is_character(&self) -> bool {
        self.kind == ThingKind::Character
    }
}

/// Primary and tactical destinations of an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalState {
    /// Long-lived destination (explicit or picked by exploration)
    pub primary: Option<Position>,
    /// Short-lived destination that overrides `primary` while set
    pub tactical: Option<Position>,
    /// Room currently being walked to (room id bits, see [`crate::room_id`])
    #[serde(default)]
    pub room: Option<u32>,
}

impl GoalState {
    /// The goal that drives the next move.
    pub fn effective(&self) -> Option<Position> {
        self.tactical.or(self.primary)
    }
}

/// Independent mode switches of an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentModes {
    /// Will path onto and engage monsters
    pub attacking: bool,
    /// Will path onto and engage other players' characters
    pub pvp: bool,
    /// Ignores terrain walkability (temporary phasing effect)
    pub incorporeal: bool,
}

/// Hit points reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub hit_points: i32,
    pub max_hit_points: i32,
}

impl Health {
    pub fn new(hit_points: i32, max_hit_points: i32) -> Self {
        Self {
            hit_points,
            max_hit_points,
        }
    }

    /// Below half of the maximum.
    pub fn is_low(&self) -> bool {
        self.hit_points < self.max_hit_points / 2
    }
}

/// Combat modes put aside while an agent withdraws.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retreat {
    pub resume_attacking: bool,
    pub resume_pvp: bool,
}

/// Everything the coordinator knows about one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub id: AgentId,
    pub name: String,
    pub map_name: String,
    pub position: Position,
    pub visible_items: Vec<VisibleThing>,
    pub visible_entities: Vec<VisibleThing>,
    pub goals: GoalState,
    pub modes: AgentModes,
    /// Last reported hit points, if the server sends them
    pub health: Option<Health>,
    /// Set while the agent withdraws from combat
    pub retreat: Option<Retreat>,
}

impl AgentState {
    /// Creates an agent at a known position with no goals and all modes off.
    pub fn new(
        id: impl Into<AgentId>,
        name: impl Into<String>,
        map_name: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            map_name: map_name.into(),
            position,
            visible_items: Vec::new(),
            visible_entities: Vec::new(),
            goals: GoalState::default(),
            modes: AgentModes::default(),
            health: None,
            retreat: None,
        }
    }

    /// Takes over position and visibility from a confirmed observation.
    pub fn apply_observation(&mut self, observation: &Observation) {
        self.map_name = observation.map_name.clone();
        self.position = observation.position;
        self.visible_items = observation.items.clone();
        self.visible_entities = observation.entities.clone();
        if observation.health.is_some() {
            self.health = observation.health;
        }
    }

    /// Clears each goal the agent is standing on. Returns the cleared
    /// primary and tactical goals, in that order.
    pub fn clear_reached_goals(&mut self) -> (Option<Position>, Option<Position>) {
        let primary = self.goals.primary.filter(|goal| *goal == self.position);
        if primary.is_some() {
            self.goals.primary = None;
        }
        let tactical = self.goals.tactical.filter(|goal| *goal == self.position);
        if tactical.is_some() {
            self.goals.tactical = None;
        }
        (primary, tactical)
    }
}
