//! Game simulation modules

pub mod action;
pub mod door;
pub mod geometry;
pub mod launch_pad;
pub mod loadout;
pub mod r#match;
pub mod ray;
pub mod runner;
pub mod scoreboard;
pub mod session;
pub mod spawn;
pub mod weapon;
pub mod world;

pub use r#match::Match;
pub use runner::{MatchHandle, MatchRunner};
pub use world::{Environment, SimWorld};

use serde::{Deserialize, Serialize};

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Participants gather in the waiting area
    Waiting,
    /// Combat in progress
    Running,
    /// Play stopped, winners are celebrated
    Ending,
    /// Arena released
    Closed,
}

/// Match setup and precondition errors
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Arena has no spawn points")]
    NoSpawnPoints,

    #[error("Team assignment given but no teams are configured")]
    NoTeams,

    #[error("Unknown team: {0}")]
    UnknownTeam(String),

    #[error("Door region has no closed-state block")]
    MissingBarrierGeometry,

    #[error("Match state touched outside the simulation thread")]
    OffSimulationThread,
}
