//! Arena layout: spawn points, doors, team barriers and launch pads
//!
//! Arenas are authored as JSON and loaded once when the match opens.

use std::fs;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::game::geometry::{Aabb, Axis};
use crate::game::world::Facing;

/// Combat spawn point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    #[serde(default)]
    pub id: String,
    pub position: Vec3,
    /// Yaw the avatar faces after spawning
    #[serde(default)]
    pub yaw: f32,
}

/// Door region: the blocking geometry and how occupants are detected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoorRegion {
    pub bounds: Aabb,
    /// Closed-state block; doors without one are a layout error
    #[serde(default)]
    pub block: Option<String>,
    /// Id of a named activation region used for detection
    #[serde(default)]
    pub activation: Option<String>,
    /// Extrusion axis used when no activation region is named
    #[serde(default)]
    pub facing: Option<Axis>,
    /// Extrusion distance along `facing`
    #[serde(default)]
    pub distance: f32,
    /// Team allowed through; everyone when absent
    #[serde(default)]
    pub team: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationRegion {
    pub id: String,
    pub bounds: Aabb,
}

/// Region passable only for one team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamBarrierRegion {
    pub bounds: Aabb,
    pub team: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchPadRegion {
    pub bounds: Aabb,
    pub facing: Facing,
    #[serde(default = "default_power")]
    pub power: u8,
}

fn default_power() -> u8 {
    3
}

/// Everything the match needs to know about an arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaData {
    pub id: String,
    /// Area late joiners and waiting participants are placed in
    pub waiting_spawn: Aabb,
    pub spawns: Vec<SpawnPoint>,
    #[serde(default)]
    pub doors: Vec<DoorRegion>,
    #[serde(default)]
    pub door_activations: Vec<ActivationRegion>,
    #[serde(default)]
    pub team_barriers: Vec<TeamBarrierRegion>,
    #[serde(default)]
    pub launch_pads: Vec<LaunchPadRegion>,
}

impl ArenaData {
    pub fn load(path: &Path) -> Result<Self, ArenaError> {
        let raw = fs::read_to_string(path).map_err(|source| ArenaError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ArenaError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn activation_bounds(&self, id: &str) -> Option<Aabb> {
        self.door_activations
            .iter()
            .find(|region| region.id == id)
            .map(|region| region.bounds)
    }
}

/// Arena loading errors
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("Failed to read arena file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed arena data: {0}")]
    Parse(#[from] serde_json::Error),
}
