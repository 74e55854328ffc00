//! Automatic doors
//!
//! A door is a geometry region that opens while an authorized participant
//! stands in its detection area and closes two ticks after the last one left.

use tracing::debug;

use super::geometry::Aabb;
use super::session::Roster;
use super::world::{Environment, GeometryState, WorldCommand};
use super::MatchError;
use crate::arena::{ArenaData, DoorRegion};
use crate::config::MatchConfig;

/// Ticks a door stays open after its detection area empties
pub const DOOR_HOLD_TICKS: u8 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct Barrier {
    bounds: Aabb,
    detection: Aabb,
    block: String,
    team: Option<String>,
    open: bool,
    open_ticks: u8,
}

impl Barrier {
    /// Build a door from its arena region and close it.
    ///
    /// The named activation region is the detection area when it exists;
    /// otherwise the door bounds are extruded along `facing` by `distance`.
    /// Doors whose detection area cannot be resolved are skipped (`Ok(None)`);
    /// a door without a closed-state block is a layout error.
    pub fn from_region<E: Environment + ?Sized>(
        env: &mut E,
        region: &DoorRegion,
        arena: &ArenaData,
        config: &MatchConfig,
    ) -> Result<Option<Self>, MatchError> {
        let detection = region
            .activation
            .as_deref()
            .and_then(|id| arena.activation_bounds(id))
            .or_else(|| match region.facing {
                Some(axis) if region.distance != 0.0 => {
                    Some(region.bounds.extrude(axis, region.distance))
                }
                _ => None,
            });
        let Some(detection) = detection else {
            debug!(bounds = ?region.bounds, "Door without detection area skipped");
            return Ok(None);
        };

        let block = region
            .block
            .clone()
            .ok_or(MatchError::MissingBarrierGeometry)?;

        let team = region
            .team
            .clone()
            .filter(|team| config.has_team(team));

        let mut barrier = Self {
            bounds: region.bounds,
            detection,
            block,
            team,
            open: true,
            open_ticks: 0,
        };
        barrier.close(env);
        Ok(Some(barrier))
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn team(&self) -> Option<&str> {
        self.team.as_deref()
    }

    pub fn tick<E: Environment + ?Sized>(&mut self, env: &mut E, roster: &Roster) {
        let occupied = env
            .entities_within(&self.detection)
            .iter()
            .any(|entity| roster.can_open_door(entity, self.team()));

        if occupied {
            if !self.open {
                self.open(env);
            }
            self.open_ticks = DOOR_HOLD_TICKS;
        }

        if self.open_ticks == 0 {
            if self.open {
                self.close(env);
            }
        } else {
            self.open_ticks -= 1;
        }
    }

    fn open<E: Environment + ?Sized>(&mut self, env: &mut E) {
        self.open = true;
        env.apply(WorldCommand::SetGeometry {
            bounds: self.bounds,
            state: GeometryState::TeamBarrier {
                team: self.team.clone(),
            },
        });
    }

    fn close<E: Environment + ?Sized>(&mut self, env: &mut E) {
        self.open = false;
        env.apply(WorldCommand::SetGeometry {
            bounds: self.bounds,
            state: GeometryState::Solid {
                block: self.block.clone(),
            },
        });
    }
}
