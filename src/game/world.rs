//! Environment seam: what the match core reads from and commands to the world

use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::geometry::Aabb;
use crate::protocol::AvatarState;

/// Avatar half width on the horizontal axes
pub const AVATAR_HALF_WIDTH: f32 = 0.3;
/// Avatar height
pub const AVATAR_HEIGHT: f32 = 1.8;
/// Eye height above the feet
pub const AVATAR_EYE_HEIGHT: f32 = 1.62;

/// Read-only view of an entity, as reported by the environment
#[derive(Debug, Clone, PartialEq)]
pub struct EntityView {
    pub id: Uuid,
    /// Feet position
    pub position: Vec3,
    /// Yaw in degrees, 0 = +Z, 90 = -X
    pub yaw: f32,
    /// Pitch in degrees, positive looks down
    pub pitch: f32,
    pub velocity: Vec3,
    pub half_width: f32,
    pub height: f32,
    pub eye_height: f32,
    /// Extra slack added around the box when the entity is targeted
    pub targeting_margin: f32,
    /// Item currently held in the main hand
    pub main_hand: Option<String>,
    pub alive: bool,
    pub spectator: bool,
    pub collidable: bool,
    pub on_ground: bool,
}

impl EntityView {
    /// A standing, live, collidable avatar with nothing in hand
    pub fn avatar(id: Uuid, position: Vec3) -> Self {
        Self {
            id,
            position,
            yaw: 0.0,
            pitch: 0.0,
            velocity: Vec3::ZERO,
            half_width: AVATAR_HALF_WIDTH,
            height: AVATAR_HEIGHT,
            eye_height: AVATAR_EYE_HEIGHT,
            targeting_margin: 0.0,
            main_hand: None,
            alive: true,
            spectator: false,
            collidable: true,
            on_ground: true,
        }
    }

    pub fn looking(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = yaw;
        self.pitch = pitch;
        self
    }

    pub fn holding(mut self, item: impl Into<String>) -> Self {
        self.main_hand = Some(item.into());
        self
    }

    pub fn eye_position(&self) -> Vec3 {
        self.position + Vec3::Y * self.eye_height
    }

    /// Unit aim direction derived from yaw and pitch
    pub fn look(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(
            -yaw.sin() * pitch.cos(),
            -pitch.sin(),
            yaw.cos() * pitch.cos(),
        )
    }

    pub fn bounding_box(&self) -> Aabb {
        let half = Vec3::new(self.half_width, 0.0, self.half_width);
        Aabb::new(
            self.position - half,
            self.position + half + Vec3::Y * self.height,
        )
    }

    /// Whether hitscan and explosions may target this entity
    pub fn is_targetable(&self) -> bool {
        self.alive && !self.spectator && self.collidable
    }
}

/// Game mode of an avatar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    Adventure,
    Spectator,
}

/// Horizontal facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    North,
    South,
    East,
    West,
}

impl Facing {
    /// Yaw in degrees an avatar has when looking along this facing
    pub fn yaw(self) -> f32 {
        match self {
            Facing::South => 0.0,
            Facing::West => 90.0,
            Facing::North => 180.0,
            Facing::East => 270.0,
        }
    }
}

/// State materialized into a region of world geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeometryState {
    /// Plain blocking geometry
    Solid { block: String },
    /// Passable for members of `team` (or everyone when `None`), blocking for others
    TeamBarrier { team: Option<String> },
    /// Surface that launches avatars touching it
    LaunchPad { facing: Facing, power: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectileKind {
    Rocket,
    Grenade { fuse_ticks: u32 },
}

/// Request to spawn a projectile; its flight is simulated by the environment
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileSpawn {
    pub kind: ProjectileKind,
    pub owner: Uuid,
    pub position: Vec3,
    pub velocity: Vec3,
    pub critical: bool,
}

/// Mutation the core asks the environment to perform
#[derive(Debug, Clone, PartialEq)]
pub enum WorldCommand {
    Teleport {
        entity: Uuid,
        position: Vec3,
        yaw: f32,
        pitch: f32,
    },
    SetVelocity {
        entity: Uuid,
        velocity: Vec3,
    },
    SetGameMode {
        entity: Uuid,
        mode: GameMode,
    },
    SetSpeedBoost {
        entity: Uuid,
        enabled: bool,
    },
    GiveLoadout {
        entity: Uuid,
        items: Vec<String>,
    },
    ClearInventory {
        entity: Uuid,
    },
    SetItemCooldown {
        entity: Uuid,
        item: String,
        ticks: u32,
    },
    SetGeometry {
        bounds: Aabb,
        state: GeometryState,
    },
    SpawnProjectile(ProjectileSpawn),
}

/// The world the match runs in
pub trait Environment {
    fn entity(&self, id: Uuid) -> Option<EntityView>;

    /// Every entity whose bounding box intersects `area`
    fn entities_within(&self, area: &Aabb) -> Vec<EntityView>;

    /// Segment test against static geometry only; entities and team barriers are ignored
    fn raycast_geometry(&self, origin: Vec3, target: Vec3) -> Option<Vec3>;

    fn apply(&mut self, command: WorldCommand);

    /// Accept an avatar update pushed by the transport. Environments that
    /// observe their avatars directly can ignore it.
    fn sync_avatar(&mut self, _state: AvatarState) {}
}

/// In-memory environment: an entity table, static solids and a command log
#[derive(Debug, Default)]
pub struct SimWorld {
    entities: BTreeMap<Uuid, EntityView>,
    solids: Vec<Aabb>,
    geometry: Vec<(Aabb, GeometryState)>,
    commands: Vec<WorldCommand>,
}

impl SimWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_solid(&mut self, bounds: Aabb) {
        self.solids.push(bounds);
    }

    pub fn insert_entity(&mut self, entity: EntityView) {
        self.entities.insert(entity.id, entity);
    }

    pub fn remove_entity(&mut self, id: Uuid) -> Option<EntityView> {
        self.entities.remove(&id)
    }

    pub fn entity_mut(&mut self, id: Uuid) -> Option<&mut EntityView> {
        self.entities.get_mut(&id)
    }

    /// Current state of the geometry region with exactly these bounds
    pub fn geometry_at(&self, bounds: &Aabb) -> Option<&GeometryState> {
        self.geometry
            .iter()
            .find(|(region, _)| region == bounds)
            .map(|(_, state)| state)
    }

    pub fn commands(&self) -> &[WorldCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<WorldCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl Environment for SimWorld {
    fn entity(&self, id: Uuid) -> Option<EntityView> {
        self.entities.get(&id).cloned()
    }

    fn entities_within(&self, area: &Aabb) -> Vec<EntityView> {
        self.entities
            .values()
            .filter(|e| e.bounding_box().intersects(area))
            .cloned()
            .collect()
    }

    fn raycast_geometry(&self, origin: Vec3, target: Vec3) -> Option<Vec3> {
        let closed = self.geometry.iter().filter_map(|(bounds, state)| match state {
            GeometryState::Solid { .. } => Some(bounds),
            _ => None,
        });

        self.solids
            .iter()
            .chain(closed)
            .filter_map(|bounds| bounds.raycast(origin, target))
            .min_by(|a, b| {
                a.distance_squared(origin)
                    .partial_cmp(&b.distance_squared(origin))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    fn apply(&mut self, command: WorldCommand) {
        match &command {
            WorldCommand::Teleport {
                entity,
                position,
                yaw,
                pitch,
            } => {
                if let Some(e) = self.entities.get_mut(entity) {
                    e.position = *position;
                    e.yaw = *yaw;
                    e.pitch = *pitch;
                    e.alive = true;
                }
            }
            WorldCommand::SetVelocity { entity, velocity } => {
                if let Some(e) = self.entities.get_mut(entity) {
                    e.velocity = *velocity;
                }
            }
            WorldCommand::SetGameMode { entity, mode } => {
                if let Some(e) = self.entities.get_mut(entity) {
                    e.spectator = *mode == GameMode::Spectator;
                }
            }
            WorldCommand::GiveLoadout { entity, items } => {
                if let Some(e) = self.entities.get_mut(entity) {
                    e.main_hand = items.first().cloned();
                }
            }
            WorldCommand::ClearInventory { entity } => {
                if let Some(e) = self.entities.get_mut(entity) {
                    e.main_hand = None;
                }
            }
            WorldCommand::SetGeometry { bounds, state } => {
                match self.geometry.iter_mut().find(|(region, _)| region == bounds) {
                    Some((_, current)) => *current = state.clone(),
                    None => self.geometry.push((*bounds, state.clone())),
                }
            }
            WorldCommand::SetSpeedBoost { .. }
            | WorldCommand::SetItemCooldown { .. }
            | WorldCommand::SpawnProjectile(_) => {}
        }
        self.commands.push(command);
    }

    fn sync_avatar(&mut self, state: AvatarState) {
        let entity = self
            .entities
            .entry(state.id)
            .or_insert_with(|| EntityView::avatar(state.id, state.position));
        entity.position = state.position;
        entity.yaw = state.yaw;
        entity.pitch = state.pitch;
        entity.velocity = state.velocity;
        entity.on_ground = state.on_ground;
        if state.main_hand.is_some() {
            entity.main_hand = state.main_hand;
        }
    }
}
