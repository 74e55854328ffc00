//! Weapon catalogue and weapon actions

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ray::{raycast_entities, trace_segment, RayHits};
use super::world::{EntityView, Environment, ProjectileKind, ProjectileSpawn, WorldCommand};

/// Hitscan range in blocks
pub const SHOOTER_RANGE: f32 = 80.0;
/// Extra slack around hitscan targets
pub const SHOOTER_MARGIN: f32 = 0.25;
/// Horizontal dash multiplier of the shooter's secondary ability
pub const DASH_FACTOR: f32 = 1.2;
/// Ticks before a grenade explodes
pub const GRENADE_FUSE_TICKS: u32 = 40;

const ROCKET_SPEED: f32 = 1.5 * 0.75;
const GRENADE_SPEED: f32 = 1.5;

/// Weapons that can be part of a loadout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    BaseShooter,
    AdvancedShooter,
    RocketLauncher,
    GrenadeLauncher,
}

/// Static stats per weapon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeaponStats {
    /// Item type representing the weapon in an inventory
    pub item: &'static str,
    /// Ticks between two primary shots
    pub primary_cooldown: u32,
    /// Ticks between two secondary activations, if the weapon has one
    pub secondary_cooldown: Option<u32>,
    /// Ticks needed to reload an empty clip
    pub reload_cooldown: Option<u32>,
    /// Rounds per clip
    pub clip_size: Option<u32>,
    /// Total rounds carried, clip included; unlimited when `None`
    pub ammo_size: Option<u32>,
}

impl WeaponKind {
    /// Weapons handed to every combatant on (re)spawn
    pub const LOADOUT: [WeaponKind; 3] = [
        WeaponKind::AdvancedShooter,
        WeaponKind::RocketLauncher,
        WeaponKind::GrenadeLauncher,
    ];

    pub fn stats(self) -> WeaponStats {
        match self {
            WeaponKind::BaseShooter => WeaponStats {
                item: "stone_hoe",
                primary_cooldown: 50,
                secondary_cooldown: Some(80),
                reload_cooldown: None,
                clip_size: None,
                ammo_size: None,
            },
            WeaponKind::AdvancedShooter => WeaponStats {
                item: "iron_hoe",
                primary_cooldown: 25,
                secondary_cooldown: Some(80),
                reload_cooldown: None,
                clip_size: None,
                ammo_size: None,
            },
            WeaponKind::RocketLauncher => WeaponStats {
                item: "iron_axe",
                primary_cooldown: 35,
                secondary_cooldown: None,
                reload_cooldown: None,
                clip_size: Some(4),
                ammo_size: Some(20),
            },
            WeaponKind::GrenadeLauncher => WeaponStats {
                item: "blaze_rod",
                primary_cooldown: 45,
                secondary_cooldown: None,
                reload_cooldown: None,
                clip_size: Some(4),
                ammo_size: Some(16),
            },
        }
    }

    pub fn item(self) -> &'static str {
        self.stats().item
    }

    /// Whether an inventory item is this weapon
    pub fn matches(self, item: &str) -> bool {
        self.item() == item
    }

    /// Fire the primary action on behalf of `shooter`
    pub fn on_primary<E, R>(self, env: &mut E, rng: &mut R, shooter: &EntityView) -> Shot
    where
        E: Environment + ?Sized,
        R: Rng,
    {
        match self {
            WeaponKind::BaseShooter | WeaponKind::AdvancedShooter => {
                let hits = raycast_entities(env, shooter, SHOOTER_RANGE, SHOOTER_MARGIN);
                let trace = trace_segment(env, shooter, hits.distance);
                Shot::Hitscan { hits, trace }
            }
            WeaponKind::RocketLauncher => {
                let look = shooter.look();
                let spawn = ProjectileSpawn {
                    kind: ProjectileKind::Rocket,
                    owner: shooter.id,
                    position: shooter.eye_position() + look * 0.25,
                    velocity: look * ROCKET_SPEED,
                    critical: rng.gen_ratio(1, 4),
                };
                env.apply(WorldCommand::SpawnProjectile(spawn));
                Shot::Projectile
            }
            WeaponKind::GrenadeLauncher => {
                let inherited = Vec3::new(
                    shooter.velocity.x,
                    if shooter.on_ground { 0.0 } else { shooter.velocity.y },
                    shooter.velocity.z,
                );
                let spawn = ProjectileSpawn {
                    kind: ProjectileKind::Grenade {
                        fuse_ticks: GRENADE_FUSE_TICKS,
                    },
                    owner: shooter.id,
                    position: shooter.eye_position() - Vec3::Y * 0.1,
                    velocity: shooter.look() * GRENADE_SPEED + inherited,
                    critical: rng.gen_ratio(1, 6),
                };
                env.apply(WorldCommand::SpawnProjectile(spawn));
                Shot::Projectile
            }
        }
    }

    /// Fire the secondary ability. Returns false when the weapon has none.
    pub fn on_secondary<E: Environment + ?Sized>(self, env: &mut E, shooter: &EntityView) -> bool {
        match self {
            WeaponKind::BaseShooter | WeaponKind::AdvancedShooter => {
                let look = shooter.look();
                env.apply(WorldCommand::SetVelocity {
                    entity: shooter.id,
                    velocity: Vec3::new(
                        look.x * DASH_FACTOR,
                        shooter.velocity.y,
                        look.z * DASH_FACTOR,
                    ),
                });
                true
            }
            WeaponKind::RocketLauncher | WeaponKind::GrenadeLauncher => false,
        }
    }

    pub fn from_item(item: &str) -> Option<WeaponKind> {
        [
            WeaponKind::BaseShooter,
            WeaponKind::AdvancedShooter,
            WeaponKind::RocketLauncher,
            WeaponKind::GrenadeLauncher,
        ]
        .into_iter()
        .find(|kind| kind.matches(item))
    }
}

/// Result of a primary shot
#[derive(Debug, Clone, PartialEq)]
pub enum Shot {
    /// Instant ray; every hit entity is eliminated
    Hitscan { hits: RayHits, trace: (Vec3, Vec3) },
    /// Projectile handed to the environment; damage arrives later as an explosion
    Projectile,
}

impl Shot {
    pub fn hits(&self) -> &[Uuid] {
        match self {
            Shot::Hitscan { hits, .. } => &hits.hits,
            Shot::Projectile => &[],
        }
    }
}
