//! Match protocol message definitions
//! These are the types exchanged between the match core and its transport

use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::scoreboard::Scoreboard;
use crate::game::world::Facing;
use crate::game::MatchPhase;

/// Hand an interaction was performed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hand {
    #[default]
    Main,
    Off,
}

/// What caused an explosion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum ExplosionCause {
    Grenade { owner: Option<Uuid> },
    Rocket { owner: Option<Uuid> },
    /// Celebration fireworks; never harmful
    Firework,
    /// Explosion directly caused by an avatar
    Avatar { id: Uuid },
}

/// Source of incoming damage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DamageSource {
    Explosion { cause: ExplosionCause },
    /// Anything the core does not arbitrate (falls, void, ...)
    Other,
}

/// Whether the environment should apply a damage or interaction event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Apply,
    Cancel,
}

/// Avatar state pushed by the transport into the environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarState {
    pub id: Uuid,
    pub position: Vec3,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub pitch: f32,
    #[serde(default)]
    pub velocity: Vec3,
    #[serde(default)]
    pub main_hand: Option<String>,
    #[serde(default = "default_true")]
    pub on_ground: bool,
}

fn default_true() -> bool {
    true
}

/// Commands sent from the transport to the match
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Participant connected
    Join { id: Uuid, name: String },
    /// Participant disconnected
    Leave { id: Uuid },
    /// Waiting room requests the match to start
    Start,
    /// Avatar moved, turned or switched items
    Sync { avatar: AvatarState },
    /// Right-click with an item
    UseItem { id: Uuid, hand: Hand },
    /// Right-click on world geometry
    UseBlock { id: Uuid, hand: Hand },
    /// Left-click hand swing
    Swing { id: Uuid, hand: Hand },
    /// Melee hit on another entity
    AttackEntity { id: Uuid },
    /// Avatar is about to take damage
    Damage { victim: Uuid, source: DamageSource },
    /// Avatar died from something the core did not arbitrate
    Death { victim: Uuid, killer: Option<Uuid> },
    /// Avatar touched a launch pad
    LaunchPad { id: Uuid, facing: Facing, power: u8 },
}

/// Broadcast chat line, rendered and localized by the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Announcement {
    Kill { killer: String, victim: String },
    /// Two to five kills in a single tick
    MultiKill { name: String, count: u32 },
    /// More than five kills in a single tick
    KillingSpree { name: String },
    Won { name: String },
    NotEnoughPlayers,
    TimeExpired,
}

/// Why play stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Winner,
    NotEnoughPlayers,
    TimeExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Burst where an avatar was eliminated
    Death,
    /// Periodic firework over a winner
    Celebration,
}

/// Colors used by death and celebration effects
pub const EFFECT_COLORS: [u32; 2] = [15435844, 11743532];

/// Events sent from the match to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchEvent {
    PhaseChanged {
        phase: MatchPhase,
    },
    Announcement {
        message: Announcement,
    },
    Scoreboard {
        board: Scoreboard,
    },
    /// Secondary-ability cooldown of the held weapon
    CooldownBar {
        participant: Uuid,
        remaining: u32,
        total: u32,
        /// Cells of a 10-cell bar that are ready
        ready_cells: u32,
    },
    ShotFired {
        shooter: Uuid,
        position: Vec3,
    },
    RayTrace {
        from: Vec3,
        to: Vec3,
    },
    Effect {
        kind: EffectKind,
        position: Vec3,
        colors: Vec<u32>,
    },
    Closed {
        reason: EndReason,
    },
}

impl MatchEvent {
    pub fn announce(message: Announcement) -> Self {
        Self::Announcement { message }
    }

    pub fn effect(kind: EffectKind, position: Vec3) -> Self {
        Self::Effect {
            kind,
            position,
            colors: EFFECT_COLORS.to_vec(),
        }
    }
}
