//! Arena deathmatch core
//!
//! Server-authoritative rules for a free-for-all (or team) deathmatch:
//! hitscan and projectile weapons, spawn selection, automatic doors, kill
//! accounting and the end-of-match sequence. The world itself is reached
//! through the [`game::Environment`] trait.

pub mod arena;
pub mod config;
pub mod game;
pub mod protocol;
pub mod util;
