//! Participant sessions and the match roster

use std::collections::BTreeMap;

use rand::Rng;
use tracing::debug;
use uuid::Uuid;

use super::action::{ActionDisambiguator, PlayerAction, SwingIntent};
use super::loadout::{ItemCooldowns, Loadout};
use super::weapon::Shot;
use super::world::{EntityView, Environment, GameMode, WorldCommand};
use crate::protocol::{Announcement, MatchEvent};

/// Kills in a single tick above which the announcement turns into a spree
pub const SPREE_THRESHOLD: u32 = 5;

/// Outcome of a primary item use
#[derive(Debug, Clone, PartialEq)]
pub enum UseOutcome {
    /// Item is cooling down
    CoolingDown,
    /// Held item is not a weapon or is out of ammo
    NotFired,
    Fired { cooldown: u32, shot: Shot },
}

/// Match-scoped state of one participant
#[derive(Debug, Clone)]
pub struct ParticipantSession {
    pub id: Uuid,
    pub name: String,
    team: Option<String>,
    kills: u32,
    kills_this_tick: u32,
    left: bool,
    actions: ActionDisambiguator,
    loadout: Loadout,
    cooldowns: ItemCooldowns,
    /// Tick at which a pending respawn happens
    respawn_at: Option<u64>,
}

impl ParticipantSession {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            team: None,
            kills: 0,
            kills_this_tick: 0,
            left: false,
            actions: ActionDisambiguator::default(),
            loadout: Loadout::default(),
            cooldowns: ItemCooldowns::default(),
            respawn_at: None,
        }
    }

    pub fn kills(&self) -> u32 {
        self.kills
    }

    pub fn team(&self) -> Option<&str> {
        self.team.as_deref()
    }

    pub fn set_team(&mut self, team: Option<String>) {
        self.team = team;
    }

    pub fn has_left(&self) -> bool {
        self.left
    }

    pub fn last_action(&self) -> PlayerAction {
        self.actions.last()
    }

    pub fn loadout(&self) -> &Loadout {
        &self.loadout
    }

    pub fn is_cooling(&self, item: &str) -> bool {
        self.cooldowns.is_cooling(item)
    }

    /// Queue a kill; it is credited on the next tick
    pub fn record_kill(&mut self) {
        self.kills_this_tick += 1;
    }

    pub fn has_won(&self, threshold: u32) -> bool {
        self.kills >= threshold
    }

    pub fn mark_left(&mut self) {
        self.left = true;
        self.respawn_at = None;
    }

    pub fn respawn_at(&self) -> Option<u64> {
        self.respawn_at
    }

    pub fn schedule_respawn(&mut self, tick: u64) {
        self.respawn_at = Some(tick);
    }

    pub fn clear_respawn(&mut self) {
        self.respawn_at = None;
    }

    /// Credit the kills of the last tick and advance weapon cooldowns
    pub fn tick<E: Environment + ?Sized>(&mut self, env: &E) -> Vec<MatchEvent> {
        let mut events = Vec::new();

        let batch = std::mem::take(&mut self.kills_this_tick);
        self.kills += batch;
        match batch {
            0 | 1 => {}
            2..=SPREE_THRESHOLD => events.push(MatchEvent::announce(Announcement::MultiKill {
                name: self.name.clone(),
                count: batch,
            })),
            _ => events.push(MatchEvent::announce(Announcement::KillingSpree {
                name: self.name.clone(),
            })),
        }

        self.loadout.tick();
        self.cooldowns.tick();

        if !self.left {
            let held = env.entity(self.id).and_then(|e| e.main_hand);
            if let Some(bar) = self.loadout.cooldown_bar(held.as_deref()) {
                events.push(MatchEvent::CooldownBar {
                    participant: self.id,
                    remaining: bar.remaining,
                    total: bar.total,
                    ready_cells: bar.ready_cells,
                });
            }
        }

        events
    }

    /// Restore the combat state: mode, loadout, velocity and speed boost.
    ///
    /// Participants that left are turned into spectators instead.
    pub fn reset<E: Environment + ?Sized>(&mut self, env: &mut E) {
        if self.left {
            env.apply(WorldCommand::SetGameMode {
                entity: self.id,
                mode: GameMode::Spectator,
            });
            return;
        }

        self.loadout.refill();
        self.cooldowns.clear();
        self.actions.reset();

        env.apply(WorldCommand::SetGameMode {
            entity: self.id,
            mode: GameMode::Adventure,
        });
        env.apply(WorldCommand::GiveLoadout {
            entity: self.id,
            items: self.loadout.items(),
        });
        env.apply(WorldCommand::SetVelocity {
            entity: self.id,
            velocity: glam::Vec3::ZERO,
        });
        env.apply(WorldCommand::SetSpeedBoost {
            entity: self.id,
            enabled: true,
        });
    }

    /// Strip combat items at the end of play
    pub fn on_end<E: Environment + ?Sized>(&mut self, env: &mut E) {
        self.respawn_at = None;
        env.apply(WorldCommand::ClearInventory { entity: self.id });
    }

    /// Main-hand item use. Starts the item cooldown when the weapon fires.
    pub fn on_item_use<E, R>(&mut self, env: &mut E, rng: &mut R, avatar: &EntityView) -> UseOutcome
    where
        E: Environment + ?Sized,
        R: Rng,
    {
        let held = avatar.main_hand.clone().unwrap_or_default();
        if self.cooldowns.is_cooling(&held) {
            self.actions.on_item_use_blocked();
            return UseOutcome::CoolingDown;
        }

        self.actions.on_item_used();
        match self.loadout.on_primary(env, rng, avatar) {
            Some((cooldown, shot)) => {
                self.cooldowns.set(&held, cooldown);
                env.apply(WorldCommand::SetItemCooldown {
                    entity: self.id,
                    item: held,
                    ticks: cooldown,
                });
                UseOutcome::Fired { cooldown, shot }
            }
            None => UseOutcome::NotFired,
        }
    }

    pub fn on_block_use(&mut self) {
        self.actions.on_block_used();
    }

    /// Hand swing. Returns true when the secondary ability fired.
    pub fn on_swing<E: Environment + ?Sized>(&mut self, env: &mut E, avatar: &EntityView) -> bool {
        match self.actions.on_swing() {
            SwingIntent::Suppressed => {
                debug!(participant_id = %self.id, "Swing after use suppressed");
                false
            }
            SwingIntent::Secondary => self.loadout.on_secondary(env, avatar),
        }
    }
}

/// Sessions of a match, ordered by participant id
#[derive(Debug, Clone, Default)]
pub struct Roster {
    sessions: BTreeMap<Uuid, ParticipantSession>,
}

impl Roster {
    pub fn get(&self, id: Uuid) -> Option<&ParticipantSession> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut ParticipantSession> {
        self.sessions.get_mut(&id)
    }

    pub fn insert(&mut self, session: ParticipantSession) {
        self.sessions.insert(session.id, session);
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParticipantSession> {
        self.sessions.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ParticipantSession> {
        self.sessions.values_mut()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions that have not left
    pub fn active(&self) -> impl Iterator<Item = &ParticipantSession> {
        self.sessions.values().filter(|s| !s.left)
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Whether this entity is a present, non-spectating participant
    pub fn is_present(&self, entity: &EntityView) -> bool {
        !entity.spectator && self.get(entity.id).is_some_and(|s| !s.left)
    }

    /// Whether an entity may open a door restricted to `team`
    pub fn can_open_door(&self, entity: &EntityView, team: Option<&str>) -> bool {
        let Some(session) = self.get(entity.id) else {
            return false;
        };
        if session.left || entity.spectator {
            return false;
        }
        match (team, session.team()) {
            (None, _) | (_, None) => true,
            (Some(door), Some(own)) => door == own,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::weapon::WeaponKind;
    use crate::game::world::SimWorld;
    use glam::Vec3;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn announcements(events: &[MatchEvent]) -> Vec<Announcement> {
        events
            .iter()
            .filter_map(|e| match e {
                MatchEvent::Announcement { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn kills_are_batched_per_tick() {
        let world = SimWorld::new();
        let mut session = ParticipantSession::new(Uuid::new_v4(), "ada");

        for _ in 0..3 {
            session.record_kill();
        }
        assert_eq!(session.kills(), 0);

        let events = session.tick(&world);
        assert_eq!(session.kills(), 3);
        assert_eq!(
            announcements(&events),
            vec![Announcement::MultiKill {
                name: "ada".into(),
                count: 3
            }]
        );
        assert!(session.tick(&world).is_empty());
    }

    #[test]
    fn single_kill_is_silent_and_large_batch_is_a_spree() {
        let world = SimWorld::new();
        let mut session = ParticipantSession::new(Uuid::new_v4(), "ada");

        session.record_kill();
        assert!(announcements(&session.tick(&world)).is_empty());

        for _ in 0..6 {
            session.record_kill();
        }
        assert_eq!(
            announcements(&session.tick(&world)),
            vec![Announcement::KillingSpree { name: "ada".into() }]
        );
        assert_eq!(session.kills(), 7);
    }

    #[test]
    fn cooldown_blocks_the_next_use() {
        let mut world = SimWorld::new();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let avatar = EntityView::avatar(Uuid::new_v4(), Vec3::ZERO)
            .holding(WeaponKind::AdvancedShooter.item());
        world.insert_entity(avatar.clone());
        let mut session = ParticipantSession::new(avatar.id, "ada");

        assert!(matches!(
            session.on_item_use(&mut world, &mut rng, &avatar),
            UseOutcome::Fired { cooldown: 25, .. }
        ));
        assert_eq!(
            session.on_item_use(&mut world, &mut rng, &avatar),
            UseOutcome::CoolingDown
        );
        for _ in 0..25 {
            session.tick(&world);
        }
        assert!(!session.is_cooling(WeaponKind::AdvancedShooter.item()));
    }

    #[test]
    fn reset_of_a_departed_participant_only_spectates() {
        let mut world = SimWorld::new();
        let id = Uuid::new_v4();
        world.insert_entity(EntityView::avatar(id, Vec3::ZERO));
        let mut session = ParticipantSession::new(id, "ada");
        session.mark_left();
        session.reset(&mut world);

        assert_eq!(
            world.commands(),
            &[WorldCommand::SetGameMode {
                entity: id,
                mode: GameMode::Spectator
            }]
        );
    }

    #[test]
    fn door_access_follows_teams() {
        let mut roster = Roster::default();
        let red = Uuid::new_v4();
        let loner = Uuid::new_v4();
        let mut session = ParticipantSession::new(red, "red");
        session.set_team(Some("red".into()));
        roster.insert(session);
        roster.insert(ParticipantSession::new(loner, "loner"));

        let red_avatar = EntityView::avatar(red, Vec3::ZERO);
        let loner_avatar = EntityView::avatar(loner, Vec3::ZERO);
        let stranger = EntityView::avatar(Uuid::new_v4(), Vec3::ZERO);

        assert!(roster.can_open_door(&red_avatar, Some("red")));
        assert!(!roster.can_open_door(&red_avatar, Some("blue")));
        assert!(roster.can_open_door(&red_avatar, None));
        assert!(roster.can_open_door(&loner_avatar, Some("blue")));
        assert!(!roster.can_open_door(&stranger, None));

        let mut spectating = red_avatar.clone();
        spectating.spectator = true;
        assert!(!roster.can_open_door(&spectating, None));
    }
}
