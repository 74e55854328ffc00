//! Match state machine and event handlers
//!
//! A [`Match`] owns the roster, spawn selection, doors and the clock. It is
//! advanced by [`Match::tick`] and fed environment events through the `on_*`
//! handlers; everything it wants rendered is queued as [`MatchEvent`]s.

use std::collections::BTreeMap;
use std::thread::{self, ThreadId};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::arena::ArenaData;
use crate::config::MatchConfig;
use crate::protocol::{
    Announcement, DamageSource, EffectKind, EndReason, ExplosionCause, Hand, MatchEvent, Verdict,
};
use crate::util::time::TICKS_PER_SECOND;

use super::door::Barrier;
use super::launch_pad::launch_vector;
use super::ray::raycast_entity;
use super::scoreboard::ScoreboardBuilder;
use super::session::{ParticipantSession, Roster, UseOutcome};
use super::spawn::{spawn_waiting, SpawnSelector};
use super::weapon::{Shot, SHOOTER_MARGIN, SHOOTER_RANGE};
use super::world::{Environment, Facing, GameMode, GeometryState, WorldCommand};
use super::{MatchError, MatchPhase};

/// Ticks between two celebration effects while ending
const CELEBRATION_INTERVAL: u32 = TICKS_PER_SECOND;

pub struct Match<E: Environment> {
    id: Uuid,
    config: MatchConfig,
    arena: ArenaData,
    env: E,
    rng: ChaCha8Rng,
    phase: MatchPhase,
    tick: u64,
    time_left: i64,
    end_time: u32,
    end_reason: Option<EndReason>,
    winners: Vec<Uuid>,
    roster: Roster,
    spawns: SpawnSelector,
    barriers: Vec<Barrier>,
    scoreboard: ScoreboardBuilder,
    events: Vec<MatchEvent>,
    sim_thread: ThreadId,
}

impl<E: Environment> Match<E> {
    /// Validate the arena, build doors and launch pads, and register every
    /// participant in the waiting area.
    ///
    /// Without an explicit assignment, configured teams are handed out
    /// round-robin in participant id order.
    pub fn open(
        config: MatchConfig,
        arena: ArenaData,
        mut env: E,
        participants: impl IntoIterator<Item = (Uuid, String)>,
        assignment: Option<BTreeMap<Uuid, String>>,
    ) -> Result<Self, MatchError> {
        let spawns = SpawnSelector::new(arena.spawns.clone()).ok_or(MatchError::NoSpawnPoints)?;
        if let Some(assignment) = &assignment {
            if config.teams.is_empty() {
                return Err(MatchError::NoTeams);
            }
            if let Some(team) = assignment.values().find(|team| !config.has_team(team)) {
                return Err(MatchError::UnknownTeam(team.clone()));
            }
        }

        let mut barriers = Vec::new();
        for region in &arena.doors {
            if let Some(barrier) = Barrier::from_region(&mut env, region, &arena, &config)? {
                barriers.push(barrier);
            }
        }
        for pad in &arena.launch_pads {
            env.apply(WorldCommand::SetGeometry {
                bounds: pad.bounds,
                state: GeometryState::LaunchPad {
                    facing: pad.facing,
                    power: pad.power,
                },
            });
        }

        let mut roster = Roster::default();
        for (id, name) in participants {
            roster.insert(ParticipantSession::new(id, name));
        }
        match &assignment {
            Some(assignment) => {
                for session in roster.iter_mut() {
                    session.set_team(assignment.get(&session.id).cloned());
                }
            }
            None if !config.teams.is_empty() => {
                let teams = config.teams.clone();
                for (session, team) in roster.iter_mut().zip(teams.iter().cycle()) {
                    session.set_team(Some(team.clone()));
                }
            }
            None => {}
        }

        let id = Uuid::new_v4();
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for session in roster.iter() {
            spawn_waiting(&mut env, &mut rng, &arena.waiting_spawn, session.id);
        }

        info!(
            match_id = %id,
            arena = %config.arena_id,
            participants = roster.len(),
            doors = barriers.len(),
            seed,
            "Match opened"
        );

        let time_left = i64::from(config.time_limit_ticks);
        let end_time = config.end_grace_ticks;

        Ok(Self {
            id,
            config,
            arena,
            env,
            rng,
            phase: MatchPhase::Waiting,
            tick: 0,
            time_left,
            end_time,
            end_reason: None,
            winners: Vec::new(),
            roster,
            spawns,
            barriers,
            scoreboard: ScoreboardBuilder::new(TICKS_PER_SECOND),
            events: vec![MatchEvent::PhaseChanged {
                phase: MatchPhase::Waiting,
            }],
            sim_thread: thread::current().id(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Remaining match time in ticks
    pub fn time_left(&self) -> i64 {
        self.time_left
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn winners(&self) -> &[Uuid] {
        &self.winners
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn barriers(&self) -> &[Barrier] {
        &self.barriers
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    /// Drain the events queued since the last call
    pub fn take_events(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.events)
    }

    /// Make the calling thread the simulation thread
    pub fn bind_simulation_thread(&mut self) {
        self.sim_thread = thread::current().id();
    }

    fn set_phase(&mut self, phase: MatchPhase) {
        self.phase = phase;
        self.events.push(MatchEvent::PhaseChanged { phase });
    }

    /// Leave the waiting area: team barriers go up and everyone spawns
    pub fn start(&mut self) {
        if self.phase != MatchPhase::Waiting {
            debug!(match_id = %self.id, phase = ?self.phase, "Start ignored");
            return;
        }

        if !self.config.teams.is_empty() {
            for region in &self.arena.team_barriers {
                if !self.config.has_team(&region.team) {
                    debug!(team = %region.team, "Team barrier for unknown team skipped");
                    continue;
                }
                self.env.apply(WorldCommand::SetGeometry {
                    bounds: region.bounds,
                    state: GeometryState::TeamBarrier {
                        team: Some(region.team.clone()),
                    },
                });
            }
        }

        self.set_phase(MatchPhase::Running);
        let ids: Vec<Uuid> = self.roster.active().map(|s| s.id).collect();
        for id in ids {
            self.spawn_participant(id);
        }
        self.scoreboard.force_next();

        info!(match_id = %self.id, participants = self.roster.active_count(), "Match started");
    }

    /// Advance the match by one tick
    pub fn tick(&mut self) {
        if self.phase == MatchPhase::Closed {
            return;
        }
        self.tick += 1;

        for barrier in &mut self.barriers {
            barrier.tick(&mut self.env, &self.roster);
        }

        match self.phase {
            MatchPhase::Running => self.tick_running(),
            MatchPhase::Ending => self.tick_ending(),
            MatchPhase::Waiting | MatchPhase::Closed => {}
        }

        if matches!(self.phase, MatchPhase::Running | MatchPhase::Ending) {
            if let Some(board) = self.scoreboard.update(self.time_left, &self.roster) {
                self.events.push(MatchEvent::Scoreboard { board });
            }
        }
    }

    fn tick_running(&mut self) {
        let due: Vec<Uuid> = self
            .roster
            .active()
            .filter(|s| s.respawn_at().is_some_and(|at| at <= self.tick))
            .map(|s| s.id)
            .collect();
        for id in due {
            if let Some(session) = self.roster.get_mut(id) {
                session.clear_respawn();
            }
            self.spawn_participant(id);
        }

        let win_kills = self.config.win_kills;
        let env = &self.env;
        let events = &mut self.events;
        let (active, winner) = self
            .roster
            .iter_mut()
            .filter(|s| !s.has_left())
            .fold((0usize, None), |(active, winner), session| {
                events.extend(session.tick(env));
                let winner = winner.or_else(|| session.has_won(win_kills).then_some(session.id));
                (active + 1, winner)
            });

        self.time_left -= 1;

        if let Some(winner) = winner {
            self.end(EndReason::Winner, Some(winner));
        } else if active <= 1 {
            self.end(EndReason::NotEnoughPlayers, None);
        } else if self.time_left <= 0 {
            self.end(EndReason::TimeExpired, None);
        }
    }

    fn end(&mut self, reason: EndReason, winner: Option<Uuid>) {
        let announcement = match winner.and_then(|id| self.roster.get(id)) {
            Some(session) => {
                info!(match_id = %self.id, participant = %session.id, kills = session.kills(), "Win latched");
                Announcement::Won {
                    name: session.name.clone(),
                }
            }
            None if reason == EndReason::NotEnoughPlayers => Announcement::NotEnoughPlayers,
            None => Announcement::TimeExpired,
        };
        self.winners.extend(winner);
        self.events.push(MatchEvent::announce(announcement));

        for session in self.roster.iter_mut() {
            session.on_end(&mut self.env);
        }

        self.end_reason = Some(reason);
        self.end_time = self.config.end_grace_ticks;
        self.set_phase(MatchPhase::Ending);
        self.scoreboard.force_next();

        info!(match_id = %self.id, reason = ?reason, "Match ended");
    }

    fn tick_ending(&mut self) {
        self.end_time = self.end_time.saturating_sub(1);

        if self.end_time % CELEBRATION_INTERVAL == 0 {
            for winner in &self.winners {
                if self.roster.get(*winner).map_or(true, |s| s.has_left()) {
                    continue;
                }
                if let Some(avatar) = self.env.entity(*winner) {
                    self.events
                        .push(MatchEvent::effect(EffectKind::Celebration, avatar.position));
                }
            }
        }

        if self.end_time == 0 {
            self.close();
        }
    }

    fn close(&mut self) {
        let reason = self.end_reason.unwrap_or(EndReason::TimeExpired);
        self.set_phase(MatchPhase::Closed);
        self.events.push(MatchEvent::Closed { reason });
        info!(match_id = %self.id, "Match closed");
    }

    /// Reset a session and place it: combatants at a spawn point, departed
    /// participants in the waiting area
    fn spawn_participant(&mut self, id: Uuid) {
        let Some(session) = self.roster.get_mut(id) else {
            return;
        };
        session.reset(&mut self.env);
        if session.has_left() {
            spawn_waiting(&mut self.env, &mut self.rng, &self.arena.waiting_spawn, id);
            return;
        }

        let roster_size = self.roster.active_count();
        let roster = &self.roster;
        self.spawns
            .spawn_avatar(&mut self.env, &mut self.rng, id, roster_size, |e| roster.is_present(e));
    }

    /// Participant connected. In the waiting phase this registers a session;
    /// afterwards the avatar spectates from the waiting area.
    pub fn add_participant(&mut self, id: Uuid, name: impl Into<String>) {
        let name = name.into();
        match self.phase {
            MatchPhase::Waiting => {
                let mut session = ParticipantSession::new(id, name);
                session.set_team(self.next_team());
                self.roster.insert(session);
                spawn_waiting(&mut self.env, &mut self.rng, &self.arena.waiting_spawn, id);
                info!(match_id = %self.id, participant = %id, "Participant joined");
            }
            MatchPhase::Running | MatchPhase::Ending => {
                self.env.apply(WorldCommand::SetGameMode {
                    entity: id,
                    mode: GameMode::Spectator,
                });
                self.env.apply(WorldCommand::ClearInventory { entity: id });
                spawn_waiting(&mut self.env, &mut self.rng, &self.arena.waiting_spawn, id);
                info!(match_id = %self.id, participant = %id, "Participant joined as spectator");
            }
            MatchPhase::Closed => {
                debug!(match_id = %self.id, participant = %id, "Join after close ignored");
            }
        }
    }

    /// Least populated configured team, first in configuration order on ties
    fn next_team(&self) -> Option<String> {
        self.config
            .teams
            .iter()
            .min_by_key(|team| {
                self.roster
                    .iter()
                    .filter(|s| s.team() == Some(team.as_str()))
                    .count()
            })
            .cloned()
    }

    /// Participant disconnected. The session stays for the scoreboard.
    pub fn remove_participant(&mut self, id: Uuid) {
        let Some(session) = self.roster.get_mut(id) else {
            debug!(match_id = %self.id, participant = %id, "Leave for unknown participant");
            return;
        };
        session.mark_left();
        self.env.apply(WorldCommand::SetSpeedBoost {
            entity: id,
            enabled: false,
        });
        self.scoreboard.force_next();
        info!(match_id = %self.id, participant = %id, "Participant left");
    }

    /// Running, present and not waiting to respawn
    fn is_combatant(&self, id: Uuid) -> bool {
        self.phase == MatchPhase::Running
            && self
                .roster
                .get(id)
                .is_some_and(|s| !s.has_left() && s.respawn_at().is_none())
    }

    /// Right-click with an item. Fires the held weapon unless it is cooling down.
    pub fn on_use_item(&mut self, id: Uuid, hand: Hand) -> Verdict {
        if hand == Hand::Off || !self.is_combatant(id) {
            return Verdict::Cancel;
        }
        let Some(avatar) = self.env.entity(id) else {
            return Verdict::Apply;
        };
        let Some(session) = self.roster.get_mut(id) else {
            return Verdict::Apply;
        };

        match session.on_item_use(&mut self.env, &mut self.rng, &avatar) {
            UseOutcome::Fired { shot, .. } => {
                self.events.push(MatchEvent::ShotFired {
                    shooter: id,
                    position: avatar.position,
                });
                if let Shot::Hitscan { trace, .. } = &shot {
                    self.events.push(MatchEvent::RayTrace {
                        from: trace.0,
                        to: trace.1,
                    });
                }
                for &victim in shot.hits() {
                    self.on_avatar_death(victim, Some(id));
                }
                Verdict::Cancel
            }
            UseOutcome::CoolingDown | UseOutcome::NotFired => Verdict::Apply,
        }
    }

    /// Right-click on world geometry
    pub fn on_use_block(&mut self, id: Uuid, _hand: Hand) -> Verdict {
        if let Some(session) = self.roster.get_mut(id) {
            session.on_block_use();
        }
        Verdict::Cancel
    }

    /// Hand swing: the secondary ability unless it trails a use.
    ///
    /// Must be called on the simulation thread.
    pub fn on_swing_hand(&mut self, id: Uuid, hand: Hand) -> Result<(), MatchError> {
        if thread::current().id() != self.sim_thread {
            warn!(match_id = %self.id, participant = %id, "Swing delivered off the simulation thread");
            return Err(MatchError::OffSimulationThread);
        }
        if hand == Hand::Off || !self.is_combatant(id) {
            return Ok(());
        }
        let Some(avatar) = self.env.entity(id) else {
            return Ok(());
        };
        if let Some(session) = self.roster.get_mut(id) {
            session.on_swing(&mut self.env, &avatar);
        }
        Ok(())
    }

    /// Melee is disabled; spectators keep their default interactions
    pub fn on_attack_entity(&self, id: Uuid) -> Verdict {
        match self.env.entity(id) {
            Some(avatar) if avatar.spectator => Verdict::Apply,
            _ => Verdict::Cancel,
        }
    }

    /// Incoming damage. Explosions never hurt: they either kill outright on
    /// behalf of whoever caused them, or are dropped.
    pub fn on_damage(&mut self, victim: Uuid, source: DamageSource) -> Verdict {
        if self.phase != MatchPhase::Running {
            return Verdict::Cancel;
        }
        let DamageSource::Explosion { cause } = source else {
            return Verdict::Apply;
        };

        let attacker = match cause {
            ExplosionCause::Grenade { owner } | ExplosionCause::Rocket { owner } => owner,
            ExplosionCause::Firework => return Verdict::Cancel,
            ExplosionCause::Avatar { id } => Some(id),
        };

        if let Some(attacker) = attacker {
            if attacker != victim && self.env.entity(attacker).is_some() {
                self.on_avatar_death(victim, Some(attacker));
            }
        }
        Verdict::Cancel
    }

    /// Avatar died. Credits the killer if it is a present participant and
    /// respawns the victim.
    pub fn on_avatar_death(&mut self, victim: Uuid, killer: Option<Uuid>) -> Verdict {
        if self.phase != MatchPhase::Running {
            return Verdict::Apply;
        }
        let Some(victim_name) = self.roster.get(victim).map(|s| s.name.clone()) else {
            debug!(match_id = %self.id, victim = %victim, "Death of a non-participant ignored");
            return Verdict::Apply;
        };

        let credited = killer
            .filter(|killer| *killer != victim)
            .and_then(|killer| self.roster.get_mut(killer))
            .filter(|session| !session.has_left());
        match credited {
            Some(session) => {
                session.record_kill();
                let killer_name = session.name.clone();
                self.events.push(MatchEvent::announce(Announcement::Kill {
                    killer: killer_name,
                    victim: victim_name,
                }));
                if let Some(avatar) = self.env.entity(victim) {
                    self.events
                        .push(MatchEvent::effect(EffectKind::Death, avatar.position));
                }
                self.scoreboard.force_next();
            }
            None if killer.is_some() => {
                debug!(match_id = %self.id, victim = %victim, "Kill by untracked attacker not credited");
            }
            None => {}
        }

        let delay = self.config.respawn_delay_ticks;
        if delay == 0 {
            self.spawn_participant(victim);
        } else if let Some(session) = self.roster.get_mut(victim) {
            session.schedule_respawn(self.tick + u64::from(delay));
            self.env.apply(WorldCommand::SetGameMode {
                entity: victim,
                mode: GameMode::Spectator,
            });
        }
        Verdict::Cancel
    }

    /// Avatar touched a launch pad
    pub fn on_launch_pad(&mut self, id: Uuid, facing: Facing, power: u8) {
        let Some(avatar) = self.env.entity(id) else {
            return;
        };
        if avatar.spectator || !avatar.alive {
            return;
        }
        self.env.apply(WorldCommand::SetVelocity {
            entity: id,
            velocity: launch_vector(avatar.yaw, avatar.pitch, facing, power),
        });
    }

    /// Whether a team barrier owned by `team` blocks this entity.
    ///
    /// Only combatants with a team other than the barrier's are blocked.
    pub fn barrier_blocks(&self, entity: Uuid, team: Option<&str>) -> bool {
        let Some(team) = team else {
            return false;
        };
        if self.config.teams.is_empty() {
            return false;
        }
        self.roster
            .get(entity)
            .filter(|s| !s.has_left())
            .and_then(|s| s.team())
            .is_some_and(|own| own != team)
    }

    /// Nearest entity in the participant's line of sight within shooting range
    pub fn aim_target(&self, id: Uuid) -> Option<Uuid> {
        let avatar = self.env.entity(id)?;
        raycast_entity(&self.env, &avatar, SHOOTER_RANGE, SHOOTER_MARGIN).map(|c| c.entity)
    }
}
