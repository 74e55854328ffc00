//! Tick loop driving a match from queued commands

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::{Command, MatchEvent};
use crate::util::time::tick_duration;

use super::{Environment, Match, MatchPhase};

/// Handle to a running match
#[derive(Clone)]
pub struct MatchHandle {
    pub id: Uuid,
    pub command_tx: mpsc::Sender<Command>,
    pub event_tx: broadcast::Sender<MatchEvent>,
    pub participant_count: Arc<AtomicUsize>,
}

impl MatchHandle {
    pub fn participant_count(&self) -> usize {
        self.participant_count.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.event_tx.subscribe()
    }
}

/// Owns a match and advances it at the simulation rate.
///
/// Every mutation happens inside [`MatchRunner::run`], so it must be driven
/// from a single thread (a current-thread runtime or a `LocalSet`).
pub struct MatchRunner<E: Environment> {
    game: Match<E>,
    command_rx: mpsc::Receiver<Command>,
    event_tx: broadcast::Sender<MatchEvent>,
    participant_count: Arc<AtomicUsize>,
}

impl<E: Environment> MatchRunner<E> {
    pub fn new(game: Match<E>) -> (Self, MatchHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(256);
        let participant_count = Arc::new(AtomicUsize::new(game.roster().active_count()));

        let handle = MatchHandle {
            id: game.id(),
            command_tx,
            event_tx: event_tx.clone(),
            participant_count: participant_count.clone(),
        };

        let runner = Self {
            game,
            command_rx,
            event_tx,
            participant_count,
        };

        (runner, handle)
    }

    /// Run the tick loop until the match closes or every handle is dropped.
    /// Returns the match for inspection.
    pub async fn run(mut self) -> Match<E> {
        self.game.bind_simulation_thread();
        info!(match_id = %self.game.id(), "Match loop started");

        let mut ticker = interval(tick_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            if !self.process_commands() {
                info!(match_id = %self.game.id(), "All handles dropped, stopping match loop");
                break;
            }

            self.game.tick();
            self.publish();

            if self.game.phase() == MatchPhase::Closed {
                break;
            }
        }

        self.game
    }

    /// Drain queued commands. Returns false once the command channel is closed.
    fn process_commands(&mut self) -> bool {
        loop {
            match self.command_rx.try_recv() {
                Ok(command) => self.apply(command),
                Err(mpsc::error::TryRecvError::Empty) => return true,
                Err(mpsc::error::TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn apply(&mut self, command: Command) {
        let game = &mut self.game;
        match command {
            Command::Join { id, name } => game.add_participant(id, name),
            Command::Leave { id } => game.remove_participant(id),
            Command::Start => game.start(),
            Command::Sync { avatar } => game.env_mut().sync_avatar(avatar),
            Command::UseItem { id, hand } => {
                game.on_use_item(id, hand);
            }
            Command::UseBlock { id, hand } => {
                game.on_use_block(id, hand);
            }
            Command::Swing { id, hand } => {
                if let Err(err) = game.on_swing_hand(id, hand) {
                    warn!(participant = %id, error = %err, "Swing dropped");
                }
            }
            Command::AttackEntity { id } => {
                game.on_attack_entity(id);
            }
            Command::Damage { victim, source } => {
                let verdict = game.on_damage(victim, source);
                debug!(victim = %victim, ?verdict, "Damage arbitrated");
            }
            Command::Death { victim, killer } => {
                game.on_avatar_death(victim, killer);
            }
            Command::LaunchPad { id, facing, power } => game.on_launch_pad(id, facing, power),
        }
        self.participant_count
            .store(self.game.roster().active_count(), Ordering::Relaxed);
    }

    fn publish(&mut self) {
        for event in self.game.take_events() {
            // No subscribers is fine; the match keeps running.
            let _ = self.event_tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{ArenaData, SpawnPoint};
    use crate::config::MatchConfig;
    use crate::game::geometry::Aabb;
    use crate::game::world::{EntityView, SimWorld};
    use glam::Vec3;

    fn game(participants: usize) -> (Match<SimWorld>, Vec<Uuid>) {
        let mut world = SimWorld::new();
        let ids: Vec<Uuid> = (0..participants).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            world.insert_entity(EntityView::avatar(*id, Vec3::ZERO));
        }
        let arena = ArenaData {
            id: "runner".into(),
            waiting_spawn: Aabb::new(Vec3::ZERO, Vec3::new(2.0, 0.0, 2.0)),
            spawns: vec![SpawnPoint {
                id: "a".into(),
                position: Vec3::new(0.0, 64.0, 0.0),
                yaw: 0.0,
            }],
            doors: Vec::new(),
            door_activations: Vec::new(),
            team_barriers: Vec::new(),
            launch_pads: Vec::new(),
        };
        let config = MatchConfig {
            end_grace_ticks: 2,
            seed: Some(5),
            ..MatchConfig::default()
        };
        let entrants = ids.iter().map(|id| (*id, id.to_string()));
        let game = Match::open(config, arena, world, entrants, None).expect("open");
        (game, ids)
    }

    #[tokio::test]
    async fn lone_participant_ends_the_match() {
        let (game, _) = game(1);
        let (runner, handle) = MatchRunner::new(game);
        let mut events = handle.subscribe();

        handle.command_tx.send(Command::Start).await.expect("runner alive");
        let game = runner.run().await;

        assert_eq!(game.phase(), MatchPhase::Closed);
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&MatchEvent::PhaseChanged {
            phase: MatchPhase::Running
        }));
        assert!(matches!(seen.last(), Some(MatchEvent::Closed { .. })));
    }

    #[test]
    fn dropping_every_handle_stops_the_loop() {
        let (game, ids) = game(2);
        let (runner, handle) = MatchRunner::new(game);
        assert_eq!(handle.participant_count(), 2);

        handle
            .command_tx
            .try_send(Command::Leave { id: ids[0] })
            .expect("queue has room");
        let count = handle.participant_count.clone();
        drop(handle);

        let game = tokio_test::block_on(runner.run());
        assert_eq!(game.phase(), MatchPhase::Waiting);
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }
}
