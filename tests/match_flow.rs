//! End-to-end match scenarios against the in-memory world

use glam::Vec3;
use uuid::Uuid;

use arena_deathmatch::arena::{ActivationRegion, ArenaData, DoorRegion, SpawnPoint};
use arena_deathmatch::config::MatchConfig;
use arena_deathmatch::game::geometry::Aabb;
use arena_deathmatch::game::world::{EntityView, GameMode, GeometryState, WorldCommand};
use arena_deathmatch::game::{Environment, Match, MatchPhase, SimWorld};
use arena_deathmatch::protocol::{
    Announcement, DamageSource, EffectKind, EndReason, ExplosionCause, Hand, MatchEvent, Verdict,
};

fn arena() -> ArenaData {
    ArenaData {
        id: "flow".into(),
        waiting_spawn: Aabb::new(Vec3::new(-50.0, 100.0, -50.0), Vec3::new(-40.0, 100.0, -40.0)),
        spawns: (0..4)
            .map(|i| SpawnPoint {
                id: format!("spawn-{i}"),
                position: Vec3::new(i as f32 * 200.0, 64.0, 500.0),
                yaw: 180.0,
            })
            .collect(),
        doors: Vec::new(),
        door_activations: Vec::new(),
        team_barriers: Vec::new(),
        launch_pads: Vec::new(),
    }
}

fn config() -> MatchConfig {
    MatchConfig {
        seed: Some(42),
        ..MatchConfig::default()
    }
}

/// Open a match with `n` participants (sorted by id) and start it
fn running_match(n: usize, config: MatchConfig, arena: ArenaData) -> (Match<SimWorld>, Vec<Uuid>) {
    let mut world = SimWorld::new();
    let mut ids: Vec<Uuid> = (0..n).map(|_| Uuid::new_v4()).collect();
    ids.sort();
    for id in &ids {
        world.insert_entity(EntityView::avatar(*id, Vec3::ZERO));
    }
    let entrants = ids.iter().enumerate().map(|(i, id)| (*id, format!("p{i}")));
    let mut game = Match::open(config, arena, world, entrants, None).expect("match opens");
    game.start();
    game.take_events();
    (game, ids)
}

fn place(game: &mut Match<SimWorld>, id: Uuid, position: Vec3, yaw: f32) {
    let avatar = game.env_mut().entity_mut(id).expect("avatar exists");
    avatar.position = position;
    avatar.yaw = yaw;
    avatar.pitch = 0.0;
}

fn announcements(events: &[MatchEvent]) -> Vec<Announcement> {
    events
        .iter()
        .filter_map(|event| match event {
            MatchEvent::Announcement { message } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

fn kills(game: &Match<SimWorld>, id: Uuid) -> u32 {
    game.roster().get(id).map(|s| s.kills()).unwrap_or(0)
}

#[test]
fn one_shot_through_three_targets_is_a_single_multi_kill() {
    let (mut game, ids) = running_match(4, config(), arena());
    let shooter = ids[0];
    place(&mut game, shooter, Vec3::new(1000.0, 64.0, 1000.0), -90.0);
    for (i, target) in ids[1..].iter().enumerate() {
        place(&mut game, *target, Vec3::new(1005.0 + i as f32 * 5.0, 64.0, 1000.0), 0.0);
    }

    assert_eq!(game.on_use_item(shooter, Hand::Main), Verdict::Cancel);
    let shot_events = game.take_events();
    let kill_lines = announcements(&shot_events)
        .into_iter()
        .filter(|a| matches!(a, Announcement::Kill { .. }))
        .count();
    assert_eq!(kill_lines, 3);
    assert!(shot_events
        .iter()
        .any(|e| matches!(e, MatchEvent::RayTrace { .. })));
    assert_eq!(kills(&game, shooter), 0, "kills are credited on the tick");

    game.tick();
    assert_eq!(kills(&game, shooter), 3);
    let multi: Vec<Announcement> = announcements(&game.take_events())
        .into_iter()
        .filter(|a| matches!(a, Announcement::MultiKill { .. }))
        .collect();
    assert_eq!(
        multi,
        vec![Announcement::MultiKill {
            name: "p0".into(),
            count: 3
        }]
    );

    // victims were sent back to spawn points
    for target in &ids[1..] {
        let avatar = game.env().entity(*target).expect("avatar");
        assert_eq!(avatar.position.y, 64.0);
        assert_eq!(avatar.position.z, 500.0);
    }
}

#[test]
fn item_cooldown_blocks_the_second_shot() {
    let (mut game, ids) = running_match(2, config(), arena());
    place(&mut game, ids[0], Vec3::new(1000.0, 64.0, 1000.0), -90.0);

    assert_eq!(game.on_use_item(ids[0], Hand::Main), Verdict::Cancel);
    assert_eq!(game.on_use_item(ids[0], Hand::Main), Verdict::Apply);
    assert_eq!(game.on_use_item(ids[0], Hand::Off), Verdict::Cancel);

    let cooldowns = game
        .env()
        .commands()
        .iter()
        .filter(|c| matches!(c, WorldCommand::SetItemCooldown { ticks: 25, .. }))
        .count();
    assert_eq!(cooldowns, 1);
}

#[test]
fn first_session_in_id_order_wins_a_tied_tick() {
    let config = MatchConfig {
        win_kills: 1,
        ..config()
    };
    let (mut game, ids) = running_match(4, config, arena());

    game.on_avatar_death(ids[1], Some(ids[2]));
    game.on_avatar_death(ids[3], Some(ids[0]));
    game.take_events();

    game.tick();
    assert_eq!(game.phase(), MatchPhase::Ending);
    assert_eq!(game.end_reason(), Some(EndReason::Winner));
    assert_eq!(game.winners(), &[ids[0]]);

    let won: Vec<Announcement> = announcements(&game.take_events())
        .into_iter()
        .filter(|a| matches!(a, Announcement::Won { .. }))
        .collect();
    assert_eq!(won, vec![Announcement::Won { name: "p0".into() }]);

    game.tick();
    assert_eq!(game.winners().len(), 1);
}

#[test]
fn last_participant_standing_ends_without_winner() {
    let (mut game, ids) = running_match(2, config(), arena());
    game.remove_participant(ids[1]);
    game.tick();

    assert_eq!(game.phase(), MatchPhase::Ending);
    assert_eq!(game.end_reason(), Some(EndReason::NotEnoughPlayers));
    assert!(game.winners().is_empty());
    assert!(announcements(&game.take_events()).contains(&Announcement::NotEnoughPlayers));

    let cleared = game
        .env()
        .commands()
        .iter()
        .filter(|c| matches!(c, WorldCommand::ClearInventory { .. }))
        .count();
    assert_eq!(cleared, 2);
    assert!(game
        .env()
        .commands()
        .contains(&WorldCommand::SetSpeedBoost {
            entity: ids[1],
            enabled: false
        }));
}

#[test]
fn clock_running_out_ends_the_match() {
    let config = MatchConfig {
        time_limit_ticks: 3,
        ..config()
    };
    let (mut game, _) = running_match(2, config, arena());

    game.tick();
    game.tick();
    assert_eq!(game.phase(), MatchPhase::Running);
    game.tick();
    assert_eq!(game.phase(), MatchPhase::Ending);
    assert_eq!(game.end_reason(), Some(EndReason::TimeExpired));
    assert!(announcements(&game.take_events()).contains(&Announcement::TimeExpired));
}

#[test]
fn grace_period_celebrates_then_closes() {
    let config = MatchConfig {
        win_kills: 1,
        end_grace_ticks: 40,
        ..config()
    };
    let (mut game, ids) = running_match(3, config, arena());
    game.on_avatar_death(ids[1], Some(ids[0]));
    game.tick();
    assert_eq!(game.phase(), MatchPhase::Ending);
    game.take_events();

    let mut events = Vec::new();
    for _ in 0..39 {
        game.tick();
        events.extend(game.take_events());
    }
    assert_eq!(game.phase(), MatchPhase::Ending);
    game.tick();
    events.extend(game.take_events());
    assert_eq!(game.phase(), MatchPhase::Closed);

    let celebrations = events
        .iter()
        .filter(|e| {
            matches!(
                e,
                MatchEvent::Effect {
                    kind: EffectKind::Celebration,
                    ..
                }
            )
        })
        .count();
    assert_eq!(celebrations, 2);
    assert!(events.contains(&MatchEvent::Closed {
        reason: EndReason::Winner
    }));

    game.tick();
    assert!(game.take_events().is_empty());
}

#[test]
fn explosions_are_attributed_to_their_owner() {
    let (mut game, ids) = running_match(3, config(), arena());
    let (owner, victim) = (ids[0], ids[1]);

    let grenade = DamageSource::Explosion {
        cause: ExplosionCause::Grenade { owner: Some(owner) },
    };
    assert_eq!(game.on_damage(victim, grenade), Verdict::Cancel);
    game.tick();
    assert_eq!(kills(&game, owner), 1);

    // own rocket: suppressed, nobody credited, no respawn
    let before = game.env().commands().len();
    let own_rocket = DamageSource::Explosion {
        cause: ExplosionCause::Rocket { owner: Some(victim) },
    };
    assert_eq!(game.on_damage(victim, own_rocket), Verdict::Cancel);
    assert_eq!(game.env().commands().len(), before);

    let ownerless = DamageSource::Explosion {
        cause: ExplosionCause::Rocket { owner: None },
    };
    assert_eq!(game.on_damage(victim, ownerless), Verdict::Cancel);
    let firework = DamageSource::Explosion {
        cause: ExplosionCause::Firework,
    };
    assert_eq!(game.on_damage(victim, firework), Verdict::Cancel);
    assert_eq!(game.on_damage(victim, DamageSource::Other), Verdict::Apply);

    game.tick();
    assert_eq!(kills(&game, owner), 1);
    assert_eq!(kills(&game, victim), 0);
}

#[test]
fn kill_by_unknown_attacker_still_respawns_victim() {
    let (mut game, ids) = running_match(2, config(), arena());
    place(&mut game, ids[1], Vec3::new(-500.0, 0.0, -500.0), 0.0);

    assert_eq!(game.on_avatar_death(ids[1], Some(Uuid::new_v4())), Verdict::Cancel);
    game.tick();
    assert!(game.roster().iter().all(|s| s.kills() == 0));
    assert_eq!(game.env().entity(ids[1]).expect("avatar").position.z, 500.0);
}

#[test]
fn swing_right_after_a_shot_does_not_dash() {
    let (mut game, ids) = running_match(2, config(), arena());
    let id = ids[0];
    place(&mut game, id, Vec3::new(1000.0, 64.0, 1000.0), -90.0);
    let dashes = |game: &Match<SimWorld>| {
        game.env()
            .commands()
            .iter()
            .filter(|c| matches!(c, WorldCommand::SetVelocity { entity, velocity } if *entity == id && velocity.x > 1.0))
            .count()
    };

    game.on_use_item(id, Hand::Main);
    game.on_swing_hand(id, Hand::Main).expect("simulation thread");
    assert_eq!(dashes(&game), 0);

    game.on_swing_hand(id, Hand::Main).expect("simulation thread");
    assert_eq!(dashes(&game), 1);

    // ability is on cooldown now
    game.on_swing_hand(id, Hand::Main).expect("simulation thread");
    assert_eq!(dashes(&game), 1);
}

#[test]
fn block_use_suppresses_the_trailing_swing() {
    let (mut game, ids) = running_match(2, config(), arena());
    let id = ids[0];
    let session_action = |game: &Match<SimWorld>| game.roster().get(id).map(|s| s.last_action());

    assert_eq!(game.on_use_block(id, Hand::Main), Verdict::Cancel);
    game.on_swing_hand(id, Hand::Main).expect("simulation thread");
    assert_eq!(
        session_action(&game),
        Some(arena_deathmatch::game::action::PlayerAction::None)
    );
}

#[test]
fn late_joiner_spectates_from_the_waiting_area() {
    let (mut game, _) = running_match(2, config(), arena());
    let late = Uuid::new_v4();
    game.env_mut().insert_entity(EntityView::avatar(late, Vec3::ZERO));

    game.add_participant(late, "late");
    assert!(game.roster().get(late).is_none());
    let avatar = game.env().entity(late).expect("avatar");
    assert!(avatar.spectator);
    assert_eq!(avatar.position.y, 100.5);
    assert!(game.env().commands().contains(&WorldCommand::SetGameMode {
        entity: late,
        mode: GameMode::Spectator
    }));
}

#[test]
fn respawn_waits_for_the_configured_delay() {
    let config = MatchConfig {
        respawn_delay_ticks: 3,
        ..config()
    };
    let (mut game, ids) = running_match(3, config, arena());
    place(&mut game, ids[1], Vec3::new(-500.0, 0.0, -500.0), 0.0);

    game.on_avatar_death(ids[1], Some(ids[0]));
    assert!(game.env().entity(ids[1]).expect("avatar").spectator);

    game.tick();
    game.tick();
    assert_eq!(game.env().entity(ids[1]).expect("avatar").position.x, -500.0);
    game.tick();
    let avatar = game.env().entity(ids[1]).expect("avatar");
    assert!(!avatar.spectator);
    assert_eq!(avatar.position.z, 500.0);
}

#[test]
fn participant_awaiting_respawn_cannot_fight() {
    let config = MatchConfig {
        respawn_delay_ticks: 40,
        ..config()
    };
    let (mut game, ids) = running_match(3, config, arena());
    let (dead, target) = (ids[0], ids[1]);

    game.on_avatar_death(dead, Some(ids[2]));
    place(&mut game, dead, Vec3::new(1000.0, 64.0, 1000.0), -90.0);
    place(&mut game, target, Vec3::new(1005.0, 64.0, 1000.0), 0.0);
    game.take_events();
    let issued = game.env().commands().len();

    assert_eq!(game.on_use_item(dead, Hand::Main), Verdict::Cancel);
    game.on_swing_hand(dead, Hand::Main).expect("simulation thread");
    assert!(announcements(&game.take_events()).is_empty());
    assert_eq!(game.env().commands().len(), issued, "no shot, cooldown or dash");

    game.tick();
    assert_eq!(kills(&game, dead), 0);
    assert_eq!(game.env().entity(target).expect("avatar").position.x, 1005.0);
}

#[test]
fn door_opens_for_a_nearby_combatant() {
    let mut layout = arena();
    let door = Aabb::new(Vec3::new(20.0, 64.0, 20.0), Vec3::new(22.0, 67.0, 20.0));
    layout.door_activations.push(ActivationRegion {
        id: "hall".into(),
        bounds: Aabb::new(Vec3::new(15.0, 60.0, 15.0), Vec3::new(27.0, 70.0, 25.0)),
    });
    layout.doors.push(DoorRegion {
        bounds: door,
        block: Some("iron_bars".into()),
        activation: Some("hall".into()),
        facing: None,
        distance: 0.0,
        team: None,
    });
    let (mut game, ids) = running_match(2, config(), layout);
    assert!(matches!(
        game.env().geometry_at(&door),
        Some(GeometryState::Solid { .. })
    ));

    place(&mut game, ids[0], Vec3::new(21.0, 64.0, 18.0), 0.0);
    game.tick();
    assert!(game.barriers()[0].is_open());
    assert_eq!(
        game.env().geometry_at(&door),
        Some(&GeometryState::TeamBarrier { team: None })
    );
}

#[test]
fn scoreboard_tracks_kills_and_departures() {
    let (mut game, ids) = running_match(3, config(), arena());
    game.on_avatar_death(ids[1], Some(ids[2]));
    game.remove_participant(ids[0]);
    game.tick();

    let board = game
        .take_events()
        .into_iter()
        .find_map(|e| match e {
            MatchEvent::Scoreboard { board } => Some(board),
            _ => None,
        })
        .expect("scoreboard published");
    assert_eq!(board.entries[0].name, "p2");
    assert_eq!(board.entries[0].kills, 1);
    assert!(board.entries.iter().any(|e| e.name == "p0" && e.left));
    assert_eq!(board.time_left, "19:59");
}
