//! Power economy scenarios: saturation, freeze transitions, the raid state
//! machine, and the member-power threshold.

mod common;

use clanforge::engine::EngineNotice;
use clanforge::faction::power;
use common::*;

#[test]
fn power_stays_in_bounds_for_any_mutation_sequence() {
    let mut engine = engine();
    create_faction(&mut engine, "alice", "Alpha");
    add_member(&mut engine, "alice", "bob", "Alpha");

    // 2 members * 20 = ceiling 40.
    let sequence: &[i64] = &[100, -3, 7, -200, 50, 15, -1, 999];
    let mut now = 1;
    for delta in sequence {
        engine.admin_set_power("Alpha", *delta, at(now)).unwrap();
        let faction = engine.roster().faction("Alpha").unwrap();
        assert!(faction.power >= 0, "power went negative");
        assert!(faction.power <= 40, "power exceeded the derived ceiling");
        now += 1;
    }
}

#[test]
fn collapse_clamps_to_zero_and_freezes() {
    let mut engine = engine();
    create_faction(&mut engine, "alice", "Alpha");

    // Driving power to -5 observes 0, a freeze flag, and a window ending
    // exactly freeze_duration after the collapse.
    let event = engine.admin_set_power("Alpha", -5, at(100)).unwrap();
    let event = event.expect("collapse triggers freeze");
    assert_eq!(event.frozen_until, at(700));

    let faction = engine.roster().faction("Alpha").unwrap();
    assert_eq!(faction.power, 0);
    assert!(faction.freeze);
    assert!(!faction.is_raidable(), "frozen factions are protected, not raidable");
}

#[test]
fn freeze_is_idempotent_and_blocks_mutation() {
    let mut engine = engine();
    create_faction(&mut engine, "alice", "Alpha");

    engine.admin_set_power("Alpha", -5, at(100)).unwrap();
    let first_window = engine.roster().faction("Alpha").unwrap().freeze_until;

    // Re-triggering must not extend the window.
    let second = engine.admin_set_power("Alpha", -10, at(400)).unwrap();
    assert!(second.is_none());
    assert_eq!(engine.roster().faction("Alpha").unwrap().freeze_until, first_window);

    // Power gain is rejected while frozen.
    engine.admin_set_power("Alpha", 15, at(500)).unwrap();
    assert_eq!(engine.roster().faction("Alpha").unwrap().power, 0);
}

#[test]
fn raid_state_machine_round_trip() {
    let mut engine = engine();
    create_faction(&mut engine, "alice", "Alpha");

    // Stable.
    assert!(!engine.roster().faction("Alpha").unwrap().is_raidable());

    // Collapse -> Frozen (power forced to 0).
    engine.admin_set_power("Alpha", 0, at(60)).unwrap();
    assert!(engine.roster().faction("Alpha").unwrap().freeze);

    // The sweep before expiry leaves the faction frozen.
    assert!(engine.tick(at(120)).is_empty());

    // Frozen -> Stable once the window elapses (60 + 600).
    let notices = engine.tick(at(700));
    assert!(notices
        .iter()
        .any(|n| matches!(n, EngineNotice::FreezeEnded { faction } if faction == "Alpha")));
    let faction = engine.roster().faction("Alpha").unwrap();
    assert!(!faction.freeze);
    assert_eq!(faction.freeze_until, None);

    // Power can move again after release.
    engine.admin_set_power("Alpha", 10, at(710)).unwrap();
    assert_eq!(engine.roster().faction("Alpha").unwrap().power, 10);
}

#[test]
fn member_power_threshold_converts_overreach_into_freeze() {
    let mut engine = engine();
    create_faction(&mut engine, "alice", "Alpha");
    create_faction(&mut engine, "eve", "Raiders");

    // Hold three claims: threshold is 3 * 5.0 = 15.0 member power.
    for (x, z) in [(8.0, 8.0), (24.0, 8.0), (40.0, 8.0)] {
        engine
            .handle_command(
                &ctx("alice", Some(pos("world", x, z)), at(0)),
                clanforge::engine::Command::Claim,
            )
            .unwrap();
    }

    // alice starts at 10.0 personal power; one death (-10.0) leaves 0.0,
    // far below the 15.0 the territory demands.
    let outcome = engine.on_player_death("alice", Some("eve"), at(50));
    let freeze = outcome.freeze.expect("threshold breach freezes");
    assert_eq!(freeze.faction, "Alpha");
    assert_eq!(freeze.frozen_until, at(650));
    assert!(engine.roster().faction("Alpha").unwrap().freeze);
}

#[test]
fn periodic_sweep_catches_threshold_drift() {
    let mut engine = engine();
    create_faction(&mut engine, "alice", "Alpha");
    create_faction(&mut engine, "bob", "Beta");
    add_member(&mut engine, "alice", "carol", "Alpha");

    // Alpha holds four claims on the strength of two members...
    for (x, z) in [(8.0, 8.0), (24.0, 8.0), (40.0, 8.0), (56.0, 8.0)] {
        engine
            .handle_command(
                &ctx("alice", Some(pos("world", x, z)), at(0)),
                clanforge::engine::Command::Claim,
            )
            .unwrap();
    }
    assert!(engine.tick(at(1)).is_empty());

    // ...then carol is kicked, leaving 10.0 member power against the
    // 20.0 the territory demands. The next sweep notices.
    engine
        .handle_command(
            &ctx("alice", None, at(2)),
            clanforge::engine::Command::Kick { player: "carol".to_string() },
        )
        .unwrap();
    let notices = engine.tick(at(120));
    assert!(notices
        .iter()
        .any(|n| matches!(n, EngineNotice::FreezeStarted { faction, .. } if faction == "Alpha")));
    assert!(engine.roster().faction("Alpha").unwrap().freeze);
    assert!(!engine.roster().faction("Beta").unwrap().freeze);
}

#[test]
fn kills_and_deaths_mirror_into_faction_stats() {
    let mut engine = engine();
    create_faction(&mut engine, "alice", "Alpha");
    create_faction(&mut engine, "bob", "Beta");

    let outcome = engine.on_player_death("bob", Some("alice"), at(10));
    assert_eq!(outcome.killer_faction.as_deref(), Some("Alpha"));
    assert_eq!(outcome.victim_faction.as_deref(), Some("Beta"));

    let alpha = engine.roster().faction("Alpha").unwrap();
    let beta = engine.roster().faction("Beta").unwrap();
    assert_eq!((alpha.kills, alpha.deaths), (1, 0));
    assert_eq!((beta.kills, beta.deaths), (0, 1));

    // Faction power is untouched by the personal-power exchange.
    assert_eq!(alpha.power, 20);
    assert_eq!(beta.power, 20);

    let killer = engine.roster().player("alice").unwrap();
    let victim = engine.roster().player("bob").unwrap();
    assert_eq!(killer.power, 15.0);
    assert_eq!(victim.power, 0.0);
}

#[test]
fn max_power_follows_member_count_live() {
    let mut engine = engine();
    create_faction(&mut engine, "alice", "Alpha");
    let config = free_config();

    let faction = engine.roster().faction("Alpha").unwrap();
    assert_eq!(power::max_power(faction, &config.power), 20);

    add_member(&mut engine, "alice", "bob", "Alpha");
    let faction = engine.roster().faction("Alpha").unwrap();
    assert_eq!(power::max_power(faction, &config.power), 40);
}
