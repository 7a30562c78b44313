//! Access-control scenarios driven through the engine: the decision table
//! must answer identically for movement, block edits and border coloring.

mod common;

use clanforge::engine::Command;
use clanforge::faction::types::{ClaimKey, GameMode, TerritoryColor};
use common::*;

/// Alpha owns chunk (0,0); Beta exists as a rival.
fn contested_engine() -> clanforge::engine::Engine {
    let mut engine = engine();
    create_faction(&mut engine, "alice", "Alpha");
    create_faction(&mut engine, "bob", "Beta");
    engine
        .handle_command(&ctx("alice", Some(pos("world", 8.0, 8.0)), at(0)), Command::Claim)
        .unwrap();
    engine
}

#[test]
fn stronger_attacker_may_enter_weaker_territory() {
    let mut engine = contested_engine();
    // Alpha power 50, Beta power 60: rule 10 lets Beta in, survival mode.
    add_member(&mut engine, "alice", "ann", "Alpha");
    add_member(&mut engine, "alice", "amy", "Alpha");
    add_member(&mut engine, "alice", "ada", "Alpha");
    add_member(&mut engine, "alice", "ava", "Alpha");
    add_member(&mut engine, "bob", "ben", "Beta");
    add_member(&mut engine, "bob", "bea", "Beta");
    engine.admin_set_power("Alpha", 50, at(1)).unwrap();
    engine.admin_set_power("Beta", 60, at(1)).unwrap();

    let outcome = engine.on_player_move("bob", &pos("world", 100.0, 100.0), &pos("world", 8.0, 8.0), at(2));
    assert!(!outcome.cancel);
    assert_eq!(outcome.game_mode, Some(GameMode::Survival));

    let build = engine.on_block_break("bob", &pos("world", 8.0, 8.0), at(3));
    assert!(!build.cancel);
}

#[test]
fn equal_power_is_denied_entry() {
    let mut engine = contested_engine();
    // Both factions sit at their initial 20 power.
    let outcome = engine.on_player_move("bob", &pos("world", 100.0, 100.0), &pos("world", 8.0, 8.0), at(1));
    assert!(outcome.cancel);
    assert_eq!(outcome.game_mode, Some(GameMode::Adventure));
}

#[test]
fn raid_window_overrides_power_comparison() {
    let mut engine = contested_engine();

    // Alpha raidable: power forced to zero without a freeze via the claim
    // threshold never firing here, so craft the state through a collapse
    // and a released window.
    engine.admin_set_power("Alpha", 0, at(0)).unwrap();
    engine.tick(at(700)); // release the freeze; power stays 0 => raidable

    let faction = engine.roster().faction("Alpha").unwrap();
    assert!(faction.is_raidable());

    // Beta is weaker than nothing can be, but the raid window is open.
    engine.admin_set_power("Beta", 1, at(701)).unwrap();
    let outcome = engine.on_player_move("bob", &pos("world", 100.0, 100.0), &pos("world", 8.0, 8.0), at(702));
    assert!(!outcome.cancel);
    assert_eq!(outcome.game_mode, Some(GameMode::Survival));

    let build = engine.on_block_place("bob", &pos("world", 8.0, 8.0), at(703));
    assert!(!build.cancel);
}

#[test]
fn border_colors_match_movement_rulings() {
    let mut engine = contested_engine();
    let key = ClaimKey::new(0, 0, "world");

    // Own territory: green. Rival: red. Wilderness: white.
    assert_eq!(engine.border_color("alice", &key), TerritoryColor::Green);
    assert_eq!(engine.border_color("bob", &key), TerritoryColor::Red);
    assert_eq!(
        engine.border_color("bob", &ClaimKey::new(9, 9, "world")),
        TerritoryColor::White
    );

    // Ally: aqua. The first attempt fails the 50-power requirement.
    engine
        .handle_command(&ctx("alice", None, at(1)), Command::Ally { faction: "Beta".to_string() })
        .unwrap_err();
    add_members_for_ally_power(&mut engine);
    engine
        .handle_command(&ctx("alice", None, at(2)), Command::Ally { faction: "Beta".to_string() })
        .unwrap();
    engine
        .handle_command(&ctx("bob", None, at(3)), Command::Ally { faction: "Alpha".to_string() })
        .unwrap();
    assert_eq!(engine.border_color("bob", &key), TerritoryColor::Aqua);
}

/// Raise both factions above the 50-power first-ally requirement.
fn add_members_for_ally_power(engine: &mut clanforge::engine::Engine) {
    add_member(engine, "alice", "ann", "Alpha");
    add_member(engine, "alice", "amy", "Alpha");
    add_member(engine, "bob", "ben", "Beta");
    add_member(engine, "bob", "bea", "Beta");
    engine.admin_set_power("Alpha", 55, at(1)).unwrap();
    engine.admin_set_power("Beta", 55, at(1)).unwrap();
}

#[test]
fn bypass_walks_through_raid_protection() {
    let mut engine = contested_engine();
    engine.admin_set_power("Alpha", -1, at(0)).unwrap(); // frozen

    let blocked = engine.on_player_move("bob", &pos("world", 100.0, 100.0), &pos("world", 8.0, 8.0), at(1));
    assert!(blocked.cancel);

    engine.set_bypass("bob", true).unwrap();
    let allowed = engine.on_player_move("bob", &pos("world", 100.0, 100.0), &pos("world", 8.0, 8.0), at(10));
    assert!(!allowed.cancel);
    assert_eq!(
        engine.border_color("bob", &ClaimKey::new(0, 0, "world")),
        TerritoryColor::White
    );
}

#[test]
fn factionless_player_blocked_only_by_freeze() {
    let mut engine = contested_engine();
    engine.on_player_join("wanderer", at(0));

    // Unfrozen territory lets the factionless pass.
    let outcome = engine.on_player_move("wanderer", &pos("world", 100.0, 100.0), &pos("world", 8.0, 8.0), at(1));
    assert!(!outcome.cancel);

    engine.admin_set_power("Alpha", -1, at(2)).unwrap();
    let outcome = engine.on_player_move("wanderer", &pos("world", 100.0, 100.0), &pos("world", 8.0, 8.0), at(3));
    assert!(outcome.cancel);
    assert_eq!(outcome.game_mode, Some(GameMode::Adventure));
}

#[test]
fn disbanded_territory_reverts_to_wilderness() {
    let mut engine = contested_engine();
    engine
        .handle_command(&ctx("alice", None, at(1)), Command::Disband)
        .unwrap();

    let outcome = engine.on_player_move("bob", &pos("world", 100.0, 100.0), &pos("world", 8.0, 8.0), at(2));
    assert!(!outcome.cancel);
    assert_eq!(
        engine.border_color("bob", &ClaimKey::new(0, 0, "world")),
        TerritoryColor::White
    );
}
