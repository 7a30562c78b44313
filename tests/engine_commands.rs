//! Command-surface flows end to end, including the store-backed reload
//! path that exercises the mirror.

mod common;

use clanforge::engine::{Command, CommandContext, Engine, Reply, TopMetric};
use clanforge::faction::types::Role;
use clanforge::faction::FactionError;
use clanforge::storage::FactionStoreBuilder;
use common::*;
use tempfile::TempDir;

#[test]
fn create_validates_name_and_charges_cost() {
    let mut config = free_config();
    config.costs.create = 100.0;
    let mut engine = Engine::ephemeral(config);
    engine.on_player_join("alice", at(0));

    // Bad names first.
    for name in ["ab", "Wilderness", "no spaces", "WayTooLongForAFactionName"] {
        let result = engine.handle_command(
            &ctx("alice", None, at(0)),
            Command::Create { name: name.to_string() },
        );
        assert!(matches!(result, Err(FactionError::InvalidName(_))), "{} accepted", name);
    }

    // Broke players cannot found factions.
    assert!(matches!(
        engine.handle_command(&ctx("alice", None, at(0)), Command::Create { name: "Alpha".to_string() }),
        Err(FactionError::NotEnoughMoney { .. })
    ));

    engine.admin_give_money("alice", 150.0).unwrap();
    let reply = engine
        .handle_command(&ctx("alice", None, at(0)), Command::Create { name: "Alpha".to_string() })
        .unwrap();
    assert_eq!(reply, Reply::FactionCreated { faction: "Alpha".to_string(), cost: 100.0 });
    assert_eq!(engine.roster().player("alice").unwrap().money, 50.0);

    // Name collision, case-sensitive: "alpha" is a different faction.
    engine.on_player_join("bob", at(1));
    engine.admin_give_money("bob", 150.0).unwrap();
    assert_eq!(
        engine.handle_command(&ctx("bob", None, at(1)), Command::Create { name: "Alpha".to_string() }),
        Err(FactionError::FactionExists("Alpha".to_string()))
    );
    assert!(engine
        .handle_command(&ctx("bob", None, at(1)), Command::Create { name: "alpha".to_string() })
        .is_ok());
}

#[test]
fn bank_deposit_withdraw_and_balance() {
    let mut engine = engine();
    create_faction(&mut engine, "alice", "Alpha");
    add_member(&mut engine, "alice", "bob", "Alpha");
    engine.admin_give_money("bob", 80.0).unwrap();

    // Plain members may deposit.
    let reply = engine
        .handle_command(&ctx("bob", None, at(1)), Command::Deposit { amount: 50.0 })
        .unwrap();
    assert_eq!(reply, Reply::Deposited { amount: 50.0, balance: 50.0 });
    assert_eq!(engine.roster().player("bob").unwrap().money, 30.0);

    // But not withdraw.
    assert_eq!(
        engine.handle_command(&ctx("bob", None, at(2)), Command::Withdraw { amount: 10.0 }),
        Err(FactionError::OfficerOnly)
    );

    // Overdrafts and non-positive amounts are rejected.
    assert!(matches!(
        engine.handle_command(&ctx("alice", None, at(3)), Command::Withdraw { amount: 500.0 }),
        Err(FactionError::NotEnoughMoney { .. })
    ));
    assert_eq!(
        engine.handle_command(&ctx("alice", None, at(3)), Command::Deposit { amount: 0.0 }),
        Err(FactionError::InvalidAmount)
    );

    let reply = engine
        .handle_command(&ctx("alice", None, at(4)), Command::Withdraw { amount: 20.0 })
        .unwrap();
    assert_eq!(reply, Reply::Withdrawn { amount: 20.0, balance: 30.0 });

    let reply = engine
        .handle_command(&ctx("bob", None, at(5)), Command::Balance)
        .unwrap();
    assert_eq!(reply, Reply::Balance { faction: "Alpha".to_string(), money: 30.0 });
}

#[test]
fn kick_matrix_by_role() {
    let mut engine = engine();
    create_faction(&mut engine, "alice", "Alpha");
    add_member(&mut engine, "alice", "olivia", "Alpha");
    add_member(&mut engine, "alice", "mike", "Alpha");
    add_member(&mut engine, "alice", "mona", "Alpha");
    engine
        .handle_command(&ctx("alice", None, at(0)), Command::Promote { player: "olivia".to_string() })
        .unwrap();

    // Officers kick members but not officers or the leader.
    engine
        .handle_command(&ctx("olivia", None, at(1)), Command::Kick { player: "mike".to_string() })
        .unwrap();
    assert_eq!(
        engine.handle_command(&ctx("olivia", None, at(2)), Command::Kick { player: "alice".to_string() }),
        Err(FactionError::KickRefused)
    );

    // Members kick nobody.
    assert_eq!(
        engine.handle_command(&ctx("mona", None, at(3)), Command::Kick { player: "olivia".to_string() }),
        Err(FactionError::KickRefused)
    );

    // Nobody kicks themselves; leaders kick officers.
    assert_eq!(
        engine.handle_command(&ctx("alice", None, at(4)), Command::Kick { player: "alice".to_string() }),
        Err(FactionError::SelfTarget)
    );
    engine
        .handle_command(&ctx("alice", None, at(5)), Command::Kick { player: "olivia".to_string() })
        .unwrap();
    assert!(engine.roster().player("olivia").unwrap().faction.is_none());
}

#[test]
fn leadership_rules_on_leave_and_transfer() {
    let mut engine = engine();
    create_faction(&mut engine, "alice", "Alpha");
    add_member(&mut engine, "alice", "bob", "Alpha");

    assert_eq!(
        engine.handle_command(&ctx("alice", None, at(1)), Command::Leave),
        Err(FactionError::LeaderCannotLeave)
    );

    engine
        .handle_command(&ctx("alice", None, at(2)), Command::Transfer { player: "bob".to_string() })
        .unwrap();
    let faction = engine.roster().faction("Alpha").unwrap();
    assert_eq!(faction.role_of("bob"), Some(Role::Leader));
    assert_eq!(faction.role_of("alice"), Some(Role::Member));

    // The demoted founder may leave now.
    engine.handle_command(&ctx("alice", None, at(3)), Command::Leave).unwrap();
    assert!(engine.roster().player("alice").unwrap().faction.is_none());
}

#[test]
fn home_teleport_respects_cooldown() {
    let mut engine = engine();
    create_faction(&mut engine, "alice", "Alpha");
    engine
        .handle_command(&ctx("alice", Some(pos("world", 8.0, 8.0)), at(0)), Command::Claim)
        .unwrap();
    engine
        .handle_command(&ctx("alice", Some(pos("world", 10.0, 12.0)), at(0)), Command::SetHome)
        .unwrap();

    let reply = engine.handle_command(&ctx("alice", None, at(1)), Command::Home).unwrap();
    match reply {
        Reply::TeleportHome { position } => {
            assert_eq!(position.world, "world");
            assert_eq!(position.x, 10.0);
        }
        other => panic!("unexpected reply {:?}", other),
    }

    // Within the 5s cooldown.
    assert!(matches!(
        engine.handle_command(&ctx("alice", None, at(3)), Command::Home),
        Err(FactionError::OnCooldown(_))
    ));
    assert!(engine.handle_command(&ctx("alice", None, at(7)), Command::Home).is_ok());

    // Clearing the home makes teleport report the absence.
    engine.handle_command(&ctx("alice", None, at(20)), Command::DelHome).unwrap();
    assert_eq!(
        engine.handle_command(&ctx("alice", None, at(20)), Command::Home),
        Err(FactionError::NoHome)
    );
}

#[test]
fn info_and_top_report_live_state() {
    let mut engine = engine();
    create_faction(&mut engine, "alice", "Alpha");
    create_faction(&mut engine, "bob", "Beta");
    add_member(&mut engine, "alice", "carol", "Alpha");
    engine
        .handle_command(&ctx("alice", Some(pos("world", 8.0, 8.0)), at(0)), Command::Claim)
        .unwrap();
    engine.admin_set_power("Alpha", 33, at(1)).unwrap();

    let reply = engine
        .handle_command(&ctx("bob", None, at(2)), Command::Info { faction: Some("Alpha".to_string()) })
        .unwrap();
    let summary = match reply {
        Reply::FactionInfo(summary) => summary,
        other => panic!("unexpected reply {:?}", other),
    };
    assert_eq!(summary.name, "Alpha");
    assert_eq!(summary.leader.as_deref(), Some("alice"));
    assert_eq!(summary.members, vec!["carol".to_string()]);
    assert_eq!(summary.power, 33);
    assert_eq!(summary.max_power, 40);
    assert_eq!(summary.claims, 1);
    assert!(!summary.raidable && !summary.frozen);

    let reply = engine
        .handle_command(&ctx("bob", None, at(3)), Command::Top { metric: TopMetric::Power, limit: 10 })
        .unwrap();
    match reply {
        Reply::TopFactions { entries, .. } => {
            assert_eq!(entries[0], ("Alpha".to_string(), 33));
            assert_eq!(entries[1], ("Beta".to_string(), 20));
        }
        other => panic!("unexpected reply {:?}", other),
    }
}

#[test]
fn describe_clamps_to_configured_length() {
    let mut engine = engine();
    create_faction(&mut engine, "alice", "Alpha");

    let long = "d".repeat(400);
    engine
        .handle_command(&ctx("alice", None, at(1)), Command::Describe { text: long })
        .unwrap();
    assert_eq!(engine.roster().faction("Alpha").unwrap().description.len(), 120);
}

#[test]
fn border_toggle_is_rate_limited() {
    let mut engine = engine();
    engine.on_player_join("alice", at(0));

    let reply = engine.handle_command(&ctx("alice", None, at(0)), Command::Border).unwrap();
    assert_eq!(reply, Reply::BorderToggled { enabled: true });
    assert!(matches!(
        engine.handle_command(&ctx("alice", None, at(1)), Command::Border),
        Err(FactionError::OnCooldown(_))
    ));
    let reply = engine.handle_command(&ctx("alice", None, at(4)), Command::Border).unwrap();
    assert_eq!(reply, Reply::BorderToggled { enabled: false });
}

#[test]
fn state_survives_reload_through_the_mirror() {
    let dir = TempDir::new().expect("tempdir");
    let now = at(0);

    {
        let store = FactionStoreBuilder::new(dir.path()).open().expect("store");
        let mut engine = Engine::new(free_config(), store);
        engine.load(now);

        create_faction(&mut engine, "alice", "Alpha");
        add_member(&mut engine, "alice", "bob", "Alpha");
        engine
            .handle_command(&ctx("alice", Some(pos("world", 8.0, 8.0)), now), Command::Claim)
            .unwrap();
        engine.on_player_join("carol", now);
        engine
            .handle_command(
                &CommandContext::new("alice", None, now),
                Command::Invite { player: "carol".to_string() },
            )
            .unwrap();
        engine.admin_give_money("alice", 40.0).unwrap();
        engine
            .handle_command(&ctx("alice", None, now), Command::Deposit { amount: 25.0 })
            .unwrap();
        // Engine drops here without an explicit save; per-operation
        // mirroring must be enough.
    }

    let store = FactionStoreBuilder::new(dir.path()).open().expect("reopen");
    let mut engine = Engine::new(free_config(), store);
    engine.load(at(10));

    let faction = engine.roster().faction("Alpha").expect("faction persisted");
    assert_eq!(faction.member_count(), 2);
    assert_eq!(faction.money, 25.0);
    assert_eq!(engine.claims().faction_claim_count("Alpha"), 1);
    assert_eq!(engine.roster().player("bob").unwrap().faction.as_deref(), Some("Alpha"));

    // The pending invite survived and can still be accepted.
    engine
        .handle_command(
            &ctx("carol", None, at(20)),
            Command::Accept { faction: "Alpha".to_string() },
        )
        .expect("persisted invite accepted");

    // Session flags never persist.
    assert!(!engine.roster().player("alice").unwrap().session.bypass);
}

#[test]
fn purge_removes_profile_and_membership() {
    let mut engine = engine();
    create_faction(&mut engine, "alice", "Alpha");
    add_member(&mut engine, "alice", "bob", "Alpha");

    engine.purge_player("bob", at(1)).unwrap();
    assert!(engine.roster().player("bob").is_none());
    assert!(!engine.roster().faction("Alpha").unwrap().is_member("bob"));

    assert!(matches!(
        engine.purge_player("bob", at(2)),
        Err(FactionError::PlayerNotFound(_))
    ));
}

#[test]
fn snapshot_counts_world_state() {
    let mut engine = engine();
    create_faction(&mut engine, "alice", "Alpha");
    engine
        .handle_command(&ctx("alice", Some(pos("world", 8.0, 8.0)), at(0)), Command::Claim)
        .unwrap();

    let snapshot = engine.snapshot(at(1));
    assert_eq!(snapshot.claims, 1);
    assert_eq!(snapshot.players, 1);
    assert_eq!(snapshot.factions.len(), 1);
    assert!(snapshot.factions[0].connected_territory);

    let json = serde_json::to_string(&snapshot).expect("snapshot serializes");
    assert!(json.contains("\"Alpha\""));
}
