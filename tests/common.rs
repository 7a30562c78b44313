//! Test utilities & fixtures.
//! Builds ephemeral engines with free creation/claim costs so scenarios can
//! focus on the rules under test.

use chrono::{DateTime, TimeZone, Utc};
use clanforge::config::Config;
use clanforge::engine::{Command, CommandContext, Engine};
use clanforge::faction::types::WorldPosition;

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

#[allow(dead_code)] // Not every integration suite needs spatial fixtures.
pub fn pos(world: &str, x: f64, z: f64) -> WorldPosition {
    WorldPosition::new(world, x, 64.0, z)
}

/// Default config with zero costs.
pub fn free_config() -> Config {
    let mut config = Config::default();
    config.costs.create = 0.0;
    config.costs.claim = 0.0;
    config
}

pub fn engine() -> Engine {
    Engine::ephemeral(free_config())
}

#[allow(dead_code)] // Not every integration suite drives commands; silenced to keep builds clean.
pub fn ctx(player: &str, position: Option<WorldPosition>, now: DateTime<Utc>) -> CommandContext {
    CommandContext::new(player, position, now)
}

/// Join `leader` and have them create `faction` at t=0.
#[allow(dead_code)]
pub fn create_faction(engine: &mut Engine, leader: &str, faction: &str) {
    engine.on_player_join(leader, at(0));
    engine
        .handle_command(
            &CommandContext::new(leader, None, at(0)),
            Command::Create {
                name: faction.to_string(),
            },
        )
        .expect("faction created");
}

/// Join `member` and route them into `faction` via invite + accept.
#[allow(dead_code)]
pub fn add_member(engine: &mut Engine, leader: &str, member: &str, faction: &str) {
    engine.on_player_join(member, at(0));
    engine
        .handle_command(
            &CommandContext::new(leader, None, at(0)),
            Command::Invite {
                player: member.to_string(),
            },
        )
        .expect("invite sent");
    engine
        .handle_command(
            &CommandContext::new(member, None, at(0)),
            Command::Accept {
                faction: faction.to_string(),
            },
        )
        .expect("invite accepted");
}
