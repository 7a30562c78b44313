//! Power economy: faction power balances, saturation, and the freeze/raid
//! state machine.
//!
//! Faction power is the canonical gate for claiming and raiding. It is an
//! integer clamped to `[0, member_count * power_per_member]`; the ceiling is
//! derived live and never stored. Personal player power is a separate
//! contribution stat moved by kills and deaths; its faction-wide sum drives
//! the freeze threshold check.
//!
//! Raid state machine: Stable -> (power hits 0) -> Raidable -> (freeze
//! trigger) -> Frozen -> (freeze window elapses) -> Stable. While frozen, a
//! faction accepts no power mutation; the transition into freeze itself
//! forces power to 0.

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::config::PowerConfig;
use crate::faction::types::{Faction, FactionPlayer};

/// Emitted when a faction enters raid protection so the caller can notify
/// online members and mirror the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreezeEvent {
    pub faction: String,
    pub frozen_until: DateTime<Utc>,
}

/// Live power ceiling for a faction.
pub fn max_power(faction: &Faction, config: &PowerConfig) -> i64 {
    faction.member_count() as i64 * config.power_per_member
}

/// Set a faction's power, saturating at `[0, max_power]`.
///
/// No-op while the faction is frozen. A value at or below zero triggers the
/// freeze transition; triggering while already frozen never resets the
/// protection window.
pub fn set_power(
    faction: &mut Faction,
    value: i64,
    config: &PowerConfig,
    now: DateTime<Utc>,
) -> Option<FreezeEvent> {
    if faction.freeze {
        return None;
    }

    let ceiling = max_power(faction, config);
    if value <= 0 {
        return trigger_freeze(faction, config, now);
    }

    faction.power = value.min(ceiling);
    None
}

pub fn add_power(
    faction: &mut Faction,
    amount: i64,
    config: &PowerConfig,
    now: DateTime<Utc>,
) -> Option<FreezeEvent> {
    set_power(faction, faction.power.saturating_add(amount), config, now)
}

pub fn remove_power(
    faction: &mut Faction,
    amount: i64,
    config: &PowerConfig,
    now: DateTime<Utc>,
) -> Option<FreezeEvent> {
    set_power(faction, faction.power.saturating_sub(amount), config, now)
}

/// Force a faction into raid protection. Power drops to 0 either way; the
/// freeze window is only armed when the faction is not already frozen.
pub fn trigger_freeze(
    faction: &mut Faction,
    config: &PowerConfig,
    now: DateTime<Utc>,
) -> Option<FreezeEvent> {
    faction.power = 0;

    if faction.freeze {
        return None;
    }

    let until = now + Duration::seconds(config.freeze_duration_secs);
    faction.freeze = true;
    faction.freeze_until = Some(until);
    faction.add_log(now, "Faction entered raid protection");
    debug!(
        "faction {} frozen until {} (power collapsed)",
        faction.name, until
    );

    Some(FreezeEvent {
        faction: faction.name.clone(),
        frozen_until: until,
    })
}

/// Release the faction from raid protection if its window has elapsed.
/// Returns true when the faction was unfrozen by this call.
pub fn release_freeze_if_elapsed(faction: &mut Faction, now: DateTime<Utc>) -> bool {
    let elapsed = match faction.freeze_until {
        Some(until) => faction.freeze && until <= now,
        None => faction.freeze,
    };
    if !elapsed {
        return false;
    }

    faction.freeze = false;
    faction.freeze_until = None;
    faction.add_log(now, "Raid protection ended");
    true
}

/// Freeze the faction when its members' summed contribution power can no
/// longer hold its claims. This is what turns "too many claims, not enough
/// defenders" into raidability.
pub fn check_freeze_threshold(
    faction: &mut Faction,
    member_power_sum: f64,
    claim_count: usize,
    config: &PowerConfig,
    now: DateTime<Utc>,
) -> Option<FreezeEvent> {
    if faction.freeze {
        return None;
    }
    let required = claim_count as f64 * config.power_per_claim;
    if member_power_sum < required {
        trigger_freeze(faction, config, now)
    } else {
        None
    }
}

/// Apply the kill side of a PvP death: personal power and stat for the
/// killer.
pub fn record_kill(killer: &mut FactionPlayer, config: &PowerConfig) {
    killer.kills += 1;
    killer.add_power(config.power_per_kill);
}

/// Apply the death side of a PvP death: personal power and stat for the
/// victim.
pub fn record_death(victim: &mut FactionPlayer, config: &PowerConfig) {
    victim.deaths += 1;
    victim.remove_power(config.power_per_death);
}
