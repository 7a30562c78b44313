//! Access control decision function.
//!
//! A single pure decision table answering "is this territory accessible to
//! this actor right now". Movement validation, block protection, interaction
//! protection and border coloring all consult the same function, so their
//! answers can never drift apart.
//!
//! The table is evaluated top to bottom, first match wins:
//!
//! 1. bypass -> allow everything
//! 2. creative/spectator -> allow everything
//! 3. wilderness -> allow everything
//! 4. dangling claim (owner no longer resolves) -> treated as wilderness
//! 5. factionless actor -> blocked only by frozen territory
//! 6. own territory -> allow everything
//! 7. allied territory -> allow everything
//! 8. territory owner raidable (power <= 0, not frozen) -> raid window open
//! 9. territory owner frozen -> raid protection, deny
//! 10. attacker power > defender power -> siege allowed, else denied

use crate::faction::types::{Faction, GameMode, TerritoryColor};

/// Who is asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct Actor<'a> {
    pub faction: Option<&'a Faction>,
    /// Explicit bypass: permission grant or toggled bypass mode.
    pub bypass: bool,
    /// Creative or spectator game mode; protection checks are skipped
    /// upstream for these, the table just stays consistent with that.
    pub creative: bool,
}

/// What they are standing in. `Dangling` covers a claim whose owning
/// faction no longer resolves; it behaves as wilderness until healed.
#[derive(Debug, Clone, Copy)]
pub enum Territory<'a> {
    Wilderness,
    Dangling,
    Owned(&'a Faction),
}

/// Message the host should surface alongside a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMessage {
    RaidProtection,
    InsufficientPower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allow_movement: bool,
    pub allow_build: bool,
    pub allow_pvp: bool,
    pub game_mode: GameMode,
    pub color: TerritoryColor,
    pub message: Option<AccessMessage>,
}

impl AccessDecision {
    fn allow_all(color: TerritoryColor) -> Self {
        Self {
            allow_movement: true,
            allow_build: true,
            allow_pvp: true,
            game_mode: GameMode::Survival,
            color,
            message: None,
        }
    }

    fn deny(color: TerritoryColor, message: Option<AccessMessage>) -> Self {
        Self {
            allow_movement: false,
            allow_build: false,
            allow_pvp: false,
            game_mode: GameMode::Adventure,
            color,
            message,
        }
    }
}

/// Decide territory access for an actor. Pure: same inputs, same answer.
pub fn decide(actor: Actor<'_>, territory: Territory<'_>) -> AccessDecision {
    // Rules 1-2: bypass and creative/spectator actors see no restrictions.
    if actor.bypass || actor.creative {
        return AccessDecision::allow_all(TerritoryColor::White);
    }

    // Rules 3-4: wilderness, or a claim whose owner vanished.
    let owner = match territory {
        Territory::Wilderness | Territory::Dangling => {
            return AccessDecision::allow_all(TerritoryColor::White);
        }
        Territory::Owned(owner) => owner,
    };

    // Rule 5: actors without a faction are only stopped by raid protection.
    let Some(actor_faction) = actor.faction else {
        if owner.freeze {
            return AccessDecision::deny(TerritoryColor::Red, Some(AccessMessage::RaidProtection));
        }
        return AccessDecision::allow_all(TerritoryColor::Red);
    };

    // Rule 6: own territory.
    if actor_faction.name == owner.name {
        return AccessDecision::allow_all(TerritoryColor::Green);
    }

    // Rule 7: allied territory.
    if actor_faction.is_ally(&owner.name) || owner.is_ally(&actor_faction.name) {
        return AccessDecision::allow_all(TerritoryColor::Aqua);
    }

    // Rule 8: the raid window. Checked strictly before the power
    // comparison so a collapsed defender is open to any attacker.
    if owner.is_raidable() {
        return AccessDecision::allow_all(TerritoryColor::Red);
    }

    // Rule 9: raid protection.
    if owner.freeze {
        return AccessDecision::deny(TerritoryColor::Red, Some(AccessMessage::RaidProtection));
    }

    // Rule 10: contested entry, settled by faction power.
    if actor_faction.power > owner.power {
        AccessDecision::allow_all(TerritoryColor::Red)
    } else {
        AccessDecision::deny(TerritoryColor::Red, Some(AccessMessage::InsufficientPower))
    }
}
