//! Game-event adapters.
//!
//! The host game server forwards its raw events (join, quit, movement,
//! block edits, damage, death, chat) here. Each handler consults the shared
//! access decision table plus the roster/claim state and returns an outcome
//! the host applies: cancel the event, switch a game mode, relay a message.
//! Handlers never talk to the host directly.

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::engine::Engine;
use crate::faction::access::{decide, AccessMessage};
use crate::faction::cooldown::CooldownKind;
use crate::faction::power::{self, FreezeEvent};
use crate::faction::types::{ChatMode, ClaimKey, GameMode, TerritoryColor, WorldPosition};
use crate::logutil::escape_log;

/// Result of a first-contact or returning join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// A profile was created for a first-time player.
    pub created: bool,
    /// The player referenced a vanished faction and was auto-removed.
    pub healed: bool,
}

/// Crossing from one territory into another, for the host's title/message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerritoryChange {
    /// Previous owner, `None` for wilderness.
    pub from: Option<String>,
    /// New owner, `None` for wilderness.
    pub to: Option<String>,
    pub color: TerritoryColor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub cancel: bool,
    /// Game mode the host should apply at the destination.
    pub game_mode: Option<GameMode>,
    /// Denial message, already throttled; `None` when suppressed.
    pub message: Option<AccessMessage>,
    pub transition: Option<TerritoryChange>,
    /// A chunk was auto-claimed on entry for an opted-in claimer.
    pub auto_claimed: bool,
}

impl MoveOutcome {
    fn pass() -> Self {
        Self {
            cancel: false,
            game_mode: None,
            message: None,
            transition: None,
            auto_claimed: false,
        }
    }
}

/// Result of a block break/place or container interaction check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionOutcome {
    pub cancel: bool,
    /// Denial message, already throttled; `None` when suppressed.
    pub message: Option<AccessMessage>,
}

impl ProtectionOutcome {
    fn allow() -> Self {
        Self {
            cancel: false,
            message: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageBlock {
    /// Attacker and victim share a faction or an alliance.
    Allied,
    /// The victim stands in raid-protected territory.
    RaidProtection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DamageOutcome {
    pub cancel: bool,
    pub reason: Option<DamageBlock>,
}

/// Consequences of a PvP death.
#[derive(Debug, Clone, PartialEq)]
pub struct DeathOutcome {
    pub killer_faction: Option<String>,
    pub victim_faction: Option<String>,
    /// Set when the victim's faction collapsed below its claim threshold.
    pub freeze: Option<FreezeEvent>,
}

/// Where a chat line should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRoute {
    /// Let the host's normal chat pipeline handle it.
    Global,
    /// Deliver only to these faction members.
    Faction { faction: String, recipients: Vec<String> },
    /// Deliver to the faction and every allied faction's members.
    Alliance { faction: String, recipients: Vec<String> },
}

impl Engine {
    /// Player connected. Creates the profile on first contact and validates
    /// the faction reference of returning players.
    pub fn on_player_join(&mut self, player: &str, now: DateTime<Utc>) -> JoinOutcome {
        let created = self.roster.player(player).is_none();
        let config = self.config.clone();
        self.roster.ensure_player(player, &config, now);

        let healed = self.roster.heal_membership(player);
        if let Some(profile) = self.roster.player_mut(player) {
            profile.last_seen = now;
        }
        self.mirror_player(player);

        if created {
            info!("first join for {}", escape_log(player));
        }
        JoinOutcome { created, healed }
    }

    /// Player disconnected: stamp last-seen, drop session-only state.
    pub fn on_player_quit(&mut self, player: &str, now: DateTime<Utc>) {
        if let Some(profile) = self.roster.player_mut(player) {
            profile.last_seen = now;
            profile.session = Default::default();
        }
        self.cooldowns.clear_player(player);
        self.mirror_player(player);
    }

    /// Movement / teleport check between two positions.
    pub fn on_player_move(
        &mut self,
        player: &str,
        from: &WorldPosition,
        to: &WorldPosition,
        now: DateTime<Utc>,
    ) -> MoveOutcome {
        if !self.config.faction.applies_in_world(&to.world) {
            return MoveOutcome::pass();
        }

        let from_key = ClaimKey::from_position(from);
        let to_key = ClaimKey::from_position(to);
        if from_key == to_key {
            return MoveOutcome::pass();
        }

        let decision = decide(self.actor_for(player), self.territory_at(&to_key));

        let cancel = !decision.allow_movement;
        let message = if cancel {
            self.throttled_message(player, decision.message, now)
        } else {
            None
        };

        let from_owner = self.claims.claim_at(&from_key).map(|c| c.faction.clone());
        let to_owner = self.claims.claim_at(&to_key).map(|c| c.faction.clone());
        let transition = if from_owner != to_owner {
            Some(TerritoryChange {
                from: from_owner,
                to: to_owner.clone(),
                color: decision.color,
            })
        } else {
            None
        };

        let auto_claimed = if !cancel && to_owner.is_none() {
            self.try_auto_claim(player, to, now)
        } else {
            false
        };

        MoveOutcome {
            cancel,
            game_mode: Some(decision.game_mode),
            message,
            transition,
            auto_claimed,
        }
    }

    /// Block break protection.
    pub fn on_block_break(
        &mut self,
        player: &str,
        position: &WorldPosition,
        now: DateTime<Utc>,
    ) -> ProtectionOutcome {
        self.build_check(player, position, now)
    }

    /// Block place protection.
    pub fn on_block_place(
        &mut self,
        player: &str,
        position: &WorldPosition,
        now: DateTime<Utc>,
    ) -> ProtectionOutcome {
        self.build_check(player, position, now)
    }

    /// Container/door/tool interaction protection. Same ruling as block
    /// edits; the host decides which interactions are worth checking.
    pub fn on_player_interact(
        &mut self,
        player: &str,
        position: &WorldPosition,
        now: DateTime<Utc>,
    ) -> ProtectionOutcome {
        self.build_check(player, position, now)
    }

    fn build_check(
        &mut self,
        player: &str,
        position: &WorldPosition,
        now: DateTime<Utc>,
    ) -> ProtectionOutcome {
        if !self.config.faction.applies_in_world(&position.world) {
            return ProtectionOutcome::allow();
        }

        let key = ClaimKey::from_position(position);
        let decision = decide(self.actor_for(player), self.territory_at(&key));
        if decision.allow_build {
            return ProtectionOutcome::allow();
        }

        ProtectionOutcome {
            cancel: true,
            message: self.throttled_message(player, decision.message, now),
        }
    }

    /// PvP damage gate. Ally fire is always cancelled; otherwise the
    /// territory the victim stands in decides.
    pub fn on_entity_damage(
        &mut self,
        attacker: &str,
        victim: &str,
        victim_position: Option<&WorldPosition>,
        _now: DateTime<Utc>,
    ) -> DamageOutcome {
        if let Some(position) = victim_position {
            if !self.config.faction.applies_in_world(&position.world) {
                return DamageOutcome {
                    cancel: false,
                    reason: None,
                };
            }
        }

        if self.roster.are_players_allied(attacker, victim) {
            return DamageOutcome {
                cancel: true,
                reason: Some(DamageBlock::Allied),
            };
        }

        if let Some(position) = victim_position {
            let key = ClaimKey::from_position(position);
            let decision = decide(self.actor_for(attacker), self.territory_at(&key));
            if !decision.allow_pvp {
                return DamageOutcome {
                    cancel: true,
                    reason: Some(DamageBlock::RaidProtection),
                };
            }
        }

        DamageOutcome {
            cancel: false,
            reason: None,
        }
    }

    /// PvP death: move personal power, bump stats, and re-check the
    /// victim faction's claim threshold.
    pub fn on_player_death(
        &mut self,
        victim: &str,
        killer: Option<&str>,
        now: DateTime<Utc>,
    ) -> DeathOutcome {
        let config = self.config.clone();
        let power_config = config.power.clone();

        self.roster.ensure_player(victim, &config, now);
        if let Some(profile) = self.roster.player_mut(victim) {
            power::record_death(profile, &power_config);
        }
        self.mirror_player(victim);

        let victim_faction = self
            .roster
            .player(victim)
            .and_then(|p| p.faction.clone());
        if let Some(name) = &victim_faction {
            if let Some(faction) = self.roster.faction_mut(name) {
                faction.deaths += 1;
            }
        }

        let mut killer_faction = None;
        if let Some(killer_name) = killer {
            self.roster.ensure_player(killer_name, &config, now);
            if let Some(profile) = self.roster.player_mut(killer_name) {
                power::record_kill(profile, &power_config);
            }
            self.mirror_player(killer_name);

            killer_faction = self
                .roster
                .player(killer_name)
                .and_then(|p| p.faction.clone());
            if let Some(name) = &killer_faction {
                if let Some(faction) = self.roster.faction_mut(name) {
                    faction.kills += 1;
                }
                self.mirror_faction(name);
            }
        }

        // The defenders just got weaker; see if their claims outgrew them.
        let mut freeze = None;
        if let Some(name) = &victim_faction {
            let member_power = self.roster.member_power_sum(name);
            let claim_count = self.claims.faction_claim_count(name);
            if let Some(faction) = self.roster.faction_mut(name) {
                freeze = power::check_freeze_threshold(
                    faction,
                    member_power,
                    claim_count,
                    &power_config,
                    now,
                );
            }
            self.mirror_faction(name);
        }

        if let Some(event) = &freeze {
            debug!("death of {} froze faction {}", victim, event.faction);
        }

        DeathOutcome {
            killer_faction,
            victim_faction,
            freeze,
        }
    }

    /// Route a chat line according to the speaker's chat mode. A mode that
    /// is no longer valid falls back to global and resets the profile.
    pub fn on_player_chat(&mut self, player: &str) -> ChatRoute {
        let Some(profile) = self.roster.player(player) else {
            return ChatRoute::Global;
        };
        let mode = profile.chat_mode;
        if mode == ChatMode::Global {
            return ChatRoute::Global;
        }

        let Some(faction) = self.roster.player_faction(player) else {
            if let Some(profile) = self.roster.player_mut(player) {
                profile.chat_mode = ChatMode::Global;
            }
            return ChatRoute::Global;
        };

        let faction_name = faction.name.clone();
        match mode {
            ChatMode::Faction => ChatRoute::Faction {
                recipients: faction.all_members(),
                faction: faction_name,
            },
            ChatMode::Alliance => {
                let mut recipients = faction.all_members();
                for ally_name in faction.allies.clone() {
                    if let Some(ally) = self.roster.faction(&ally_name) {
                        recipients.extend(ally.all_members());
                    }
                }
                ChatRoute::Alliance {
                    faction: faction_name,
                    recipients,
                }
            }
            ChatMode::Global => ChatRoute::Global,
        }
    }

    /// Protection messages repeat on every swing; only let one through per
    /// throttle window.
    fn throttled_message(
        &mut self,
        player: &str,
        message: Option<AccessMessage>,
        now: DateTime<Utc>,
    ) -> Option<AccessMessage> {
        let message = message?;
        if self
            .cooldowns
            .active(player, &CooldownKind::ProtectionMessage, now)
        {
            return None;
        }
        self.cooldowns.start(
            player,
            CooldownKind::ProtectionMessage,
            self.config.cooldowns.protection_message_secs,
            now,
        );
        Some(message)
    }

    /// Claim-on-entry for opted-in leaders and officers. Failures are
    /// silent: auto-claim piggybacks on movement and must never spam.
    fn try_auto_claim(&mut self, player: &str, position: &WorldPosition, now: DateTime<Utc>) -> bool {
        let wants_auto_claim = self
            .roster
            .player(player)
            .map(|p| p.session.auto_claim)
            .unwrap_or(false);
        if !wants_auto_claim {
            return false;
        }

        let ctx = super::CommandContext::new(player, Some(position.clone()), now);
        self.handle_command(&ctx, super::Command::Claim).is_ok()
    }
}
