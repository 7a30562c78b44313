//! Engine wiring and scheduled maintenance.
//!
//! [`Engine`] owns the roster, claim index, invite book, cooldown ledger and
//! the mirror store, passed in explicitly at construction — there is no
//! ambient global state. All mutation happens on the caller's thread; the
//! host drives [`Engine::tick`] between game ticks to run the periodic
//! sweeps (freeze expiry, invite cleanup, cooldown cleanup, full resync).
//!
//! Persistence is optimistic: in-memory state commits first, mirror writes
//! are best-effort and logged on failure, and the periodic resync repairs
//! any lost delta.

mod commands;
mod events;

pub use commands::{Command, CommandContext, FactionSummary, Reply, TopMetric};
pub use events::{
    ChatRoute, DamageBlock, DamageOutcome, DeathOutcome, JoinOutcome, MoveOutcome,
    ProtectionOutcome, TerritoryChange,
};

use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::config::Config;
use crate::faction::access::{Actor, Territory};
use crate::faction::claims::ClaimIndex;
use crate::faction::cooldown::CooldownLedger;
use crate::faction::invites::InviteBook;
use crate::faction::power;
use crate::faction::roster::Roster;
use crate::faction::types::{ClaimKey, FactionInvite};
use crate::storage::FactionStore;

/// Sweep cadences, in seconds. The host calls `tick` as often as it likes;
/// each sweep only runs once its interval has elapsed.
const FREEZE_SWEEP_SECS: i64 = 60;
const INVITE_SWEEP_SECS: i64 = 300;
const COOLDOWN_SWEEP_SECS: i64 = 60;
const FULL_SAVE_SECS: i64 = 600;

/// Something the host should relay to players after a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotice {
    /// A faction's raid-protection window opened.
    FreezeStarted { faction: String, until: DateTime<Utc> },
    /// A faction's raid-protection window elapsed.
    FreezeEnded { faction: String },
    /// An invite lapsed before being accepted.
    InviteExpired { invite: FactionInvite },
}

#[derive(Debug, Default)]
struct SweepClock {
    freeze: Option<DateTime<Utc>>,
    invites: Option<DateTime<Utc>>,
    cooldowns: Option<DateTime<Utc>>,
    full_save: Option<DateTime<Utc>>,
}

impl SweepClock {
    fn due(slot: &mut Option<DateTime<Utc>>, interval_secs: i64, now: DateTime<Utc>) -> bool {
        let due = match slot {
            Some(last) => now - *last >= Duration::seconds(interval_secs),
            None => true,
        };
        if due {
            *slot = Some(now);
        }
        due
    }
}

pub struct Engine {
    pub(crate) config: Config,
    pub(crate) roster: Roster,
    pub(crate) claims: ClaimIndex,
    pub(crate) invites: InviteBook,
    pub(crate) cooldowns: CooldownLedger,
    store: Option<FactionStore>,
    sweeps: SweepClock,
}

impl Engine {
    /// Build an engine around an existing mirror store.
    pub fn new(config: Config, store: FactionStore) -> Self {
        Self {
            config,
            roster: Roster::new(),
            claims: ClaimIndex::new(),
            invites: InviteBook::new(),
            cooldowns: CooldownLedger::new(),
            store: Some(store),
            sweeps: SweepClock::default(),
        }
    }

    /// Build an engine with no persistence, for tests and dry runs.
    pub fn ephemeral(config: Config) -> Self {
        Self {
            config,
            roster: Roster::new(),
            claims: ClaimIndex::new(),
            invites: InviteBook::new(),
            cooldowns: CooldownLedger::new(),
            store: None,
            sweeps: SweepClock::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn claims(&self) -> &ClaimIndex {
        &self.claims
    }

    /// Populate in-memory state from the mirror. Dangling references are
    /// healed on the way in: players auto-leave vanished factions, claims
    /// and invites of vanished factions are dropped.
    pub fn load(&mut self, now: DateTime<Utc>) {
        let Some(store) = &self.store else {
            return;
        };

        let factions = store.load_factions().unwrap_or_else(|e| {
            warn!("failed to load factions: {}", e);
            Vec::new()
        });
        let players = store.load_players().unwrap_or_else(|e| {
            warn!("failed to load players: {}", e);
            Vec::new()
        });
        let claims = store.load_claims().unwrap_or_else(|e| {
            warn!("failed to load claims: {}", e);
            Vec::new()
        });
        let invites = store.load_invites().unwrap_or_else(|e| {
            warn!("failed to load invites: {}", e);
            Vec::new()
        });

        let healed = self.roster.load(factions, players);
        if healed > 0 {
            info!("healed {} dangling faction memberships", healed);
        }

        let live_claims: Vec<_> = claims
            .into_iter()
            .filter(|c| self.roster.faction_exists(&c.faction))
            .collect();
        self.claims.load(live_claims);

        let live_invites: Vec<_> = invites
            .into_iter()
            .filter(|i| self.roster.faction_exists(&i.faction))
            .collect();
        self.invites.load(live_invites, now);

        info!(
            "loaded {} factions, {} players, {} claims, {} invites",
            self.roster.faction_count(),
            self.roster.player_count(),
            self.claims.len(),
            self.invites.len()
        );
    }

    /// Run whichever periodic sweeps are due. Safe to call every second;
    /// re-entrant into the same single-threaded state only between ticks.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<EngineNotice> {
        let mut notices = Vec::new();

        if SweepClock::due(&mut self.sweeps.freeze, FREEZE_SWEEP_SECS, now) {
            for faction in self.roster.factions_mut() {
                if power::release_freeze_if_elapsed(faction, now) {
                    notices.push(EngineNotice::FreezeEnded {
                        faction: faction.name.clone(),
                    });
                }
            }

            // Deaths trigger the threshold check immediately; this sweep
            // catches drifts from member churn and admin edits.
            let defenses: Vec<(String, f64, usize)> = self
                .roster
                .factions()
                .filter(|f| !f.freeze)
                .map(|f| {
                    (
                        f.name.clone(),
                        self.roster.member_power_sum(&f.name),
                        self.claims.faction_claim_count(&f.name),
                    )
                })
                .collect();
            let power_config = self.config.power.clone();
            for (name, member_power, claim_count) in defenses {
                if let Some(faction) = self.roster.faction_mut(&name) {
                    if let Some(event) = power::check_freeze_threshold(
                        faction,
                        member_power,
                        claim_count,
                        &power_config,
                        now,
                    ) {
                        notices.push(EngineNotice::FreezeStarted {
                            faction: event.faction,
                            until: event.frozen_until,
                        });
                    }
                }
            }

            for notice in &notices {
                match notice {
                    EngineNotice::FreezeEnded { faction }
                    | EngineNotice::FreezeStarted { faction, .. } => {
                        self.mirror_faction(faction);
                    }
                    EngineNotice::InviteExpired { .. } => {}
                }
            }
        }

        if SweepClock::due(&mut self.sweeps.invites, INVITE_SWEEP_SECS, now) {
            for invite in self.invites.sweep_expired(now) {
                self.mirror_invite_removed(&invite.player, &invite.faction);
                notices.push(EngineNotice::InviteExpired { invite });
            }
        }

        if SweepClock::due(&mut self.sweeps.cooldowns, COOLDOWN_SWEEP_SECS, now) {
            self.cooldowns.sweep(now);
        }

        if SweepClock::due(&mut self.sweeps.full_save, FULL_SAVE_SECS, now) {
            self.save_all();
        }

        notices
    }

    /// Full resync of the mirror from authoritative memory.
    pub fn save_all(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.resync(
            self.roster.factions(),
            self.roster.players(),
            self.claims.iter(),
            self.invites.iter(),
        ) {
            warn!("full save failed: {}", e);
        }
    }

    // -- mirror helpers (best-effort, never roll back memory) --------------

    pub(crate) fn mirror_faction(&self, name: &str) {
        let Some(store) = &self.store else { return };
        match self.roster.faction(name) {
            Some(faction) => {
                if let Err(e) = store.put_faction(faction) {
                    warn!("mirror write for faction {} failed: {}", name, e);
                }
            }
            None => {
                if let Err(e) = store.delete_faction(name) {
                    warn!("mirror delete for faction {} failed: {}", name, e);
                }
            }
        }
    }

    pub(crate) fn mirror_player(&self, name: &str) {
        let Some(store) = &self.store else { return };
        if let Some(player) = self.roster.player(name) {
            if let Err(e) = store.put_player(player) {
                warn!("mirror write for player {} failed: {}", name, e);
            }
        }
    }

    pub(crate) fn mirror_claim(&self, key: &ClaimKey) {
        let Some(store) = &self.store else { return };
        match self.claims.claim_at(key) {
            Some(claim) => {
                if let Err(e) = store.put_claim(claim) {
                    warn!("mirror write for claim {} failed: {}", key.storage_key(), e);
                }
            }
            None => {
                if let Err(e) = store.delete_claim(&key.storage_key()) {
                    warn!("mirror delete for claim {} failed: {}", key.storage_key(), e);
                }
            }
        }
    }

    pub(crate) fn mirror_invite(&self, invite: &FactionInvite) {
        let Some(store) = &self.store else { return };
        if let Err(e) = store.put_invite(invite) {
            warn!(
                "mirror write for invite {}:{} failed: {}",
                invite.player, invite.faction, e
            );
        }
    }

    pub(crate) fn mirror_invite_removed(&self, player: &str, faction: &str) {
        let Some(store) = &self.store else { return };
        if let Err(e) = store.delete_invite(player, faction) {
            warn!(
                "mirror delete for invite {}:{} failed: {}",
                player, faction, e
            );
        }
    }

    // -- shared decision plumbing ------------------------------------------

    /// Resolve the territory at a chunk: wilderness, a live claim, or a
    /// claim whose owner no longer exists.
    pub(crate) fn territory_at(&self, key: &ClaimKey) -> Territory<'_> {
        match self.claims.claim_at(key) {
            None => Territory::Wilderness,
            Some(claim) => match self.roster.faction(&claim.faction) {
                Some(owner) => Territory::Owned(owner),
                None => Territory::Dangling,
            },
        }
    }

    pub(crate) fn actor_for(&self, player: &str) -> Actor<'_> {
        let profile = self.roster.player(player);
        Actor {
            faction: profile
                .and_then(|p| p.faction.as_deref())
                .and_then(|name| self.roster.faction(name)),
            bypass: profile.map(|p| p.session.bypass).unwrap_or(false),
            creative: profile.map(|p| p.session.creative).unwrap_or(false),
        }
    }

    /// Territory tint for the border renderer; same table as everything
    /// else.
    pub fn border_color(&self, player: &str, key: &ClaimKey) -> crate::faction::types::TerritoryColor {
        crate::faction::access::decide(self.actor_for(player), self.territory_at(key)).color
    }

    // -- admin surface -----------------------------------------------------

    /// Force a faction's power. Same saturation and freeze rules as any
    /// other mutation; returns the freeze event on collapse.
    pub fn admin_set_power(
        &mut self,
        faction: &str,
        value: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<power::FreezeEvent>, crate::faction::FactionError> {
        let config = self.config.power.clone();
        let target = self
            .roster
            .faction_mut(faction)
            .ok_or_else(|| crate::faction::FactionError::FactionNotFound(faction.to_string()))?;
        let event = power::set_power(target, value, &config, now);
        self.mirror_faction(faction);
        Ok(event)
    }

    /// Toggle the protection bypass for a player session. Doubles as the
    /// unlimited members/claims/allies override.
    pub fn set_bypass(&mut self, player: &str, enabled: bool) -> Result<(), crate::faction::FactionError> {
        let profile = self
            .roster
            .player_mut(player)
            .ok_or_else(|| crate::faction::FactionError::PlayerNotFound(player.to_string()))?;
        profile.session.bypass = enabled;
        Ok(())
    }

    /// Toggle claim-on-entry for a player session.
    pub fn set_auto_claim(&mut self, player: &str, enabled: bool) -> Result<(), crate::faction::FactionError> {
        let profile = self
            .roster
            .player_mut(player)
            .ok_or_else(|| crate::faction::FactionError::PlayerNotFound(player.to_string()))?;
        profile.session.auto_claim = enabled;
        Ok(())
    }

    /// Track the host-side creative/spectator game mode so the decision
    /// table can skip protection for those players.
    pub fn set_creative(&mut self, player: &str, enabled: bool) -> Result<(), crate::faction::FactionError> {
        let profile = self
            .roster
            .player_mut(player)
            .ok_or_else(|| crate::faction::FactionError::PlayerNotFound(player.to_string()))?;
        profile.session.creative = enabled;
        Ok(())
    }

    /// Account removal: detach the player from their faction, drop their
    /// cooldowns and profile, and erase the mirror row.
    pub fn purge_player(&mut self, player: &str, now: DateTime<Utc>) -> Result<(), crate::faction::FactionError> {
        let faction = self
            .roster
            .player(player)
            .ok_or_else(|| crate::faction::FactionError::PlayerNotFound(player.to_string()))?
            .faction
            .clone();

        if let Some(faction_name) = faction {
            if self.roster.remove_member(&faction_name, player, now).is_ok() {
                self.mirror_faction(&faction_name);
            }
        }
        self.cooldowns.clear_player(player);
        self.roster.remove_player(player);

        if let Some(store) = &self.store {
            if let Err(e) = store.delete_player(player) {
                warn!("mirror delete for player {} failed: {}", player, e);
            }
        }
        Ok(())
    }

    /// Credit a player's wallet. Stands in for the host's economy provider
    /// when running headless.
    pub fn admin_give_money(&mut self, player: &str, amount: f64) -> Result<f64, crate::faction::FactionError> {
        let profile = self
            .roster
            .player_mut(player)
            .ok_or_else(|| crate::faction::FactionError::PlayerNotFound(player.to_string()))?;
        profile.money += amount;
        let balance = profile.money;
        self.mirror_player(player);
        Ok(balance)
    }

    /// Machine-readable snapshot for the `status` CLI and host dashboards.
    pub fn snapshot(&self, now: DateTime<Utc>) -> EngineSnapshot {
        let mut factions: Vec<FactionStatus> = self
            .roster
            .factions()
            .map(|f| FactionStatus {
                name: f.name.clone(),
                members: f.member_count(),
                power: f.power,
                max_power: power::max_power(f, &self.config.power),
                claims: self.claims.faction_claim_count(&f.name),
                connected_territory: self.claims.has_connected_claims(&f.name),
                raidable: f.is_raidable(),
                frozen: f.freeze,
                freeze_remaining_secs: f.remaining_freeze(now).num_seconds(),
            })
            .collect();
        factions.sort_by(|a, b| b.power.cmp(&a.power).then_with(|| a.name.cmp(&b.name)));

        EngineSnapshot {
            factions,
            players: self.roster.player_count(),
            claims: self.claims.len(),
            pending_invites: self.invites.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub factions: Vec<FactionStatus>,
    pub players: usize,
    pub claims: usize,
    pub pending_invites: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FactionStatus {
    pub name: String,
    pub members: usize,
    pub power: i64,
    pub max_power: i64,
    pub claims: usize,
    pub connected_territory: bool,
    pub raidable: bool,
    pub frozen: bool,
    pub freeze_remaining_secs: i64,
}
