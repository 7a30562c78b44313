//! Identity and membership registry.
//!
//! Owns every known faction and player profile, keyed by name. References
//! between entities are names resolved through this registry on access, so
//! a failed resolve always means "entity no longer exists" and is healed by
//! auto-leave rather than surfaced as a fault.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::config::Config;
use crate::faction::errors::FactionError;
use crate::faction::types::{Faction, FactionPlayer, Role};
use crate::logutil::escape_log;

/// Result of an ally request: either a pending proposal was recorded, or a
/// matching counter-proposal was found and the alliance formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllyOutcome {
    RequestSent,
    Accepted,
}

#[derive(Debug, Default)]
pub struct Roster {
    factions: HashMap<String, Faction>,
    players: HashMap<String, FactionPlayer>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    // -- lookups -----------------------------------------------------------

    pub fn faction(&self, name: &str) -> Option<&Faction> {
        self.factions.get(name)
    }

    pub fn faction_mut(&mut self, name: &str) -> Option<&mut Faction> {
        self.factions.get_mut(name)
    }

    pub fn faction_exists(&self, name: &str) -> bool {
        self.factions.contains_key(name)
    }

    pub fn factions(&self) -> impl Iterator<Item = &Faction> {
        self.factions.values()
    }

    pub fn factions_mut(&mut self) -> impl Iterator<Item = &mut Faction> {
        self.factions.values_mut()
    }

    pub fn player(&self, name: &str) -> Option<&FactionPlayer> {
        self.players.get(name)
    }

    pub fn player_mut(&mut self, name: &str) -> Option<&mut FactionPlayer> {
        self.players.get_mut(name)
    }

    pub fn players(&self) -> impl Iterator<Item = &FactionPlayer> {
        self.players.values()
    }

    /// Resolve a player's faction through their name reference. Returns
    /// `None` for factionless players and for dangling references alike.
    pub fn player_faction(&self, player: &str) -> Option<&Faction> {
        let faction_name = self.players.get(player)?.faction.as_deref()?;
        self.factions.get(faction_name)
    }

    pub fn faction_count(&self) -> usize {
        self.factions.len()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    // -- player lifecycle --------------------------------------------------

    /// Fetch a player profile, creating one on first contact.
    pub fn ensure_player(&mut self, name: &str, config: &Config, now: DateTime<Utc>) -> &mut FactionPlayer {
        self.players.entry(name.to_string()).or_insert_with(|| {
            info!("created faction profile for {}", escape_log(name));
            FactionPlayer::new(
                name,
                now,
                config.power.player_initial_power,
                config.power.player_max_power,
            )
        })
    }

    /// Drop a player profile entirely (account removal). Membership should
    /// be detached first; this only forgets the record.
    pub fn remove_player(&mut self, name: &str) -> bool {
        self.players.remove(name).is_some()
    }

    /// Validate a player's faction reference against the live registry.
    /// A dangling or one-sided reference triggers auto-leave. Returns true
    /// when healing happened.
    pub fn heal_membership(&mut self, player_name: &str) -> bool {
        let Some(player) = self.players.get(player_name) else {
            return false;
        };
        let Some(faction_name) = player.faction.clone() else {
            return false;
        };

        let consistent = self
            .factions
            .get(&faction_name)
            .map(|f| f.is_member(player_name))
            .unwrap_or(false);
        if consistent {
            return false;
        }

        warn!(
            "player {} referenced missing faction {}; auto-leaving",
            escape_log(player_name),
            escape_log(&faction_name)
        );
        if let Some(player) = self.players.get_mut(player_name) {
            player.leave_faction();
        }
        true
    }

    // -- faction lifecycle -------------------------------------------------

    /// Create a faction with the given player as leader. Name validation
    /// and cost charging happen at the command layer before this call.
    pub fn create_faction(
        &mut self,
        name: &str,
        leader: &str,
        config: &Config,
        now: DateTime<Utc>,
    ) -> Result<(), FactionError> {
        if self.factions.contains_key(name) {
            return Err(FactionError::FactionExists(name.to_string()));
        }
        let player = self
            .players
            .get_mut(leader)
            .ok_or_else(|| FactionError::PlayerNotFound(leader.to_string()))?;
        if player.in_faction() {
            return Err(FactionError::AlreadyInFaction);
        }

        let mut faction = Faction::new(name, now, config.power.initial_power);
        faction.place_in_role(leader, Role::Leader);
        faction.add_log(now, format!("Faction created by {}", leader));

        player.faction = Some(name.to_string());
        player.role = Role::Leader;

        self.factions.insert(name.to_string(), faction);
        info!("faction {} created by {}", escape_log(name), escape_log(leader));
        Ok(())
    }

    /// Remove a faction and cascade: clear every member's reference, and
    /// drop ally links and pending requests pointing at it from every other
    /// faction. Claims and invites are owned elsewhere; the engine cascades
    /// those.
    pub fn disband_faction(&mut self, name: &str) -> Result<Faction, FactionError> {
        let faction = self
            .factions
            .remove(name)
            .ok_or_else(|| FactionError::FactionNotFound(name.to_string()))?;

        for member in faction.all_members() {
            if let Some(player) = self.players.get_mut(&member) {
                player.leave_faction();
            }
        }

        for other in self.factions.values_mut() {
            other.allies.retain(|a| a != name);
            other.pending_ally_requests.retain(|a| a != name);
        }

        info!("faction {} disbanded", escape_log(name));
        Ok(faction)
    }

    // -- membership --------------------------------------------------------

    pub fn add_member(
        &mut self,
        faction_name: &str,
        player_name: &str,
        now: DateTime<Utc>,
    ) -> Result<(), FactionError> {
        let player = self
            .players
            .get_mut(player_name)
            .ok_or_else(|| FactionError::PlayerNotFound(player_name.to_string()))?;
        if player.in_faction() {
            return Err(FactionError::AlreadyInFaction);
        }
        let faction = self
            .factions
            .get_mut(faction_name)
            .ok_or_else(|| FactionError::FactionNotFound(faction_name.to_string()))?;

        faction.place_in_role(player_name, Role::Member);
        faction.add_log(now, format!("{} joined", player_name));
        player.faction = Some(faction_name.to_string());
        player.role = Role::Member;
        Ok(())
    }

    pub fn remove_member(
        &mut self,
        faction_name: &str,
        player_name: &str,
        now: DateTime<Utc>,
    ) -> Result<(), FactionError> {
        let faction = self
            .factions
            .get_mut(faction_name)
            .ok_or_else(|| FactionError::FactionNotFound(faction_name.to_string()))?;
        if faction.remove_from_all_roles(player_name).is_none() {
            return Err(FactionError::NotAMember(player_name.to_string()));
        }
        faction.add_log(now, format!("{} left", player_name));

        if let Some(player) = self.players.get_mut(player_name) {
            player.leave_faction();
        }
        Ok(())
    }

    /// member -> officer. Leader-only operations are enforced by callers.
    pub fn promote(
        &mut self,
        faction_name: &str,
        player_name: &str,
        now: DateTime<Utc>,
    ) -> Result<(), FactionError> {
        self.change_role(faction_name, player_name, Role::Member, Role::Officer, now)
    }

    /// officer -> member.
    pub fn demote(
        &mut self,
        faction_name: &str,
        player_name: &str,
        now: DateTime<Utc>,
    ) -> Result<(), FactionError> {
        self.change_role(faction_name, player_name, Role::Officer, Role::Member, now)
    }

    fn change_role(
        &mut self,
        faction_name: &str,
        player_name: &str,
        from: Role,
        to: Role,
        now: DateTime<Utc>,
    ) -> Result<(), FactionError> {
        let faction = self
            .factions
            .get_mut(faction_name)
            .ok_or_else(|| FactionError::FactionNotFound(faction_name.to_string()))?;
        if faction.role_of(player_name) != Some(from) {
            return Err(FactionError::NotAMember(player_name.to_string()));
        }
        faction.place_in_role(player_name, to);
        faction.add_log(
            now,
            format!("{} is now {}", player_name, to.display_name()),
        );
        if let Some(player) = self.players.get_mut(player_name) {
            player.role = to;
        }
        Ok(())
    }

    /// Hand leadership to another member. The previous leader steps down to
    /// plain member; there is exactly one leader at a time.
    pub fn transfer_leadership(
        &mut self,
        faction_name: &str,
        new_leader: &str,
        now: DateTime<Utc>,
    ) -> Result<(), FactionError> {
        let faction = self
            .factions
            .get_mut(faction_name)
            .ok_or_else(|| FactionError::FactionNotFound(faction_name.to_string()))?;
        if faction.role_of(new_leader).is_none() {
            return Err(FactionError::NotAMember(new_leader.to_string()));
        }

        let old_leader = faction.leader.clone();
        if let Some(old) = &old_leader {
            if old == new_leader {
                return Ok(());
            }
            faction.place_in_role(old, Role::Member);
        }
        faction.place_in_role(new_leader, Role::Leader);
        faction.add_log(now, format!("Leadership transferred to {}", new_leader));

        if let Some(old) = old_leader {
            if let Some(player) = self.players.get_mut(&old) {
                player.role = Role::Member;
            }
        }
        if let Some(player) = self.players.get_mut(new_leader) {
            player.role = Role::Leader;
        }
        Ok(())
    }

    // -- diplomacy ---------------------------------------------------------

    /// Two-phase ally handshake. If the target already has a pending
    /// request towards the requester, this call accepts: both become
    /// symmetric allies and both pending entries clear. Otherwise the
    /// requester's pending proposal is recorded.
    pub fn request_ally(
        &mut self,
        requester: &str,
        target: &str,
        now: DateTime<Utc>,
    ) -> Result<AllyOutcome, FactionError> {
        if requester == target {
            return Err(FactionError::SelfTarget);
        }
        if !self.factions.contains_key(target) {
            return Err(FactionError::FactionNotFound(target.to_string()));
        }
        {
            let requester_faction = self
                .factions
                .get(requester)
                .ok_or_else(|| FactionError::FactionNotFound(requester.to_string()))?;
            if requester_faction.is_ally(target) {
                return Err(FactionError::AlreadyAllied);
            }
            if requester_faction.has_pending_ally_request(target) {
                return Err(FactionError::AllyRequestPending);
            }
        }

        let target_has_pending = self
            .factions
            .get(target)
            .map(|f| f.has_pending_ally_request(requester))
            .unwrap_or(false);

        if target_has_pending {
            // Second matching request: form the alliance on both sides.
            if let Some(target_faction) = self.factions.get_mut(target) {
                target_faction.pending_ally_requests.retain(|r| r != requester);
                target_faction.allies.push(requester.to_string());
                target_faction.add_log(now, format!("Allied with {}", requester));
            }
            if let Some(requester_faction) = self.factions.get_mut(requester) {
                requester_faction.pending_ally_requests.retain(|r| r != target);
                requester_faction.allies.push(target.to_string());
                requester_faction.add_log(now, format!("Allied with {}", target));
            }
            Ok(AllyOutcome::Accepted)
        } else {
            let requester_faction = self
                .factions
                .get_mut(requester)
                .ok_or_else(|| FactionError::FactionNotFound(requester.to_string()))?;
            requester_faction
                .pending_ally_requests
                .push(target.to_string());
            Ok(AllyOutcome::RequestSent)
        }
    }

    /// Unilateral alliance removal; both directions clear in one call to
    /// keep the graph symmetric.
    pub fn remove_ally(
        &mut self,
        faction_name: &str,
        ally_name: &str,
        now: DateTime<Utc>,
    ) -> Result<(), FactionError> {
        let allied = self
            .factions
            .get(faction_name)
            .ok_or_else(|| FactionError::FactionNotFound(faction_name.to_string()))?
            .is_ally(ally_name);
        if !allied {
            return Err(FactionError::NotAllied);
        }

        if let Some(faction) = self.factions.get_mut(faction_name) {
            faction.allies.retain(|a| a != ally_name);
            faction.add_log(now, format!("Broke alliance with {}", ally_name));
        }
        if let Some(ally) = self.factions.get_mut(ally_name) {
            ally.allies.retain(|a| a != faction_name);
            ally.add_log(now, format!("Broke alliance with {}", faction_name));
        }
        Ok(())
    }

    pub fn are_factions_allied(&self, a: &str, b: &str) -> bool {
        self.factions
            .get(a)
            .map(|f| f.is_ally(b))
            .unwrap_or(false)
    }

    /// Same faction or allied factions. Factionless players are never
    /// allied with anyone.
    pub fn are_players_allied(&self, a: &str, b: &str) -> bool {
        let (Some(fa), Some(fb)) = (self.player_faction(a), self.player_faction(b)) else {
            return false;
        };
        fa.name == fb.name || fa.is_ally(&fb.name)
    }

    // -- derived queries ---------------------------------------------------

    /// Summed contribution power of every member; feeds the freeze
    /// threshold check.
    pub fn member_power_sum(&self, faction_name: &str) -> f64 {
        let Some(faction) = self.factions.get(faction_name) else {
            return 0.0;
        };
        faction
            .all_members()
            .iter()
            .filter_map(|name| self.players.get(name))
            .map(|p| p.power)
            .sum()
    }

    /// Factions ranked by power, strongest first.
    pub fn top_by_power(&self, limit: usize) -> Vec<(&str, i64)> {
        let mut ranked: Vec<(&str, i64)> = self
            .factions
            .values()
            .map(|f| (f.name.as_str(), f.power))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(limit);
        ranked
    }

    /// Factions ranked by kill count, highest first.
    pub fn top_by_kills(&self, limit: usize) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self
            .factions
            .values()
            .map(|f| (f.name.as_str(), f.kills))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(limit);
        ranked
    }

    /// Rebuild from persisted records, then heal any player whose faction
    /// reference no longer resolves.
    pub fn load(&mut self, factions: Vec<Faction>, players: Vec<FactionPlayer>) -> usize {
        self.factions = factions.into_iter().map(|f| (f.name.clone(), f)).collect();
        self.players = players.into_iter().map(|p| (p.name.clone(), p)).collect();

        let names: Vec<String> = self.players.keys().cloned().collect();
        let mut healed = 0;
        for name in names {
            if self.heal_membership(&name) {
                healed += 1;
            }
        }
        healed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn roster_with(names: &[&str]) -> Roster {
        let config = Config::default();
        let mut roster = Roster::new();
        for name in names {
            roster.ensure_player(name, &config, at(0));
        }
        roster
    }

    #[test]
    fn create_and_membership_flow() {
        let config = Config::default();
        let mut roster = roster_with(&["alice", "bob"]);

        roster.create_faction("Alpha", "alice", &config, at(0)).unwrap();
        assert_eq!(
            roster.create_faction("Alpha", "bob", &config, at(1)),
            Err(FactionError::FactionExists("Alpha".to_string()))
        );

        roster.add_member("Alpha", "bob", at(2)).unwrap();
        assert_eq!(
            roster.add_member("Alpha", "bob", at(3)),
            Err(FactionError::AlreadyInFaction)
        );
        assert_eq!(roster.faction("Alpha").unwrap().member_count(), 2);
        assert_eq!(roster.player_faction("bob").unwrap().name, "Alpha");
    }

    #[test]
    fn promote_demote_and_transfer() {
        let config = Config::default();
        let mut roster = roster_with(&["alice", "bob"]);
        roster.create_faction("Alpha", "alice", &config, at(0)).unwrap();
        roster.add_member("Alpha", "bob", at(1)).unwrap();

        roster.promote("Alpha", "bob", at(2)).unwrap();
        assert_eq!(roster.faction("Alpha").unwrap().role_of("bob"), Some(Role::Officer));

        roster.demote("Alpha", "bob", at(3)).unwrap();
        assert_eq!(roster.faction("Alpha").unwrap().role_of("bob"), Some(Role::Member));

        roster.transfer_leadership("Alpha", "bob", at(4)).unwrap();
        let faction = roster.faction("Alpha").unwrap();
        assert_eq!(faction.role_of("bob"), Some(Role::Leader));
        assert_eq!(faction.role_of("alice"), Some(Role::Member));
        assert_eq!(roster.player("alice").unwrap().role, Role::Member);
    }

    #[test]
    fn ally_handshake_is_two_phase() {
        let config = Config::default();
        let mut roster = roster_with(&["alice", "bob"]);
        roster.create_faction("Alpha", "alice", &config, at(0)).unwrap();
        roster.create_faction("Beta", "bob", &config, at(0)).unwrap();

        let first = roster.request_ally("Alpha", "Beta", at(1)).unwrap();
        assert_eq!(first, AllyOutcome::RequestSent);
        assert!(!roster.are_factions_allied("Alpha", "Beta"));

        let second = roster.request_ally("Beta", "Alpha", at(2)).unwrap();
        assert_eq!(second, AllyOutcome::Accepted);
        assert!(roster.are_factions_allied("Alpha", "Beta"));
        assert!(roster.are_factions_allied("Beta", "Alpha"));
        assert!(roster.faction("Alpha").unwrap().pending_ally_requests.is_empty());
        assert!(roster.faction("Beta").unwrap().pending_ally_requests.is_empty());
    }

    #[test]
    fn unally_clears_both_directions() {
        let config = Config::default();
        let mut roster = roster_with(&["alice", "bob"]);
        roster.create_faction("Alpha", "alice", &config, at(0)).unwrap();
        roster.create_faction("Beta", "bob", &config, at(0)).unwrap();
        roster.request_ally("Alpha", "Beta", at(1)).unwrap();
        roster.request_ally("Beta", "Alpha", at(2)).unwrap();

        roster.remove_ally("Alpha", "Beta", at(3)).unwrap();
        assert!(!roster.are_factions_allied("Alpha", "Beta"));
        assert!(!roster.are_factions_allied("Beta", "Alpha"));
        assert_eq!(
            roster.remove_ally("Alpha", "Beta", at(4)),
            Err(FactionError::NotAllied)
        );
    }

    #[test]
    fn disband_cascades_members_and_ally_links() {
        let config = Config::default();
        let mut roster = roster_with(&["alice", "bob", "carol"]);
        roster.create_faction("Alpha", "alice", &config, at(0)).unwrap();
        roster.add_member("Alpha", "carol", at(0)).unwrap();
        roster.create_faction("Beta", "bob", &config, at(0)).unwrap();
        roster.request_ally("Alpha", "Beta", at(1)).unwrap();
        roster.request_ally("Beta", "Alpha", at(2)).unwrap();

        roster.disband_faction("Alpha").unwrap();
        assert!(!roster.faction_exists("Alpha"));
        assert!(roster.player("alice").unwrap().faction.is_none());
        assert!(roster.player("carol").unwrap().faction.is_none());
        assert!(!roster.faction("Beta").unwrap().is_ally("Alpha"));
    }

    #[test]
    fn dangling_reference_heals_on_load() {
        let mut player = FactionPlayer::new("alice", at(0), 10.0, 100.0);
        player.faction = Some("Ghost".to_string());
        player.role = Role::Leader;

        let mut roster = Roster::new();
        let healed = roster.load(Vec::new(), vec![player]);
        assert_eq!(healed, 1);
        let alice = roster.player("alice").unwrap();
        assert!(alice.faction.is_none());
        assert_eq!(alice.role, Role::Member);
    }

    #[test]
    fn member_power_sum_and_leaderboards() {
        let config = Config::default();
        let mut roster = roster_with(&["alice", "bob", "carol"]);
        roster.create_faction("Alpha", "alice", &config, at(0)).unwrap();
        roster.add_member("Alpha", "carol", at(0)).unwrap();
        roster.create_faction("Beta", "bob", &config, at(0)).unwrap();

        roster.player_mut("alice").unwrap().set_power(30.0);
        roster.player_mut("carol").unwrap().set_power(12.5);
        assert_eq!(roster.member_power_sum("Alpha"), 42.5);

        roster.faction_mut("Alpha").unwrap().power = 80;
        roster.faction_mut("Beta").unwrap().power = 95;
        let top = roster.top_by_power(10);
        assert_eq!(top[0], ("Beta", 95));
        assert_eq!(top[1], ("Alpha", 80));
    }
}
