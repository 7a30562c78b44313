//! Time-bounded faction invites.
//!
//! One live invite per (player, faction) pair; a player may hold invites
//! from several factions at once. Expiry is enforced twice: lazily at every
//! read, and proactively by a due-time queue drained from the periodic
//! sweep. Both paths converge on the same "removed" outcome.
//!
//! Queue entries are cancelled by identity: an entry only expires the
//! invite it was scheduled for (matched by creation instant), never a newer
//! invite re-issued under the same key.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::faction::errors::FactionError;
use crate::faction::types::FactionInvite;

type InviteKey = (String, String);

/// (due, player, faction, created_at); ordered by due time for the heap.
type ExpiryEntry = (DateTime<Utc>, String, String, DateTime<Utc>);

#[derive(Debug, Default)]
pub struct InviteBook {
    invites: HashMap<InviteKey, FactionInvite>,
    expiry_queue: BinaryHeap<Reverse<ExpiryEntry>>,
}

impl InviteBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.invites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invites.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FactionInvite> {
        self.invites.values()
    }

    /// Record an invite. Rejected while a live invite for the same pair
    /// exists; an expired one is silently superseded.
    pub fn send(
        &mut self,
        player: &str,
        faction: &str,
        inviter: &str,
        ttl_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<FactionInvite, FactionError> {
        let key = (player.to_string(), faction.to_string());
        if let Some(existing) = self.invites.get(&key) {
            if !existing.is_expired(now) {
                return Err(FactionError::InviteAlreadySent);
            }
        }

        let expires_at = now + Duration::seconds(ttl_secs);
        let invite = FactionInvite::new(player, faction, inviter, now, expires_at);
        self.expiry_queue.push(Reverse((
            expires_at,
            player.to_string(),
            faction.to_string(),
            now,
        )));
        self.invites.insert(key, invite.clone());
        Ok(invite)
    }

    /// Live invite for a pair, expired ones removed on the way.
    pub fn invite(&mut self, player: &str, faction: &str, now: DateTime<Utc>) -> Option<&FactionInvite> {
        let key = (player.to_string(), faction.to_string());
        if let Some(existing) = self.invites.get(&key) {
            if existing.is_expired(now) {
                self.invites.remove(&key);
                return None;
            }
        }
        self.invites.get(&key)
    }

    pub fn has_invite(&self, player: &str, now: DateTime<Utc>) -> bool {
        self.invites
            .values()
            .any(|i| i.player == player && !i.is_expired(now))
    }

    pub fn has_invite_from(&self, player: &str, faction: &str, now: DateTime<Utc>) -> bool {
        self.invites
            .get(&(player.to_string(), faction.to_string()))
            .map(|i| !i.is_expired(now))
            .unwrap_or(false)
    }

    pub fn invites_for_player(&self, player: &str, now: DateTime<Utc>) -> Vec<&FactionInvite> {
        self.invites
            .values()
            .filter(|i| i.player == player && !i.is_expired(now))
            .collect()
    }

    /// Consume a live invite for acceptance. A late call against an expired
    /// invite removes it and returns `None`, matching the sweep's outcome.
    pub fn take(&mut self, player: &str, faction: &str, now: DateTime<Utc>) -> Option<FactionInvite> {
        let key = (player.to_string(), faction.to_string());
        let invite = self.invites.remove(&key)?;
        if invite.is_expired(now) {
            return None;
        }
        Some(invite)
    }

    /// Drop an invite regardless of its expiry state (decline or revoke).
    pub fn remove(&mut self, player: &str, faction: &str) -> bool {
        self.invites
            .remove(&(player.to_string(), faction.to_string()))
            .is_some()
    }

    /// Disband cascade: drop every invite issued by a faction.
    pub fn remove_faction_invites(&mut self, faction: &str) -> usize {
        let before = self.invites.len();
        self.invites.retain(|_, invite| invite.faction != faction);
        before - self.invites.len()
    }

    /// Drain due queue entries and expire the invites they refer to.
    /// An entry whose invite was superseded (different creation instant) or
    /// already removed is a no-op. Returns the invites expired here so the
    /// caller can notify the players.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Vec<FactionInvite> {
        let mut expired = Vec::new();

        while matches!(self.expiry_queue.peek(), Some(Reverse((due, _, _, _))) if *due <= now) {
            let Some(Reverse((_, player, faction, created_at))) = self.expiry_queue.pop() else {
                break;
            };

            let key = (player, faction);
            let is_current = self
                .invites
                .get(&key)
                .map(|i| i.created_at == created_at)
                .unwrap_or(false);
            if is_current {
                if let Some(invite) = self.invites.remove(&key) {
                    debug!(
                        "invite for {} from {} expired",
                        invite.player, invite.faction
                    );
                    expired.push(invite);
                }
            }
        }

        expired
    }

    /// Rebuild from persisted invites, dropping anything already expired.
    pub fn load(&mut self, invites: Vec<FactionInvite>, now: DateTime<Utc>) {
        self.invites.clear();
        self.expiry_queue.clear();
        for invite in invites {
            if invite.is_expired(now) {
                continue;
            }
            self.expiry_queue.push(Reverse((
                invite.expires_at,
                invite.player.clone(),
                invite.faction.clone(),
                invite.created_at,
            )));
            self.invites
                .insert((invite.player.clone(), invite.faction.clone()), invite);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn duplicate_live_invite_is_rejected() {
        let mut book = InviteBook::new();
        book.send("bob", "Red", "alice", 60, at(0)).unwrap();
        assert_eq!(
            book.send("bob", "Red", "alice", 60, at(10)),
            Err(FactionError::InviteAlreadySent)
        );
        // A different faction may still invite the same player.
        assert!(book.send("bob", "Blue", "carol", 60, at(10)).is_ok());
        assert_eq!(book.invites_for_player("bob", at(11)).len(), 2);
    }

    #[test]
    fn invites_expire_lazily() {
        let mut book = InviteBook::new();
        book.send("bob", "Red", "alice", 60, at(0)).unwrap();

        assert!(book.has_invite("bob", at(59)));
        assert!(!book.has_invite("bob", at(61)));
        assert!(book.take("bob", "Red", at(61)).is_none());
        assert!(book.is_empty());
    }

    #[test]
    fn sweep_expires_due_invites() {
        let mut book = InviteBook::new();
        book.send("bob", "Red", "alice", 60, at(0)).unwrap();
        book.send("carol", "Red", "alice", 120, at(0)).unwrap();

        let expired = book.sweep_expired(at(61));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].player, "bob");
        assert!(book.has_invite_from("carol", "Red", at(61)));
    }

    #[test]
    fn stale_queue_entry_spares_reissued_invite() {
        let mut book = InviteBook::new();
        book.send("bob", "Red", "alice", 60, at(0)).unwrap();

        // Lazy read drops the first invite after expiry, then it is
        // re-issued with a newer creation instant.
        assert!(book.invite("bob", "Red", at(70)).is_none());
        book.send("bob", "Red", "alice", 60, at(80)).unwrap();

        // The stale queue entry for the first invite comes due but must not
        // touch the replacement.
        let expired = book.sweep_expired(at(90));
        assert!(expired.is_empty());
        assert!(book.has_invite_from("bob", "Red", at(90)));

        // The replacement still expires on its own schedule.
        let expired = book.sweep_expired(at(141));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].created_at, at(80));
    }

    #[test]
    fn faction_cascade_removes_its_invites() {
        let mut book = InviteBook::new();
        book.send("bob", "Red", "alice", 60, at(0)).unwrap();
        book.send("carol", "Red", "alice", 60, at(0)).unwrap();
        book.send("bob", "Blue", "dave", 60, at(0)).unwrap();

        assert_eq!(book.remove_faction_invites("Red"), 2);
        assert_eq!(book.len(), 1);
        assert!(book.has_invite_from("bob", "Blue", at(1)));
    }

    #[test]
    fn load_drops_expired_rows() {
        let mut book = InviteBook::new();
        let invites = vec![
            FactionInvite::new("bob", "Red", "alice", at(0), at(60)),
            FactionInvite::new("carol", "Red", "alice", at(0), at(600)),
        ];
        book.load(invites, at(100));
        assert_eq!(book.len(), 1);
        assert!(book.has_invite_from("carol", "Red", at(100)));
    }
}
