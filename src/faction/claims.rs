//! Claim store and territory index.
//!
//! Authoritative in-memory mapping from `(chunk_x, chunk_z, world)` to the
//! owning faction. Creation is gated on key uniqueness and faction capacity;
//! connectivity is a reportable property, not a write-time invariant.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};

use crate::faction::types::{Claim, ClaimKey};

/// Result of a claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Created,
    /// The chunk already belongs to the named faction.
    AlreadyClaimed(String),
    LimitReached,
}

#[derive(Debug, Default)]
pub struct ClaimIndex {
    claims: HashMap<ClaimKey, Claim>,
}

impl ClaimIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.claims.values()
    }

    /// O(1) lookup; `None` is wilderness.
    pub fn claim_at(&self, key: &ClaimKey) -> Option<&Claim> {
        self.claims.get(key)
    }

    pub fn is_claimed(&self, key: &ClaimKey) -> bool {
        self.claims.contains_key(key)
    }

    pub fn faction_claims<'a>(&'a self, faction: &'a str) -> impl Iterator<Item = &'a Claim> {
        self.claims.values().filter(move |c| c.faction == faction)
    }

    pub fn faction_claim_count(&self, faction: &str) -> usize {
        self.faction_claims(faction).count()
    }

    pub fn world_claims<'a>(&'a self, world: &'a str) -> impl Iterator<Item = &'a Claim> {
        self.claims.values().filter(move |c| c.key.world == world)
    }

    /// True when the faction may take another claim: an unlimited override
    /// wins outright, otherwise the configured ceiling applies.
    pub fn can_faction_claim(&self, faction: &str, unlimited: bool, max_claims: usize) -> bool {
        unlimited || self.faction_claim_count(faction) < max_claims
    }

    /// Claim a chunk for a faction. Never mutates an existing claim: a
    /// takeover is delete + recreate by the caller.
    pub fn create_claim(
        &mut self,
        faction: &str,
        key: ClaimKey,
        unlimited: bool,
        max_claims: usize,
        now: DateTime<Utc>,
    ) -> ClaimOutcome {
        if let Some(existing) = self.claims.get(&key) {
            return ClaimOutcome::AlreadyClaimed(existing.faction.clone());
        }
        if !self.can_faction_claim(faction, unlimited, max_claims) {
            return ClaimOutcome::LimitReached;
        }

        self.claims.insert(key.clone(), Claim::new(faction, key, now));
        ClaimOutcome::Created
    }

    /// Remove a claim. Deleting an absent key is a no-op reported as false.
    pub fn delete_claim(&mut self, key: &ClaimKey) -> bool {
        self.claims.remove(key).is_some()
    }

    /// Remove every claim owned by a faction, returning how many went.
    pub fn delete_faction_claims(&mut self, faction: &str) -> usize {
        let keys: Vec<ClaimKey> = self
            .faction_claims(faction)
            .map(|c| c.key.clone())
            .collect();
        for key in &keys {
            self.claims.remove(key);
        }
        keys.len()
    }

    /// Claims in the four orthogonal neighbour chunks, any owner.
    pub fn adjacent_claims(&self, key: &ClaimKey) -> Vec<&Claim> {
        key.neighbours()
            .iter()
            .filter_map(|n| self.claims.get(n))
            .collect()
    }

    /// Breadth-first flood fill over same-faction adjacency. True iff every
    /// claim of the faction is reachable from the first one. Diagnostic
    /// only; disconnected territory is reportable but never prevented.
    pub fn has_connected_claims(&self, faction: &str) -> bool {
        let keys: Vec<&ClaimKey> = self.faction_claims(faction).map(|c| &c.key).collect();
        if keys.len() <= 1 {
            return true;
        }

        let owned: HashSet<&ClaimKey> = keys.iter().copied().collect();
        let mut visited: HashSet<&ClaimKey> = HashSet::new();
        let mut queue: VecDeque<&ClaimKey> = VecDeque::new();

        visited.insert(keys[0]);
        queue.push_back(keys[0]);

        while let Some(current) = queue.pop_front() {
            for neighbour in current.neighbours() {
                if let Some(&key) = owned.get(&neighbour) {
                    if visited.insert(key) {
                        queue.push_back(key);
                    }
                }
            }
        }

        visited.len() == keys.len()
    }

    /// Rebuild the index from persisted records, dropping duplicates.
    pub fn load(&mut self, claims: Vec<Claim>) {
        self.claims.clear();
        for claim in claims {
            self.claims.entry(claim.key.clone()).or_insert(claim);
        }
    }
}
