//! Per-player cooldown ledger.
//!
//! Entries are (player, kind) -> expiry instant, checked lazily against the
//! current time at read; a periodic sweep keeps the map from accumulating
//! dead rows. Session-scoped: cooldowns do not survive a restart.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

/// Cooldown kinds used by the engine. `Custom` covers host extensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CooldownKind {
    HomeTeleport,
    BorderToggle,
    ProtectionMessage,
    Custom(String),
}

#[derive(Debug, Default)]
pub struct CooldownLedger {
    entries: HashMap<(String, CooldownKind), DateTime<Utc>>,
}

impl CooldownLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, player: &str, kind: CooldownKind, secs: i64, now: DateTime<Utc>) {
        self.entries.insert(
            (player.to_string(), kind),
            now + Duration::seconds(secs),
        );
    }

    /// True while the cooldown is running. Expired entries are removed here
    /// rather than waiting for the sweep.
    pub fn active(&mut self, player: &str, kind: &CooldownKind, now: DateTime<Utc>) -> bool {
        let key = (player.to_string(), kind.clone());
        match self.entries.get(&key) {
            Some(expiry) if *expiry > now => true,
            Some(_) => {
                self.entries.remove(&key);
                false
            }
            None => false,
        }
    }

    /// Seconds until the cooldown clears; 0 when not active.
    pub fn remaining_secs(&mut self, player: &str, kind: &CooldownKind, now: DateTime<Utc>) -> i64 {
        if !self.active(player, kind, now) {
            return 0;
        }
        self.entries
            .get(&(player.to_string(), kind.clone()))
            .map(|expiry| (*expiry - now).num_seconds().max(0))
            .unwrap_or(0)
    }

    pub fn clear_player(&mut self, player: &str) {
        self.entries.retain(|(name, _), _| name != player);
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expiry| *expiry > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
