//! Sled-backed mirror store for engine state.
//!
//! In-memory state is always the source of truth for reads; this store is
//! an eventually-consistent mirror. Writes are best-effort and the engine
//! never rolls back a gameplay mutation because its mirror write failed —
//! a periodic full resync repairs any lost delta.
//!
//! The data directory is guarded with an exclusive `fs2` lock so two engine
//! processes cannot share one database.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::warn;
use sled::IVec;
use thiserror::Error;

use crate::faction::types::{
    Claim, Faction, FactionInvite, FactionPlayer, CLAIM_SCHEMA_VERSION, FACTION_SCHEMA_VERSION,
    INVITE_SCHEMA_VERSION, PLAYER_SCHEMA_VERSION,
};

const TREE_FACTIONS: &str = "factions";
const TREE_PLAYERS: &str = "players";
const TREE_CLAIMS: &str = "claims";
const TREE_INVITES: &str = "invites";
const TREE_LOGS: &str = "engine_logs";

const LOCK_FILE: &str = "clanforge.lock";

/// Errors that can arise while interacting with the mirror store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, lock file, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// Another engine process already holds the data directory.
    #[error("data directory is locked by another process: {0}")]
    Locked(String),
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct FactionStoreBuilder {
    path: PathBuf,
}

impl FactionStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open(self) -> Result<FactionStore, StoreError> {
        FactionStore::open(self.path)
    }
}

/// Sled-backed persistence for factions, players, claims and invites.
pub struct FactionStore {
    _db: sled::Db,
    _lock: File,
    factions: sled::Tree,
    players: sled::Tree,
    claims: sled::Tree,
    invites: sled::Tree,
    logs: sled::Tree,
}

impl FactionStore {
    /// Open (or create) the store rooted at `path`, taking the exclusive
    /// data-dir lock first.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;

        let lock_path = path_ref.join(LOCK_FILE);
        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&lock_path)?;
        if lock.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked(lock_path.display().to_string()));
        }

        let db = sled::open(path_ref)?;
        let factions = db.open_tree(TREE_FACTIONS)?;
        let players = db.open_tree(TREE_PLAYERS)?;
        let claims = db.open_tree(TREE_CLAIMS)?;
        let invites = db.open_tree(TREE_INVITES)?;
        let logs = db.open_tree(TREE_LOGS)?;

        Ok(Self {
            _db: db,
            _lock: lock,
            factions,
            players,
            claims,
            invites,
            logs,
        })
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: IVec) -> Result<T, StoreError> {
        Ok(bincode::deserialize::<T>(&bytes)?)
    }

    fn invite_key(invite: &FactionInvite) -> Vec<u8> {
        format!("{}:{}", invite.player, invite.faction).into_bytes()
    }

    // -- factions ----------------------------------------------------------

    /// Insert or update a faction record.
    pub fn put_faction(&self, faction: &Faction) -> Result<(), StoreError> {
        let mut record = faction.clone();
        record.schema_version = FACTION_SCHEMA_VERSION;
        self.factions
            .insert(record.name.as_bytes(), Self::serialize(&record)?)?;
        self.factions.flush()?;
        Ok(())
    }

    pub fn get_faction(&self, name: &str) -> Result<Faction, StoreError> {
        let Some(bytes) = self.factions.get(name.as_bytes())? else {
            return Err(StoreError::NotFound(format!("faction: {}", name)));
        };
        let record: Faction = Self::deserialize(bytes)?;
        if record.schema_version != FACTION_SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                entity: "faction",
                expected: FACTION_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }

    pub fn delete_faction(&self, name: &str) -> Result<(), StoreError> {
        self.factions.remove(name.as_bytes())?;
        self.factions.flush()?;
        Ok(())
    }

    /// Load every readable faction record. Corrupt or mismatched rows are
    /// skipped with a warning rather than failing the whole load.
    pub fn load_factions(&self) -> Result<Vec<Faction>, StoreError> {
        let mut records = Vec::new();
        for entry in self.factions.iter() {
            let (key, bytes) = entry?;
            match Self::deserialize::<Faction>(bytes) {
                Ok(record) if record.schema_version == FACTION_SCHEMA_VERSION => {
                    records.push(record)
                }
                Ok(record) => warn!(
                    "skipping faction {} with schema {}",
                    String::from_utf8_lossy(&key),
                    record.schema_version
                ),
                Err(e) => warn!(
                    "skipping unreadable faction {}: {}",
                    String::from_utf8_lossy(&key),
                    e
                ),
            }
        }
        Ok(records)
    }

    // -- players -----------------------------------------------------------

    /// Insert or update a player record.
    pub fn put_player(&self, player: &FactionPlayer) -> Result<(), StoreError> {
        let mut record = player.clone();
        record.schema_version = PLAYER_SCHEMA_VERSION;
        self.players
            .insert(record.name.as_bytes(), Self::serialize(&record)?)?;
        self.players.flush()?;
        Ok(())
    }

    pub fn get_player(&self, name: &str) -> Result<FactionPlayer, StoreError> {
        let Some(bytes) = self.players.get(name.as_bytes())? else {
            return Err(StoreError::NotFound(format!("player: {}", name)));
        };
        let record: FactionPlayer = Self::deserialize(bytes)?;
        if record.schema_version != PLAYER_SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                entity: "player",
                expected: PLAYER_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }

    pub fn delete_player(&self, name: &str) -> Result<(), StoreError> {
        self.players.remove(name.as_bytes())?;
        self.players.flush()?;
        Ok(())
    }

    pub fn load_players(&self) -> Result<Vec<FactionPlayer>, StoreError> {
        let mut records = Vec::new();
        for entry in self.players.iter() {
            let (key, bytes) = entry?;
            match Self::deserialize::<FactionPlayer>(bytes) {
                Ok(record) if record.schema_version == PLAYER_SCHEMA_VERSION => {
                    records.push(record)
                }
                Ok(record) => warn!(
                    "skipping player {} with schema {}",
                    String::from_utf8_lossy(&key),
                    record.schema_version
                ),
                Err(e) => warn!(
                    "skipping unreadable player {}: {}",
                    String::from_utf8_lossy(&key),
                    e
                ),
            }
        }
        Ok(records)
    }

    // -- claims ------------------------------------------------------------

    pub fn put_claim(&self, claim: &Claim) -> Result<(), StoreError> {
        let mut record = claim.clone();
        record.schema_version = CLAIM_SCHEMA_VERSION;
        self.claims
            .insert(record.key.storage_key().into_bytes(), Self::serialize(&record)?)?;
        self.claims.flush()?;
        Ok(())
    }

    pub fn delete_claim(&self, storage_key: &str) -> Result<(), StoreError> {
        self.claims.remove(storage_key.as_bytes())?;
        self.claims.flush()?;
        Ok(())
    }

    pub fn load_claims(&self) -> Result<Vec<Claim>, StoreError> {
        let mut records = Vec::new();
        for entry in self.claims.iter() {
            let (key, bytes) = entry?;
            match Self::deserialize::<Claim>(bytes) {
                Ok(record) if record.schema_version == CLAIM_SCHEMA_VERSION => records.push(record),
                Ok(record) => warn!(
                    "skipping claim {} with schema {}",
                    String::from_utf8_lossy(&key),
                    record.schema_version
                ),
                Err(e) => warn!(
                    "skipping unreadable claim {}: {}",
                    String::from_utf8_lossy(&key),
                    e
                ),
            }
        }
        Ok(records)
    }

    // -- invites -----------------------------------------------------------

    pub fn put_invite(&self, invite: &FactionInvite) -> Result<(), StoreError> {
        let mut record = invite.clone();
        record.schema_version = INVITE_SCHEMA_VERSION;
        self.invites
            .insert(Self::invite_key(&record), Self::serialize(&record)?)?;
        self.invites.flush()?;
        Ok(())
    }

    pub fn delete_invite(&self, player: &str, faction: &str) -> Result<(), StoreError> {
        self.invites
            .remove(format!("{}:{}", player, faction).into_bytes())?;
        self.invites.flush()?;
        Ok(())
    }

    pub fn load_invites(&self) -> Result<Vec<FactionInvite>, StoreError> {
        let mut records = Vec::new();
        for entry in self.invites.iter() {
            let (key, bytes) = entry?;
            match Self::deserialize::<FactionInvite>(bytes) {
                Ok(record) if record.schema_version == INVITE_SCHEMA_VERSION => {
                    records.push(record)
                }
                Ok(record) => warn!(
                    "skipping invite {} with schema {}",
                    String::from_utf8_lossy(&key),
                    record.schema_version
                ),
                Err(e) => warn!(
                    "skipping unreadable invite {}: {}",
                    String::from_utf8_lossy(&key),
                    e
                ),
            }
        }
        Ok(records)
    }

    // -- diagnostics and resync --------------------------------------------

    /// Append a line to the engine diagnostic log tree.
    pub fn append_log(&self, timestamp_nanos: i64, message: &str) -> Result<(), StoreError> {
        let key = format!("logs:{:020}", timestamp_nanos).into_bytes();
        self.logs.insert(key, message.as_bytes())?;
        self.logs.flush()?;
        Ok(())
    }

    /// Rewrite the mirror from the authoritative in-memory state, removing
    /// rows that no longer exist. This is the repair path for any delta
    /// lost to a failed best-effort write.
    pub fn resync<'a>(
        &self,
        factions: impl Iterator<Item = &'a Faction>,
        players: impl Iterator<Item = &'a FactionPlayer>,
        claims: impl Iterator<Item = &'a Claim>,
        invites: impl Iterator<Item = &'a FactionInvite>,
    ) -> Result<(), StoreError> {
        self.factions.clear()?;
        for faction in factions {
            let mut record = faction.clone();
            record.schema_version = FACTION_SCHEMA_VERSION;
            self.factions
                .insert(record.name.as_bytes(), Self::serialize(&record)?)?;
        }

        self.players.clear()?;
        for player in players {
            let mut record = player.clone();
            record.schema_version = PLAYER_SCHEMA_VERSION;
            self.players
                .insert(record.name.as_bytes(), Self::serialize(&record)?)?;
        }

        self.claims.clear()?;
        for claim in claims {
            let mut record = claim.clone();
            record.schema_version = CLAIM_SCHEMA_VERSION;
            self.claims
                .insert(record.key.storage_key().into_bytes(), Self::serialize(&record)?)?;
        }

        self.invites.clear()?;
        for invite in invites {
            let mut record = invite.clone();
            record.schema_version = INVITE_SCHEMA_VERSION;
            self.invites
                .insert(Self::invite_key(&record), Self::serialize(&record)?)?;
        }

        self.factions.flush()?;
        self.players.flush()?;
        self.claims.flush()?;
        self.invites.flush()?;
        Ok(())
    }
}
