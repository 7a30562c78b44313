use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const FACTION_SCHEMA_VERSION: u8 = 1;
pub const PLAYER_SCHEMA_VERSION: u8 = 1;
pub const CLAIM_SCHEMA_VERSION: u8 = 1;
pub const INVITE_SCHEMA_VERSION: u8 = 1;

/// Number of audit log entries retained per faction; oldest evicted first.
pub const FACTION_LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Officer,
    Leader,
}

impl Role {
    pub fn can_manage(self) -> bool {
        matches!(self, Role::Leader | Role::Officer)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Role::Member => "Member",
            Role::Officer => "Officer",
            Role::Leader => "Leader",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    Global,
    Faction,
    Alliance,
}

impl Default for ChatMode {
    fn default() -> Self {
        Self::Global
    }
}

/// Game mode the host should apply to an actor inside a territory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    Survival,
    Adventure,
    Creative,
    Spectator,
}

/// Border/territory tint exposed to the host's renderer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TerritoryColor {
    White,
    Green,
    Aqua,
    Red,
}

/// A point in a named world. Chunk coordinates derive from block coordinates
/// by a 4-bit shift (16x16 block chunks).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldPosition {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl WorldPosition {
    pub fn new(world: &str, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.to_string(),
            x,
            y,
            z,
        }
    }

    pub fn chunk_x(&self) -> i32 {
        (self.x.floor() as i32) >> 4
    }

    pub fn chunk_z(&self) -> i32 {
        (self.z.floor() as i32) >> 4
    }

    pub fn chunk(&self) -> ChunkPos {
        ChunkPos {
            x: self.chunk_x(),
            z: self.chunk_z(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

/// Composite key identifying one claimable chunk. A chunk is claimed by at
/// most one faction at a time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ClaimKey {
    pub chunk_x: i32,
    pub chunk_z: i32,
    pub world: String,
}

impl ClaimKey {
    pub fn new(chunk_x: i32, chunk_z: i32, world: &str) -> Self {
        Self {
            chunk_x,
            chunk_z,
            world: world.to_string(),
        }
    }

    pub fn from_position(pos: &WorldPosition) -> Self {
        Self::new(pos.chunk_x(), pos.chunk_z(), &pos.world)
    }

    /// Stable text form used as the storage key: `x:z:world`.
    pub fn storage_key(&self) -> String {
        format!("{}:{}:{}", self.chunk_x, self.chunk_z, self.world)
    }

    /// The four orthogonal neighbours, same world. Diagonals do not count as
    /// adjacent for connectivity purposes.
    pub fn neighbours(&self) -> [ClaimKey; 4] {
        [
            Self::new(self.chunk_x + 1, self.chunk_z, &self.world),
            Self::new(self.chunk_x - 1, self.chunk_z, &self.world),
            Self::new(self.chunk_x, self.chunk_z + 1, &self.world),
            Self::new(self.chunk_x, self.chunk_z - 1, &self.world),
        ]
    }

    pub fn is_adjacent_to(&self, other: &ClaimKey) -> bool {
        if self.world != other.world {
            return false;
        }
        let dx = (self.chunk_x - other.chunk_x).abs();
        let dz = (self.chunk_z - other.chunk_z).abs();
        (dx == 1 && dz == 0) || (dx == 0 && dz == 1)
    }
}

/// Ownership of one chunk by one faction. Ownership never mutates in place;
/// a takeover is delete + recreate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claim {
    pub key: ClaimKey,
    /// Owning faction, by name. Resolved through the roster on access; a
    /// failed resolve means the faction no longer exists.
    pub faction: String,
    pub claimed_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl Claim {
    pub fn new(faction: &str, key: ClaimKey, claimed_at: DateTime<Utc>) -> Self {
        Self {
            key,
            faction: faction.to_string(),
            claimed_at,
            schema_version: CLAIM_SCHEMA_VERSION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// A faction: the unit of membership, power, territory and diplomacy.
///
/// Membership is split across `leader`, `officers` and `members`; the three
/// sets are disjoint and their union is "all members". Allies and pending
/// ally requests hold faction names, never pointers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Faction {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub leader: Option<String>,
    pub officers: Vec<String>,
    pub members: Vec<String>,
    pub allies: Vec<String>,
    /// Outgoing ally proposals awaiting the other side's reciprocal request.
    pub pending_ally_requests: Vec<String>,
    pub power: i64,
    pub money: f64,
    pub kills: u64,
    pub deaths: u64,
    pub freeze: bool,
    /// Absolute instant the raid-protection window ends. Meaningful only
    /// while `freeze` is set.
    pub freeze_until: Option<DateTime<Utc>>,
    pub home: Option<WorldPosition>,
    pub description: String,
    pub open: bool,
    pub logs: Vec<FactionLogEntry>,
    pub schema_version: u8,
}

impl Faction {
    pub fn new(name: &str, created_at: DateTime<Utc>, initial_power: i64) -> Self {
        Self {
            name: name.to_string(),
            created_at,
            leader: None,
            officers: Vec::new(),
            members: Vec::new(),
            allies: Vec::new(),
            pending_ally_requests: Vec::new(),
            power: initial_power,
            money: 0.0,
            kills: 0,
            deaths: 0,
            freeze: false,
            freeze_until: None,
            home: None,
            description: String::new(),
            open: false,
            logs: Vec::new(),
            schema_version: FACTION_SCHEMA_VERSION,
        }
    }

    pub fn is_member(&self, player: &str) -> bool {
        self.leader.as_deref() == Some(player)
            || self.officers.iter().any(|m| m == player)
            || self.members.iter().any(|m| m == player)
    }

    pub fn role_of(&self, player: &str) -> Option<Role> {
        if self.leader.as_deref() == Some(player) {
            Some(Role::Leader)
        } else if self.officers.iter().any(|m| m == player) {
            Some(Role::Officer)
        } else if self.members.iter().any(|m| m == player) {
            Some(Role::Member)
        } else {
            None
        }
    }

    /// Every member name: leader, officers, then plain members.
    pub fn all_members(&self) -> Vec<String> {
        let mut all = Vec::with_capacity(1 + self.officers.len() + self.members.len());
        if let Some(leader) = &self.leader {
            all.push(leader.clone());
        }
        all.extend(self.officers.iter().cloned());
        all.extend(self.members.iter().cloned());
        all
    }

    pub fn member_count(&self) -> usize {
        self.leader.is_some() as usize + self.officers.len() + self.members.len()
    }

    /// Detach a player from whichever role set holds them. Returns the role
    /// they held, if any.
    pub fn remove_from_all_roles(&mut self, player: &str) -> Option<Role> {
        if self.leader.as_deref() == Some(player) {
            self.leader = None;
            return Some(Role::Leader);
        }
        if let Some(pos) = self.officers.iter().position(|m| m == player) {
            self.officers.remove(pos);
            return Some(Role::Officer);
        }
        if let Some(pos) = self.members.iter().position(|m| m == player) {
            self.members.remove(pos);
            return Some(Role::Member);
        }
        None
    }

    /// Place a player into the given role set, detaching them from any
    /// previous one first so the sets stay disjoint.
    pub fn place_in_role(&mut self, player: &str, role: Role) {
        self.remove_from_all_roles(player);
        match role {
            Role::Leader => self.leader = Some(player.to_string()),
            Role::Officer => self.officers.push(player.to_string()),
            Role::Member => self.members.push(player.to_string()),
        }
    }

    pub fn is_ally(&self, faction: &str) -> bool {
        self.allies.iter().any(|a| a == faction)
    }

    pub fn has_pending_ally_request(&self, faction: &str) -> bool {
        self.pending_ally_requests.iter().any(|a| a == faction)
    }

    /// Power at or below zero with no active protection window: the faction
    /// is contestable.
    pub fn is_raidable(&self) -> bool {
        self.power <= 0 && !self.freeze
    }

    pub fn remaining_freeze(&self, now: DateTime<Utc>) -> chrono::Duration {
        match self.freeze_until {
            Some(until) if self.freeze && until > now => until - now,
            _ => chrono::Duration::zero(),
        }
    }

    pub fn kd_ratio(&self) -> f64 {
        if self.deaths > 0 {
            self.kills as f64 / self.deaths as f64
        } else {
            self.kills as f64
        }
    }

    /// Append an audit entry, evicting the oldest once the ring is full.
    pub fn add_log(&mut self, now: DateTime<Utc>, message: impl Into<String>) {
        self.logs.push(FactionLogEntry {
            timestamp: now,
            message: message.into(),
        });
        if self.logs.len() > FACTION_LOG_CAPACITY {
            let overflow = self.logs.len() - FACTION_LOG_CAPACITY;
            self.logs.drain(..overflow);
        }
    }

    pub fn recent_logs(&self, count: usize) -> &[FactionLogEntry] {
        let start = self.logs.len().saturating_sub(count);
        &self.logs[start..]
    }
}

/// Per-player profile, created on first join and kept for the life of the
/// account. The faction reference is a name, validated against the live
/// roster on load; a dangling reference triggers auto-leave.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactionPlayer {
    pub name: String,
    pub faction: Option<String>,
    pub role: Role,
    pub chat_mode: ChatMode,
    /// Personal contribution power. Moves on kills and deaths; its
    /// faction-wide sum feeds the freeze threshold check.
    pub power: f64,
    pub max_power: f64,
    pub kills: u64,
    pub deaths: u64,
    pub money: f64,
    pub joined_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Session-only flags, never persisted across restarts.
    #[serde(skip)]
    pub session: SessionFlags,
    pub schema_version: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFlags {
    pub bypass: bool,
    pub auto_claim: bool,
    pub show_borders: bool,
    pub creative: bool,
}

impl FactionPlayer {
    pub fn new(name: &str, now: DateTime<Utc>, power: f64, max_power: f64) -> Self {
        Self {
            name: name.to_string(),
            faction: None,
            role: Role::Member,
            chat_mode: ChatMode::Global,
            power,
            max_power,
            kills: 0,
            deaths: 0,
            money: 0.0,
            joined_at: now,
            last_seen: now,
            session: SessionFlags::default(),
            schema_version: PLAYER_SCHEMA_VERSION,
        }
    }

    pub fn in_faction(&self) -> bool {
        self.faction.is_some()
    }

    /// Clear the faction reference and everything that only makes sense
    /// while in one.
    pub fn leave_faction(&mut self) {
        self.faction = None;
        self.role = Role::Member;
        self.chat_mode = ChatMode::Global;
    }

    pub fn set_power(&mut self, value: f64) {
        self.power = value.clamp(0.0, self.max_power);
    }

    pub fn add_power(&mut self, amount: f64) {
        self.set_power(self.power + amount);
    }

    pub fn remove_power(&mut self, amount: f64) {
        self.set_power(self.power - amount);
    }

    pub fn kd_ratio(&self) -> f64 {
        if self.deaths > 0 {
            self.kills as f64 / self.deaths as f64
        } else {
            self.kills as f64
        }
    }
}

/// A time-bounded invitation for one player into one faction. Identity for
/// cancellation purposes is the creation instant, not just the key: a
/// re-issued invite must not be expired by the stale callback of the one it
/// replaced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactionInvite {
    pub player: String,
    pub faction: String,
    pub inviter: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl FactionInvite {
    pub fn new(
        player: &str,
        faction: &str,
        inviter: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            player: player.to_string(),
            faction: faction.to_string(),
            inviter: inviter.to_string(),
            created_at,
            expires_at,
            schema_version: INVITE_SCHEMA_VERSION,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
