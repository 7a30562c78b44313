//! Faction data model and rules.
//!
//! The building blocks of the engine: entity records, the membership and
//! alliance registry, the power economy, the claim index, the pure access
//! decision table, invites and cooldowns. Everything here is synchronous
//! in-memory state; the engine layer wires the pieces together and mirrors
//! them to storage.

pub mod access;
pub mod claims;
pub mod cooldown;
pub mod errors;
pub mod invites;
pub mod power;
pub mod roster;
pub mod types;

pub use access::{decide, AccessDecision, AccessMessage, Actor, Territory};
pub use claims::{ClaimIndex, ClaimOutcome};
pub use cooldown::{CooldownKind, CooldownLedger};
pub use errors::FactionError;
pub use invites::InviteBook;
pub use power::{
    add_power, check_freeze_threshold, max_power, record_death, record_kill,
    release_freeze_if_elapsed, remove_power, set_power, trigger_freeze, FreezeEvent,
};
pub use roster::{AllyOutcome, Roster};
pub use types::*;
