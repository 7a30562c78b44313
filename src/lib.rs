//! # Clanforge - Faction and Territory Engine
//!
//! Clanforge is a faction/territory management engine for chunk-based
//! multiplayer worlds. Players form factions, claim chunk territory, accrue
//! a depletable "power" resource that gates claiming and raiding, and enter
//! temporary raid-protection freezes when their power collapses. The engine
//! mediates PvP, block protection, territory transitions and alliance
//! diplomacy; the host game server forwards events in and applies the
//! decisions coming back.
//!
//! ## Features
//!
//! - **Single decision table**: movement, block edits, interactions and
//!   border coloring all consult one pure access function, so protections
//!   can never disagree with each other.
//! - **Power economy**: live-derived power ceilings, saturating balances,
//!   and a Stable → Raidable → Frozen → Stable raid state machine.
//! - **Territory index**: O(1) chunk lookup, adjacency and flood-fill
//!   connectivity reporting, capacity and power gating on claims.
//! - **Diplomacy**: two-phase ally handshake with symmetric alliance state
//!   and time-bounded invites with identity-checked expiry.
//! - **Optimistic persistence**: in-memory state is authoritative; a sled
//!   mirror receives best-effort writes plus a periodic full resync.
//! - **Async host loop**: the binary drives ticks with Tokio intervals; the
//!   engine core itself is synchronous and single-threaded.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clanforge::config::Config;
//! use clanforge::engine::Engine;
//! use clanforge::storage::FactionStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let store = FactionStore::open(&config.storage.data_dir)?;
//!     let mut engine = Engine::new(config, store);
//!     engine.load(chrono::Utc::now());
//!
//!     let notices = engine.tick(chrono::Utc::now());
//!     println!("{} notices", notices.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`faction`] - entity records, power economy, claims, access rules
//! - [`engine`] - component wiring, command surface, game-event adapters
//! - [`storage`] - sled-backed mirror store
//! - [`config`] - configuration management and defaults
//! - [`validation`] - faction/player name validation

pub mod config;
pub mod engine;
pub mod faction;
pub mod logutil;
pub mod storage;
pub mod validation;
