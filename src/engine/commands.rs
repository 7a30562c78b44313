//! Command surface of the engine.
//!
//! Each variant of [`Command`] maps onto one player-facing subcommand of the
//! host's `/faction` command. Handlers validate, mutate in-memory state,
//! mirror the touched records, and hand back a [`Reply`] for the host's
//! message templating. Every rejection is a [`FactionError`]; no state is
//! mutated on the rejection path.

use chrono::{DateTime, Utc};
use log::info;

use crate::engine::Engine;
use crate::faction::claims::ClaimOutcome;
use crate::faction::cooldown::CooldownKind;
use crate::faction::errors::FactionError;
use crate::faction::power;
use crate::faction::roster::AllyOutcome;
use crate::faction::types::{ChatMode, ClaimKey, Role, WorldPosition};
use crate::logutil::escape_log;
use crate::validation::{clamp_description, validate_faction_name};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Create { name: String },
    Disband,
    Invite { player: String },
    Accept { faction: String },
    Leave,
    Kick { player: String },
    Promote { player: String },
    Demote { player: String },
    Transfer { player: String },
    Info { faction: Option<String> },
    Describe { text: String },
    Open { open: bool },
    SetHome,
    DelHome,
    Home,
    Claim,
    Unclaim,
    Deposit { amount: f64 },
    Withdraw { amount: f64 },
    Balance,
    Ally { faction: String },
    Unally { faction: String },
    Chat { mode: Option<ChatMode> },
    Border,
    Top { metric: TopMetric, limit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopMetric {
    Power,
    Kills,
}

/// Who issued the command, where they stand, and when.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub player: String,
    pub position: Option<WorldPosition>,
    pub now: DateTime<Utc>,
}

impl CommandContext {
    pub fn new(player: &str, position: Option<WorldPosition>, now: DateTime<Utc>) -> Self {
        Self {
            player: player.to_string(),
            position,
            now,
        }
    }

    fn position(&self) -> Result<&WorldPosition, FactionError> {
        self.position.as_ref().ok_or(FactionError::MissingPosition)
    }
}

/// Faction overview for the `info` command.
#[derive(Debug, Clone, PartialEq)]
pub struct FactionSummary {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub leader: Option<String>,
    pub officers: Vec<String>,
    pub members: Vec<String>,
    pub allies: Vec<String>,
    pub description: String,
    pub power: i64,
    pub max_power: i64,
    pub claims: usize,
    pub money: f64,
    pub kills: u64,
    pub deaths: u64,
    pub raidable: bool,
    pub frozen: bool,
    pub freeze_remaining_secs: i64,
}

/// Successful command outcomes, carrying the data message templates need.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    FactionCreated { faction: String, cost: f64 },
    FactionDisbanded { faction: String },
    InviteSent { player: String, expires_at: DateTime<Utc> },
    JoinedFaction { faction: String },
    LeftFaction { faction: String },
    PlayerKicked { player: String },
    PlayerPromoted { player: String, role: Role },
    PlayerDemoted { player: String, role: Role },
    LeadershipTransferred { player: String },
    FactionInfo(Box<FactionSummary>),
    DescriptionSet,
    OpenChanged { open: bool },
    HomeSet,
    HomeDeleted,
    TeleportHome { position: WorldPosition },
    ChunkClaimed { key: ClaimKey, cost: f64 },
    ChunkUnclaimed { key: ClaimKey },
    Deposited { amount: f64, balance: f64 },
    Withdrawn { amount: f64, balance: f64 },
    Balance { faction: String, money: f64 },
    AllyRequested { faction: String },
    AllyAccepted { faction: String },
    AllianceBroken { faction: String },
    ChatModeChanged { mode: ChatMode },
    BorderToggled { enabled: bool },
    TopFactions { metric: TopMetric, entries: Vec<(String, i64)> },
}

impl Engine {
    /// Execute one command for one player. The player profile is created on
    /// the fly when missing, mirroring first-contact behavior of the join
    /// handler.
    pub fn handle_command(
        &mut self,
        ctx: &CommandContext,
        command: Command,
    ) -> Result<Reply, FactionError> {
        let config = self.config.clone();
        self.roster.ensure_player(&ctx.player, &config, ctx.now);

        match command {
            Command::Create { name } => self.cmd_create(ctx, &name),
            Command::Disband => self.cmd_disband(ctx),
            Command::Invite { player } => self.cmd_invite(ctx, &player),
            Command::Accept { faction } => self.cmd_accept(ctx, &faction),
            Command::Leave => self.cmd_leave(ctx),
            Command::Kick { player } => self.cmd_kick(ctx, &player),
            Command::Promote { player } => self.cmd_promote(ctx, &player),
            Command::Demote { player } => self.cmd_demote(ctx, &player),
            Command::Transfer { player } => self.cmd_transfer(ctx, &player),
            Command::Info { faction } => self.cmd_info(ctx, faction.as_deref()),
            Command::Describe { text } => self.cmd_describe(ctx, &text),
            Command::Open { open } => self.cmd_open(ctx, open),
            Command::SetHome => self.cmd_sethome(ctx),
            Command::DelHome => self.cmd_delhome(ctx),
            Command::Home => self.cmd_home(ctx),
            Command::Claim => self.cmd_claim(ctx),
            Command::Unclaim => self.cmd_unclaim(ctx),
            Command::Deposit { amount } => self.cmd_deposit(ctx, amount),
            Command::Withdraw { amount } => self.cmd_withdraw(ctx, amount),
            Command::Balance => self.cmd_balance(ctx),
            Command::Ally { faction } => self.cmd_ally(ctx, &faction),
            Command::Unally { faction } => self.cmd_unally(ctx, &faction),
            Command::Chat { mode } => self.cmd_chat(ctx, mode),
            Command::Border => self.cmd_border(ctx),
            Command::Top { metric, limit } => self.cmd_top(metric, limit),
        }
    }

    // -- membership --------------------------------------------------------

    fn cmd_create(&mut self, ctx: &CommandContext, raw_name: &str) -> Result<Reply, FactionError> {
        let name = validate_faction_name(raw_name, &self.config.faction)
            .map_err(|e| FactionError::InvalidName(e.to_string()))?;
        if self.roster.faction_exists(&name) {
            return Err(FactionError::FactionExists(name));
        }

        let cost = self.config.costs.create;
        {
            let player = self.require_player(&ctx.player)?;
            if player.in_faction() {
                return Err(FactionError::AlreadyInFaction);
            }
            if player.money < cost {
                return Err(FactionError::NotEnoughMoney {
                    required: cost,
                    current: player.money,
                });
            }
        }

        let config = self.config.clone();
        self.roster
            .create_faction(&name, &ctx.player, &config, ctx.now)?;
        if let Some(player) = self.roster.player_mut(&ctx.player) {
            player.money -= cost;
        }

        self.mirror_faction(&name);
        self.mirror_player(&ctx.player);
        Ok(Reply::FactionCreated { faction: name, cost })
    }

    fn cmd_disband(&mut self, ctx: &CommandContext) -> Result<Reply, FactionError> {
        let faction_name = self.require_role(&ctx.player, Role::Leader)?;

        let members = self
            .roster
            .faction(&faction_name)
            .map(|f| f.all_members())
            .unwrap_or_default();

        let removed_claims: Vec<ClaimKey> = self
            .claims
            .faction_claims(&faction_name)
            .map(|c| c.key.clone())
            .collect();
        self.claims.delete_faction_claims(&faction_name);

        let dropped_invites: Vec<(String, String)> = self
            .invites
            .iter()
            .filter(|i| i.faction == faction_name)
            .map(|i| (i.player.clone(), i.faction.clone()))
            .collect();
        self.invites.remove_faction_invites(&faction_name);

        self.roster.disband_faction(&faction_name)?;

        for key in &removed_claims {
            self.mirror_claim(key);
        }
        for (player, faction) in &dropped_invites {
            self.mirror_invite_removed(player, faction);
        }
        self.mirror_faction(&faction_name);
        for member in &members {
            self.mirror_player(member);
        }

        info!("faction {} disbanded by {}", escape_log(&faction_name), escape_log(&ctx.player));
        Ok(Reply::FactionDisbanded {
            faction: faction_name,
        })
    }

    fn cmd_invite(&mut self, ctx: &CommandContext, target: &str) -> Result<Reply, FactionError> {
        if target == ctx.player {
            return Err(FactionError::SelfTarget);
        }
        let faction_name = self.require_manager(&ctx.player)?;

        let target_player = self
            .roster
            .player(target)
            .ok_or_else(|| FactionError::PlayerNotFound(target.to_string()))?;
        if target_player.in_faction() {
            return Err(FactionError::AlreadyInFaction);
        }

        let unlimited = self.has_unlimited_override(&ctx.player);
        let member_count = self
            .roster
            .faction(&faction_name)
            .map(|f| f.member_count())
            .unwrap_or(0);
        if !unlimited && member_count >= self.config.faction.max_members {
            return Err(FactionError::MemberLimitReached);
        }

        let invite = self.invites.send(
            target,
            &faction_name,
            &ctx.player,
            self.config.faction.invite_expiry_secs,
            ctx.now,
        )?;
        let expires_at = invite.expires_at;
        self.mirror_invite(&invite);

        Ok(Reply::InviteSent {
            player: target.to_string(),
            expires_at,
        })
    }

    fn cmd_accept(&mut self, ctx: &CommandContext, faction_name: &str) -> Result<Reply, FactionError> {
        if self.require_player(&ctx.player)?.in_faction() {
            return Err(FactionError::AlreadyInFaction);
        }

        // A vanished faction invalidates the invite; heal silently.
        if !self.roster.faction_exists(faction_name) {
            self.invites.remove(&ctx.player, faction_name);
            self.mirror_invite_removed(&ctx.player, faction_name);
            return Err(FactionError::FactionNotFound(faction_name.to_string()));
        }

        // Open factions admit anyone; closed ones require a live invite.
        let open = self
            .roster
            .faction(faction_name)
            .map(|f| f.open)
            .unwrap_or(false);
        let inviter = self
            .invites
            .invite(&ctx.player, faction_name, ctx.now)
            .map(|i| i.inviter.clone());
        if !open && inviter.is_none() {
            return Err(FactionError::NoInvite(faction_name.to_string()));
        }

        let unlimited = inviter
            .as_deref()
            .map(|name| self.has_unlimited_override(name))
            .unwrap_or(false);
        let member_count = self
            .roster
            .faction(faction_name)
            .map(|f| f.member_count())
            .unwrap_or(0);
        if !unlimited && member_count >= self.config.faction.max_members {
            return Err(FactionError::MemberLimitReached);
        }

        self.invites.take(&ctx.player, faction_name, ctx.now);
        self.roster.add_member(faction_name, &ctx.player, ctx.now)?;
        self.mirror_invite_removed(&ctx.player, faction_name);
        self.mirror_faction(faction_name);
        self.mirror_player(&ctx.player);

        Ok(Reply::JoinedFaction {
            faction: faction_name.to_string(),
        })
    }

    fn cmd_leave(&mut self, ctx: &CommandContext) -> Result<Reply, FactionError> {
        let (faction_name, role) = self.membership_of(&ctx.player)?;
        if role == Role::Leader {
            return Err(FactionError::LeaderCannotLeave);
        }

        self.roster.remove_member(&faction_name, &ctx.player, ctx.now)?;
        self.mirror_faction(&faction_name);
        self.mirror_player(&ctx.player);
        Ok(Reply::LeftFaction {
            faction: faction_name,
        })
    }

    fn cmd_kick(&mut self, ctx: &CommandContext, target: &str) -> Result<Reply, FactionError> {
        if target == ctx.player {
            return Err(FactionError::SelfTarget);
        }
        let (faction_name, actor_role) = self.membership_of(&ctx.player)?;

        let target_role = self
            .roster
            .faction(&faction_name)
            .and_then(|f| f.role_of(target))
            .ok_or_else(|| FactionError::NotAMember(target.to_string()))?;

        // Leaders may kick anyone below them; officers only plain members.
        let allowed = match actor_role {
            Role::Leader => target_role != Role::Leader,
            Role::Officer => target_role == Role::Member,
            Role::Member => false,
        };
        if !allowed {
            return Err(FactionError::KickRefused);
        }

        self.roster.remove_member(&faction_name, target, ctx.now)?;
        self.mirror_faction(&faction_name);
        self.mirror_player(target);
        Ok(Reply::PlayerKicked {
            player: target.to_string(),
        })
    }

    fn cmd_promote(&mut self, ctx: &CommandContext, target: &str) -> Result<Reply, FactionError> {
        let faction_name = self.require_role(&ctx.player, Role::Leader)?;
        self.roster.promote(&faction_name, target, ctx.now)?;
        self.mirror_faction(&faction_name);
        self.mirror_player(target);
        Ok(Reply::PlayerPromoted {
            player: target.to_string(),
            role: Role::Officer,
        })
    }

    fn cmd_demote(&mut self, ctx: &CommandContext, target: &str) -> Result<Reply, FactionError> {
        let faction_name = self.require_role(&ctx.player, Role::Leader)?;
        self.roster.demote(&faction_name, target, ctx.now)?;
        self.mirror_faction(&faction_name);
        self.mirror_player(target);
        Ok(Reply::PlayerDemoted {
            player: target.to_string(),
            role: Role::Member,
        })
    }

    fn cmd_transfer(&mut self, ctx: &CommandContext, target: &str) -> Result<Reply, FactionError> {
        let faction_name = self.require_role(&ctx.player, Role::Leader)?;
        self.roster
            .transfer_leadership(&faction_name, target, ctx.now)?;
        self.mirror_faction(&faction_name);
        self.mirror_player(&ctx.player);
        self.mirror_player(target);
        Ok(Reply::LeadershipTransferred {
            player: target.to_string(),
        })
    }

    fn cmd_info(&mut self, ctx: &CommandContext, name: Option<&str>) -> Result<Reply, FactionError> {
        let faction_name = match name {
            Some(name) => name.to_string(),
            None => self.membership_of(&ctx.player)?.0,
        };
        let faction = self
            .roster
            .faction(&faction_name)
            .ok_or_else(|| FactionError::FactionNotFound(faction_name.clone()))?;

        let summary = FactionSummary {
            name: faction.name.clone(),
            created_at: faction.created_at,
            leader: faction.leader.clone(),
            officers: faction.officers.clone(),
            members: faction.members.clone(),
            allies: faction.allies.clone(),
            description: faction.description.clone(),
            power: faction.power,
            max_power: power::max_power(faction, &self.config.power),
            claims: self.claims.faction_claim_count(&faction.name),
            money: faction.money,
            kills: faction.kills,
            deaths: faction.deaths,
            raidable: faction.is_raidable(),
            frozen: faction.freeze,
            freeze_remaining_secs: faction.remaining_freeze(ctx.now).num_seconds(),
        };
        Ok(Reply::FactionInfo(Box::new(summary)))
    }

    fn cmd_describe(&mut self, ctx: &CommandContext, text: &str) -> Result<Reply, FactionError> {
        let faction_name = self.require_manager(&ctx.player)?;
        let clamped = clamp_description(text, self.config.faction.max_description_length);
        if let Some(faction) = self.roster.faction_mut(&faction_name) {
            faction.description = clamped;
            faction.add_log(ctx.now, "Description updated");
        }
        self.mirror_faction(&faction_name);
        Ok(Reply::DescriptionSet)
    }

    fn cmd_open(&mut self, ctx: &CommandContext, open: bool) -> Result<Reply, FactionError> {
        let faction_name = self.require_role(&ctx.player, Role::Leader)?;
        if let Some(faction) = self.roster.faction_mut(&faction_name) {
            faction.open = open;
            faction.add_log(
                ctx.now,
                if open { "Faction opened to the public" } else { "Faction closed to the public" },
            );
        }
        self.mirror_faction(&faction_name);
        Ok(Reply::OpenChanged { open })
    }

    // -- home --------------------------------------------------------------

    fn cmd_sethome(&mut self, ctx: &CommandContext) -> Result<Reply, FactionError> {
        let faction_name = self.require_manager(&ctx.player)?;
        let position = ctx.position()?.clone();

        let key = ClaimKey::from_position(&position);
        let owned_here = self
            .claims
            .claim_at(&key)
            .map(|c| c.faction == faction_name)
            .unwrap_or(false);
        if !owned_here {
            return Err(FactionError::HomeOutsideTerritory);
        }

        if let Some(faction) = self.roster.faction_mut(&faction_name) {
            faction.home = Some(position);
            faction.add_log(ctx.now, "Home location updated");
        }
        self.mirror_faction(&faction_name);
        Ok(Reply::HomeSet)
    }

    fn cmd_delhome(&mut self, ctx: &CommandContext) -> Result<Reply, FactionError> {
        let faction_name = self.require_manager(&ctx.player)?;
        let faction = self
            .roster
            .faction_mut(&faction_name)
            .ok_or_else(|| FactionError::FactionNotFound(faction_name.clone()))?;
        if faction.home.is_none() {
            return Err(FactionError::NoHome);
        }
        faction.home = None;
        faction.add_log(ctx.now, "Home location cleared");
        self.mirror_faction(&faction_name);
        Ok(Reply::HomeDeleted)
    }

    fn cmd_home(&mut self, ctx: &CommandContext) -> Result<Reply, FactionError> {
        let (faction_name, _) = self.membership_of(&ctx.player)?;
        let home = self
            .roster
            .faction(&faction_name)
            .and_then(|f| f.home.clone())
            .ok_or(FactionError::NoHome)?;

        if self
            .cooldowns
            .active(&ctx.player, &CooldownKind::HomeTeleport, ctx.now)
        {
            let remaining =
                self.cooldowns
                    .remaining_secs(&ctx.player, &CooldownKind::HomeTeleport, ctx.now);
            return Err(FactionError::OnCooldown(remaining));
        }
        self.cooldowns.start(
            &ctx.player,
            CooldownKind::HomeTeleport,
            self.config.cooldowns.home_secs,
            ctx.now,
        );

        Ok(Reply::TeleportHome { position: home })
    }

    // -- territory ---------------------------------------------------------

    fn cmd_claim(&mut self, ctx: &CommandContext) -> Result<Reply, FactionError> {
        let faction_name = self.require_manager(&ctx.player)?;
        let position = ctx.position()?;
        if !self.config.faction.applies_in_world(&position.world) {
            return Err(FactionError::WorldNotEnabled);
        }
        let key = ClaimKey::from_position(position);

        if let Some(existing) = self.claims.claim_at(&key) {
            return Err(FactionError::AlreadyClaimed(existing.faction.clone()));
        }

        // Command-layer power gate: holding n+1 claims requires
        // claims_per_power * (n+1) faction power.
        let claim_count = self.claims.faction_claim_count(&faction_name);
        let required = self.config.power.claims_per_power * (claim_count as i64 + 1);
        let current = self
            .roster
            .faction(&faction_name)
            .map(|f| f.power)
            .unwrap_or(0);
        if current < required {
            return Err(FactionError::NotEnoughPower { required, current });
        }

        let cost = self.config.costs.claim;
        {
            let player = self.require_player(&ctx.player)?;
            if player.money < cost {
                return Err(FactionError::NotEnoughMoney {
                    required: cost,
                    current: player.money,
                });
            }
        }

        let unlimited = self.has_unlimited_override(&ctx.player);
        match self.claims.create_claim(
            &faction_name,
            key.clone(),
            unlimited,
            self.config.faction.max_claims,
            ctx.now,
        ) {
            ClaimOutcome::Created => {}
            ClaimOutcome::AlreadyClaimed(owner) => return Err(FactionError::AlreadyClaimed(owner)),
            ClaimOutcome::LimitReached => return Err(FactionError::ClaimLimitReached),
        }

        if let Some(player) = self.roster.player_mut(&ctx.player) {
            player.money -= cost;
        }
        if let Some(faction) = self.roster.faction_mut(&faction_name) {
            faction.add_log(
                ctx.now,
                format!("Claimed chunk {},{} in {}", key.chunk_x, key.chunk_z, key.world),
            );
        }

        self.mirror_claim(&key);
        self.mirror_player(&ctx.player);
        self.mirror_faction(&faction_name);
        Ok(Reply::ChunkClaimed { key, cost })
    }

    fn cmd_unclaim(&mut self, ctx: &CommandContext) -> Result<Reply, FactionError> {
        let faction_name = self.require_manager(&ctx.player)?;
        let position = ctx.position()?;
        let key = ClaimKey::from_position(position);

        let owned_here = self
            .claims
            .claim_at(&key)
            .map(|c| c.faction == faction_name)
            .unwrap_or(false);
        if !owned_here {
            return Err(FactionError::NotClaimedHere);
        }

        self.claims.delete_claim(&key);
        if let Some(faction) = self.roster.faction_mut(&faction_name) {
            faction.add_log(
                ctx.now,
                format!("Unclaimed chunk {},{} in {}", key.chunk_x, key.chunk_z, key.world),
            );
        }
        self.mirror_claim(&key);
        self.mirror_faction(&faction_name);
        Ok(Reply::ChunkUnclaimed { key })
    }

    // -- bank --------------------------------------------------------------

    fn cmd_deposit(&mut self, ctx: &CommandContext, amount: f64) -> Result<Reply, FactionError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(FactionError::InvalidAmount);
        }
        let (faction_name, _) = self.membership_of(&ctx.player)?;
        {
            let player = self.require_player(&ctx.player)?;
            if player.money < amount {
                return Err(FactionError::NotEnoughMoney {
                    required: amount,
                    current: player.money,
                });
            }
        }

        if let Some(player) = self.roster.player_mut(&ctx.player) {
            player.money -= amount;
        }
        let balance = {
            let faction = self
                .roster
                .faction_mut(&faction_name)
                .ok_or_else(|| FactionError::FactionNotFound(faction_name.clone()))?;
            faction.money += amount;
            faction.money
        };

        self.mirror_player(&ctx.player);
        self.mirror_faction(&faction_name);
        Ok(Reply::Deposited { amount, balance })
    }

    fn cmd_withdraw(&mut self, ctx: &CommandContext, amount: f64) -> Result<Reply, FactionError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(FactionError::InvalidAmount);
        }
        let faction_name = self.require_manager(&ctx.player)?;

        let balance = {
            let faction = self
                .roster
                .faction_mut(&faction_name)
                .ok_or_else(|| FactionError::FactionNotFound(faction_name.clone()))?;
            if faction.money < amount {
                return Err(FactionError::NotEnoughMoney {
                    required: amount,
                    current: faction.money,
                });
            }
            faction.money -= amount;
            faction.money
        };
        if let Some(player) = self.roster.player_mut(&ctx.player) {
            player.money += amount;
        }

        self.mirror_player(&ctx.player);
        self.mirror_faction(&faction_name);
        Ok(Reply::Withdrawn { amount, balance })
    }

    fn cmd_balance(&mut self, ctx: &CommandContext) -> Result<Reply, FactionError> {
        let (faction_name, _) = self.membership_of(&ctx.player)?;
        let money = self
            .roster
            .faction(&faction_name)
            .map(|f| f.money)
            .unwrap_or(0.0);
        Ok(Reply::Balance {
            faction: faction_name,
            money,
        })
    }

    // -- diplomacy ---------------------------------------------------------

    fn cmd_ally(&mut self, ctx: &CommandContext, target: &str) -> Result<Reply, FactionError> {
        let faction_name = self.require_role(&ctx.player, Role::Leader)?;
        if faction_name == target {
            return Err(FactionError::SelfTarget);
        }
        if !self.roster.faction_exists(target) {
            return Err(FactionError::FactionNotFound(target.to_string()));
        }

        let (ally_count, faction_power) = self
            .roster
            .faction(&faction_name)
            .map(|f| (f.allies.len(), f.power))
            .unwrap_or((0, 0));
        if self.roster.are_factions_allied(&faction_name, target) {
            return Err(FactionError::AlreadyAllied);
        }
        if !self.has_unlimited_override(&ctx.player)
            && ally_count >= self.config.faction.max_allies
        {
            return Err(FactionError::AllyLimitReached);
        }
        let required = self.config.power.ally_power_requirement(ally_count);
        if faction_power < required {
            return Err(FactionError::NotEnoughPower {
                required,
                current: faction_power,
            });
        }

        match self.roster.request_ally(&faction_name, target, ctx.now)? {
            AllyOutcome::Accepted => {
                self.mirror_faction(&faction_name);
                self.mirror_faction(target);
                Ok(Reply::AllyAccepted {
                    faction: target.to_string(),
                })
            }
            AllyOutcome::RequestSent => {
                self.mirror_faction(&faction_name);
                Ok(Reply::AllyRequested {
                    faction: target.to_string(),
                })
            }
        }
    }

    fn cmd_unally(&mut self, ctx: &CommandContext, target: &str) -> Result<Reply, FactionError> {
        let faction_name = self.require_role(&ctx.player, Role::Leader)?;
        self.roster.remove_ally(&faction_name, target, ctx.now)?;
        self.mirror_faction(&faction_name);
        self.mirror_faction(target);
        Ok(Reply::AllianceBroken {
            faction: target.to_string(),
        })
    }

    // -- session -----------------------------------------------------------

    fn cmd_chat(&mut self, ctx: &CommandContext, mode: Option<ChatMode>) -> Result<Reply, FactionError> {
        let (faction_name, _) = self.membership_of(&ctx.player)?;

        let current = self.require_player(&ctx.player)?.chat_mode;
        let has_allies = self
            .roster
            .faction(&faction_name)
            .map(|f| !f.allies.is_empty())
            .unwrap_or(false);

        // No explicit mode cycles global -> faction -> alliance -> global,
        // skipping alliance chat while the faction has no allies.
        let requested = mode.unwrap_or(match current {
            ChatMode::Global => ChatMode::Faction,
            ChatMode::Faction if has_allies => ChatMode::Alliance,
            ChatMode::Faction | ChatMode::Alliance => ChatMode::Global,
        });

        if requested == ChatMode::Alliance && !has_allies {
            return Err(FactionError::NoAllies);
        }

        if let Some(player) = self.roster.player_mut(&ctx.player) {
            player.chat_mode = requested;
        }
        Ok(Reply::ChatModeChanged { mode: requested })
    }

    fn cmd_border(&mut self, ctx: &CommandContext) -> Result<Reply, FactionError> {
        if self
            .cooldowns
            .active(&ctx.player, &CooldownKind::BorderToggle, ctx.now)
        {
            let remaining =
                self.cooldowns
                    .remaining_secs(&ctx.player, &CooldownKind::BorderToggle, ctx.now);
            return Err(FactionError::OnCooldown(remaining));
        }
        self.cooldowns.start(
            &ctx.player,
            CooldownKind::BorderToggle,
            self.config.cooldowns.border_toggle_secs,
            ctx.now,
        );

        let player = self
            .roster
            .player_mut(&ctx.player)
            .ok_or_else(|| FactionError::PlayerNotFound(ctx.player.clone()))?;
        player.session.show_borders = !player.session.show_borders;
        Ok(Reply::BorderToggled {
            enabled: player.session.show_borders,
        })
    }

    fn cmd_top(&mut self, metric: TopMetric, limit: usize) -> Result<Reply, FactionError> {
        let entries = match metric {
            TopMetric::Power => self
                .roster
                .top_by_power(limit)
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            TopMetric::Kills => self
                .roster
                .top_by_kills(limit)
                .into_iter()
                .map(|(name, value)| (name.to_string(), value as i64))
                .collect(),
        };
        Ok(Reply::TopFactions { metric, entries })
    }

    // -- shared guards -----------------------------------------------------

    fn require_player(&self, name: &str) -> Result<&crate::faction::types::FactionPlayer, FactionError> {
        self.roster
            .player(name)
            .ok_or_else(|| FactionError::PlayerNotFound(name.to_string()))
    }

    /// Faction name and role of a player, or `NotInFaction`.
    fn membership_of(&self, player: &str) -> Result<(String, Role), FactionError> {
        let profile = self.require_player(player)?;
        let faction_name = profile.faction.clone().ok_or(FactionError::NotInFaction)?;
        let role = self
            .roster
            .faction(&faction_name)
            .and_then(|f| f.role_of(player))
            .ok_or(FactionError::NotInFaction)?;
        Ok((faction_name, role))
    }

    /// Leader or officer.
    fn require_manager(&self, player: &str) -> Result<String, FactionError> {
        let (faction_name, role) = self.membership_of(player)?;
        if !role.can_manage() {
            return Err(FactionError::OfficerOnly);
        }
        Ok(faction_name)
    }

    fn require_role(&self, player: &str, required: Role) -> Result<String, FactionError> {
        let (faction_name, role) = self.membership_of(player)?;
        if role != required {
            return Err(match required {
                Role::Leader => FactionError::LeaderOnly,
                _ => FactionError::OfficerOnly,
            });
        }
        Ok(faction_name)
    }

    /// Session bypass doubles as the "unlimited members/claims/allies"
    /// override the host grants to administrators.
    fn has_unlimited_override(&self, player: &str) -> bool {
        self.roster
            .player(player)
            .map(|p| p.session.bypass)
            .unwrap_or(false)
    }
}
