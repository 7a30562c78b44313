use thiserror::Error;

/// Errors surfaced by faction rule checks. Every variant maps to a
/// user-facing rejection; none of them indicates engine corruption.
#[derive(Debug, Error, PartialEq)]
pub enum FactionError {
    #[error("faction not found: {0}")]
    FactionNotFound(String),

    #[error("player not found: {0}")]
    PlayerNotFound(String),

    #[error("faction already exists: {0}")]
    FactionExists(String),

    #[error("player is not in a faction")]
    NotInFaction,

    #[error("player already belongs to a faction")]
    AlreadyInFaction,

    #[error("player is not a member of this faction: {0}")]
    NotAMember(String),

    #[error("requires the leader role")]
    LeaderOnly,

    #[error("requires the leader or officer role")]
    OfficerOnly,

    #[error("faction is at its member limit")]
    MemberLimitReached,

    #[error("faction is at its ally limit")]
    AllyLimitReached,

    #[error("faction is at its claim limit")]
    ClaimLimitReached,

    #[error("chunk is already claimed by {0}")]
    AlreadyClaimed(String),

    #[error("chunk is not claimed by this faction")]
    NotClaimedHere,

    #[error("not enough power: requires {required}, have {current}")]
    NotEnoughPower { required: i64, current: i64 },

    #[error("not enough money: requires {required}, have {current}")]
    NotEnoughMoney { required: f64, current: f64 },

    #[error("no pending invite from {0}")]
    NoInvite(String),

    #[error("an invite for this player is already pending")]
    InviteAlreadySent,

    #[error("factions are already allied")]
    AlreadyAllied,

    #[error("factions are not allied")]
    NotAllied,

    #[error("an ally request to this faction is already pending")]
    AllyRequestPending,

    #[error("a faction cannot target itself")]
    SelfTarget,

    #[error("cannot kick this member")]
    KickRefused,

    #[error("no faction home is set")]
    NoHome,

    #[error("home must be inside your own territory")]
    HomeOutsideTerritory,

    #[error("action is on cooldown for {0}s")]
    OnCooldown(i64),

    #[error("alliance chat requires at least one ally")]
    NoAllies,

    #[error("{0}")]
    InvalidName(String),

    #[error("the leader must transfer leadership or disband instead of leaving")]
    LeaderCannotLeave,

    #[error("this action needs a position in the world")]
    MissingPosition,

    #[error("faction rules are not enabled in this world")]
    WorldNotEnabled,

    #[error("amount must be greater than zero")]
    InvalidAmount,
}
