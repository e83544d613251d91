use thiserror::Error;

use crate::types::UpgradeId;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown thing type '{id}'")]
    UnknownThingType { id: String },

    #[error("Unknown guy type '{id}'")]
    UnknownGuyType { id: String },

    #[error("Registry '{name}' is empty")]
    EmptyRegistry { name: &'static str },

    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;

/// Reasons an upgrade purchase is refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PurchaseError {
    #[error("Unknown upgrade '{0}'")]
    UnknownUpgrade(UpgradeId),

    #[error("Upgrade '{0}' already purchased")]
    AlreadyPurchased(UpgradeId),

    #[error("Upgrade '{id}' requires '{missing}'")]
    MissingPrerequisite { id: UpgradeId, missing: UpgradeId },

    #[error("Upgrade '{id}' unlocks at round {unlock_round}")]
    Locked { id: UpgradeId, unlock_round: u32 },

    #[error("Upgrade '{id}' costs {cost} stars, {available} available")]
    InsufficientStars { id: UpgradeId, cost: u32, available: u32 },

    #[error("Upgrades can only be bought between rounds")]
    WrongPhase,
}
