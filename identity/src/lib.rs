//! Mnemonic-derived identities and sub-account fleet management, `§4.6`.

pub mod derivation;
pub mod error;
pub mod funder;
pub mod rewards;

pub use derivation::{derive_identity, derive_subaccount, DERIVATION_COIN_TYPE};
pub use error::IdentityError;
pub use funder::{ensure_funded, SubAccountFundingPlan};
pub use rewards::spawn_rewards_withdrawal_loop;
