use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid mnemonic phrase: {0}")]
    InvalidMnemonic(String),

    #[error("invalid derivation path: {0}")]
    InvalidDerivationPath(String),

    #[error("key derivation failed: {0}")]
    Derivation(String),

    #[error(transparent)]
    Key(#[from] seda_overlay_common::crypto::KeyError),

    #[error(transparent)]
    Chain(#[from] seda_overlay_chain::ChainError),
}
