use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] seda_overlay_common::config::ConfigError),

    #[error(transparent)]
    Chain(#[from] seda_overlay_chain::ChainError),

    #[error(transparent)]
    Identity(#[from] seda_overlay_identity::IdentityError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Generic(String),
}
