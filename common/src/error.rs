use thiserror::Error;

/// Top-level error aggregating every crate's narrow error enum.
///
/// Internal modules match on their own enum directly so retryable vs.
/// terminal variants stay exhaustively matched; this type exists only at
/// the boundary the MainTask logs errors from.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("chain client error: {0}")]
    Chain(String),

    #[error("transaction dispatch error: {0}")]
    Dispatch(String),

    #[error("wasm execution error: {0}")]
    Wasm(String),

    #[error("identity manager error: {0}")]
    Identity(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
