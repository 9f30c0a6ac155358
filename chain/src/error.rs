use thiserror::Error;

/// Broadcast/query failure classification, `§4.1` / `§7`. The retry policy
/// lives next to this enum (see `dispatcher::retry_policy`) so adding a
/// variant forces a decision about whether it's retryable.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("incorrect account sequence")]
    SequenceMismatch,

    #[error("request timed out")]
    Timeout,

    #[error("mempool is full")]
    Mempool,

    #[error("data request already committed")]
    AlreadyCommitted,

    #[error("data request already revealed")]
    AlreadyRevealed,

    #[error("reveal stage already started")]
    RevealStarted,

    #[error("local commitment disagrees with on-chain reveal data")]
    RevealMismatch,

    #[error("data request has expired")]
    DataRequestExpired,

    #[error("data request not found")]
    DataRequestNotFound,

    #[error("chain RPC error: {0}")]
    Generic(String),
}

impl From<String> for ChainError {
    fn from(message: String) -> Self {
        ChainError::classify(&message)
    }
}

impl ChainError {
    /// Classifies a raw error message returned by the chain/mempool into
    /// one of the typed variants above. The chain communicates these as
    /// substrings in broadcast error responses, not as structured codes, so
    /// classification is necessarily string-matching — kept in one place.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("insufficient funds") {
            ChainError::InsufficientFunds
        } else if lower.contains("incorrect account sequence") {
            ChainError::SequenceMismatch
        } else if lower.contains("timed out") || lower.contains("timeout") {
            ChainError::Timeout
        } else if lower.contains("mempool is full") {
            ChainError::Mempool
        } else if lower.contains("already committed") {
            ChainError::AlreadyCommitted
        } else if lower.contains("already revealed") {
            ChainError::AlreadyRevealed
        } else if lower.contains("reveal") && lower.contains("started") {
            ChainError::RevealStarted
        } else if lower.contains("reveal") && lower.contains("mismatch") {
            ChainError::RevealMismatch
        } else if lower.contains("expired") {
            ChainError::DataRequestExpired
        } else if lower.contains("not found") {
            ChainError::DataRequestNotFound
        } else {
            ChainError::Generic(message.to_string())
        }
    }

    /// Whether the dispatcher should retry a failed broadcast carrying this
    /// error, per `§4.1`/`§7`'s failure semantics table.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChainError::SequenceMismatch | ChainError::Mempool | ChainError::Generic(_)
        )
    }
}
