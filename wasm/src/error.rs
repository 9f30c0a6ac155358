use thiserror::Error;

#[derive(Debug, Error)]
pub enum WasmError {
    #[error("oracle program {0} not found on chain")]
    ProgramNotFound(String),

    #[error("failed to read/write program cache: {0}")]
    CacheIo(#[from] std::io::Error),

    #[error(transparent)]
    Chain(#[from] seda_overlay_chain::ChainError),

    #[error("worker pool is shut down")]
    PoolShutDown,

    #[error("vm adapter request blocked: {0}")]
    AdapterBlocked(String),

    #[error("vm execution failed: {0}")]
    Execution(String),
}
