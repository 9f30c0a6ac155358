use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Chain(#[from] seda_overlay_chain::ChainError),

    #[error(transparent)]
    Wasm(#[from] seda_overlay_wasm::WasmError),

    #[error(transparent)]
    Identity(#[from] seda_overlay_identity::IdentityError),

    #[error("dr {0} not found in pool")]
    DrNotFound(String),
}
