//! Chain client and transaction dispatcher, `§4.1`.

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod signer;
pub mod types;

pub use client::{ChainClient, HttpChainClient, HttpChainClientConfig, SharedChainClient};
pub use dispatcher::{Broadcaster, DispatcherConfig, TxDispatcher};
pub use error::ChainError;
pub use signer::{Signer, SignerPool, SharedSigner};
