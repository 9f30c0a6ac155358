pub mod hash;
pub mod hashing;
pub mod keypair;
pub mod vrf;

pub use hash::{keccak256, Hash, Hashable};
pub use keypair::{prove, sign, Identity, KeyError, PrivateKey, Proof, PublicKey};
pub use vrf::verify;
