use secp256k1::{ecdsa::Signature, Message, Secp256k1};

use super::{
    hash::Hash,
    keypair::{Proof, PublicKey},
};

/// Verifies a proof produced by [`prove`](super::keypair::prove) against the
/// claimed public key and message hash. Used to validate proofs recovered
/// from chain responses or test vectors; the node itself only ever produces
/// proofs, it never needs to verify its own.
pub fn verify(public_key: &PublicKey, message: &Hash, proof: &Proof) -> bool {
    let secp = Secp256k1::verification_only();
    let msg = Message::from_digest(*message.as_bytes());
    let sig: Signature = proof.to_signature();
    let Ok(pk) = secp256k1::PublicKey::from_slice(public_key.as_bytes()) else {
        return false;
    };
    secp.verify_ecdsa(&msg, &sig, &pk).is_ok()
}

impl Proof {
    pub fn to_signature(&self) -> Signature {
        self.clone().into()
    }
}

impl From<Proof> for Signature {
    fn from(proof: Proof) -> Self {
        let bytes = proof.to_bytes();
        // Drop the trailing recovery byte; `Signature` is the 64-byte compact form.
        Signature::from_compact(&bytes[..64]).expect("proof always encodes a valid signature")
    }
}
