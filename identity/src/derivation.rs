//! BIP-39/BIP-32 key derivation, `§4.6`. A single mnemonic seeds the node's
//! primary identity (account index 0) and every funded sub-account in the
//! fleet, each at its own index under the same coin type.

use bip32::{DerivationPath, XPrv};
use bip39::Mnemonic;

use seda_overlay_common::crypto::{Identity, PrivateKey};

use crate::error::IdentityError;

/// SLIP-44 coin type reserved for SEDA identities; every derivation path in
/// this crate is rooted at `m/44'/{DERIVATION_COIN_TYPE}'/0'/0/i`.
pub const DERIVATION_COIN_TYPE: u32 = 83696865;

fn derive_private_key(mnemonic: &Mnemonic, index: u32) -> Result<PrivateKey, IdentityError> {
    let seed = mnemonic.to_seed("");
    let path: DerivationPath = format!("m/44'/{DERIVATION_COIN_TYPE}'/0'/0/{index}")
        .parse()
        .map_err(|e: bip32::Error| IdentityError::InvalidDerivationPath(e.to_string()))?;

    let xprv = XPrv::derive_from_path(&seed, &path)
        .map_err(|e| IdentityError::Derivation(e.to_string()))?;

    let bytes: [u8; 32] = xprv.private_key().to_bytes().into();
    PrivateKey::from_bytes(&bytes).map_err(IdentityError::from)
}

/// Parses and normalizes the configured mnemonic phrase.
pub fn parse_mnemonic(phrase: &str) -> Result<Mnemonic, IdentityError> {
    Mnemonic::parse_normalized(phrase).map_err(|e| IdentityError::InvalidMnemonic(e.to_string()))
}

/// Derives the node's primary identity, the one that stakes, commits, and
/// reveals on behalf of the fleet.
pub fn derive_identity(mnemonic: &Mnemonic, index: u32) -> Result<Identity, IdentityError> {
    let key = derive_private_key(mnemonic, index)?;
    Ok(Identity::new(index, key))
}

/// Derives one sub-account signer, `§4.6`. Sub-accounts share the identity's
/// coin type but occupy index `>= identities_amount` so they never collide
/// with an identity's own derivation index.
pub fn derive_subaccount(mnemonic: &Mnemonic, index: u32) -> Result<Identity, IdentityError> {
    let key = derive_private_key(mnemonic, index)?;
    Ok(Identity::new(index, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn derivation_is_deterministic() {
        let mnemonic = parse_mnemonic(TEST_MNEMONIC).unwrap();
        let a = derive_identity(&mnemonic, 0).unwrap();
        let b = derive_identity(&mnemonic, 0).unwrap();
        assert_eq!(a.public_key, b.public_key);
    }

    #[test]
    fn distinct_indices_give_distinct_identities() {
        let mnemonic = parse_mnemonic(TEST_MNEMONIC).unwrap();
        let a = derive_subaccount(&mnemonic, 1).unwrap();
        let b = derive_subaccount(&mnemonic, 2).unwrap();
        assert_ne!(a.public_key, b.public_key);
    }

    #[test]
    fn rejects_malformed_mnemonic() {
        assert!(parse_mnemonic("not a real mnemonic phrase").is_err());
    }
}
