use std::{fmt, str::FromStr};

use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, Secp256k1, SecretKey,
};
use serde::{de::Error as SerdeError, Deserialize, Deserializer, Serialize, Serializer};

use super::hash::Hash;

/// `PrivateKey` never implements `Display`, and its `Debug` output is
/// redacted, so that a stray `{:?}` in a log line cannot leak key material.
#[derive(Clone)]
pub struct PrivateKey(SecretKey);

impl PrivateKey {
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, KeyError> {
        let secret = SecretKey::from_slice(bytes).map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self(secret))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.secret_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        let secp = Secp256k1::signing_only();
        let pk = secp256k1::PublicKey::from_secret_key(&secp, &self.0);
        PublicKey(pk.serialize())
    }

    pub(crate) fn inner(&self) -> &SecretKey {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("invalid secret key bytes")]
    InvalidSecretKey,
    #[error("invalid public key bytes")]
    InvalidPublicKey,
    #[error("invalid signature bytes")]
    InvalidSignature,
}

/// Compressed secp256k1 public key. This is the protocol's `identityId`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey([u8; 33]);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let parsed =
            secp256k1::PublicKey::from_slice(bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self(parsed.serialize()))
    }

    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The `identityId` used as the map key everywhere in the pool and
    /// eligibility selector.
    pub fn identity_id(&self) -> String {
        self.to_hex()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
            .map_err(|_| KeyError::InvalidPublicKey)?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_str(&s).map_err(SerdeError::custom)
    }
}

/// A loaded, process-lifetime keypair for one of the node's controlled
/// identities. Immutable once constructed at startup.
#[derive(Clone)]
pub struct Identity {
    pub index: u32,
    pub private_key: PrivateKey,
    pub public_key: PublicKey,
}

impl Identity {
    pub fn new(index: u32, private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        Self {
            index,
            private_key,
            public_key,
        }
    }

    pub fn id(&self) -> String {
        self.public_key.identity_id()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("index", &self.index)
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// The protocol's VRF-style proof: a recoverable ECDSA signature over a
/// keccak256 message hash. Used both as a selection token and as the
/// authentication proof attached to submitted messages.
#[derive(Clone)]
pub struct Proof(RecoverableSignature);

impl Proof {
    pub fn to_bytes(&self) -> Vec<u8> {
        let (recovery_id, sig) = self.0.serialize_compact();
        let mut out = Vec::with_capacity(65);
        out.extend_from_slice(&sig);
        out.push(recovery_id_to_byte(recovery_id));
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != 65 {
            return Err(KeyError::InvalidSignature);
        }
        let recovery_id = byte_to_recovery_id(bytes[64]).ok_or(KeyError::InvalidSignature)?;
        let sig = RecoverableSignature::from_compact(&bytes[..64], recovery_id)
            .map_err(|_| KeyError::InvalidSignature)?;
        Ok(Self(sig))
    }
}

fn recovery_id_to_byte(id: RecoveryId) -> u8 {
    id.to_i32() as u8
}

fn byte_to_recovery_id(byte: u8) -> Option<RecoveryId> {
    RecoveryId::from_i32(byte as i32).ok()
}

/// Signs the given message hash with the identity's private key, producing
/// the protocol's proof (`§4.7 prove(privateKey, message)`).
pub fn prove(private_key: &PrivateKey, message: &Hash) -> Proof {
    let secp = Secp256k1::signing_only();
    let msg = Message::from_digest(*message.as_bytes());
    Proof(secp.sign_ecdsa_recoverable(&msg, private_key.inner()))
}

/// Convenience wrapper matching `§4.7 sign(identityId, message)`: looks up
/// nothing itself (the caller already holds the identity), it just proves.
pub fn sign(identity: &Identity, message: &Hash) -> Proof {
    prove(&identity.private_key, message)
}
