use std::sync::Arc;

use tokio::sync::Mutex;

use seda_overlay_common::crypto::Identity;

use crate::types::AccountInfo;

/// One sub-account's signing client: the identity/key material used to sign
/// transactions plus the cached `{accountNumber, sequence}`. Two concurrent
/// broadcasts from the same sub-account serialize through `lock`.
pub struct Signer {
    pub index: u32,
    pub identity: Identity,
    pub address: String,
    cached_info: Mutex<Option<AccountInfo>>,
    /// Serializes broadcast + local sequence bump for this sub-account —
    /// the dispatcher's per-account worker is the only thing that ever
    /// mutates this cache.
    pub lock: Mutex<()>,
}

impl Signer {
    pub fn new(index: u32, identity: Identity, address: String) -> Self {
        Self {
            index,
            identity,
            address,
            cached_info: Mutex::new(None),
            lock: Mutex::new(()),
        }
    }

    pub async fn cached(&self) -> Option<AccountInfo> {
        *self.cached_info.lock().await
    }

    pub async fn set_cached(&self, info: AccountInfo) {
        *self.cached_info.lock().await = Some(info);
    }

    /// Invalidates the cache on a `SequenceMismatch`; the next broadcast
    /// must refetch `accountInfo` from the chain.
    pub async fn invalidate(&self) {
        *self.cached_info.lock().await = None;
    }

    /// Bumps the locally cached sequence after a successful broadcast, so
    /// back-to-back queue drains don't need a round trip per transaction.
    pub async fn advance_sequence(&self) {
        let mut guard = self.cached_info.lock().await;
        if let Some(info) = guard.as_mut() {
            info.sequence += 1;
        }
    }
}

pub type SharedSigner = Arc<Signer>;

/// The fleet of sub-accounts a node signs with. Index 0 is always the
/// funder (`§3`).
pub struct SignerPool {
    signers: Vec<SharedSigner>,
}

impl SignerPool {
    pub fn new(signers: Vec<SharedSigner>) -> Self {
        assert!(!signers.is_empty(), "a node needs at least one sub-account");
        Self { signers }
    }

    pub fn get(&self, index: u32) -> Option<&SharedSigner> {
        self.signers.get(index as usize)
    }

    pub fn funder(&self) -> &SharedSigner {
        &self.signers[0]
    }

    pub fn all(&self) -> &[SharedSigner] {
        &self.signers
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }
}
