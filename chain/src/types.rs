use serde::{Deserialize, Serialize};

use seda_overlay_common::crypto::{Hash, PublicKey};
use seda_overlay_common::model::DataRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrConfig {
    /// Number of blocks the `committing` stage lasts before a DR expires.
    pub commit_timeout_in_blocks: u64,
    pub reveal_timeout_in_blocks: u64,
    pub max_exec_inputs_size_bytes: u64,
    pub max_tally_inputs_size_bytes: u64,
    /// `backupDelayInBlocks ≥ 1`, enforced at construction.
    pub backup_delay_in_blocks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staker {
    pub public_key: PublicKey,
    pub tokens_staked: u128,
    pub tokens_pending_withdrawal: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingConfig {
    pub minimum_stake: u128,
    pub allowlist_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub tx_ids: Vec<Hash>,
}

#[derive(Debug, Clone)]
pub struct DrStatusPage {
    pub drs: Vec<DataRequest>,
    pub total: u64,
    pub is_paused: bool,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StakerAndSeq {
    pub staker: Option<Staker>,
    pub seq: u128,
}

/// Cached `{accountNumber, sequence}` for one sub-account's signing client.
/// Updated locally on successful broadcast; invalidated wholesale on a
/// `SequenceMismatch`.
#[derive(Debug, Clone, Copy)]
pub struct AccountInfo {
    pub account_number: u64,
    pub sequence: u64,
}

#[derive(Debug, Clone)]
pub struct TxResult {
    pub tx_hash: Hash,
    pub height: u64,
    pub code: u32,
    pub raw_log: String,
}

impl TxResult {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}
