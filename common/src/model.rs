//! The protocol data model, `§3`. `DataRequest` and `IdentityDataRequest`
//! are owned by the DR pool (`seda_overlay_core`); this crate only defines
//! the shapes so every crate can speak about them without a cyclic
//! dependency on the pool implementation.

use serde::{Deserialize, Serialize};

use crate::crypto::{Hash, PublicKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrStatus {
    Committing,
    Revealing,
    Tallying,
}

/// Authoritative fields mirrored from chain state. At most one record per
/// `id`; updates replace the record wholesale, they never mutate fields in
/// place (so a `DataRequest` handed out by the pool is always a consistent
/// snapshot).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRequest {
    pub id: Hash,
    pub version: u32,
    pub exec_program_id: Hash,
    pub exec_inputs: Vec<u8>,
    pub exec_gas_limit: u64,
    pub tally_program_id: Hash,
    pub tally_inputs: Vec<u8>,
    pub tally_gas_limit: u64,
    pub replication_factor: u16,
    pub consensus_filter: Vec<u8>,
    pub gas_price: u128,
    pub posted_gas_price: u128,
    pub memo: Vec<u8>,
    pub payback_address: Vec<u8>,
    pub seda_payload: Vec<u8>,
    pub height: u64,
    pub status: DrStatus,
    pub commits_length: u32,
    /// Monotonic local timestamp (millis since process start is sufficient;
    /// only used for relative staleness checks), refreshed on every update.
    pub last_updated: u64,
}

impl DataRequest {
    /// `commitsLength < replicationFactor` — still accepting commits.
    pub fn is_in_reveal_stage(&self) -> bool {
        self.commits_length as u32 >= self.replication_factor as u32
    }
}

/// States of the per-(DR, identity) task state machine, `§4.4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    EligibleForExecution,
    Executed,
    Committed,
    ReadyToBeRevealed,
    Revealed,
    Failed,
}

/// A per-(drId, identityId) work item. Owned by the DR pool; created on
/// eligibility, destroyed on terminal status or when the parent DR is
/// removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityDataRequest {
    pub dr_id: Hash,
    pub identity_id: String,
    pub status: TaskStatus,
    pub execution_result: Option<ExecutionResult>,
    pub eligibility_height: u64,
    pub retries: u32,
}

impl IdentityDataRequest {
    pub fn new(dr_id: Hash, identity_id: String, eligibility_height: u64) -> Self {
        Self {
            dr_id,
            identity_id,
            status: TaskStatus::EligibleForExecution,
            execution_result: None,
            eligibility_height,
            retries: 0,
        }
    }
}

/// `exitCode = RESULT_TOO_LARGE` when a reveal is coerced to empty for
/// exceeding the per-replication-factor size bound, `§4.4`.
pub const RESULT_TOO_LARGE: u8 = 255;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealBody {
    pub dr_id: Hash,
    pub dr_block_height: u64,
    pub exit_code: u8,
    pub gas_used: u64,
    pub proxy_public_keys: Vec<PublicKey>,
    pub reveal: Vec<u8>,
}

/// Produced once per DRTask, never mutated — `§3`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub reveal_body: RevealBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasOption {
    Auto,
    Fixed(u64),
}

/// An item in the dispatcher queue, `§3`. Transactions sharing a signer
/// sequence are submitted in sequence order; failures may rewind to a
/// cached `accountInfo`.
#[derive(Debug, Clone)]
pub struct TransactionEntry {
    pub id: u64,
    pub priority: Priority,
    pub messages: Vec<serde_json::Value>,
    pub signer_index: u32,
    pub gas_option: GasOption,
    pub trace_id: String,
}
