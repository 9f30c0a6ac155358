//! The VM invocation contract, `§4.5`/`§4.4`. `VmCallData` is assembled once
//! per DRTask execution and handed to the worker pool unchanged.

use std::collections::BTreeMap;

use seda_overlay_common::crypto::{Hash, PrivateKey};

#[derive(Debug, Clone)]
pub struct VmCallData {
    pub identity_private_key: PrivateKey,
    pub dr_id: Hash,
    pub dr_height: u64,
    pub eligibility_height: u64,
    pub exec_program_id: Hash,
    pub exec_inputs: Vec<u8>,
    pub gas_limit: u64,
    pub env: BTreeMap<String, String>,
}

/// Builds the env map named in `§4.4`'s `EligibleForExecution → Executed`
/// transition. `clamped_gas_limit` is `min(execGasLimit / replicationFactor,
/// maxGasLimit)`, computed by the caller before this is invoked.
pub fn build_env(
    dr_id: Hash,
    dr_height: u64,
    exec_program_id: Hash,
    replication_factor: u16,
    posted_gas_price: u128,
    clamped_gas_limit: u64,
    tally_gas_limit: u64,
    memo: &[u8],
    payback_address: &[u8],
    tally_program_id: Hash,
    tally_inputs: &[u8],
) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("VM_MODE".to_string(), "dr".to_string());
    env.insert("DR_ID".to_string(), dr_id.to_hex());
    env.insert("DR_HEIGHT".to_string(), dr_height.to_string());
    env.insert("EXEC_PROGRAM_ID".to_string(), exec_program_id.to_hex());
    env.insert("DR_REPLICATION_FACTOR".to_string(), replication_factor.to_string());
    env.insert("DR_GAS_PRICE".to_string(), posted_gas_price.to_string());
    env.insert("DR_EXEC_GAS_LIMIT".to_string(), clamped_gas_limit.to_string());
    env.insert("DR_TALLY_GAS_LIMIT".to_string(), tally_gas_limit.to_string());
    env.insert("DR_MEMO".to_string(), hex::encode(memo));
    env.insert("DR_PAYBACK_ADDRESS".to_string(), hex::encode(payback_address));
    env.insert("TALLY_PROGRAM_ID".to_string(), tally_program_id.to_hex());
    env.insert("TALLY_INPUTS".to_string(), hex::encode(tally_inputs));
    env
}
