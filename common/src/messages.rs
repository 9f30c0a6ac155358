//! On-chain message envelopes submitted by the dispatcher, `§4.7`.
//! Field order is immaterial; these are plain `serde_json::Value`-producing
//! structs matching the teacher's `TransactionType` enum convention of
//! `#[serde(rename_all = "snake_case")]` per variant.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeMsg {
    pub public_key: String,
    pub proof: String,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnstakeMsg {
    pub public_key: String,
    pub proof: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawMsg {
    pub public_key: String,
    pub proof: String,
    pub withdraw_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitDataResultMsg {
    pub dr_id: String,
    pub commitment: String,
    pub proof: String,
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealBodyMsg {
    pub dr_id: String,
    pub dr_block_height: u64,
    pub exit_code: u8,
    pub gas_used: u64,
    pub proxy_public_keys: Vec<String>,
    pub reveal_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealDataResultMsg {
    pub public_key: String,
    pub proof: String,
    pub reveal_body: RevealBodyMsg,
    pub stderr: Vec<String>,
    pub stdout: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminMsg {
    Pause {},
    Unpause {},
    AddToAllowlist { public_key: String },
    RemoveFromAllowlist { public_key: String },
    TransferOwnership { new_owner: String },
    AcceptOwnership {},
}

/// Wraps any of the above into the untagged `{ "<kind>": { ... } }` shape
/// Cosmos `MsgExecuteContract` bodies expect.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractMsg {
    Stake(StakeMsg),
    Unstake(UnstakeMsg),
    Withdraw(WithdrawMsg),
    CommitDataResult(CommitDataResultMsg),
    RevealDataResult(RevealDataResultMsg),
    #[serde(untagged)]
    Admin(AdminMsg),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_message_roundtrips() {
        let msg = ContractMsg::CommitDataResult(CommitDataResultMsg {
            dr_id: "abcd".into(),
            commitment: "ef01".into(),
            proof: "12".into(),
            public_key: "03aa".into(),
        });
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed.get("commit_data_result").is_some());
    }

    #[test]
    fn admin_message_is_tagless_inside_its_variant() {
        let msg = ContractMsg::Admin(AdminMsg::Pause {});
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"pause": {}}));
    }
}
