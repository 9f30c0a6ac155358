//! HTTP diagnostics snapshot, `§6`. The core crate only produces the value;
//! the `cli` crate's `actix-web` server is the one that serves it.

use serde::Serialize;

use seda_overlay_common::model::TaskStatus;

use crate::pool::{count_by_status, DrPool};

#[derive(Debug, Clone, Serialize)]
pub struct TxStats {
    pub queued: u64,
    pub broadcast: u64,
    pub retried: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub actively_executing_size: usize,
    pub eligible_but_waiting_for_execution_size: usize,
    pub data_request_pool_size: usize,
    pub completed_data_requests: usize,
    pub tx_stats: TxStats,
    pub active_identities: Vec<String>,
    pub version: String,
    pub vm_version: String,
}

/// Builds the snapshot from current pool contents; `tx_stats` and
/// `active_identities` are supplied by the caller since they live outside
/// the DR pool (dispatcher counters, loaded identity set).
pub fn build_snapshot(
    pool: &dyn DrPool,
    tx_stats: TxStats,
    active_identities: Vec<String>,
    version: String,
    vm_version: String,
) -> HealthSnapshot {
    let identity_drs = pool.all_identity_drs();

    let eligible = count_by_status(&identity_drs, TaskStatus::EligibleForExecution);
    let executed = count_by_status(&identity_drs, TaskStatus::Executed);
    let committed = count_by_status(&identity_drs, TaskStatus::Committed);
    let ready = count_by_status(&identity_drs, TaskStatus::ReadyToBeRevealed);
    let revealed = count_by_status(&identity_drs, TaskStatus::Revealed);

    HealthSnapshot {
        actively_executing_size: executed + committed + ready,
        eligible_but_waiting_for_execution_size: eligible,
        data_request_pool_size: pool.dr_count(),
        completed_data_requests: revealed,
        tx_stats,
        active_identities,
        version,
        vm_version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::InMemoryDrPool;
    use seda_overlay_common::{crypto::keccak256, model::DataRequest, model::DrStatus};

    fn sample_dr(id: seda_overlay_common::crypto::Hash) -> DataRequest {
        DataRequest {
            id,
            version: 1,
            exec_program_id: seda_overlay_common::crypto::Hash::zero(),
            exec_inputs: vec![],
            exec_gas_limit: 1000,
            tally_program_id: seda_overlay_common::crypto::Hash::zero(),
            tally_inputs: vec![],
            tally_gas_limit: 1000,
            replication_factor: 2,
            consensus_filter: vec![],
            gas_price: 1,
            posted_gas_price: 1,
            memo: vec![],
            payback_address: vec![],
            seda_payload: vec![],
            height: 10,
            status: DrStatus::Committing,
            commits_length: 0,
            last_updated: 0,
        }
    }

    #[test]
    fn snapshot_buckets_tasks_by_status() {
        let pool = InMemoryDrPool::new();
        let id = keccak256(&[b"dr"]);
        pool.insert_dr(sample_dr(id));
        pool.insert_identity_dr(id, "identity-a".to_string(), 10);
        pool.update_identity_dr(id, "identity-a", |t| t.status = TaskStatus::Revealed);
        pool.insert_identity_dr(id, "identity-b".to_string(), 10);

        let snapshot = build_snapshot(
            &pool,
            TxStats {
                queued: 0,
                broadcast: 0,
                retried: 0,
                failed: 0,
            },
            vec!["identity-a".to_string()],
            "0.1.0".to_string(),
            "v1".to_string(),
        );

        assert_eq!(snapshot.data_request_pool_size, 1);
        assert_eq!(snapshot.completed_data_requests, 1);
        assert_eq!(snapshot.eligible_but_waiting_for_execution_size, 1);
    }
}
