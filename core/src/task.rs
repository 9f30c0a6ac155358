//! Per-(DR, identity) task state machine, `§4.4`. One `run` call drives a
//! single `IdentityDataRequest` from `EligibleForExecution` through to a
//! terminal status; the pool entry is removed when it stops, regardless of
//! how it stopped.

use std::{sync::Arc, time::Duration};

use log::{error, info, warn};

use seda_overlay_chain::{ChainClient, ChainError, TxDispatcher};
use seda_overlay_common::{
    crypto::{hashing, sign, Identity},
    messages::{CommitDataResultMsg, ContractMsg, RevealBodyMsg, RevealDataResultMsg},
    model::{DataRequest, ExecutionResult, GasOption, Priority, RevealBody, TaskStatus, RESULT_TOO_LARGE},
};
use seda_overlay_wasm::{build_env, HttpVmAdapter, ProgramCache, VmCallData, WorkerPool};

use crate::{error::CoreError, pool::DrPool};

pub struct DrTaskConfig {
    pub chain_id: String,
    pub core_contract_address: String,
    pub max_gas_limit: u64,
    pub gas_adjustment_factor: f64,
    pub max_retries: u32,
    pub sleep_between_failed_tx: Duration,
    pub status_check_interval: Duration,
    pub dr_task_interval: Duration,
    pub block_localhost: bool,
    pub gas_estimations_enabled: bool,
}

pub struct DrTaskContext {
    pub client: Arc<dyn ChainClient>,
    pub dispatcher: Arc<TxDispatcher>,
    pub pool: Arc<dyn DrPool>,
    pub program_cache: Arc<ProgramCache>,
    pub worker_pool: Arc<WorkerPool>,
    pub config: DrTaskConfig,
}

/// Drives one `(dr_id, identity)` pair to completion. Returns once the task
/// reaches `Revealed` or `Failed`, or the DR disappears from the pool.
pub async fn run(ctx: Arc<DrTaskContext>, dr_id: seda_overlay_common::crypto::Hash, identity: Identity, signer_index: u32) {
    let identity_id = identity.id();
    let mut last_status_check = tokio::time::Instant::now();

    loop {
        let Some(dr) = ctx.pool.get_dr(dr_id) else {
            info!("dr {dr_id} disappeared from pool, stopping task for {identity_id}");
            break;
        };
        let Some(task) = ctx.pool.get_identity_dr(dr_id, &identity_id) else {
            break;
        };

        if task.status == TaskStatus::Failed {
            break;
        }

        if last_status_check.elapsed() >= ctx.config.status_check_interval {
            last_status_check = tokio::time::Instant::now();
            if refresh_dr(&ctx, dr_id).await.is_none() {
                break;
            }
        }

        let result = step(&ctx, &dr, &identity, signer_index).await;

        match result {
            Ok(StepOutcome::Advance(next)) => {
                ctx.pool.update_identity_dr(dr_id, &identity_id, |t| {
                    t.status = next;
                    t.retries = 0;
                });
                if next == TaskStatus::Revealed {
                    info!("dr {dr_id} identity {identity_id} revealed");
                    break;
                }
            }
            Ok(StepOutcome::Stop) => {
                break;
            }
            Ok(StepOutcome::Wait) => {
                tokio::time::sleep(ctx.config.dr_task_interval).await;
            }
            Err(e) => {
                warn!("dr {dr_id} identity {identity_id} step failed: {e}");
                let retries = task.retries + 1;
                if retries >= ctx.config.max_retries {
                    error!("dr {dr_id} identity {identity_id} exhausted retries, marking failed");
                    ctx.pool.update_identity_dr(dr_id, &identity_id, |t| t.status = TaskStatus::Failed);
                    break;
                }
                ctx.pool.update_identity_dr(dr_id, &identity_id, |t| t.retries = retries);
                tokio::time::sleep(ctx.config.sleep_between_failed_tx).await;
            }
        }
    }

    ctx.pool.delete_identity_dr(dr_id, &identity_id);
}

async fn refresh_dr(ctx: &DrTaskContext, dr_id: seda_overlay_common::crypto::Hash) -> Option<DataRequest> {
    match ctx.client.query_dr(dr_id).await {
        Ok(Some(mut dr)) => {
            dr.last_updated = crate::discovery::now_millis();
            ctx.pool.insert_dr(dr.clone());
            Some(dr)
        }
        Ok(None) => {
            warn!("dr {dr_id} absent on chain during refresh, removing");
            ctx.pool.delete_dr(dr_id);
            None
        }
        Err(e) => {
            warn!("failed to refresh dr {dr_id}: {e}");
            ctx.pool.get_dr(dr_id)
        }
    }
}

enum StepOutcome {
    Advance(TaskStatus),
    Wait,
    Stop,
}

async fn step(
    ctx: &DrTaskContext,
    dr: &DataRequest,
    identity: &Identity,
    signer_index: u32,
) -> Result<StepOutcome, CoreError> {
    let identity_id = identity.id();
    let Some(task) = ctx.pool.get_identity_dr(dr.id, &identity_id) else {
        return Ok(StepOutcome::Stop);
    };

    match task.status {
        TaskStatus::EligibleForExecution => execute(ctx, dr, identity, task.eligibility_height).await,
        TaskStatus::Executed => commit(ctx, dr, identity, signer_index, task.execution_result.as_ref()).await,
        TaskStatus::Committed => {
            if dr.is_in_reveal_stage() {
                Ok(StepOutcome::Advance(TaskStatus::ReadyToBeRevealed))
            } else {
                Ok(StepOutcome::Wait)
            }
        }
        TaskStatus::ReadyToBeRevealed => reveal(ctx, dr, identity, signer_index, task.execution_result.as_ref()).await,
        TaskStatus::Revealed | TaskStatus::Failed => Ok(StepOutcome::Stop),
    }
}

async fn execute(
    ctx: &DrTaskContext,
    dr: &DataRequest,
    identity: &Identity,
    eligibility_height: u64,
) -> Result<StepOutcome, CoreError> {
    let module = ctx.program_cache.get_oracle_program(&*ctx.client, dr.exec_program_id).await?;

    let clamped_gas_limit = (dr.exec_gas_limit / dr.replication_factor as u64).min(ctx.config.max_gas_limit);

    let env = build_env(
        dr.id,
        dr.height,
        dr.exec_program_id,
        dr.replication_factor,
        dr.posted_gas_price,
        clamped_gas_limit,
        dr.tally_gas_limit,
        &dr.memo,
        &dr.payback_address,
        dr.tally_program_id,
        &dr.tally_inputs,
    );

    let call_data = VmCallData {
        identity_private_key: identity.private_key.clone(),
        dr_id: dr.id,
        dr_height: dr.height,
        eligibility_height,
        exec_program_id: dr.exec_program_id,
        exec_inputs: dr.exec_inputs.clone(),
        gas_limit: clamped_gas_limit,
        env,
    };

    let adapter = HttpVmAdapter::new(
        identity.clone(),
        dr.id,
        ctx.config.chain_id.clone(),
        ctx.config.core_contract_address.clone(),
        ctx.config.block_localhost,
    );

    let output = ctx
        .worker_pool
        .execute(dr.id, dr.height, &module, &call_data, &adapter)
        .await?;

    let max_reveal = 24_000 / dr.replication_factor as usize;
    let (reveal, exit_code, stderr) = if output.result.len() > max_reveal {
        let mut stderr = vec![format!(
            "Reveal size {} bytes exceeds the limit {} bytes",
            output.result.len(),
            max_reveal
        )];
        stderr.extend(output.stderr.iter().cloned());
        (Vec::new(), RESULT_TOO_LARGE, stderr)
    } else {
        (output.result.clone(), output.exit_code, output.stderr.clone())
    };

    let proxy_public_keys = output
        .used_proxy_public_keys
        .iter()
        .filter_map(|bytes| seda_overlay_common::crypto::PublicKey::from_bytes(bytes).ok())
        .collect();

    let execution_result = ExecutionResult {
        stdout: output.stdout.clone(),
        stderr,
        reveal_body: RevealBody {
            dr_id: dr.id,
            dr_block_height: dr.height,
            exit_code,
            gas_used: output.gas_used,
            proxy_public_keys,
            reveal,
        },
    };

    ctx.pool.update_identity_dr(dr.id, &identity.id(), |t| {
        t.execution_result = Some(execution_result);
    });

    Ok(StepOutcome::Advance(TaskStatus::Executed))
}

fn estimate_commit_gas(dr_bytes: usize, replication_factor: u16, gas_adjustment_factor: f64) -> u64 {
    let raw = 18.0 * dr_bytes as f64 + 280_000.0 + 7_500.0 * replication_factor as f64;
    (raw * gas_adjustment_factor).round() as u64
}

fn estimate_reveal_gas(commit_gas: u64, reveal_bytes: usize, std_bytes: usize, replication_factor: u16, gas_adjustment_factor: f64) -> u64 {
    let raw = commit_gas as f64 + 60.0 * reveal_bytes as f64 + 15.0 * std_bytes as f64 + 3000.0 * replication_factor as f64;
    (raw * gas_adjustment_factor).round() as u64
}

async fn commit(
    ctx: &DrTaskContext,
    dr: &DataRequest,
    identity: &Identity,
    signer_index: u32,
    execution_result: Option<&ExecutionResult>,
) -> Result<StepOutcome, CoreError> {
    let Some(execution_result) = execution_result else {
        return Ok(StepOutcome::Stop);
    };

    let rb = &execution_result.reveal_body;
    let reveal_body_hash = hashing::reveal_body_hash(
        &dr.id,
        rb.dr_block_height,
        rb.exit_code,
        rb.gas_used,
        &rb.reveal,
        &rb.proxy_public_keys.iter().map(|pk| pk.as_bytes().to_vec()).collect::<Vec<_>>(),
    );

    let proof = sign(identity, &reveal_body_hash);
    let stderr_joined = execution_result.stderr.join("\n");
    let stdout_joined = execution_result.stdout.join("\n");

    let commitment = hashing::commitment_hash(
        &reveal_body_hash,
        identity.public_key.as_bytes(),
        &proof.to_hex(),
        &stderr_joined,
        &stdout_joined,
    );

    let dr_bytes = serde_json::to_vec(dr).map(|v| v.len()).unwrap_or(0);
    let gas = if ctx.config.gas_estimations_enabled {
        Some(estimate_commit_gas(dr_bytes, dr.replication_factor, ctx.config.gas_adjustment_factor))
    } else {
        None
    };

    let commit_message_hash = hashing::commit_message_hash(
        &dr.id,
        dr.height,
        &commitment.to_hex(),
        &ctx.config.chain_id,
        &ctx.config.core_contract_address,
    );
    let commit_proof = sign(identity, &commit_message_hash);

    let msg = ContractMsg::CommitDataResult(CommitDataResultMsg {
        dr_id: dr.id.to_hex(),
        commitment: commitment.to_hex(),
        proof: commit_proof.to_hex(),
        public_key: identity.public_key.to_hex(),
    });
    let message = serde_json::to_value(&msg).expect("ContractMsg always serializes");

    let gas_option = gas.map(GasOption::Fixed).unwrap_or(GasOption::Auto);

    match ctx
        .dispatcher
        .wait_for_transaction(vec![message], Priority::Low, signer_index, gas_option)
        .await
    {
        Ok(_) => Ok(StepOutcome::Advance(TaskStatus::Committed)),
        Err(ChainError::AlreadyCommitted) => Ok(StepOutcome::Advance(TaskStatus::Committed)),
        Err(ChainError::RevealStarted) | Err(ChainError::DataRequestExpired) | Err(ChainError::DataRequestNotFound) => {
            Ok(StepOutcome::Stop)
        }
        Err(e) => Err(CoreError::from(e)),
    }
}

async fn reveal(
    ctx: &DrTaskContext,
    dr: &DataRequest,
    identity: &Identity,
    signer_index: u32,
    execution_result: Option<&ExecutionResult>,
) -> Result<StepOutcome, CoreError> {
    let Some(execution_result) = execution_result else {
        return Ok(StepOutcome::Stop);
    };

    let rb = &execution_result.reveal_body;
    let reveal_body_hash = hashing::reveal_body_hash(
        &dr.id,
        rb.dr_block_height,
        rb.exit_code,
        rb.gas_used,
        &rb.reveal,
        &rb.proxy_public_keys.iter().map(|pk| pk.as_bytes().to_vec()).collect::<Vec<_>>(),
    );

    let reveal_message_hash = hashing::reveal_message_hash(
        &dr.id,
        rb.dr_block_height,
        &reveal_body_hash,
        &ctx.config.chain_id,
        &ctx.config.core_contract_address,
    );
    let proof = sign(identity, &reveal_message_hash);

    let dr_bytes = serde_json::to_vec(dr).map(|v| v.len()).unwrap_or(0);
    let std_bytes = execution_result.stdout.iter().map(|s| s.len()).sum::<usize>()
        + execution_result.stderr.iter().map(|s| s.len()).sum::<usize>();
    let gas = if ctx.config.gas_estimations_enabled {
        let commit_gas = estimate_commit_gas(dr_bytes, dr.replication_factor, ctx.config.gas_adjustment_factor);
        Some(estimate_reveal_gas(
            commit_gas,
            rb.reveal.len(),
            std_bytes,
            dr.replication_factor,
            ctx.config.gas_adjustment_factor,
        ))
    } else {
        None
    };

    let msg = ContractMsg::RevealDataResult(RevealDataResultMsg {
        public_key: identity.public_key.to_hex(),
        proof: proof.to_hex(),
        reveal_body: RevealBodyMsg {
            dr_id: rb.dr_id.to_hex(),
            dr_block_height: rb.dr_block_height,
            exit_code: rb.exit_code,
            gas_used: rb.gas_used,
            proxy_public_keys: rb.proxy_public_keys.iter().map(|pk| pk.to_hex()).collect(),
            reveal_base64: {
                use base64::{engine::general_purpose::STANDARD, Engine};
                STANDARD.encode(&rb.reveal)
            },
        },
        stderr: execution_result.stderr.clone(),
        stdout: execution_result.stdout.clone(),
    });
    let message = serde_json::to_value(&msg).expect("ContractMsg always serializes");

    let gas_option = gas.map(GasOption::Fixed).unwrap_or(GasOption::Auto);

    match ctx
        .dispatcher
        .wait_for_transaction(vec![message], Priority::High, signer_index, gas_option)
        .await
    {
        Ok(_) => Ok(StepOutcome::Advance(TaskStatus::Revealed)),
        Err(ChainError::AlreadyRevealed) => Ok(StepOutcome::Advance(TaskStatus::Revealed)),
        Err(ChainError::RevealMismatch) => {
            error!(
                "dr {} identity {} reveal mismatch: local commitment and on-chain reveal disagree",
                dr.id,
                identity.id()
            );
            Ok(StepOutcome::Stop)
        }
        Err(e) => Err(CoreError::from(e)),
    }
}
