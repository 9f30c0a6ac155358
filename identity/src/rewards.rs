//! Optional reward withdrawal loop, `§4.6`. Disabled by default
//! (`enableRewardsWithdrawal`); when on, periodically withdraws any
//! identity's pending rewards once they clear the configured threshold.

use std::{sync::Arc, time::Duration};

use log::{error, info};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use seda_overlay_chain::{ChainClient, TxDispatcher};
use seda_overlay_common::{
    crypto::{hashing::withdraw_message_hash, prove, Identity},
    interval::spawn_debounced_interval,
    model::{GasOption, Priority},
};

pub struct RewardsWithdrawalConfig {
    pub interval: Duration,
    pub minimum_threshold: u128,
    pub chain_id: String,
    pub core_contract_address: String,
    pub withdraw_address: String,
}

/// Spawns the withdrawal loop; returns its handle so the caller can join it
/// on shutdown alongside the node's other long-lived tasks.
pub fn spawn_rewards_withdrawal_loop(
    client: Arc<dyn ChainClient>,
    dispatcher: Arc<TxDispatcher>,
    identities: Vec<Identity>,
    config: RewardsWithdrawalConfig,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    spawn_debounced_interval(config.interval, cancel, move || {
        let client = client.clone();
        let dispatcher = dispatcher.clone();
        let identities = identities.clone();
        let chain_id = config.chain_id.clone();
        let contract = config.core_contract_address.clone();
        let withdraw_address = config.withdraw_address.clone();
        let threshold = config.minimum_threshold;

        async move {
            for identity in &identities {
                if let Err(e) =
                    withdraw_if_due(&*client, &dispatcher, identity, threshold, &chain_id, &contract, &withdraw_address)
                        .await
                {
                    error!("reward withdrawal failed for identity {}: {e}", identity.id());
                }
            }
        }
    })
}

async fn withdraw_if_due(
    client: &dyn ChainClient,
    dispatcher: &TxDispatcher,
    identity: &Identity,
    minimum_threshold: u128,
    chain_id: &str,
    core_contract_address: &str,
    withdraw_address: &str,
) -> Result<(), crate::error::IdentityError> {
    let Some(staker) = client.query_staker(&identity.id()).await? else {
        return Ok(());
    };

    if staker.tokens_pending_withdrawal < minimum_threshold {
        return Ok(());
    }

    let seq = client.query_staker_and_seq(&identity.id()).await?.seq;
    let hash = withdraw_message_hash(
        staker.tokens_pending_withdrawal,
        chain_id,
        core_contract_address,
        seq,
    );
    let proof = prove(&identity.private_key, &hash);

    info!(
        "withdrawing {} pending reward for identity {}",
        staker.tokens_pending_withdrawal,
        identity.id()
    );

    let message = json!({
        "withdraw": {
            "public_key": identity.public_key.to_hex(),
            "proof": proof.to_hex(),
            "withdraw_address": withdraw_address,
        }
    });

    dispatcher
        .queue_message(vec![message], Priority::Low, identity.index, GasOption::Auto)
        .await?;

    Ok(())
}
