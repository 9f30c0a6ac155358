//! Discovery and eligibility, `§4.2`. `FetchTask` pages through DRs in
//! `committing` status and keeps the pool in sync; `EligibilityTask` makes
//! a purely local selection decision per DR/identity pair so no chain query
//! is needed per identity.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use log::{debug, warn};
use tokio::sync::Mutex;

use seda_overlay_chain::ChainClient;
use seda_overlay_common::{
    cache::TtlCache,
    crypto::{keccak256, Hash, PublicKey},
    model::DataRequest,
};

use crate::{error::CoreError, pool::DrPool};

const FETCH_LIMIT: u32 = 50;
const STALE_DR_THRESHOLD: Duration = Duration::from_secs(15);
const ELIGIBILITY_CACHE_TTL: Duration = Duration::from_secs(30);
const FETCH_HEALTH_WINDOW: Duration = Duration::from_secs(5 * 60);
const FETCH_FAILURE_THRESHOLD: f64 = 0.2;

lazy_static::lazy_static! {
    static ref PROCESS_START: Instant = Instant::now();
}

/// Millis since process start — `DataRequest::last_updated` only needs a
/// monotonic relative clock for staleness checks, not wall-clock time.
pub(crate) fn now_millis() -> u64 {
    PROCESS_START.elapsed().as_millis() as u64
}

/// Rolling total/failed counters over `FETCH_HEALTH_WINDOW`, `§4.2`.
pub struct FetchHealth {
    window: Mutex<VecDeque<(Instant, bool)>>,
}

impl FetchHealth {
    pub fn new() -> Self {
        Self {
            window: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn record(&self, success: bool) {
        let mut window = self.window.lock().await;
        let now = Instant::now();
        window.push_back((now, success));
        while let Some((t, _)) = window.front() {
            if now.duration_since(*t) > FETCH_HEALTH_WINDOW {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    pub async fn is_healthy(&self) -> bool {
        let window = self.window.lock().await;
        if window.is_empty() {
            return true;
        }
        let total = window.len() as f64;
        let failed = window.iter().filter(|(_, ok)| !ok).count() as f64;
        failed / total < FETCH_FAILURE_THRESHOLD
    }
}

impl Default for FetchHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Pages through `committing` DRs and reconciles them into the pool,
/// `§4.2`.
pub struct FetchTask {
    client: Arc<dyn ChainClient>,
    pool: Arc<dyn DrPool>,
    health: Arc<FetchHealth>,
}

impl FetchTask {
    pub fn new(client: Arc<dyn ChainClient>, pool: Arc<dyn DrPool>, health: Arc<FetchHealth>) -> Self {
        Self { client, pool, health }
    }

    /// Runs one full paginated sweep, inserting new DRs and refreshing
    /// existing ones in place.
    pub async fn run_once(&self) -> Result<(), CoreError> {
        let mut offset = 0u32;
        loop {
            let page = match self.client.query_dr_status_list(offset, FETCH_LIMIT).await {
                Ok(page) => {
                    self.health.record(true).await;
                    page
                }
                Err(e) => {
                    self.health.record(false).await;
                    return Err(CoreError::from(e));
                }
            };

            for dr in page.drs {
                self.reconcile(dr);
            }

            if !page.has_more {
                break;
            }
            offset += FETCH_LIMIT;
        }

        Ok(())
    }

    fn reconcile(&self, mut dr: DataRequest) {
        dr.last_updated = now_millis();

        if self.pool.get_dr(dr.id).is_some() {
            self.pool.insert_dr(dr);
            return;
        }

        if dr.is_in_reveal_stage() {
            debug!("dr {} already in reveal stage, leaving to other nodes", dr.id);
            return;
        }

        debug!("discovered new dr {}", dr.id);
        self.pool.insert_dr(dr);
    }
}

/// `H(pk, drId) = keccak256(pk || drId_bytes)`, the selection hash every
/// staker and the evaluating identity are compared through.
fn selection_hash(public_key: &PublicKey, dr_id: Hash) -> Hash {
    keccak256(&[public_key.as_bytes(), dr_id.as_ref()])
}

#[derive(Debug, Clone)]
pub struct EligibilityInputs {
    pub stakers: Vec<PublicKey>,
    pub minimum_stake: u128,
    pub backup_delay_in_blocks: u64,
    pub current_height: u64,
}

/// Decides eligibility purely from already-fetched inputs, `§4.2`'s
/// selection algorithm. Exposed standalone so it is trivially unit-tested
/// without a chain client.
pub fn is_eligible(inputs: &EligibilityInputs, target: &PublicKey, dr: &DataRequest) -> bool {
    let set: Vec<&PublicKey> = inputs.stakers.iter().collect();
    let target_hash = selection_hash(target, dr.id);

    let lower_hash_count = set
        .iter()
        .filter(|pk| selection_hash(pk, dr.id) < target_hash)
        .count() as u64;

    let blocks_passed = inputs.current_height.saturating_sub(dr.height);
    let total_needed = if blocks_passed <= inputs.backup_delay_in_blocks {
        dr.replication_factor as u64
    } else {
        dr.replication_factor as u64 + (blocks_passed - 1) / inputs.backup_delay_in_blocks
    };
    let capped_needed = total_needed.min(set.len() as u64);

    lower_hash_count < capped_needed
}

/// Evaluates every DR in the pool against every enabled identity, emitting
/// at most one `insert_identity_dr` per pair, `§4.2`.
pub struct EligibilityTask {
    client: Arc<dyn ChainClient>,
    pool: Arc<dyn DrPool>,
    identities: Vec<PublicKey>,
    cache: TtlCache<(), EligibilityInputs>,
    last_refresh: AtomicU64,
}

impl EligibilityTask {
    pub fn new(client: Arc<dyn ChainClient>, pool: Arc<dyn DrPool>, identities: Vec<PublicKey>) -> Self {
        Self {
            client,
            pool,
            identities,
            cache: TtlCache::new(ELIGIBILITY_CACHE_TTL),
            last_refresh: AtomicU64::new(0),
        }
    }

    async fn inputs(&self) -> Result<EligibilityInputs, CoreError> {
        let client = self.client.clone();
        self.cache
            .get_or_fetch((), || async move {
                let stakers = client.query_stakers().await?;
                let staking_config = client.query_staking_config().await?;
                let dr_config = client.query_dr_config().await?;
                let current_height = client.query_block_height().await?;

                let enabled: Vec<PublicKey> = stakers
                    .into_iter()
                    .filter(|s| s.tokens_staked >= staking_config.minimum_stake)
                    .map(|s| s.public_key)
                    .collect();

                Ok::<_, seda_overlay_chain::ChainError>(EligibilityInputs {
                    stakers: enabled,
                    minimum_stake: staking_config.minimum_stake,
                    backup_delay_in_blocks: dr_config.backup_delay_in_blocks.max(1),
                    current_height,
                })
            })
            .await
            .map_err(CoreError::from)
    }

    /// Refreshes a DR from chain if its `last_updated` exceeds the stale
    /// threshold; removes it from the pool if the chain reports it gone.
    async fn refresh_if_stale(&self, dr: &DataRequest) -> Result<Option<DataRequest>, CoreError> {
        let age = Duration::from_millis(now_millis().saturating_sub(dr.last_updated));
        if age <= STALE_DR_THRESHOLD {
            return Ok(Some(dr.clone()));
        }

        match self.client.query_dr(dr.id).await? {
            Some(mut fresh) => {
                fresh.last_updated = now_millis();
                self.pool.insert_dr(fresh.clone());
                Ok(Some(fresh))
            }
            None => {
                warn!("dr {} absent on chain, removing from pool", dr.id);
                self.pool.delete_dr(dr.id);
                Ok(None)
            }
        }
    }

    pub async fn run_once(&self) -> Result<(), CoreError> {
        let inputs = self.inputs().await?;

        for dr in self.pool.all_drs() {
            let Some(dr) = self.refresh_if_stale(&dr).await? else {
                continue;
            };

            for identity in &self.identities {
                let identity_id = identity.identity_id();
                if self.pool.has_identity_dr(dr.id, &identity_id) {
                    continue;
                }

                if is_eligible(&inputs, identity, &dr) {
                    debug!("identity {identity_id} eligible for dr {}", dr.id);
                    self.pool
                        .insert_identity_dr(dr.id, identity_id, inputs.current_height);
                }
            }
        }

        self.last_refresh.store(now_millis(), Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seda_overlay_common::crypto::PrivateKey;

    fn pk(seed: u8) -> PublicKey {
        let mut bytes = [0u8; 32];
        bytes[0] = seed;
        PrivateKey::from_bytes(&bytes).unwrap().public_key()
    }

    fn dr_at_height(height: u64, replication_factor: u16) -> DataRequest {
        DataRequest {
            id: keccak256(&[b"dr"]),
            version: 1,
            exec_program_id: Hash::zero(),
            exec_inputs: vec![],
            exec_gas_limit: 1000,
            tally_program_id: Hash::zero(),
            tally_inputs: vec![],
            tally_gas_limit: 1000,
            replication_factor,
            consensus_filter: vec![],
            gas_price: 1,
            posted_gas_price: 1,
            memo: vec![],
            payback_address: vec![],
            seda_payload: vec![],
            height,
            status: seda_overlay_common::model::DrStatus::Committing,
            commits_length: 0,
            last_updated: 0,
        }
    }

    #[test]
    fn at_posting_time_only_replication_factor_are_eligible() {
        let stakers: Vec<PublicKey> = (1..=10u8).map(pk).collect();
        let inputs = EligibilityInputs {
            stakers: stakers.clone(),
            minimum_stake: 1,
            backup_delay_in_blocks: 100,
            current_height: 0,
        };
        let dr = dr_at_height(0, 3);

        let eligible_count = stakers.iter().filter(|s| is_eligible(&inputs, s, &dr)).count();
        assert_eq!(eligible_count, 3);
    }

    #[test]
    fn backup_expansion_grows_eligible_set_over_time() {
        let stakers: Vec<PublicKey> = (1..=10u8).map(pk).collect();
        let dr = dr_at_height(0, 3);

        let early = EligibilityInputs {
            stakers: stakers.clone(),
            minimum_stake: 1,
            backup_delay_in_blocks: 10,
            current_height: 5,
        };
        let late = EligibilityInputs {
            stakers: stakers.clone(),
            minimum_stake: 1,
            backup_delay_in_blocks: 10,
            current_height: 25,
        };

        let early_count = stakers.iter().filter(|s| is_eligible(&early, s, &dr)).count();
        let late_count = stakers.iter().filter(|s| is_eligible(&late, s, &dr)).count();
        assert!(late_count >= early_count);
    }

    #[test]
    fn capped_needed_never_exceeds_staker_count() {
        let stakers: Vec<PublicKey> = (1..=2u8).map(pk).collect();
        let inputs = EligibilityInputs {
            stakers: stakers.clone(),
            minimum_stake: 1,
            backup_delay_in_blocks: 1,
            current_height: 1000,
        };
        let dr = dr_at_height(0, 5);

        let eligible_count = stakers.iter().filter(|s| is_eligible(&inputs, s, &dr)).count();
        assert_eq!(eligible_count, 2);
    }
}
