//! Batches, prioritizes, signs, submits, and tracks transactions across the
//! sub-account fleet, `§4.1`.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use log::{debug, error, warn};
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use seda_overlay_common::model::{GasOption, Priority};

use crate::{error::ChainError, signer::SignerPool, types::TxResult};

/// Abstracts "sign this sub-account's next entry and broadcast it" so the
/// dispatcher's retry/backoff logic can be tested without a live chain.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn sign_and_broadcast(
        &self,
        signer_index: u32,
        messages: &[serde_json::Value],
        gas_option: GasOption,
    ) -> Result<TxResult, ChainError>;
}

struct PendingEntry {
    priority: Priority,
    messages: Vec<serde_json::Value>,
    signer_index: u32,
    gas_option: GasOption,
    trace_id: String,
    retries_left: u32,
    completion: Option<oneshot::Sender<Result<TxResult, ChainError>>>,
}

/// One bounded queue per sub-account, drained on a `queueInterval` tick;
/// HIGH-priority entries are moved to the front.
struct AccountQueue {
    entries: Mutex<VecDeque<PendingEntry>>,
}

impl AccountQueue {
    fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    async fn push(&self, entry: PendingEntry) {
        let mut queue = self.entries.lock().await;
        match entry.priority {
            Priority::High => queue.push_front(entry),
            Priority::Low => queue.push_back(entry),
        }
    }

    /// Re-queues a retried entry at the front of its priority band so it is
    /// the next thing this sub-account attempts, without starving entries
    /// of the opposite priority that arrived first.
    async fn push_retry(&self, entry: PendingEntry) {
        let mut queue = self.entries.lock().await;
        queue.push_front(entry);
    }

    async fn pop(&self) -> Option<PendingEntry> {
        self.entries.lock().await.pop_front()
    }
}

pub struct DispatcherConfig {
    pub queue_interval: Duration,
    pub max_retries: u32,
    pub sleep_between_failed_tx: Duration,
    pub mempool_backoff_cap: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_interval: Duration::from_millis(200),
            max_retries: 3,
            sleep_between_failed_tx: Duration::from_secs(3),
            mempool_backoff_cap: Duration::from_secs(2),
        }
    }
}

pub struct TxDispatcher {
    queues: Vec<Arc<AccountQueue>>,
    signers: Arc<SignerPool>,
    broadcaster: Arc<dyn Broadcaster>,
    config: DispatcherConfig,
    next_id: AtomicU64,
}

impl TxDispatcher {
    pub fn new(signers: Arc<SignerPool>, broadcaster: Arc<dyn Broadcaster>, config: DispatcherConfig) -> Self {
        let queues = (0..signers.len()).map(|_| Arc::new(AccountQueue::new())).collect();
        Self {
            queues,
            signers,
            broadcaster,
            config,
            next_id: AtomicU64::new(0),
        }
    }

    fn next_trace_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Enqueues a message for asynchronous submission; does not wait for
    /// on-chain inclusion. Returns immediately once the entry is queued.
    pub async fn queue_message(
        &self,
        messages: Vec<serde_json::Value>,
        priority: Priority,
        signer_index: u32,
        gas_option: GasOption,
    ) -> Result<String, ChainError> {
        let trace_id = format!("tx-{}", self.next_trace_id());
        let queue = self
            .queues
            .get(signer_index as usize)
            .ok_or_else(|| ChainError::Generic(format!("unknown signer index {signer_index}")))?;

        queue
            .push(PendingEntry {
                priority,
                messages,
                signer_index,
                gas_option,
                trace_id: trace_id.clone(),
                retries_left: self.config.max_retries,
                completion: None,
            })
            .await;

        Ok(trace_id)
    }

    /// Enqueues a message and blocks until its on-chain outcome (success or
    /// a terminal classified error) is known.
    pub async fn wait_for_transaction(
        &self,
        messages: Vec<serde_json::Value>,
        priority: Priority,
        signer_index: u32,
        gas_option: GasOption,
    ) -> Result<TxResult, ChainError> {
        let trace_id = format!("tx-{}", self.next_trace_id());
        let queue = self
            .queues
            .get(signer_index as usize)
            .ok_or_else(|| ChainError::Generic(format!("unknown signer index {signer_index}")))?;

        let (tx, rx) = oneshot::channel();
        queue
            .push(PendingEntry {
                priority,
                messages,
                signer_index,
                gas_option,
                trace_id,
                retries_left: self.config.max_retries,
                completion: Some(tx),
            })
            .await;

        rx.await
            .unwrap_or_else(|_| Err(ChainError::Generic("dispatcher shut down".to_string())))
    }

    /// Spawns one drain loop per sub-account queue, each ticking on
    /// `queueInterval` and processing at most one entry per tick.
    pub fn spawn_drain_loops(self: Arc<Self>, cancel: CancellationToken) -> Vec<tokio::task::JoinHandle<()>> {
        (0..self.queues.len())
            .map(|index| {
                let this = self.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { this.drain_loop(index as u32, cancel).await })
            })
            .collect()
    }

    async fn drain_loop(&self, signer_index: u32, cancel: CancellationToken) {
        let queue = self.queues[signer_index as usize].clone();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.config.queue_interval) => {}
            }

            let Some(entry) = queue.pop().await else {
                continue;
            };

            self.process_entry(queue.clone(), entry).await;
        }
    }

    async fn process_entry(&self, queue: Arc<AccountQueue>, mut entry: PendingEntry) {
        let result = self
            .broadcaster
            .sign_and_broadcast(entry.signer_index, &entry.messages, entry.gas_option)
            .await;

        match result {
            Ok(tx_result) => {
                debug!(
                    "trace={} signer={} tx included: {}",
                    entry.trace_id, entry.signer_index, tx_result.tx_hash
                );
                if let Some(signer) = self.signers.get(entry.signer_index) {
                    signer.advance_sequence().await;
                }
                if let Some(sender) = entry.completion.take() {
                    let _ = sender.send(Ok(tx_result));
                }
            }
            Err(err) if !err.is_retryable() => {
                warn!(
                    "trace={} signer={} terminal error: {err}",
                    entry.trace_id, entry.signer_index
                );
                if let Some(sender) = entry.completion.take() {
                    let _ = sender.send(Err(err));
                }
            }
            Err(err) => {
                if matches!(err, ChainError::SequenceMismatch) {
                    if let Some(signer) = self.signers.get(entry.signer_index) {
                        signer.invalidate().await;
                    }
                }

                if entry.retries_left == 0 {
                    error!(
                        "trace={} signer={} exhausted retries: {err}",
                        entry.trace_id, entry.signer_index
                    );
                    if let Some(sender) = entry.completion.take() {
                        let _ = sender.send(Err(err));
                    }
                    return;
                }

                let backoff = match &err {
                    ChainError::Mempool => {
                        let attempt = self.config.max_retries - entry.retries_left;
                        let exp = Duration::from_millis(250u64.saturating_mul(1 << attempt.min(4)));
                        exp.min(self.config.mempool_backoff_cap)
                    }
                    _ => self.config.sleep_between_failed_tx,
                };

                warn!(
                    "trace={} signer={} retrying after {:?}: {err}",
                    entry.trace_id, entry.signer_index, backoff
                );
                entry.retries_left -= 1;
                tokio::time::sleep(backoff).await;
                queue.push_retry(entry).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seda_overlay_common::crypto::{Identity, PrivateKey};
    use std::sync::atomic::AtomicUsize;

    fn test_signer_pool(n: u32) -> Arc<SignerPool> {
        use crate::signer::Signer;
        let signers = (0..n)
            .map(|i| {
                let mut seed = [0u8; 32];
                seed[0] = (i + 1) as u8;
                let identity = Identity::new(i, PrivateKey::from_bytes(&seed).unwrap());
                Arc::new(Signer::new(i, identity, format!("seda1acct{i}")))
            })
            .collect();
        Arc::new(SignerPool::new(signers))
    }

    struct FlakyBroadcaster {
        fail_times: AtomicUsize,
    }

    #[async_trait]
    impl Broadcaster for FlakyBroadcaster {
        async fn sign_and_broadcast(
            &self,
            signer_index: u32,
            _messages: &[serde_json::Value],
            _gas_option: GasOption,
        ) -> Result<TxResult, ChainError> {
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Err(ChainError::SequenceMismatch);
            }
            let _ = signer_index;
            Ok(TxResult {
                tx_hash: seda_overlay_common::crypto::keccak256(&[b"ok"]),
                height: 1,
                code: 0,
                raw_log: String::new(),
            })
        }
    }

    #[tokio::test]
    async fn sequence_mismatch_is_retried_until_success() {
        let pool = test_signer_pool(1);
        let broadcaster = Arc::new(FlakyBroadcaster {
            fail_times: AtomicUsize::new(1),
        });
        let dispatcher = Arc::new(TxDispatcher::new(
            pool,
            broadcaster,
            DispatcherConfig {
                queue_interval: Duration::from_millis(5),
                max_retries: 3,
                sleep_between_failed_tx: Duration::from_millis(5),
                mempool_backoff_cap: Duration::from_millis(50),
            },
        ));

        let cancel = CancellationToken::new();
        let handles = dispatcher.clone().spawn_drain_loops(cancel.clone());

        let result = dispatcher
            .wait_for_transaction(vec![], Priority::Low, 0, GasOption::Auto)
            .await;
        assert!(result.is_ok());

        cancel.cancel();
        for h in handles {
            let _ = h.await;
        }
    }

    /// S4 — a `SequenceMismatch` on the first of two sends invalidates the
    /// signer's cached account info; the retry succeeds and a later send
    /// against a still-populated cache bumps the sequence by one.
    #[tokio::test]
    async fn sequence_recovery_invalidates_then_advances_cache() {
        use crate::types::AccountInfo;

        let pool = test_signer_pool(1);
        let signer = pool.get(0).unwrap().clone();
        signer
            .set_cached(AccountInfo {
                account_number: 7,
                sequence: 5,
            })
            .await;

        let broadcaster = Arc::new(FlakyBroadcaster {
            fail_times: AtomicUsize::new(1),
        });
        let dispatcher = Arc::new(TxDispatcher::new(
            pool,
            broadcaster,
            DispatcherConfig {
                queue_interval: Duration::from_millis(5),
                max_retries: 3,
                sleep_between_failed_tx: Duration::from_millis(5),
                mempool_backoff_cap: Duration::from_millis(50),
            },
        ));

        let cancel = CancellationToken::new();
        let handles = dispatcher.clone().spawn_drain_loops(cancel.clone());

        let result = dispatcher
            .wait_for_transaction(vec![], Priority::Low, 0, GasOption::Auto)
            .await;
        assert!(result.is_ok());
        // the mismatch invalidated the cache and nothing repopulated it
        // before the retry landed, so the bump on success is a no-op.
        assert!(signer.cached().await.is_none());

        signer
            .set_cached(AccountInfo {
                account_number: 7,
                sequence: 9,
            })
            .await;
        let result = dispatcher
            .wait_for_transaction(vec![], Priority::Low, 0, GasOption::Auto)
            .await;
        assert!(result.is_ok());
        assert_eq!(signer.cached().await.unwrap().sequence, 10);

        cancel.cancel();
        for h in handles {
            let _ = h.await;
        }
    }

    #[tokio::test]
    async fn terminal_error_is_not_retried() {
        struct AlwaysAlreadyCommitted;
        #[async_trait]
        impl Broadcaster for AlwaysAlreadyCommitted {
            async fn sign_and_broadcast(
                &self,
                _signer_index: u32,
                _messages: &[serde_json::Value],
                _gas_option: GasOption,
            ) -> Result<TxResult, ChainError> {
                Err(ChainError::AlreadyCommitted)
            }
        }

        let pool = test_signer_pool(1);
        let dispatcher = Arc::new(TxDispatcher::new(
            pool,
            Arc::new(AlwaysAlreadyCommitted),
            DispatcherConfig {
                queue_interval: Duration::from_millis(5),
                ..Default::default()
            },
        ));
        let cancel = CancellationToken::new();
        let handles = dispatcher.clone().spawn_drain_loops(cancel.clone());

        let result = dispatcher
            .wait_for_transaction(vec![], Priority::Low, 0, GasOption::Auto)
            .await;
        assert!(matches!(result, Err(ChainError::AlreadyCommitted)));

        cancel.cancel();
        for h in handles {
            let _ = h.await;
        }
    }
}
