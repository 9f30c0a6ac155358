//! Top-level orchestration, `§4`. Owns the long-lived singletons (pool,
//! chain client, dispatcher, worker pool) and spawns the fetch, eligibility,
//! and per-`(dr, identity)` task loops under one shutdown signal.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use seda_overlay_chain::{ChainClient, TxDispatcher};
use seda_overlay_common::{crypto::Identity, interval::spawn_debounced_interval, model::TaskStatus};
use seda_overlay_wasm::{ProgramCache, WorkerPool};

use crate::{
    discovery::{EligibilityTask, FetchHealth, FetchTask},
    pool::DrPool,
    task::{self, DrTaskConfig, DrTaskContext},
};

pub struct MainTaskIntervals {
    pub fetch_task: Duration,
    pub eligibility_check: Duration,
    pub task_spawn_check: Duration,
}

pub struct MainTask {
    client: Arc<dyn ChainClient>,
    dispatcher: Arc<TxDispatcher>,
    pool: Arc<dyn DrPool>,
    fetch_task: Arc<FetchTask>,
    eligibility_task: Arc<EligibilityTask>,
    task_ctx: Arc<DrTaskContext>,
    identities: Vec<Identity>,
    intervals: MainTaskIntervals,
    /// `(dr_id, identity_id)` pairs with a task already running, so the
    /// spawn-check loop never double-starts a `DrTask`.
    running: Arc<Mutex<HashSet<(seda_overlay_common::crypto::Hash, String)>>>,
}

impl MainTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn ChainClient>,
        dispatcher: Arc<TxDispatcher>,
        pool: Arc<dyn DrPool>,
        program_cache: Arc<ProgramCache>,
        worker_pool: Arc<WorkerPool>,
        identities: Vec<Identity>,
        task_config: DrTaskConfig,
        intervals: MainTaskIntervals,
    ) -> Self {
        let health = Arc::new(FetchHealth::new());
        let fetch_task = Arc::new(FetchTask::new(client.clone(), pool.clone(), health));

        let identity_keys = identities.iter().map(|i| i.public_key).collect();
        let eligibility_task = Arc::new(EligibilityTask::new(client.clone(), pool.clone(), identity_keys));

        let task_ctx = Arc::new(DrTaskContext {
            client: client.clone(),
            dispatcher: dispatcher.clone(),
            pool: pool.clone(),
            program_cache,
            worker_pool,
            config: task_config,
        });

        Self {
            client,
            dispatcher,
            pool,
            fetch_task,
            eligibility_task,
            task_ctx,
            identities,
            intervals,
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn pool(&self) -> Arc<dyn DrPool> {
        self.pool.clone()
    }

    pub fn client(&self) -> Arc<dyn ChainClient> {
        self.client.clone()
    }

    pub fn dispatcher(&self) -> Arc<TxDispatcher> {
        self.dispatcher.clone()
    }

    /// Spawns the fetch, eligibility, and task-spawn loops; returns their
    /// handles so the caller can join them at shutdown.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        {
            let fetch_task = self.fetch_task.clone();
            handles.push(spawn_debounced_interval(self.intervals.fetch_task, cancel.clone(), move || {
                let fetch_task = fetch_task.clone();
                async move {
                    if let Err(e) = fetch_task.run_once().await {
                        warn!("fetch task sweep failed: {e}");
                    }
                }
            }));
        }

        {
            let eligibility_task = self.eligibility_task.clone();
            handles.push(spawn_debounced_interval(
                self.intervals.eligibility_check,
                cancel.clone(),
                move || {
                    let eligibility_task = eligibility_task.clone();
                    async move {
                        if let Err(e) = eligibility_task.run_once().await {
                            warn!("eligibility sweep failed: {e}");
                        }
                    }
                },
            ));
        }

        {
            let this = self.clone();
            let cancel_for_spawner = cancel.clone();
            handles.push(spawn_debounced_interval(
                self.intervals.task_spawn_check,
                cancel.clone(),
                move || {
                    let this = this.clone();
                    let cancel = cancel_for_spawner.clone();
                    async move { this.spawn_ready_tasks(cancel) }
                },
            ));
        }

        handles
    }

    /// Scans the pool for `EligibleForExecution` entries without a running
    /// task and spawns one per pair. Each identity signs and broadcasts
    /// through its own sub-account, `identity.index`.
    fn spawn_ready_tasks(&self, cancel: CancellationToken) {
        let identity_drs = self.pool.all_identity_drs();
        let mut running = self.running.lock().unwrap();

        for entry in identity_drs {
            if entry.status != TaskStatus::EligibleForExecution {
                continue;
            }
            let key = (entry.dr_id, entry.identity_id.clone());
            if running.contains(&key) {
                continue;
            }

            let Some(identity) = self.identities.iter().find(|i| i.id() == entry.identity_id) else {
                continue;
            };

            info!("spawning task for dr {} identity {}", entry.dr_id, entry.identity_id);
            running.insert(key.clone());

            let ctx = self.task_ctx.clone();
            let identity = identity.clone();
            let signer_index = identity.index;
            let running = self.running.clone();
            let dr_id = entry.dr_id;
            let identity_id = entry.identity_id.clone();

            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = task::run(ctx, dr_id, identity, signer_index) => {}
                }
                running.lock().unwrap().remove(&(dr_id, identity_id));
            });
        }
    }
}
