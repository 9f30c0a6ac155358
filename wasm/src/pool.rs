//! Bounded worker pool driving the WASM runtime, `§4.5`. Concurrency is
//! capped at `threadAmount` (default: available parallelism) via a
//! semaphore rather than a fixed thread/process pool, since each task is
//! already a `tokio` task; execution results are deduplicated for 14s per
//! `(drId, drHeight)`.

use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use log::debug;

use seda_overlay_common::{cache::TtlCache, crypto::Hash};

use crate::{adapter::VmAdapter, call_data::VmCallData, error::WasmError, runtime::{VmExecutionOutput, WasmRuntime}};

const EXECUTION_CACHE_TTL: Duration = Duration::from_secs(14);

pub struct WorkerPoolConfig {
    pub thread_amount: Option<usize>,
    /// Safety valve named in `§4.5`; tracked so callers can choose to
    /// rebuild the adapter/runtime per task instead of reusing them.
    pub terminate_after_completion: bool,
    pub stdout_limit: usize,
    pub stderr_limit: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            thread_amount: None,
            terminate_after_completion: false,
            stdout_limit: 1024,
            stderr_limit: 1024,
        }
    }
}

pub struct WorkerPool {
    runtime: Arc<dyn WasmRuntime>,
    semaphore: Arc<tokio::sync::Semaphore>,
    config: WorkerPoolConfig,
    execution_cache: TtlCache<(Hash, u64), Arc<VmExecutionOutput>>,
}

impl WorkerPool {
    pub fn new(runtime: Arc<dyn WasmRuntime>, config: WorkerPoolConfig) -> Self {
        let size = config
            .thread_amount
            .or_else(|| std::thread::available_parallelism().ok().map(NonZeroUsize::get))
            .unwrap_or(1);

        Self {
            runtime,
            semaphore: Arc::new(tokio::sync::Semaphore::new(size)),
            config,
            execution_cache: TtlCache::new(EXECUTION_CACHE_TTL),
        }
    }

    /// Runs `call_data` against `module` through `adapter`, deduplicating
    /// against the last 14s of executions for the same `(drId, drHeight)`.
    pub async fn execute(
        &self,
        dr_id: Hash,
        dr_height: u64,
        module: &[u8],
        call_data: &VmCallData,
        adapter: &dyn VmAdapter,
    ) -> Result<Arc<VmExecutionOutput>, WasmError> {
        if let Some(cached) = self.execution_cache.get(&(dr_id, dr_height)) {
            debug!("execution cache hit for dr {dr_id} at height {dr_height}");
            return Ok(cached);
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| WasmError::PoolShutDown)?;

        if self.config.terminate_after_completion {
            debug!("terminate_after_completion set; worker state is not reused across tasks");
        }

        let output = self
            .runtime
            .execute(
                module,
                call_data,
                adapter,
                self.config.stdout_limit,
                self.config.stderr_limit,
            )
            .await?;
        let output = Arc::new(output);

        self.execution_cache.insert((dr_id, dr_height), output.clone());
        Ok(output)
    }

    pub fn capacity(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubAdapter;
    #[async_trait]
    impl VmAdapter for StubAdapter {
        async fn http_fetch(
            &self,
            _url: &str,
            _method: &str,
            _headers: &[(String, String)],
            _body: &[u8],
        ) -> Result<crate::adapter::HttpFetchResponse, WasmError> {
            unimplemented!()
        }
        async fn proxy_http_fetch(
            &self,
            _url: &str,
            _method: &str,
            _headers: &[(String, String)],
            _body: &[u8],
        ) -> Result<(crate::adapter::HttpFetchResponse, Vec<u8>), WasmError> {
            unimplemented!()
        }
        async fn get_proxy_http_gas_cost(&self, _url: &str, _gas_price: u128) -> Result<u64, WasmError> {
            unimplemented!()
        }
    }

    struct CountingRuntime {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl WasmRuntime for CountingRuntime {
        async fn execute(
            &self,
            _module: &[u8],
            _call_data: &VmCallData,
            _adapter: &dyn VmAdapter,
            _stdout_limit: usize,
            _stderr_limit: usize,
        ) -> Result<VmExecutionOutput, WasmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(VmExecutionOutput::default())
        }
    }

    fn dummy_call_data() -> VmCallData {
        use seda_overlay_common::crypto::PrivateKey;
        VmCallData {
            identity_private_key: PrivateKey::from_bytes(&[7u8; 32]).unwrap(),
            dr_id: Hash::zero(),
            dr_height: 1,
            eligibility_height: 1,
            exec_program_id: Hash::zero(),
            exec_inputs: vec![],
            gas_limit: 1000,
            env: Default::default(),
        }
    }

    #[tokio::test]
    async fn repeated_execution_for_same_dr_height_is_deduped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let runtime = Arc::new(CountingRuntime { calls: calls.clone() });
        let pool = WorkerPool::new(runtime, WorkerPoolConfig::default());
        let adapter = StubAdapter;
        let call_data = dummy_call_data();

        let dr_id = seda_overlay_common::crypto::keccak256(&[b"dr"]);
        pool.execute(dr_id, 5, b"module", &call_data, &adapter).await.unwrap();
        pool.execute(dr_id, 5, b"module", &call_data, &adapter).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
