//! Abstracts the metered WASM engine itself, `§4.5`. A single production
//! implementation would wrap a real engine (e.g. `wasmtime`); it is not
//! required here, only the trait the worker pool drives.

use async_trait::async_trait;

use crate::{adapter::VmAdapter, call_data::VmCallData, error::WasmError};

#[derive(Debug, Clone, Default)]
pub struct VmExecutionOutput {
    pub exit_code: u8,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub result: Vec<u8>,
    pub gas_used: u64,
    pub used_proxy_public_keys: Vec<Vec<u8>>,
}

#[async_trait]
pub trait WasmRuntime: Send + Sync {
    async fn execute(
        &self,
        module: &[u8],
        call_data: &VmCallData,
        adapter: &dyn VmAdapter,
        stdout_limit: usize,
        stderr_limit: usize,
    ) -> Result<VmExecutionOutput, WasmError>;
}
