//! A metered WASM engine (e.g. `wasmtime`) is the one component the worker
//! pool deliberately leaves pluggable; this binary wires up the trait but
//! does not ship an engine. Swap this for a real `WasmRuntime` to execute
//! oracle programs; until then every call fails loudly instead of silently
//! returning a fabricated result.

use async_trait::async_trait;

use seda_overlay_wasm::{VmAdapter, VmCallData, VmExecutionOutput, WasmError, WasmRuntime};

pub struct UnimplementedRuntime;

#[async_trait]
impl WasmRuntime for UnimplementedRuntime {
    async fn execute(
        &self,
        _module: &[u8],
        _call_data: &VmCallData,
        _adapter: &dyn VmAdapter,
        _stdout_limit: usize,
        _stderr_limit: usize,
    ) -> Result<VmExecutionOutput, WasmError> {
        Err(WasmError::Execution(
            "no WASM engine wired into this build; replace UnimplementedRuntime with a real WasmRuntime".to_string(),
        ))
    }
}
